/// 序列化/反序列化辅助模块

use chrono::Duration;

/// 将 `[D ]HH:MM:SS[.ffffff]` 格式的字符串解析为时长
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() || input.starts_with('-') {
        return None;
    }

    let (days, clock) = match input.split_once(' ') {
        Some((days, rest)) => (days.trim().parse::<i64>().ok()?, rest.trim()),
        None => (0, input),
    };

    let (clock, micros) = match clock.split_once('.') {
        Some((clock, fraction)) => {
            if fraction.is_empty() || fraction.len() > 6 || !fraction.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{:0<6}", fraction);
            (clock, padded.parse::<i64>().ok()?)
        }
        None => (clock, 0),
    };

    let parts: Vec<i64> = clock
        .split(':')
        .map(|p| p.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        [s] => (0, 0, *s),
        _ => return None,
    };

    if parts.len() > 1 && (minutes >= 60 || seconds >= 60) {
        return None;
    }

    // 超出 chrono 可表示范围时视为格式错误
    [
        Duration::try_days(days)?,
        Duration::try_hours(hours)?,
        Duration::try_minutes(minutes)?,
        Duration::try_seconds(seconds)?,
        Duration::microseconds(micros),
    ]
    .into_iter()
    .try_fold(Duration::zero(), |total, part| total.checked_add(&part))
}

/// 格式化为 `[D ]HH:MM:SS[.ffffff]`
pub fn format_duration(duration: &Duration) -> String {
    let negative = *duration < Duration::zero();
    let duration = if negative { -*duration } else { *duration };

    let days = duration.num_days();
    let total_seconds = duration.num_seconds() - days * 86_400;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let micros = Duration::try_seconds(duration.num_seconds())
        .and_then(|whole| duration.checked_sub(&whole))
        .and_then(|fraction| fraction.num_microseconds())
        .unwrap_or(0);

    let mut out = format!("{:02}:{:02}:{:02}", hours, minutes, seconds);
    if days != 0 {
        out = format!("{} {}", days, out);
    }
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

/// `Option<chrono::Duration>` 的字符串表示
pub mod duration_string {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_str(&format_duration(duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DurationValue {
            Text(String),
            Seconds(f64),
        }

        match Option::<DurationValue>::deserialize(deserializer)? {
            None => Ok(None),
            Some(DurationValue::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(DurationValue::Text(s)) => parse_duration(&s).map(Some).ok_or_else(|| {
                serde::de::Error::custom(
                    "Duration has wrong format. Use one of these formats instead: [DD] [HH:[MM:]]ss[.uuuuuu].",
                )
            }),
            Some(DurationValue::Seconds(secs)) if secs >= 0.0 => {
                Ok(Some(Duration::microseconds((secs * 1_000_000.0).round() as i64)))
            }
            Some(DurationValue::Seconds(_)) => {
                Err(serde::de::Error::custom("Duration must not be negative."))
            }
        }
    }
}
