use chrono::{DateTime, Duration, Utc};

const CHUNKS: [(i64, &str, &str); 6] = [
    (365 * 24 * 3600, "year", "years"),
    (30 * 24 * 3600, "month", "months"),
    (7 * 24 * 3600, "week", "weeks"),
    (24 * 3600, "day", "days"),
    (3600, "hour", "hours"),
    (60, "minute", "minutes"),
];

fn plural(count: i64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// 两级精度的时间跨度描述，例如 "2 weeks, 3 days"
pub fn timesince(seconds: i64) -> String {
    let seconds = seconds.max(0);

    for (i, (unit, singular, plural_name)) in CHUNKS.iter().enumerate() {
        let count = seconds / unit;
        if count == 0 {
            continue;
        }

        let mut out = plural(count, singular, plural_name);
        if let Some((next_unit, next_singular, next_plural)) = CHUNKS.get(i + 1) {
            let remainder = (seconds - count * unit) / next_unit;
            if remainder > 0 {
                out.push_str(", ");
                out.push_str(&plural(remainder, next_singular, next_plural));
            }
        }
        return out;
    }

    "0 minutes".to_string()
}

/// Relative description of `value` as seen from `now`, e.g. "3 hours ago" or
/// "a minute from now".
pub fn naturaltime(value: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let (delta, suffix) = if value <= now {
        (now - value, "ago")
    } else {
        (value - now, "from now")
    };

    if delta >= Duration::days(1) {
        return format!("{} {}", timesince(delta.num_seconds()), suffix);
    }

    let seconds = delta.num_seconds();
    match seconds {
        0 => "now".to_string(),
        1 => format!("a second {}", suffix),
        2..=59 => format!("{} seconds {}", seconds, suffix),
        60..=119 => format!("a minute {}", suffix),
        120..=3599 => format!("{} minutes {}", seconds / 60, suffix),
        3600..=7199 => format!("an hour {}", suffix),
        _ => format!("{} hours {}", seconds / 3600, suffix),
    }
}

/// `HHh:MMm`; empty when nothing was logged.
pub fn format_time_spent(time_spent: Option<Duration>) -> String {
    match time_spent {
        Some(spent) if spent > Duration::zero() => {
            let total = spent.num_seconds();
            format!("{:02}h:{:02}m", total / 3600, (total % 3600) / 60)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naturaltime_past() {
        let now = Utc::now();
        assert_eq!(naturaltime(now, now), "now");
        assert_eq!(naturaltime(now - Duration::seconds(1), now), "a second ago");
        assert_eq!(naturaltime(now - Duration::seconds(30), now), "30 seconds ago");
        assert_eq!(naturaltime(now - Duration::seconds(90), now), "a minute ago");
        assert_eq!(naturaltime(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(naturaltime(now - Duration::minutes(61), now), "an hour ago");
        assert_eq!(naturaltime(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(naturaltime(now - Duration::hours(27), now), "1 day, 3 hours ago");
        assert_eq!(naturaltime(now - Duration::days(17), now), "2 weeks, 3 days ago");
    }

    #[test]
    fn test_naturaltime_future() {
        let now = Utc::now();
        assert_eq!(naturaltime(now + Duration::minutes(10), now), "10 minutes from now");
        assert_eq!(naturaltime(now + Duration::days(2), now), "2 days from now");
    }

    #[test]
    fn test_format_time_spent() {
        assert_eq!(format_time_spent(None), "");
        assert_eq!(format_time_spent(Some(Duration::zero())), "");
        assert_eq!(format_time_spent(Some(Duration::minutes(75))), "01h:15m");
        assert_eq!(format_time_spent(Some(Duration::hours(26))), "26h:00m");
    }
}
