use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

/// 可选邮箱字段：空白视为未填写，否则须为合法地址
pub fn optional_email(email: &str) -> std::result::Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Ok(());
    }

    if email.len() > 254 || !validator::validate_email(email) {
        let mut error = ValidationError::new("email");
        error.message = Some("Enter a valid email address.".into());
        return Err(error);
    }

    Ok(())
}

/// Blank optional text becomes `None`.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 用户名只能包含字母、数字以及 @/./+/-/_
pub fn validate_username(username: &str) -> Result<()> {
    static USERNAME: OnceLock<Regex> = OnceLock::new();
    let pattern = USERNAME.get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));

    if username.trim().is_empty() {
        return Err(AppError::field("username", "This field is required."));
    }

    if username.len() > 150 {
        return Err(AppError::field("username", "Ensure this field has no more than 150 characters."));
    }

    if !pattern.is_match(username) {
        return Err(AppError::field(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    Ok(())
}

/// Queue slugs appear inside ticket references, so they stay URL-safe.
pub fn validate_slug(slug: &str) -> Result<()> {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    let pattern = SLUG.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid regex"));

    if !pattern.is_match(slug) {
        return Err(AppError::field(
            "slug",
            "Enter a valid slug consisting of lowercase letters, numbers or hyphens.",
        ));
    }

    Ok(())
}

/// 清理文件名中的路径分隔符和控制字符
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}
