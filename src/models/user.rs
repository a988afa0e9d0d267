use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Full name, falling back to email and then username.
    pub fn display_name(&self) -> String {
        let full_name = self.full_name();
        if !full_name.is_empty() {
            full_name
        } else if !self.email.is_empty() {
            self.email.clone()
        } else {
            self.username.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[validate(length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."))]
    pub username: String,

    #[validate(custom = "crate::utils::validation::optional_email")]
    pub email: Option<String>,

    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,

    #[serde(default)]
    pub is_staff: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, email: &str) -> User {
        User {
            id: 1,
            username: "jdoe".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
            is_staff: true,
            is_active: true,
            password_hash: "secret".to_string(),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(user("Jane", "Doe", "jane@example.com").display_name(), "Jane Doe");
        assert_eq!(user("", "", "jane@example.com").display_name(), "jane@example.com");
        assert_eq!(user("", "", "").display_name(), "jdoe");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let value = serde_json::to_value(user("Jane", "Doe", "")).unwrap();
        assert!(value.get("password_hash").is_none());
    }
}
