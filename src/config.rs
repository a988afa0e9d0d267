use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const NEW_TICKET_WEBHOOK_URLS_VAR: &str = "HELPDESK_NEW_TICKET_WEBHOOK_URLS";
pub const FOLLOWUP_WEBHOOK_URLS_VAR: &str = "HELPDESK_FOLLOWUP_WEBHOOK_URLS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Webhook configuration
    pub new_ticket_webhook_var: String,
    pub followup_webhook_var: String,
    pub webhook_timeout_secs: u64,
    pub webhook_secret: Option<String>,

    // Content settings
    pub max_comment_length: usize,
    pub max_attachment_size: u64,

    // Bootstrap data
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub default_queue: Option<String>,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "helpdesk=debug,tower_http=debug".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),

            new_ticket_webhook_var: NEW_TICKET_WEBHOOK_URLS_VAR.to_string(),
            followup_webhook_var: FOLLOWUP_WEBHOOK_URLS_VAR.to_string(),
            webhook_timeout_secs: env::var("HELPDESK_WEBHOOK_TIMEOUT")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            webhook_secret: env::var("HELPDESK_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),

            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()?,
            max_attachment_size: env::var("MAX_ATTACHMENT_SIZE")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()?,

            admin_username: env::var("HELPDESK_ADMIN_USERNAME").ok(),
            admin_password: env::var("HELPDESK_ADMIN_PASSWORD").ok(),
            default_queue: env::var("HELPDESK_DEFAULT_QUEUE").ok(),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            environment: "development".to_string(),
            log_level: "helpdesk=debug".to_string(),
            log_format: "pretty".to_string(),
            new_ticket_webhook_var: NEW_TICKET_WEBHOOK_URLS_VAR.to_string(),
            followup_webhook_var: FOLLOWUP_WEBHOOK_URLS_VAR.to_string(),
            webhook_timeout_secs: 3,
            webhook_secret: None,
            max_comment_length: 100_000,
            max_attachment_size: 10 * 1024 * 1024,
            admin_username: None,
            admin_password: None,
            default_queue: None,
            cors_allowed_origins: "http://localhost:3000".to_string(),
        }
    }
}
