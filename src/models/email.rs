use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::followup::AttachmentUpload;

/// Header fields of an already-parsed inbound message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, alias = "To")]
    pub to: Vec<String>,
    #[serde(default, alias = "Cc")]
    pub cc: Vec<String>,
    #[serde(default, alias = "Message-Id")]
    pub message_id: Option<String>,
    #[serde(default, alias = "In-Reply-To")]
    pub in_reply_to: Option<String>,
}

impl InboundMessage {
    /// `In-Reply-To` with blank values treated as absent.
    pub fn reply_to(&self) -> Option<&str> {
        self.in_reply_to
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmailPayload {
    pub body: String,
    pub full_body: Option<String>,
    pub subject: String,
    /// Queue id the mailbox feeds.
    pub queue: u64,
    #[validate(email(message = "Enter a valid email address."))]
    pub sender_email: String,
    pub priority: Option<String>,
    #[serde(default)]
    #[validate]
    pub files: Vec<AttachmentUpload>,
}

impl EmailPayload {
    /// 优先使用完整正文
    pub fn comment(&self) -> String {
        self.full_body
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.body)
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestEmailRequest {
    #[serde(default)]
    pub message: InboundMessage,
    pub ticket_id: Option<u64>,
    #[validate]
    pub payload: EmailPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "created", rename_all = "snake_case")]
pub enum EmailOutcome {
    Ticket { ticket_id: u64, followup_id: u64 },
    FollowUp { ticket_id: u64, followup_id: u64 },
}

impl EmailOutcome {
    pub fn ticket_id(&self) -> u64 {
        match self {
            EmailOutcome::Ticket { ticket_id, .. } | EmailOutcome::FollowUp { ticket_id, .. } => *ticket_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_header_aliases() {
        let message: InboundMessage = serde_json::from_value(json!({
            "To": ["info@example.com"],
            "Cc": [],
            "Message-Id": "random1",
            "In-Reply-To": ""
        }))
        .unwrap();

        assert_eq!(message.to, vec!["info@example.com".to_string()]);
        assert_eq!(message.message_id.as_deref(), Some("random1"));
        assert!(message.reply_to().is_none());
    }

    #[test]
    fn test_comment_prefers_full_body() {
        let payload = EmailPayload {
            body: "short".to_string(),
            full_body: Some("short\n\n> quoted".to_string()),
            subject: "Hi".to_string(),
            queue: 1,
            sender_email: "user@example.com".to_string(),
            priority: None,
            files: vec![],
        };
        assert_eq!(payload.comment(), "short\n\n> quoted");
    }
}
