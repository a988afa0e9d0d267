use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::models::{ticket::TicketStatus, user::User};
use crate::utils::serde_helpers::duration_string;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: u64,
    pub ticket_id: u64,
    pub user_id: Option<u64>,
    pub title: Option<String>,
    pub comment: String,
    pub public: bool,
    pub new_status: Option<TicketStatus>,
    #[serde(with = "duration_string")]
    pub time_spent: Option<chrono::Duration>,
    pub date: DateTime<Utc>,
    /// 邮件 Message-Id，用于回复线程匹配
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpAttachment {
    pub id: u64,
    pub followup_id: u64,
    pub file: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FollowUpDetail {
    pub followup: FollowUp,
    pub user: Option<User>,
    pub attachments: Vec<FollowUpAttachment>,
}

/// 上传的附件 (base64 编码内容)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AttachmentUpload {
    #[validate(length(min = 1, max = 255, message = "Attachment filename is required."))]
    pub filename: String,
    pub mime_type: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateFollowUpRequest {
    pub ticket: u64,
    pub user: Option<u64>,
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub title: Option<String>,
    pub comment: Option<String>,
    pub public: Option<bool>,
    pub new_status: Option<TicketStatus>,
    #[serde(default, with = "duration_string")]
    pub time_spent: Option<chrono::Duration>,
    #[serde(default)]
    #[validate]
    pub attachments: Vec<AttachmentUpload>,
}

/// Default follow-up title for a status transition.
pub fn title_for_status(new_status: Option<TicketStatus>) -> &'static str {
    match new_status {
        Some(TicketStatus::Resolved) => "Resolved",
        Some(TicketStatus::Closed) => "Closed",
        Some(TicketStatus::Reopened) => "Reopened",
        _ => "Comment",
    }
}
