//! Canonical JSON documents for tickets, follow-ups, attachments and users.
//!
//! These are the shapes the read API returns and the webhook payloads embed.
//! A ticket document nests its complete follow-up list, and each follow-up
//! nests its attachments.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{
    followup::{FollowUpAttachment, FollowUpDetail},
    ticket::{priority_css_class, TicketDetail, TicketStatus},
    user::User,
};
use crate::utils::humanize::{format_time_spent, naturaltime};
use crate::utils::serde_helpers::duration_string;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpAttachmentDocument {
    pub id: u64,
    pub followup: u64,
    pub file: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpDocument {
    pub id: u64,
    pub ticket: u64,
    pub user: Option<u64>,
    pub title: Option<String>,
    pub comment: String,
    pub public: bool,
    pub new_status: Option<TicketStatus>,
    #[serde(with = "duration_string")]
    pub time_spent: Option<chrono::Duration>,
    pub followupattachment_set: Vec<FollowUpAttachmentDocument>,
    pub date: DateTime<Utc>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDocument {
    pub id: u64,
    pub queue: u64,
    pub title: String,
    pub description: String,
    pub resolution: Option<String>,
    pub submitter_email: Option<String>,
    pub assigned_to: Option<u64>,
    pub status: TicketStatus,
    pub on_hold: bool,
    pub priority: u8,
    pub due_date: Option<DateTime<Utc>>,
    pub merged_to: Option<u64>,
    pub followup_set: Vec<FollowUpDocument>,
    /// `custom_<name>` -> value, one entry per defined field.
    #[serde(flatten)]
    pub custom_fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRef {
    pub title: String,
    pub id: u64,
}

/// Row shape consumed by the staff ticket table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatatablesTicketRow {
    pub ticket: String,
    pub id: u64,
    pub priority: u8,
    pub title: String,
    pub queue: QueueRef,
    pub status: String,
    pub created: String,
    pub due_date: Option<String>,
    pub assigned_to: String,
    pub submitter: Option<String>,
    pub last_followup: Option<DateTime<Utc>>,
    pub row_class: String,
    pub time_spent: String,
    pub kbitem: String,
}

/// Public listing; private fields stay out of this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicTicketListing {
    pub ticket: String,
    pub id: u64,
    pub title: String,
    pub queue: QueueRef,
    pub status: String,
    pub created: String,
    pub due_date: Option<String>,
    pub submitter: Option<String>,
    pub kbitem: String,
    pub secret_key: String,
    #[serde(flatten)]
    pub custom_fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

impl From<&FollowUpAttachment> for FollowUpAttachmentDocument {
    fn from(attachment: &FollowUpAttachment) -> Self {
        Self {
            id: attachment.id,
            followup: attachment.followup_id,
            file: attachment.file.clone(),
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            size: attachment.size,
        }
    }
}

impl From<&FollowUpDetail> for FollowUpDocument {
    fn from(detail: &FollowUpDetail) -> Self {
        let followup = &detail.followup;
        Self {
            id: followup.id,
            ticket: followup.ticket_id,
            user: followup.user_id,
            title: followup.title.clone(),
            comment: followup.comment.clone(),
            public: followup.public,
            new_status: followup.new_status,
            time_spent: followup.time_spent,
            followupattachment_set: detail.attachments.iter().map(Into::into).collect(),
            date: followup.date,
            message_id: followup.message_id.clone(),
        }
    }
}

impl From<&TicketDetail> for TicketDocument {
    fn from(detail: &TicketDetail) -> Self {
        let ticket = &detail.ticket;
        Self {
            id: ticket.id,
            queue: ticket.queue_id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            resolution: ticket.resolution.clone(),
            submitter_email: ticket.submitter_email.clone(),
            assigned_to: ticket.assigned_to,
            status: ticket.status,
            on_hold: ticket.on_hold,
            priority: ticket.priority,
            due_date: ticket.due_date,
            merged_to: ticket.merged_to,
            followup_set: detail.followups.iter().map(Into::into).collect(),
            custom_fields: custom_field_map(detail),
        }
    }
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

fn custom_field_map(detail: &TicketDetail) -> BTreeMap<String, Value> {
    detail
        .custom_field_names
        .iter()
        .map(|name| {
            let value = detail
                .ticket
                .custom_values
                .get(name)
                .cloned()
                .unwrap_or(Value::Null);
            (format!("custom_{}", name), value)
        })
        .collect()
}

fn queue_ref(detail: &TicketDetail) -> QueueRef {
    QueueRef {
        title: detail.queue.title.clone(),
        id: detail.queue.id,
    }
}

impl DatatablesTicketRow {
    pub fn build(detail: &TicketDetail, now: DateTime<Utc>) -> Self {
        let ticket = &detail.ticket;
        Self {
            ticket: format!("{} {}", ticket.id, detail.reference()),
            id: ticket.id,
            priority: ticket.priority,
            title: ticket.title.clone(),
            queue: queue_ref(detail),
            status: detail.status_display(),
            created: naturaltime(ticket.created, now),
            due_date: ticket.due_date.map(|due| naturaltime(due, now)),
            assigned_to: detail
                .assignee
                .as_ref()
                .map(User::display_name)
                .unwrap_or_else(|| "None".to_string()),
            submitter: ticket.submitter_email.clone(),
            last_followup: detail.last_followup(),
            row_class: priority_css_class(ticket.priority).to_string(),
            time_spent: format_time_spent(detail.time_spent()),
            kbitem: ticket.kbitem.clone().unwrap_or_default(),
        }
    }
}

impl PublicTicketListing {
    pub fn build(detail: &TicketDetail, now: DateTime<Utc>) -> Self {
        let ticket = &detail.ticket;
        Self {
            ticket: format!("{} {}", ticket.id, detail.reference()),
            id: ticket.id,
            title: ticket.title.clone(),
            queue: queue_ref(detail),
            status: detail.status_display(),
            created: naturaltime(ticket.created, now),
            due_date: ticket.due_date.map(|due| naturaltime(due, now)),
            submitter: ticket.submitter_email.clone(),
            kbitem: ticket.kbitem.clone().unwrap_or_default(),
            secret_key: ticket.secret_key.clone(),
            custom_fields: custom_field_map(detail),
        }
    }
}
