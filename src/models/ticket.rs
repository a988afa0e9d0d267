use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

use crate::models::{
    followup::{AttachmentUpload, FollowUpDetail},
    queue::Queue,
    user::User,
};

pub const DEFAULT_PRIORITY: u8 = 3;

/// 工单状态，线上以整数表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TicketStatus {
    Open,
    Reopened,
    Resolved,
    Closed,
    Duplicate,
    New,
}

impl TicketStatus {
    pub fn code(&self) -> u8 {
        match self {
            TicketStatus::Open => 1,
            TicketStatus::Reopened => 2,
            TicketStatus::Resolved => 3,
            TicketStatus::Closed => 4,
            TicketStatus::Duplicate => 5,
            TicketStatus::New => 6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::Reopened => "Reopened",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
            TicketStatus::Duplicate => "Duplicate",
            TicketStatus::New => "New",
        }
    }
}

impl From<TicketStatus> for u8 {
    fn from(status: TicketStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for TicketStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TicketStatus::Open),
            2 => Ok(TicketStatus::Reopened),
            3 => Ok(TicketStatus::Resolved),
            4 => Ok(TicketStatus::Closed),
            5 => Ok(TicketStatus::Duplicate),
            6 => Ok(TicketStatus::New),
            other => Err(format!("\"{}\" is not a valid status.", other)),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bootstrap-style row class used by the staff ticket table.
pub fn priority_css_class(priority: u8) -> &'static str {
    match priority {
        1 => "danger",
        2 => "warning",
        5 => "success",
        _ => "",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub queue_id: u64,
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
    pub kbitem: Option<String>,
    pub secret_key: String,
    /// 自定义字段值，键为字段名 (不带 custom_ 前缀)
    pub custom_values: BTreeMap<String, Value>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A ticket with every relation resolved, as read at one instant.
#[derive(Debug, Clone)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub queue: Queue,
    pub assignee: Option<User>,
    /// Ordered by date, then id.
    pub followups: Vec<FollowUpDetail>,
    /// Names of the custom fields defined when the snapshot was taken.
    pub custom_field_names: Vec<String>,
}

impl TicketDetail {
    /// `<slug>-<id>`, the form used in URLs and email subjects.
    pub fn ticket_for_url(&self) -> String {
        format!("{}-{}", self.queue.slug, self.ticket.id)
    }

    /// `[<slug>-<id>]`
    pub fn reference(&self) -> String {
        format!("[{}]", self.ticket_for_url())
    }

    pub fn status_display(&self) -> String {
        if self.ticket.on_hold {
            format!("{} - On Hold", self.ticket.status.label())
        } else {
            self.ticket.status.label().to_string()
        }
    }

    /// Sum of follow-up time spent, saturating at the largest duration.
    pub fn time_spent(&self) -> Option<chrono::Duration> {
        let spent: Vec<chrono::Duration> = self
            .followups
            .iter()
            .filter_map(|f| f.followup.time_spent)
            .collect();

        if spent.is_empty() {
            None
        } else {
            Some(spent.into_iter().fold(chrono::Duration::zero(), |acc, d| {
                acc.checked_add(&d).unwrap_or_else(chrono::Duration::max_value)
            }))
        }
    }

    pub fn last_followup(&self) -> Option<DateTime<Utc>> {
        self.followups.last().map(|f| f.followup.date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTicketRequest {
    pub queue: u64,
    #[validate(length(min = 1, max = 200, message = "Ensure this field has between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
    pub resolution: Option<String>,
    #[validate(custom = "crate::utils::validation::optional_email")]
    pub submitter_email: Option<String>,
    pub assigned_to: Option<u64>,
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub on_hold: bool,
    #[validate(range(min = 1, max = 5, message = "Select a valid priority."))]
    pub priority: Option<u8>,
    pub due_date: Option<DateTime<Utc>>,
    pub merged_to: Option<u64>,
    pub attachment: Option<AttachmentUpload>,
    /// Remaining keys; `custom_<name>` entries carry custom field values.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTicketRequest {
    pub queue: Option<u64>,
    #[validate(length(min = 1, max = 200, message = "Ensure this field has between 1 and 200 characters."))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub resolution: Option<String>,
    #[validate(custom = "crate::utils::validation::optional_email")]
    pub submitter_email: Option<String>,
    pub assigned_to: Option<u64>,
    pub status: Option<TicketStatus>,
    pub on_hold: Option<bool>,
    #[validate(range(min = 1, max = 5, message = "Select a valid priority."))]
    pub priority: Option<u8>,
    pub due_date: Option<DateTime<Utc>>,
    pub merged_to: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Keeps only `custom_<name>` keys, stripped of the prefix.
pub fn custom_field_input(extra: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    extra
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix("custom_")
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect()
}
