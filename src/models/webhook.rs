use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// 事件类型，决定使用哪组 webhook 地址和哪种载荷结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewTicket,
    FollowUp,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewTicket => "new_ticket",
            EventKind::FollowUp => "followup",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable notification, built once after the entity is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// 2xx response
    Delivered { status: u16 },
    /// Any other HTTP status
    Rejected { status: u16 },
    /// Connection error, timeout, or the request could not be built
    Failed { error: String },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub endpoint: String,
    pub outcome: DeliveryOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event_id: Uuid,
    pub kind: EventKind,
    /// In endpoint order.
    pub attempts: Vec<DeliveryAttempt>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempts.len() - self.delivered()
    }
}
