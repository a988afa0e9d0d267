use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub default_owner: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQueueRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    /// Generated from the title when omitted.
    #[validate(length(min = 1, max = 50))]
    pub slug: Option<String>,
    pub default_owner: Option<u64>,
}
