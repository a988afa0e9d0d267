use crate::{
    error::{AppError, Result},
    models::{
        followup::{title_for_status, CreateFollowUpRequest, FollowUp, FollowUpDetail},
        ticket::{TicketDetail, TicketStatus},
        user::User,
    },
    services::{
        attachment::{attach_to_followup, decode_uploads, DecodedAttachment},
        webhook::WebhookDispatcher,
        Database,
    },
};
use chrono::Utc;
use tracing::info;
use validator::Validate;

/// A follow-up ready to be appended to an existing ticket.
#[derive(Debug, Clone)]
pub struct FollowUpDraft {
    pub ticket_id: u64,
    pub author: Option<u64>,
    pub title: String,
    pub comment: String,
    pub public: bool,
    pub new_status: Option<TicketStatus>,
    /// Moves a Closed ticket to Reopened when no explicit status is given.
    pub reopen_if_closed: bool,
    pub time_spent: Option<chrono::Duration>,
    pub message_id: Option<String>,
    pub attachments: Vec<DecodedAttachment>,
}

#[derive(Clone)]
pub struct FollowUpService {
    db: Database,
    dispatcher: WebhookDispatcher,
    max_attachment_size: u64,
    max_comment_length: usize,
}

impl FollowUpService {
    pub fn new(
        db: Database,
        dispatcher: WebhookDispatcher,
        max_attachment_size: u64,
        max_comment_length: usize,
    ) -> Self {
        Self {
            db,
            dispatcher,
            max_attachment_size,
            max_comment_length,
        }
    }

    /// 添加跟进，工单状态和耗时更新提交后发送 FollowUp 通知
    pub async fn create_followup(&self, caller: &User, request: CreateFollowUpRequest) -> Result<FollowUpDetail> {
        request.validate()?;

        let comment = request.comment.unwrap_or_default();
        if comment.chars().count() > self.max_comment_length {
            return Err(AppError::field(
                "comment",
                &format!(
                    "Ensure this field has no more than {} characters.",
                    self.max_comment_length
                ),
            ));
        }

        if let Some(spent) = request.time_spent {
            if spent < chrono::Duration::zero() {
                return Err(AppError::field("time_spent", "Time spent cannot be negative."));
            }
        }

        let attachments = decode_uploads("attachments", &request.attachments, self.max_attachment_size)?;

        let draft = FollowUpDraft {
            ticket_id: request.ticket,
            author: Some(request.user.unwrap_or(caller.id)),
            title: request
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| title_for_status(request.new_status).to_string()),
            comment,
            public: request.public.unwrap_or(false),
            new_status: request.new_status,
            reopen_if_closed: false,
            time_spent: request.time_spent,
            message_id: None,
            attachments,
        };

        let (followup, _) = self.append_followup(draft).await?;
        Ok(followup)
    }

    /// Appends a follow-up and applies its status transition in one
    /// transaction, then dispatches FollowUp with the ticket as that
    /// transaction left it.
    pub async fn append_followup(&self, draft: FollowUpDraft) -> Result<(FollowUpDetail, TicketDetail)> {
        let (followup, ticket) = self.db.transaction(|tables| {
            let current_status = tables
                .tickets
                .get(&draft.ticket_id)
                .map(|ticket| ticket.status)
                .ok_or_else(|| AppError::field("ticket", "Invalid pk - object does not exist."))?;
            if let Some(uid) = draft.author {
                if !tables.users.contains_key(&uid) {
                    return Err(AppError::field("user", "Invalid pk - object does not exist."));
                }
            }

            let new_status = draft.new_status.or_else(|| {
                (draft.reopen_if_closed && current_status == TicketStatus::Closed).then_some(TicketStatus::Reopened)
            });
            // 在写锁内取时间，保证 (date, id) 顺序与提交顺序一致
            let now = Utc::now();

            let followup = FollowUp {
                id: tables.next_id("followup"),
                ticket_id: draft.ticket_id,
                user_id: draft.author,
                title: Some(draft.title.clone()),
                comment: draft.comment.clone(),
                public: draft.public,
                new_status,
                time_spent: draft.time_spent,
                date: now,
                message_id: draft.message_id.clone(),
            };
            let followup_id = followup.id;
            tables.followups.insert(followup_id, followup);

            let ticket = tables.ticket_mut(draft.ticket_id)?;
            if let Some(status) = new_status {
                ticket.status = status;
            }
            ticket.modified = now;

            attach_to_followup(tables, draft.ticket_id, followup_id, &draft.attachments)?;

            Ok((tables.followup_detail(followup_id)?, tables.ticket_detail(draft.ticket_id)?))
        })?;
        info!("Added follow-up {} to ticket {}", followup.followup.id, ticket.reference());

        self.dispatcher.notify_followup(&followup, &ticket).await;

        Ok((followup, ticket))
    }

    pub fn get_followup(&self, id: u64) -> Result<FollowUpDetail> {
        self.db.followup_detail(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::{queue::CreateQueueRequest, ticket::CreateTicketRequest},
        services::{
            endpoint_registry::StaticEndpointRegistry, queue::QueueService, ticket::TicketService,
            user::UserService,
        },
    };
    use serde_json::json;
    use std::sync::Arc;

    async fn setup() -> (FollowUpService, User, u64) {
        let db = Database::new();
        let dispatcher =
            WebhookDispatcher::new(Arc::new(StaticEndpointRegistry::new()), &Config::default()).unwrap();
        let staff = UserService::new(db.clone()).ensure_staff_user("staff", "pw").unwrap();
        let queue = QueueService::new(db.clone())
            .create_queue(CreateQueueRequest {
                title: "Test Queue".to_string(),
                slug: None,
                default_owner: None,
            })
            .unwrap();

        let request: CreateTicketRequest = serde_json::from_value(json!({
            "queue": queue.id,
            "title": "Test title",
            "description": "Test description"
        }))
        .unwrap();
        let ticket = TicketService::new(db.clone(), dispatcher.clone(), 1024)
            .create_ticket(&staff, request)
            .await
            .unwrap();

        (FollowUpService::new(db, dispatcher, 1024, 50), staff, ticket.ticket.id)
    }

    fn request(ticket: u64, body: serde_json::Value) -> CreateFollowUpRequest {
        let mut value = json!({ "ticket": ticket });
        if let (Some(value), Some(body)) = (value.as_object_mut(), body.as_object()) {
            value.extend(body.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_followup_defaults_and_author() {
        let (service, staff, ticket_id) = setup().await;
        let detail = service
            .create_followup(&staff, request(ticket_id, json!({"comment": "Test comment"})))
            .await
            .unwrap();

        assert_eq!(detail.followup.title.as_deref(), Some("Comment"));
        assert!(!detail.followup.public);
        assert_eq!(detail.followup.user_id, Some(staff.id));
        assert_eq!(detail.user.map(|u| u.id), Some(staff.id));
    }

    #[tokio::test]
    async fn test_status_transition_and_time_spent() {
        let (service, staff, ticket_id) = setup().await;
        service
            .create_followup(&staff, request(ticket_id, json!({"time_spent": "00:30:00"})))
            .await
            .unwrap();
        let (_, ticket) = service
            .append_followup(FollowUpDraft {
                ticket_id,
                author: None,
                title: title_for_status(Some(TicketStatus::Resolved)).to_string(),
                comment: "done".to_string(),
                public: true,
                new_status: Some(TicketStatus::Resolved),
                reopen_if_closed: false,
                time_spent: Some(chrono::Duration::minutes(45)),
                message_id: None,
                attachments: vec![],
            })
            .await
            .unwrap();

        assert_eq!(ticket.ticket.status, TicketStatus::Resolved);
        assert_eq!(ticket.time_spent(), Some(chrono::Duration::minutes(75)));
        assert_eq!(ticket.followups.last().map(|f| f.followup.comment.as_str()), Some("done"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_ticket_and_long_comment() {
        let (service, staff, ticket_id) = setup().await;

        assert!(service
            .create_followup(&staff, request(ticket_id + 100, json!({"comment": "x"})))
            .await
            .unwrap_err()
            .is_validation());

        let long = "x".repeat(51);
        assert!(service
            .create_followup(&staff, request(ticket_id, json!({ "comment": long })))
            .await
            .is_err());
    }

    fn draft(ticket_id: u64, comment: &str) -> FollowUpDraft {
        FollowUpDraft {
            ticket_id,
            author: None,
            title: "Comment".to_string(),
            comment: comment.to_string(),
            public: true,
            new_status: None,
            reopen_if_closed: false,
            time_spent: None,
            message_id: None,
            attachments: vec![],
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_followups_see_their_own_commit() {
        let (service, _, ticket_id) = setup().await;

        for round in 0..20 {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let service = service.clone();
                    let comment = format!("round {} writer {}", round, n);
                    tokio::spawn(async move {
                        let (followup, ticket) = service.append_followup(draft(ticket_id, &comment)).await.unwrap();
                        (comment, followup, ticket)
                    })
                })
                .collect();

            for handle in handles {
                let (comment, followup, ticket) = handle.await.unwrap();
                let last = &ticket.followups.last().unwrap().followup;
                assert_eq!(last.comment, comment);
                assert_eq!(last.id, followup.followup.id);
            }
        }
    }

    #[tokio::test]
    async fn test_reopen_if_closed_is_decided_at_commit() {
        let (service, _, ticket_id) = setup().await;

        let (followup, ticket) = service
            .append_followup(FollowUpDraft {
                reopen_if_closed: true,
                ..draft(ticket_id, "still open")
            })
            .await
            .unwrap();
        assert_eq!(followup.followup.new_status, None);
        assert_eq!(ticket.ticket.status, TicketStatus::Open);

        service
            .append_followup(FollowUpDraft {
                new_status: Some(TicketStatus::Closed),
                ..draft(ticket_id, "closing")
            })
            .await
            .unwrap();

        let (followup, ticket) = service
            .append_followup(FollowUpDraft {
                reopen_if_closed: true,
                ..draft(ticket_id, "back again")
            })
            .await
            .unwrap();
        assert_eq!(followup.followup.new_status, Some(TicketStatus::Reopened));
        assert_eq!(ticket.ticket.status, TicketStatus::Reopened);
    }

    #[tokio::test]
    async fn test_time_spent_total_saturates() {
        let (service, staff, ticket_id) = setup().await;
        for _ in 0..2 {
            service
                .create_followup(&staff, request(ticket_id, json!({"time_spent": "100000000000 00:00:00"})))
                .await
                .unwrap();
        }

        let ticket = service.db.ticket_detail(ticket_id).unwrap();
        assert_eq!(ticket.time_spent(), Some(chrono::Duration::max_value()));
    }

    #[test]
    fn test_overflowing_time_spent_is_rejected() {
        let result = serde_json::from_value::<CreateFollowUpRequest>(json!({
            "ticket": 1,
            "time_spent": "200000000000 00:00:00"
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<CreateFollowUpRequest>(json!({
            "ticket": 1,
            "time_spent": "99999999999999999"
        }));
        assert!(result.is_err());
    }
}
