use crate::{
    error::{AppError, Result},
    models::{
        document::{DatatablesTicketRow, PublicTicketListing},
        followup::FollowUp,
        ticket::{
            custom_field_input, CreateTicketRequest, Ticket, TicketDetail, TicketStatus,
            UpdateTicketRequest, DEFAULT_PRIORITY,
        },
        user::User,
    },
    services::{
        attachment::{attach_to_followup, decode_uploads, DecodedAttachment},
        custom_field::clean_custom_values,
        queue::queue_visible_to,
        webhook::WebhookDispatcher,
        Database,
    },
    utils::validation::blank_to_none,
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use validator::Validate;

const SECRET_KEY_LENGTH: usize = 32;

/// Everything needed to open a ticket, already validated at the field level.
#[derive(Debug, Clone)]
pub struct TicketDraft {
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
    /// Custom field input keyed by field name.
    pub custom_input: BTreeMap<String, Value>,
    /// Email tickets skip required custom fields.
    pub partial_custom_fields: bool,
    pub opening: OpeningFollowUp,
}

/// 建单时附带的首条跟进
#[derive(Debug, Clone)]
pub struct OpeningFollowUp {
    pub title: String,
    pub author: Option<u64>,
    pub message_id: Option<String>,
    pub attachments: Vec<DecodedAttachment>,
}

#[derive(Clone)]
pub struct TicketService {
    db: Database,
    dispatcher: WebhookDispatcher,
    max_attachment_size: u64,
}

impl TicketService {
    pub fn new(db: Database, dispatcher: WebhookDispatcher, max_attachment_size: u64) -> Self {
        Self {
            db,
            dispatcher,
            max_attachment_size,
        }
    }

    /// 创建工单，提交成功后发送 NewTicket 通知
    pub async fn create_ticket(&self, caller: &User, request: CreateTicketRequest) -> Result<TicketDetail> {
        request.validate()?;

        if !queue_visible_to(caller) {
            return Err(AppError::field("queue", "Select a valid choice."));
        }

        let attachments = match &request.attachment {
            Some(upload) => {
                upload.validate()?;
                decode_uploads("attachment", std::slice::from_ref(upload), self.max_attachment_size)?
            }
            None => Vec::new(),
        };

        let draft = TicketDraft {
            queue_id: request.queue,
            custom_input: custom_field_input(&request.extra),
            title: request.title,
            description: request.description,
            resolution: request.resolution,
            submitter_email: blank_to_none(request.submitter_email),
            assigned_to: request.assigned_to,
            status: request.status.unwrap_or(TicketStatus::Open),
            on_hold: request.on_hold,
            priority: request.priority.unwrap_or(DEFAULT_PRIORITY),
            due_date: request.due_date,
            merged_to: request.merged_to,
            partial_custom_fields: false,
            opening: OpeningFollowUp {
                title: "Ticket Opened".to_string(),
                author: Some(caller.id),
                message_id: None,
                attachments,
            },
        };

        let (detail, _) = self.open_ticket(draft).await?;
        Ok(detail)
    }

    /// Persists a ticket and its opening follow-up in one transaction, then
    /// dispatches NewTicket. Returns the committed snapshot and the opening
    /// follow-up id.
    pub async fn open_ticket(&self, draft: TicketDraft) -> Result<(TicketDetail, u64)> {
        let (detail, followup_id) = self.db.transaction(|tables| {
            let queue = tables
                .queue(draft.queue_id)
                .map_err(|_| AppError::field("queue", "Select a valid choice."))?
                .clone();

            if let Some(uid) = draft.assigned_to {
                if !tables.users.contains_key(&uid) {
                    return Err(AppError::field("assigned_to", "Select a valid choice."));
                }
            }
            if let Some(tid) = draft.merged_to {
                if !tables.tickets.contains_key(&tid) {
                    return Err(AppError::field("merged_to", "Select a valid choice."));
                }
            }

            let definitions = tables.custom_field_definitions();
            let custom_values = clean_custom_values(&definitions, &draft.custom_input, draft.partial_custom_fields)
                .map_err(AppError::FieldValidation)?;

            let now = Utc::now();
            let ticket = Ticket {
                id: tables.next_id("ticket"),
                queue_id: queue.id,
                title: draft.title.clone(),
                description: draft.description.clone(),
                resolution: draft.resolution.clone(),
                submitter_email: draft.submitter_email.clone(),
                assigned_to: draft.assigned_to.or(queue.default_owner),
                status: draft.status,
                on_hold: draft.on_hold,
                priority: draft.priority,
                due_date: draft.due_date,
                merged_to: draft.merged_to,
                kbitem: None,
                secret_key: generate_secret_key(),
                custom_values,
                created: now,
                modified: now,
            };
            let ticket_id = ticket.id;
            tables.tickets.insert(ticket_id, ticket);

            let followup = FollowUp {
                id: tables.next_id("followup"),
                ticket_id,
                user_id: draft.opening.author,
                title: Some(draft.opening.title.clone()),
                comment: draft.description.clone(),
                public: true,
                new_status: None,
                time_spent: None,
                date: now,
                message_id: draft.opening.message_id.clone(),
            };
            let followup_id = followup.id;
            tables.followups.insert(followup_id, followup);

            attach_to_followup(tables, ticket_id, followup_id, &draft.opening.attachments)?;

            Ok((tables.ticket_detail(ticket_id)?, followup_id))
        })?;
        info!("Opened ticket {} {}", detail.ticket.id, detail.reference());

        self.dispatcher.notify_new_ticket(&detail).await;

        Ok((detail, followup_id))
    }

    pub fn get_ticket(&self, id: u64) -> Result<TicketDetail> {
        self.db.ticket_detail(id)
    }

    pub fn list_tickets(&self) -> Result<Vec<TicketDetail>> {
        self.db.read(|t| {
            t.tickets
                .keys()
                .map(|id| t.ticket_detail(*id))
                .collect::<Result<Vec<_>>>()
        })
    }

    pub fn datatables(&self, now: DateTime<Utc>) -> Result<Vec<DatatablesTicketRow>> {
        Ok(self
            .list_tickets()?
            .iter()
            .map(|detail| DatatablesTicketRow::build(detail, now))
            .collect())
    }

    pub fn public_listing(&self, now: DateTime<Utc>) -> Result<Vec<PublicTicketListing>> {
        Ok(self
            .list_tickets()?
            .iter()
            .map(|detail| PublicTicketListing::build(detail, now))
            .collect())
    }

    /// 部分更新，不发送通知
    pub fn update_ticket(&self, id: u64, request: UpdateTicketRequest) -> Result<TicketDetail> {
        request.validate()?;

        self.db.transaction(|tables| {
            if let Some(queue_id) = request.queue {
                tables
                    .queue(queue_id)
                    .map_err(|_| AppError::field("queue", "Select a valid choice."))?;
            }
            if let Some(uid) = request.assigned_to {
                if !tables.users.contains_key(&uid) {
                    return Err(AppError::field("assigned_to", "Select a valid choice."));
                }
            }
            if let Some(tid) = request.merged_to {
                if tid == id || !tables.tickets.contains_key(&tid) {
                    return Err(AppError::field("merged_to", "Select a valid choice."));
                }
            }

            let definitions = tables.custom_field_definitions();
            let custom_values = clean_custom_values(&definitions, &custom_field_input(&request.extra), true)
                .map_err(AppError::FieldValidation)?;

            let ticket = tables.ticket_mut(id)?;
            if let Some(queue_id) = request.queue {
                ticket.queue_id = queue_id;
            }
            if let Some(title) = &request.title {
                ticket.title = title.clone();
            }
            if let Some(description) = &request.description {
                ticket.description = description.clone();
            }
            if let Some(resolution) = &request.resolution {
                ticket.resolution = Some(resolution.clone());
            }
            if request.submitter_email.is_some() {
                // 空字符串清除提交人
                ticket.submitter_email = blank_to_none(request.submitter_email.clone());
            }
            if request.assigned_to.is_some() {
                ticket.assigned_to = request.assigned_to;
            }
            if let Some(status) = request.status {
                ticket.status = status;
            }
            if let Some(on_hold) = request.on_hold {
                ticket.on_hold = on_hold;
            }
            if let Some(priority) = request.priority {
                ticket.priority = priority;
            }
            if request.due_date.is_some() {
                ticket.due_date = request.due_date;
            }
            if request.merged_to.is_some() {
                ticket.merged_to = request.merged_to;
            }
            ticket.custom_values.extend(custom_values);
            ticket.modified = Utc::now();

            debug!("Updated ticket {}", id);
            tables.ticket_detail(id)
        })
    }
}

fn generate_secret_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_KEY_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::{custom_field::{CreateCustomFieldRequest, CustomFieldType}, queue::CreateQueueRequest},
        services::{
            custom_field::CustomFieldService, endpoint_registry::StaticEndpointRegistry, queue::QueueService,
            user::UserService,
        },
    };
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        service: TicketService,
        staff: User,
        queue_id: u64,
        db: Database,
    }

    fn fixture() -> Fixture {
        let db = Database::new();
        let dispatcher =
            WebhookDispatcher::new(Arc::new(StaticEndpointRegistry::new()), &Config::default()).unwrap();
        let staff = UserService::new(db.clone()).ensure_staff_user("staff", "pw").unwrap();
        let queue = QueueService::new(db.clone())
            .create_queue(CreateQueueRequest {
                title: "Test Queue".to_string(),
                slug: None,
                default_owner: Some(staff.id),
            })
            .unwrap();

        Fixture {
            service: TicketService::new(db.clone(), dispatcher, 1024),
            staff,
            queue_id: queue.id,
            db,
        }
    }

    fn request(queue: u64, extra: serde_json::Value) -> CreateTicketRequest {
        let mut body = json!({
            "queue": queue,
            "title": "Test title",
            "description": "Test description\nMulti lines",
            "submitter_email": "test@mail.com",
            "priority": 4
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_create_ticket_with_opening_followup() {
        let f = fixture();
        let detail = f.service.create_ticket(&f.staff, request(f.queue_id, json!({}))).await.unwrap();

        assert_eq!(detail.ticket.status, TicketStatus::Open);
        assert_eq!(detail.ticket.priority, 4);
        assert_eq!(detail.ticket.secret_key.len(), SECRET_KEY_LENGTH);
        assert_eq!(detail.ticket.assigned_to, Some(f.staff.id));
        assert_eq!(detail.reference(), format!("[test-queue-{}]", detail.ticket.id));

        assert_eq!(detail.followups.len(), 1);
        let opening = &detail.followups[0].followup;
        assert_eq!(opening.title.as_deref(), Some("Ticket Opened"));
        assert_eq!(opening.comment, "Test description\nMulti lines");
        assert!(opening.public);
        assert_eq!(opening.user_id, Some(f.staff.id));
    }

    #[tokio::test]
    async fn test_create_ticket_stores_attachment_metadata() {
        let f = fixture();
        let detail = f
            .service
            .create_ticket(
                &f.staff,
                request(
                    f.queue_id,
                    json!({"attachment": {"filename": "log.txt", "mime_type": "text/plain", "content": "aGVsbG8="}}),
                ),
            )
            .await
            .unwrap();

        let attachments = &detail.followups[0].attachments;
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].size, 5);
        assert!(attachments[0].file.ends_with("/log.txt"));
    }

    #[tokio::test]
    async fn test_invalid_queue_leaves_nothing_behind() {
        let f = fixture();
        let err = f.service.create_ticket(&f.staff, request(999, json!({}))).await.unwrap_err();

        match err {
            AppError::FieldValidation(details) => assert!(details.contains_key("queue")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(f.db.ticket_ids().is_empty());
    }

    #[tokio::test]
    async fn test_required_custom_field() {
        let f = fixture();
        CustomFieldService::new(f.db.clone())
            .create_field(CreateCustomFieldRequest {
                name: "building".to_string(),
                label: "Building".to_string(),
                data_type: CustomFieldType::Varchar,
                required: true,
                max_length: Some(10),
                list_values: vec![],
                ordering: 0,
            })
            .unwrap();

        assert!(f.service.create_ticket(&f.staff, request(f.queue_id, json!({}))).await.is_err());

        let detail = f
            .service
            .create_ticket(&f.staff, request(f.queue_id, json!({"custom_building": "B4"})))
            .await
            .unwrap();
        assert_eq!(detail.ticket.custom_values["building"], json!("B4"));
    }

    #[tokio::test]
    async fn test_update_ticket() {
        let f = fixture();
        let detail = f.service.create_ticket(&f.staff, request(f.queue_id, json!({}))).await.unwrap();

        let updated = f
            .service
            .update_ticket(
                detail.ticket.id,
                UpdateTicketRequest {
                    status: Some(TicketStatus::Resolved),
                    on_hold: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.ticket.status, TicketStatus::Resolved);
        assert_eq!(updated.status_display(), "Resolved - On Hold");
        assert_eq!(updated.ticket.title, "Test title");
    }

    #[tokio::test]
    async fn test_blank_submitter_email_means_absent() {
        let f = fixture();
        let detail = f
            .service
            .create_ticket(&f.staff, request(f.queue_id, json!({"submitter_email": ""})))
            .await
            .unwrap();
        assert_eq!(detail.ticket.submitter_email, None);

        let detail = f.service.create_ticket(&f.staff, request(f.queue_id, json!({}))).await.unwrap();
        assert_eq!(detail.ticket.submitter_email.as_deref(), Some("test@mail.com"));

        let cleared = f
            .service
            .update_ticket(
                detail.ticket.id,
                UpdateTicketRequest {
                    submitter_email: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.ticket.submitter_email, None);

        let rejected = f.service.update_ticket(
            detail.ticket.id,
            UpdateTicketRequest {
                submitter_email: Some("not-an-email".to_string()),
                ..Default::default()
            },
        );
        assert!(rejected.unwrap_err().is_validation());
    }
}
