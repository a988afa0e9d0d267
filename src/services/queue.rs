use crate::{
    error::{AppError, Result},
    models::{queue::{CreateQueueRequest, Queue}, user::User},
    services::Database,
    utils::validation::validate_slug,
};
use tracing::info;
use validator::Validate;

#[derive(Clone)]
pub struct QueueService {
    db: Database,
}

impl QueueService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_queue(&self, request: CreateQueueRequest) -> Result<Queue> {
        request.validate()?;

        let explicit_slug = request.slug.clone();
        if let Some(slug) = &explicit_slug {
            validate_slug(slug)?;
        }

        let queue = self.db.transaction(|tables| {
            if let Some(owner) = request.default_owner {
                if !tables.users.contains_key(&owner) {
                    return Err(AppError::field("default_owner", "Select a valid user."));
                }
            }

            let slug = match explicit_slug {
                Some(slug) => {
                    if tables.queue_by_slug(&slug).is_some() {
                        return Err(AppError::field("slug", "Queue with this slug already exists."));
                    }
                    slug
                }
                None => {
                    let base = match slug::slugify(&request.title) {
                        s if s.is_empty() => "queue".to_string(),
                        s => s,
                    };
                    let mut candidate = base.clone();
                    let mut counter = 1;
                    while tables.queue_by_slug(&candidate).is_some() {
                        candidate = format!("{}-{}", base, counter);
                        counter += 1;
                    }
                    candidate
                }
            };

            let queue = Queue {
                id: tables.next_id("queue"),
                title: request.title.clone(),
                slug,
                default_owner: request.default_owner,
            };
            tables.queues.insert(queue.id, queue.clone());
            Ok(queue)
        })?;

        info!("Created queue {} ({})", queue.slug, queue.id);
        Ok(queue)
    }

    pub fn list_queues(&self) -> Vec<Queue> {
        self.db.read(|t| t.queues.values().cloned().collect())
    }

    /// Queues the user may file tickets into.
    pub fn queues_for(&self, user: Option<&User>) -> Vec<Queue> {
        match user {
            Some(user) if queue_visible_to(user) => self.list_queues(),
            _ => Vec::new(),
        }
    }
}

/// 员工可见全部队列
pub fn queue_visible_to(user: &User) -> bool {
    user.is_staff && user.is_active
}
