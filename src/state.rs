use crate::{
    config::Config,
    error::Result,
    services::{
        CustomFieldService, Database, EmailService, EndpointRegistry, FollowUpService, QueueService,
        TicketService, UserService, WebhookDispatcher,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据存储
    pub db: Database,

    /// Webhook 通知
    pub dispatcher: WebhookDispatcher,

    /// 用户服务
    pub user_service: UserService,

    /// 队列服务
    pub queue_service: QueueService,

    /// 自定义字段服务
    pub custom_field_service: CustomFieldService,

    /// 工单服务
    pub ticket_service: TicketService,

    /// 跟进服务
    pub followup_service: FollowUpService,

    /// 邮件接入服务
    pub email_service: EmailService,
}

impl AppState {
    /// Wires every service around one store and one dispatcher.
    pub fn new(config: Config, db: Database, registry: Arc<dyn EndpointRegistry>) -> Result<Self> {
        let dispatcher = WebhookDispatcher::new(registry, &config)?;

        let ticket_service = TicketService::new(db.clone(), dispatcher.clone(), config.max_attachment_size);
        let followup_service = FollowUpService::new(
            db.clone(),
            dispatcher.clone(),
            config.max_attachment_size,
            config.max_comment_length,
        );
        let email_service = EmailService::new(
            db.clone(),
            ticket_service.clone(),
            followup_service.clone(),
            config.max_attachment_size,
        )?;

        Ok(Self {
            user_service: UserService::new(db.clone()),
            queue_service: QueueService::new(db.clone()),
            custom_field_service: CustomFieldService::new(db.clone()),
            ticket_service,
            followup_service,
            email_service,
            dispatcher,
            db,
            config,
        })
    }
}
