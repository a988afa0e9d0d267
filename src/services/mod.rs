pub mod attachment;
pub mod custom_field;
pub mod database;
pub mod email;
pub mod endpoint_registry;
pub mod followup;
pub mod queue;
pub mod ticket;
pub mod user;
pub mod webhook;

// 重新导出常用类型
pub use custom_field::CustomFieldService;
pub use database::Database;
pub use email::EmailService;
pub use endpoint_registry::{EndpointRegistry, EnvEndpointRegistry, StaticEndpointRegistry};
pub use followup::FollowUpService;
pub use queue::QueueService;
pub use ticket::TicketService;
pub use user::UserService;
pub use webhook::WebhookDispatcher;
