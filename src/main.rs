use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helpdesk::{
    config::Config,
    models::queue::CreateQueueRequest,
    services::{Database, EnvEndpointRegistry},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting helpdesk service ({})...", config.environment);
    if config.is_production() && config.webhook_secret.is_none() {
        warn!("HELPDESK_WEBHOOK_SECRET is not set, webhook requests will be unsigned");
    }

    let registry = Arc::new(EnvEndpointRegistry::from_config(&config));
    let app_state = Arc::new(AppState::new(config.clone(), Database::new(), registry)?);

    bootstrap(&app_state)?;

    let app = helpdesk::app(app_state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

/// 创建初始员工账号和默认队列
fn bootstrap(app_state: &AppState) -> anyhow::Result<()> {
    let config = &app_state.config;

    match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) => {
            let admin = app_state.user_service.ensure_staff_user(username, password)?;
            info!("Staff account ready: {}", admin.username);
        }
        (Some(username), None) => {
            warn!("HELPDESK_ADMIN_PASSWORD is not set, skipping staff account {}", username);
        }
        _ => {}
    }

    if let Some(title) = &config.default_queue {
        if app_state.queue_service.list_queues().is_empty() {
            let queue = app_state.queue_service.create_queue(CreateQueueRequest {
                title: title.clone(),
                slug: None,
                default_owner: None,
            })?;
            info!("Created default queue {} ({})", queue.title, queue.slug);
        }
    }

    Ok(())
}
