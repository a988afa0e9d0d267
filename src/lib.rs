pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    state::AppState,
    utils::middleware::{identity_middleware, request_id_middleware, request_logging_middleware},
};

/// Builds the full HTTP application around a shared state.
pub fn app(app_state: Arc<AppState>) -> Router {
    let origins: Vec<HeaderValue> = app_state
        .config
        .cors_allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(origins);

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/tickets", routes::tickets::router())
        .nest("/api/followups", routes::followups::router())
        .nest("/api/users", routes::users::router())
        .nest("/api/queues", routes::queues::router())
        .nest("/api/custom-fields", routes::custom_fields::router())
        .nest("/api/email", routes::email::router())
        .nest("/api/public", routes::public::router())
        .layer(middleware::from_fn_with_state(app_state.clone(), identity_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
