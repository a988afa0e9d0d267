use crate::{
    error::Result,
    models::{
        email::{EmailOutcome, IngestEmailRequest},
        response::ApiResponse,
    },
    state::AppState,
    utils::middleware::StaffUser,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/inbound", post(ingest_email))
}

/// 邮件网关转发的已解析邮件
/// POST /api/email/inbound
pub async fn ingest_email(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_gateway): StaffUser,
    Json(request): Json<IngestEmailRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EmailOutcome>>)> {
    debug!(
        "Inbound email from {} with subject {:?}",
        request.payload.sender_email, request.payload.subject
    );

    let outcome = app_state
        .email_service
        .create_object_from_email_message(request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}
