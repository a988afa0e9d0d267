use crate::{
    error::Result,
    models::{document::FollowUpDocument, followup::CreateFollowUpRequest, response::ApiResponse},
    state::AppState,
    utils::middleware::StaffUser,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_followup))
        .route("/:id", get(get_followup))
}

/// 添加跟进
/// POST /api/followups
pub async fn create_followup(
    State(app_state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Json(request): Json<CreateFollowUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FollowUpDocument>>)> {
    let ticket_id = request.ticket;
    let detail = app_state.followup_service.create_followup(&user, request).await?;

    info!(
        "Follow-up {} added to ticket {} by {}",
        detail.followup.id, ticket_id, user.username
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(FollowUpDocument::from(&detail)))))
}

/// GET /api/followups/:id
pub async fn get_followup(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
    Path(followup_id): Path<u64>,
) -> Result<Json<ApiResponse<FollowUpDocument>>> {
    let detail = app_state.followup_service.get_followup(followup_id)?;
    Ok(Json(ApiResponse::success(FollowUpDocument::from(&detail))))
}
