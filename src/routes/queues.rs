use crate::{
    error::Result,
    models::{
        queue::{CreateQueueRequest, Queue},
        response::ApiResponse,
    },
    state::AppState,
    utils::middleware::StaffUser,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_queues).post(create_queue))
}

/// GET /api/queues
pub async fn list_queues(
    State(app_state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
) -> Result<Json<ApiResponse<Vec<Queue>>>> {
    Ok(Json(ApiResponse::success(app_state.queue_service.queues_for(Some(&user)))))
}

/// POST /api/queues
pub async fn create_queue(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
    Json(request): Json<CreateQueueRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Queue>>)> {
    let queue = app_state.queue_service.create_queue(request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(queue))))
}
