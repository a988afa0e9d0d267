use crate::{
    error::Result,
    models::{document::UserDocument, response::ApiResponse, user::CreateUserRequest},
    state::AppState,
    utils::middleware::StaffUser,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(create_user))
}

/// 创建用户
/// POST /api/users
pub async fn create_user(
    State(app_state): State<Arc<AppState>>,
    StaffUser(caller): StaffUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDocument>>)> {
    let user = app_state.user_service.create_user(request)?;

    info!("User {} created by {}", user.username, caller.username);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(UserDocument::from(&user)))))
}
