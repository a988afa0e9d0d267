use crate::{
    error::Result,
    models::{
        custom_field::{CreateCustomFieldRequest, CustomField},
        response::ApiResponse,
    },
    state::AppState,
    utils::middleware::StaffUser,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_fields).post(create_field))
}

/// GET /api/custom-fields
pub async fn list_fields(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
) -> Result<Json<ApiResponse<Vec<CustomField>>>> {
    Ok(Json(ApiResponse::success(app_state.custom_field_service.list_fields())))
}

/// POST /api/custom-fields
pub async fn create_field(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
    Json(request): Json<CreateCustomFieldRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CustomField>>)> {
    let field = app_state.custom_field_service.create_field(request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(field))))
}
