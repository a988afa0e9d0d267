use crate::{
    error::Result,
    models::{document::PublicTicketListing, response::ApiResponse},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tickets", get(list_public_tickets))
}

/// 公开工单列表，无需身份
/// GET /api/public/tickets
pub async fn list_public_tickets(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<PublicTicketListing>>>> {
    let listing = app_state.ticket_service.public_listing(Utc::now())?;
    Ok(Json(ApiResponse::success(listing)))
}
