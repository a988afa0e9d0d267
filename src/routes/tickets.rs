use crate::{
    error::Result,
    models::{
        document::{DatatablesTicketRow, TicketDocument},
        response::ApiResponse,
        ticket::{CreateTicketRequest, UpdateTicketRequest},
    },
    state::AppState,
    utils::middleware::StaffUser,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tickets).post(create_ticket))
        .route("/datatables", get(datatables))
        .route("/:id", get(get_ticket).patch(update_ticket))
}

/// 创建工单
/// POST /api/tickets
pub async fn create_ticket(
    State(app_state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TicketDocument>>)> {
    debug!("Ticket submitted by {} to queue {}", user.username, request.queue);

    let detail = app_state.ticket_service.create_ticket(&user, request).await?;

    info!("Ticket {} created by {}", detail.ticket.id, user.username);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(TicketDocument::from(&detail)))))
}

/// GET /api/tickets
pub async fn list_tickets(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
) -> Result<Json<Value>> {
    let tickets: Vec<TicketDocument> = app_state
        .ticket_service
        .list_tickets()?
        .iter()
        .map(TicketDocument::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": tickets
    })))
}

/// 员工工单表格数据
/// GET /api/tickets/datatables
pub async fn datatables(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
) -> Result<Json<ApiResponse<Vec<DatatablesTicketRow>>>> {
    let rows = app_state.ticket_service.datatables(Utc::now())?;
    Ok(Json(ApiResponse::success(rows)))
}

/// GET /api/tickets/:id
pub async fn get_ticket(
    State(app_state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
    Path(ticket_id): Path<u64>,
) -> Result<Json<ApiResponse<TicketDocument>>> {
    let detail = app_state.ticket_service.get_ticket(ticket_id)?;
    Ok(Json(ApiResponse::success(TicketDocument::from(&detail))))
}

/// PATCH /api/tickets/:id
pub async fn update_ticket(
    State(app_state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Path(ticket_id): Path<u64>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Json<ApiResponse<TicketDocument>>> {
    let detail = app_state.ticket_service.update_ticket(ticket_id, request)?;

    info!("Ticket {} updated by {}", ticket_id, user.username);
    Ok(Json(ApiResponse::success(TicketDocument::from(&detail))))
}
