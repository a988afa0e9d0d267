use crate::{error::AppError, models::user::User, state::AppState};
use axum::{
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
    body::Body,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 网关注入的调用者用户名
pub const USER_HEADER: &str = "x-helpdesk-user";

/// 身份中间件
///
/// 认证由前置网关完成；这里只把网关转发的用户名解析为本地用户，
/// 并放入请求扩展中供后续处理器使用。未知或停用的用户按匿名请求处理。
pub async fn identity_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if let Some(username) = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        match app_state.user_service.find_by_username(username) {
            Some(user) if user.is_active => {
                debug!("Resolved caller: {} ({})", user.username, user.id);
                request.extensions_mut().insert(user);
            }
            Some(_) => {
                warn!("Ignoring inactive user {}", username);
            }
            None => {
                debug!("Unknown user in {} header: {}", USER_HEADER, username);
            }
        }
    }

    Ok(next.run(request).await)
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "-".to_string());

    let start_time = std::time::Instant::now();

    debug!("Incoming request [{}]: {} {}", request_id, method, uri);

    let response = next.run(request).await;

    let elapsed = start_time.elapsed();
    let status = response.status();

    info!(
        "Request completed [{}]: {} {} {} - {}ms",
        request_id,
        method,
        uri,
        status.as_u16(),
        elapsed.as_millis()
    );

    response
}

/// 请求 ID 中间件，须位于日志中间件外层
pub async fn request_id_middleware(
    mut request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 请求 ID 包装器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Staff-only extractor: 401 without a caller, 403 for non-staff callers.
pub struct StaffUser(pub User);

#[async_trait::async_trait]
impl<S> axum::extract::FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<User>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))?;

        if !user.is_staff {
            return Err(AppError::forbidden("You do not have permission to perform this action."));
        }

        Ok(StaffUser(user))
    }
}
