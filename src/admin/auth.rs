use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id_of;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let generation = state.live.load();

    let Some(admin_key) = generation.admin_key() else {
        return ApiError::NotFound(request.uri().path().to_string()).into_response();
    };

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if admin_key.verify(token) => next.run(request).await,
        _ => {
            metrics::record_auth_failure();
            tracing::warn!(
                request_id = %request_id_of(&request),
                path = %request.uri().path(),
                "Rejected admin request"
            );
            ApiError::Unauthorized.into_response()
        }
    }
}
