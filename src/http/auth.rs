//! Shared-secret authentication for webhook routes.
//!
//! # Responsibilities
//! - Pin the live generation once per request
//! - Compare the presented secret against that generation's secret
//! - Reject with a fixed 401 before any routing or body parsing
//!
//! # Design Decisions
//! - The secret is accepted from `X-Api-Key` or the `apikey` query parameter;
//!   the header wins when both are present
//! - Comparison is constant-time over SHA-256 digests
//! - Rejections log the request ID and path only, never the presented value

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id_of;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::registry::RegistryGeneration;

pub const X_API_KEY: &str = "x-api-key";
pub const API_KEY_QUERY: &str = "apikey";

/// The generation a request was authenticated against.
///
/// Everything downstream of authentication reads from this snapshot, so one
/// request never observes two generations.
#[derive(Debug, Clone)]
pub struct PinnedGeneration(pub Arc<RegistryGeneration>);

/// Extract the presented secret: header first, then query string.
pub fn presented_secret<B>(request: &axum::http::Request<B>) -> Option<String> {
    if let Some(value) = request.headers().get(X_API_KEY) {
        return value.to_str().ok().map(str::to_string);
    }

    request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == API_KEY_QUERY)
            .map(|(_, value)| value.into_owned())
    })
}

/// Middleware authenticating webhook requests.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let generation = state.live.load();

    let authorized = presented_secret(&request)
        .map(|candidate| generation.secret().verify(&candidate))
        .unwrap_or(false);

    if !authorized {
        metrics::record_auth_failure();
        tracing::warn!(
            request_id = %request_id_of(&request),
            path = %request.uri().path(),
            "Rejected request with missing or invalid secret"
        );
        return ApiError::Unauthorized.into_response();
    }

    request.extensions_mut().insert(PinnedGeneration(generation));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn request(uri: &str, header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header(X_API_KEY, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn header_is_read() {
        let r = request("/api/radarr/1", Some("s3cret"));
        assert_eq!(presented_secret(&r).as_deref(), Some("s3cret"));
    }

    #[test]
    fn query_is_read_and_decoded() {
        let r = request("/api/radarr/1?foo=1&apikey=a%20b", None);
        assert_eq!(presented_secret(&r).as_deref(), Some("a b"));
    }

    #[test]
    fn header_wins_over_query() {
        let r = request("/api/radarr/1?apikey=query", Some("header"));
        assert_eq!(presented_secret(&r).as_deref(), Some("header"));
    }

    #[test]
    fn absent_secret_is_none() {
        assert_eq!(presented_secret(&request("/api/radarr/1?x=y", None)), None);
        assert_eq!(presented_secret(&request("/api/radarr/1", None)), None);
    }
}
