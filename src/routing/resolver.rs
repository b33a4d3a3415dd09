//! Instance resolution and request timing.
//!
//! # Responsibilities
//! - Parse the raw instance id from the path
//! - Map (family, 1-based id) onto the pinned generation
//! - Produce the typed RequestContext handed to dispatch
//! - Time resolution + dispatch and report it in `X-Request-Time`
//!
//! # Design Decisions
//! - The context is a plain struct passed by value; no type-keyed lookups
//! - Resolution is pure and in-memory; it never touches the network
//! - Unknown families are not an error here: they resolve to an empty context

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use axum::response::Response;

use crate::registry::{BackendFamily, BackendInstance, RegistryGeneration};

pub const X_REQUEST_TIME: &str = "x-request-time";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("instance id {0:?} is not a number")]
    InvalidId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{family} instance {index} is not configured ({available} configured)")]
    NoSuchInstance {
        family: BackendFamily,
        index: i64,
        available: usize,
    },
}

/// Per-request routing result, owned by exactly one request.
#[derive(Debug)]
pub struct RequestContext {
    /// The path segment as received, for messages about unknown apps.
    pub app: String,
    pub family: Option<BackendFamily>,
    /// The resolved target; `None` when the family is unknown.
    pub instance: Option<Arc<BackendInstance>>,
    pub generation_id: u64,
}

/// Parse a base-10 instance id. Range checks happen during resolution.
///
/// Ids beyond `i64` saturate, so they fail resolution like any other
/// out-of-range id instead of being rejected as malformed.
pub fn parse_index(raw: &str) -> Result<i64, RoutingError> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RoutingError::InvalidId(raw.to_string()));
    }
    Ok(raw
        .parse::<i64>()
        .unwrap_or(if negative { i64::MIN } else { i64::MAX }))
}

/// Resolves ids against one pinned generation.
pub struct InstanceResolver {
    generation: Arc<RegistryGeneration>,
}

impl InstanceResolver {
    pub fn new(generation: Arc<RegistryGeneration>) -> Self {
        Self { generation }
    }

    /// Select element `index - 1` of the family's ordered instances.
    pub fn resolve(
        &self,
        family: BackendFamily,
        index: i64,
    ) -> Result<Arc<BackendInstance>, ResolutionError> {
        let instances = self.generation.instances(family);
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| instances.get(i))
            .cloned()
            .ok_or(ResolutionError::NoSuchInstance {
                family,
                index,
                available: instances.len(),
            })
    }

    /// Build the request context for an `/api/<app>/<id>` request.
    pub fn bind(&self, app: &str, index: i64) -> Result<RequestContext, ResolutionError> {
        let Some(family) = BackendFamily::from_path_segment(app) else {
            tracing::debug!(app, "Unknown app, passing through without an instance");
            return Ok(RequestContext {
                app: app.to_string(),
                family: None,
                instance: None,
                generation_id: self.generation.id(),
            });
        };

        let instance = self.resolve(family, index).inspect_err(|_| {
            tracing::warn!(%family, index, generation = self.generation.id(), "No such instance");
        })?;
        tracing::debug!(%family, index, name = %instance.name, "Instance resolved");

        Ok(RequestContext {
            app: app.to_string(),
            family: Some(family),
            instance: Some(instance),
            generation_id: self.generation.id(),
        })
    }
}

/// Render an elapsed duration rounded to whole microseconds, e.g. `1.234ms`.
///
/// Header values must be visible ASCII, so the micro sign is spelled `us`.
pub fn format_request_time(elapsed: Duration) -> String {
    let rounded = Duration::from_micros((elapsed.as_nanos() as f64 / 1_000.0).round() as u64);
    format!("{rounded:?}").replace('µ', "u")
}

/// Run `downstream` and stamp the response with its duration.
pub async fn timed<F>(downstream: F) -> Response
where
    F: Future<Output = Response>,
{
    let start = Instant::now();
    let mut response = downstream.await;
    if let Ok(value) = HeaderValue::from_str(&format_request_time(start.elapsed())) {
        response.headers_mut().insert(X_REQUEST_TIME, value);
    }
    response
}
