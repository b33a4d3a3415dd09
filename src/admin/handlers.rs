use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::UNIX_EPOCH;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::dispatch::webhook::PayloadError;
use crate::http::response::{ApiError, ApiResponse};
use crate::http::server::AppState;
use crate::lifecycle::{ControlError, Phase};
use crate::registry::BackendFamily;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub phase: Phase,
    pub generation: u64,
    pub address: Option<SocketAddr>,
    /// Seconds since the epoch at which the live generation was built.
    pub generation_created: u64,
}

#[derive(Serialize)]
pub struct InstanceSummary {
    pub index: usize,
    pub name: String,
    pub url: String,
}

#[derive(Deserialize)]
pub struct RotateRequest {
    pub api_key: String,
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::Config(_) | ControlError::Generation(_) | ControlError::EmptySecret => {
                ApiError::Unprocessable(e.to_string())
            }
            ControlError::Listener(_) | ControlError::ListenerDown | ControlError::Stopped => {
                ApiError::Unavailable(e.to_string())
            }
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let status = state.control.status();
    let generation = state.live.load();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        phase: status.phase,
        generation: generation.id(),
        address: status.address,
        generation_created: generation
            .created_at()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    })
}

pub async fn get_instances(
    State(state): State<AppState>,
) -> Json<BTreeMap<BackendFamily, Vec<InstanceSummary>>> {
    let generation = state.live.load();

    let families = BackendFamily::ALL
        .into_iter()
        .map(|family| {
            let summaries = generation
                .instances(family)
                .iter()
                .map(|instance| InstanceSummary {
                    index: instance.index,
                    name: instance.name.clone(),
                    url: instance.base_url.to_string(),
                })
                .collect();
            (family, summaries)
        })
        .collect();

    Json(families)
}

pub async fn post_reload(State(state): State<AppState>) -> Result<ApiResponse, ApiError> {
    let id = state.control.reload().await?;
    Ok(ApiResponse::ok(format!("reloaded, generation {id}")))
}

pub async fn post_rotate(
    State(state): State<AppState>,
    request: Result<Json<RotateRequest>, JsonRejection>,
) -> Result<ApiResponse, ApiError> {
    let Json(request) = request.map_err(|e| PayloadError::Malformed(e.body_text()))?;
    let id = state.control.rotate_secret(request.api_key).await?;
    Ok(ApiResponse::ok(format!("secret rotated, generation {id}")))
}
