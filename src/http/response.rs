//! Response bodies and error mapping.
//!
//! # Responsibilities
//! - Define the `{status, message}` JSON body every endpoint returns
//! - Map request-scoped errors onto HTTP status codes
//! - Keep 401 bodies fixed so they reveal nothing about the comparison
//!
//! # Design Decisions
//! - Every error is converted at the boundary; none escape a handler
//! - Backend failures surface as 502, like any upstream error

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::dispatch::client::SubmitError;
use crate::dispatch::webhook::PayloadError;
use crate::routing::{ResolutionError, RoutingError};

/// JSON body shared by every webhook and admin response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error("no route for {0}")]
    NotFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Routing(_) | ApiError::Payload(_) => StatusCode::BAD_REQUEST,
            ApiError::Resolution(_) | ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Submit(SubmitError::UnsupportedAction(_)) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Submit(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}
