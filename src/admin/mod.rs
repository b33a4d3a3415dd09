//! Operator surface.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <admin key>
//!     → auth.rs (constant-time check against the live generation)
//!     → handlers.rs
//!         status / instances  → read the live generation and controller status
//!         reload / rotate     → ControlHandle → controller task → outcome
//! ```
//!
//! # Design Decisions
//! - Handlers never perform transitions themselves; they ask the controller
//! - Disabled admin answers 404 so its existence is not advertised

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/instances", get(get_instances))
        .route("/admin/reload", post(post_reload))
        .route("/admin/rotate", post(post_rotate))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
