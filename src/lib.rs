//! Authenticated webhook relay for radarr, sonarr, lidarr and readarr.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod http;
pub mod net;
pub mod registry;
pub mod routing;

// Operator surface
pub mod admin;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::{ControlHandle, ReconfigurationController};
