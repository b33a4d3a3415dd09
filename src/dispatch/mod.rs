//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (from routing) + raw body
//!     → webhook.rs  (parse JSON, validate the family's external id)
//!     → handler.rs  (pick message, call the bound instance)
//!     → client.rs   (BackendClient::submit → backend REST API)
//!     → ApiResponse / ApiError
//! ```
//!
//! # Design Decisions
//! - One client per instance, built with the generation and immutable after
//! - No retries: a failed submit is reported to the caller once
//! - Absent instance means unknown app and is acknowledged, not rejected

pub mod client;
pub mod handler;
pub mod webhook;

pub use client::{BackendClient, ADD_ACTION, ClientFactory, HttpBackendClient, HttpClientFactory, SubmitError};
pub use handler::dispatch;
pub use webhook::{ExternalId, IncomingWebhook, MediaItem, PayloadError};
