//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → request.rs (assign request ID)
//!     → auth.rs (pin generation, verify shared secret → 401)
//!     → server.rs (parse id → resolve → read body → dispatch, timed)
//!     → response.rs ({status, message} JSON, error → status code)
//!     → Send to client
//! ```

pub mod auth;
pub mod request;
pub mod response;
pub mod server;

pub use auth::PinnedGeneration;
pub use request::X_REQUEST_ID;
pub use response::{ApiError, ApiResponse};
pub use server::{AppState, HttpServer};
