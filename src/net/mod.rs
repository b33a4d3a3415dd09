//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! BindParams (from the live generation)
//!     → listener.rs (bind TCP, record the real local address)
//!     → tls.rs (optional rustls acceptor from PEM files)
//!     → axum-server with a Handle → RunningServer
//!
//! Listener States:
//!     Bound → Serving → Draining (graceful, bounded) → Closed
//! ```
//!
//! # Design Decisions
//! - Bind with tokio so port 0 resolves before serving starts
//! - The resolved address is reused verbatim when the listener restarts
//! - TLS is optional and handled transparently

pub mod listener;
pub mod tls;

pub use listener::{start, ListenerError, RunningServer};
