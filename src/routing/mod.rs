//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! POST <base>/api/<family>/<id>/<action>
//!     → http::auth (secret checked, generation pinned)
//!     → resolver.rs
//!         parse_index(<id>)            → RoutingError (400)
//!         InstanceResolver::bind       → ResolutionError (422)
//!         RequestContext { instance }  → dispatch
//!     → timed() stamps X-Request-Time on the response
//! ```
//!
//! # Design Decisions
//! - Resolution runs against the generation pinned at request entry
//! - Deterministic: same generation and id always give the same instance
//! - Explicit NoSuchInstance rather than silent fallback to instance 1

pub mod resolver;

pub use resolver::{
    format_request_time, parse_index, timed, InstanceResolver, RequestContext, ResolutionError,
    RoutingError, X_REQUEST_TIME,
};
