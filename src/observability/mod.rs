//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers / controller
//!     → logging.rs (tracing events, filtered by level or RUST_LOG)
//!     → metrics.rs (counters, histogram, gauge → Prometheus scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - Secrets never appear in log fields or metric labels
//! - Metric recording is a no-op until an exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
