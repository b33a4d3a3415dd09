//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Load config → Build generation 1 → Bind listener → Serving
//!
//! Transitions (controller.rs, one at a time):
//!     Reload  → load + validate → build → swap (or restart on bind change)
//!     Rotate  → same instances, new secret → swap | drain → rebuild → rebind
//!     Terminate → Draining → Stopped
//!
//! Shutdown (shutdown.rs):
//!     Stop accepting → Drain in-flight requests (bounded) → Release address
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Terminate (second one forces exit)
//!     SIGHUP → Reload
//! ```
//!
//! # Design Decisions
//! - Only the controller task mutates the live pointer or the listener
//! - Shutdown has a timeout: remaining connections are closed at the deadline

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{
    ControlError, ControlHandle, ControllerStatus, Phase, ReconfigurationController, StartupError,
};
pub use shutdown::ShutdownError;
pub use signals::spawn_signal_handler;
