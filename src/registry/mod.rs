//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! RelayConfig (validated)
//!     → generation.rs builds a RegistryGeneration
//!         family.rs    : radarr / sonarr / lidarr / readarr tags
//!         instance.rs  : one BackendInstance per configured entry, 1-based
//!         secret.rs    : webhook secret held as a digest
//!     → LiveGeneration::publish (single atomic pointer swap)
//!
//! Per request:
//!     LiveGeneration::load → Arc<RegistryGeneration> pinned until response
//! ```
//!
//! # Design Decisions
//! - Generations are never mutated; any change builds a new one
//! - Instances are shared by Arc between generations that did not change them
//! - No per-instance locks: the live pointer is the only shared mutable state

pub mod family;
pub mod generation;
pub mod instance;
pub mod secret;

pub use family::BackendFamily;
pub use generation::{BindParams, GenerationError, LiveGeneration, RegistryGeneration};
pub use instance::BackendInstance;
pub use secret::SharedSecret;
