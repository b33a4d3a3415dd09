//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + RELAY_* environment
//!     → loader.rs (parse, overlay, deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to the controller, which builds a RegistryGeneration
//!
//! On reload (SIGHUP, admin call, or watcher.rs):
//!     loader.rs loads new config
//!     → validation.rs validates
//!     → controller builds and publishes a new generation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError, ConfigSource, FileConfigSource};
pub use schema::{
    AdminConfig, AuthConfig, InstanceConfig, LifecycleConfig, ListenerConfig, ObservabilityConfig,
    RelayConfig, RotationMode, TlsConfig,
};
pub use validation::ValidationError;
