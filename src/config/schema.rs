//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::registry::BackendFamily;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, base path, TLS).
    pub listener: ListenerConfig,

    /// Shared secret expected on every inbound webhook.
    pub auth: AuthConfig,

    /// Drain timeout and credential rotation behavior.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,

    pub radarr: Vec<InstanceConfig>,
    pub sonarr: Vec<InstanceConfig>,
    pub lidarr: Vec<InstanceConfig>,
    pub readarr: Vec<InstanceConfig>,
}

impl RelayConfig {
    /// Configured instances of one family, in file order.
    pub fn instances(&self, family: BackendFamily) -> &[InstanceConfig] {
        match family {
            BackendFamily::Radarr => &self.radarr,
            BackendFamily::Sonarr => &self.sonarr,
            BackendFamily::Lidarr => &self.lidarr,
            BackendFamily::Readarr => &self.readarr,
        }
    }

    pub fn instances_mut(&mut self, family: BackendFamily) -> &mut Vec<InstanceConfig> {
        match family {
            BackendFamily::Radarr => &mut self.radarr,
            BackendFamily::Sonarr => &mut self.sonarr,
            BackendFamily::Lidarr => &mut self.lidarr,
            BackendFamily::Readarr => &mut self.readarr,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5454").
    pub bind_address: String,

    /// Path prefix in front of `/api/...` (empty or "/" for none).
    pub base_path: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Total time allowed for one request, including the backend submit.
    pub request_timeout_secs: u64,

    /// Largest accepted webhook body.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5454".to_string(),
            base_path: String::new(),
            tls: None,
            request_timeout_secs: 60,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret sent by the notification service.
    pub api_key: String,
}

/// How a credential rotation is applied to the running listener.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Publish a new generation that differs only in the secret.
    #[default]
    Swap,
    /// Drain the listener, rebuild the generation, rebind the same address.
    Restart,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound on graceful drain before connections are force-closed.
    pub shutdown_timeout_secs: u64,

    pub rotation: RotationMode,

    /// Reload automatically when the config file changes.
    pub watch_config: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 10,
            rotation: RotationMode::Swap,
            watch_config: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the operator endpoints under `<base>/admin`.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

/// One configured backend instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InstanceConfig {
    /// Display name; defaults to "<family> <index>".
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL of the backend (e.g., "http://127.0.0.1:7878").
    pub url: String,

    /// Backend API key, sent as `X-Api-Key`.
    pub api_key: String,

    #[serde(default = "default_instance_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
}

impl InstanceConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
            api_key: api_key.into(),
            timeout_secs: default_instance_timeout(),
            tls_verify: default_tls_verify(),
        }
    }
}

fn default_instance_timeout() -> u64 {
    30
}

fn default_tls_verify() -> bool {
    true
}
