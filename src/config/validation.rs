//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check every backend instance points at a usable URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::RelayConfig;
use crate::registry::BackendFamily;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("auth.api_key must not be empty")]
    EmptySecret,
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),
    #[error("listener.base_path {0:?} must be empty or start with '/'")]
    BasePath(String),
    #[error("listener.request_timeout_secs must be greater than zero")]
    RequestTimeout,
    #[error("lifecycle.shutdown_timeout_secs must be greater than zero")]
    ShutdownTimeout,
    #[error("admin.api_key must not be empty when admin is enabled")]
    EmptyAdminKey,
    #[error("{family} instance {index}: url {url:?} is not an http(s) URL")]
    InstanceUrl {
        family: BackendFamily,
        index: usize,
        url: String,
    },
    #[error("{family} instance {index}: api_key must not be empty")]
    InstanceKey { family: BackendFamily, index: usize },
    #[error("{family} instance {index}: timeout_secs must be greater than zero")]
    InstanceTimeout { family: BackendFamily, index: usize },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptySecret);
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    let base = &config.listener.base_path;
    if !base.is_empty() && !base.starts_with('/') {
        errors.push(ValidationError::BasePath(base.clone()));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }
    if config.lifecycle.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ShutdownTimeout);
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminKey);
    }

    for family in BackendFamily::ALL {
        for (i, instance) in config.instances(family).iter().enumerate() {
            let index = i + 1;
            let url_ok = Url::parse(&instance.url)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
                .unwrap_or(false);
            if !url_ok {
                errors.push(ValidationError::InstanceUrl {
                    family,
                    index,
                    url: instance.url.clone(),
                });
            }
            if instance.api_key.trim().is_empty() {
                errors.push(ValidationError::InstanceKey { family, index });
            }
            if instance.timeout_secs == 0 {
                errors.push(ValidationError::InstanceTimeout { family, index });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstanceConfig;

    fn valid() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.auth.api_key = "secret".into();
        config.radarr.push(InstanceConfig::new("http://127.0.0.1:7878", "k"));
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = valid();
        config.auth.api_key = "  ".into();
        config.listener.bind_address = "nowhere".into();
        config.listener.base_path = "relay".into();
        config.sonarr.push(InstanceConfig::new("ftp://host", ""));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptySecret,
                ValidationError::BindAddress("nowhere".into()),
                ValidationError::BasePath("relay".into()),
                ValidationError::InstanceUrl {
                    family: BackendFamily::Sonarr,
                    index: 1,
                    url: "ftp://host".into(),
                },
                ValidationError::InstanceKey {
                    family: BackendFamily::Sonarr,
                    index: 1,
                },
            ]
        );
    }

    #[test]
    fn admin_requires_key_only_when_enabled() {
        let mut config = valid();
        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::EmptyAdminKey])
        );
        config.admin.enabled = false;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn empty_family_lists_are_valid() {
        let mut config = valid();
        config.radarr.clear();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
