//! Configuration loading from disk and environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{InstanceConfig, RelayConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::registry::BackendFamily;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RELAY_";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the relay reads its configuration from, at startup and on every reload.
pub trait ConfigSource: Send + Sync + 'static {
    fn load(&self) -> Result<RelayConfig, ConfigError>;

    /// File to watch for changes, if the source is file-backed.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

/// TOML file merged with `RELAY_*` environment variables.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<RelayConfig, ConfigError> {
        load_config(&self.path, std::env::vars())
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Load, overlay and validate configuration from a TOML file.
pub fn load_config<I>(path: &Path, env: I) -> Result<RelayConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: RelayConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, env);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse and validate configuration text without environment overlay.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[derive(Default)]
struct InstanceOverride {
    url: Option<String>,
    api_key: Option<String>,
}

/// Apply `RELAY_*` overrides on top of the file values.
///
/// Per-instance keys look like `RELAY_SONARR_2_URL`. An override for index
/// `len + 1` that carries a URL appends a new instance.
pub fn apply_env_overrides<I>(config: &mut RelayConfig, env: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut instances: BTreeMap<(BackendFamily, usize), InstanceOverride> = BTreeMap::new();

    for (key, value) in env {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match name {
            "API_KEY" => config.auth.api_key = value,
            "BIND_ADDRESS" => config.listener.bind_address = value,
            "BASE_PATH" => config.listener.base_path = value,
            "LOG_LEVEL" => config.observability.log_level = value,
            "ADMIN_API_KEY" => config.admin.api_key = value,
            _ => {
                let mut parts = name.splitn(3, '_');
                let (Some(family), Some(index), Some(field)) = (parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let Ok(family) = family.to_ascii_lowercase().parse::<BackendFamily>() else {
                    continue;
                };
                let Ok(index) = index.parse::<usize>() else {
                    continue;
                };
                let entry = instances.entry((family, index)).or_default();
                match field {
                    "URL" => entry.url = Some(value),
                    "API_KEY" => entry.api_key = Some(value),
                    _ => {}
                }
            }
        }
    }

    for ((family, index), patch) in instances {
        let list = config.instances_mut(family);
        if index == 0 || index > list.len() + 1 {
            tracing::warn!(%family, index, "Ignoring environment override for out-of-range instance");
            continue;
        }
        if index == list.len() + 1 {
            match patch.url {
                Some(url) => list.push(InstanceConfig::new(url, patch.api_key.unwrap_or_default())),
                None => tracing::warn!(%family, index, "Environment override adds an instance without a URL"),
            }
            continue;
        }
        let instance = &mut list[index - 1];
        if let Some(url) = patch.url {
            instance.url = url;
        }
        if let Some(api_key) = patch.api_key {
            instance.api_key = api_key;
        }
    }
}
