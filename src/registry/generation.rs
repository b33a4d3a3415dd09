//! Immutable registry generations and the live pointer that publishes them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use url::Url;

use crate::config::{RelayConfig, RotationMode, TlsConfig};
use crate::dispatch::client::ClientFactory;
use crate::registry::{BackendFamily, BackendInstance, SharedSecret};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("bind address {0:?} is not a socket address")]
    BindAddress(String),
    #[error("{family} instance {index}: invalid url: {source}")]
    Url {
        family: BackendFamily,
        index: usize,
        #[source]
        source: url::ParseError,
    },
    #[error("{family} instance {index}: cannot build client: {source}")]
    Client {
        family: BackendFamily,
        index: usize,
        #[source]
        source: reqwest::Error,
    },
}

/// Listener parameters; a change here needs a listener restart to take effect.
#[derive(Debug, Clone, PartialEq)]
pub struct BindParams {
    pub address: SocketAddr,
    /// Normalized prefix: empty, or starts with '/' and has no trailing '/'.
    pub base_path: String,
    pub tls: Option<TlsConfig>,
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// A complete, immutable snapshot of instances, secret and bind parameters.
#[derive(Debug)]
pub struct RegistryGeneration {
    id: u64,
    instances: [Vec<Arc<BackendInstance>>; 4],
    secret: SharedSecret,
    /// Secret as it came from the config source, before any rotation.
    source_secret: SharedSecret,
    admin_key: Option<SharedSecret>,
    bind: BindParams,
    request_timeout: Duration,
    max_body_bytes: usize,
    shutdown_timeout: Duration,
    rotation: RotationMode,
    created_at: SystemTime,
}

impl RegistryGeneration {
    /// Build a generation from validated configuration.
    pub fn build(
        id: u64,
        config: &RelayConfig,
        factory: &dyn ClientFactory,
    ) -> Result<Self, GenerationError> {
        let address = config
            .listener
            .bind_address
            .parse()
            .map_err(|_| GenerationError::BindAddress(config.listener.bind_address.clone()))?;

        let mut instances: [Vec<Arc<BackendInstance>>; 4] = Default::default();
        for family in BackendFamily::ALL {
            for (i, raw) in config.instances(family).iter().enumerate() {
                let index = i + 1;
                let base_url = Url::parse(&raw.url)
                    .map_err(|source| GenerationError::Url { family, index, source })?;
                let client = factory
                    .build(family, raw)
                    .map_err(|source| GenerationError::Client { family, index, source })?;
                instances[family.slot()].push(Arc::new(BackendInstance {
                    family,
                    index,
                    name: raw.name.clone().unwrap_or_else(|| format!("{family} {index}")),
                    base_url,
                    api_key: raw.api_key.clone(),
                    timeout: Duration::from_secs(raw.timeout_secs),
                    tls_verify: raw.tls_verify,
                    client,
                }));
            }
        }

        let secret = SharedSecret::new(&config.auth.api_key);
        Ok(Self {
            id,
            instances,
            source_secret: secret.clone(),
            secret,
            admin_key: config
                .admin
                .enabled
                .then(|| SharedSecret::new(&config.admin.api_key)),
            bind: BindParams {
                address,
                base_path: normalize_base_path(&config.listener.base_path),
                tls: config.listener.tls.clone(),
            },
            request_timeout: Duration::from_secs(config.listener.request_timeout_secs),
            max_body_bytes: config.listener.max_body_bytes,
            shutdown_timeout: Duration::from_secs(config.lifecycle.shutdown_timeout_secs),
            rotation: config.lifecycle.rotation,
            created_at: SystemTime::now(),
        })
    }

    /// A new generation identical to this one except for the webhook secret.
    ///
    /// Instances are shared, not rebuilt: they are immutable, so both
    /// generations observe exactly the same targets.
    pub fn with_secret(&self, id: u64, secret: SharedSecret) -> Self {
        Self {
            id,
            instances: self.instances.clone(),
            secret,
            source_secret: self.source_secret.clone(),
            admin_key: self.admin_key.clone(),
            bind: self.bind.clone(),
            request_timeout: self.request_timeout,
            max_body_bytes: self.max_body_bytes,
            shutdown_timeout: self.shutdown_timeout,
            rotation: self.rotation,
            created_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ordered instances of one family.
    pub fn instances(&self, family: BackendFamily) -> &[Arc<BackendInstance>] {
        &self.instances[family.slot()]
    }

    pub fn secret(&self) -> &SharedSecret {
        &self.secret
    }

    pub fn source_secret(&self) -> &SharedSecret {
        &self.source_secret
    }

    pub fn admin_key(&self) -> Option<&SharedSecret> {
        self.admin_key.as_ref()
    }

    pub fn bind(&self) -> &BindParams {
        &self.bind
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn rotation(&self) -> RotationMode {
        self.rotation
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// The single live generation pointer.
///
/// Readers take a full `Arc` snapshot once per request and keep it until the
/// response is done; publishing swaps the whole pointer, so a reader sees either
/// the previous generation or the next one, never a mix.
#[derive(Clone)]
pub struct LiveGeneration {
    current: Arc<ArcSwap<RegistryGeneration>>,
}

impl LiveGeneration {
    pub fn new(initial: RegistryGeneration) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Snapshot of the current generation.
    pub fn load(&self) -> Arc<RegistryGeneration> {
        self.current.load_full()
    }

    /// Replace the live generation, returning the one it superseded.
    pub(crate) fn publish(&self, next: RegistryGeneration) -> Arc<RegistryGeneration> {
        self.current.swap(Arc::new(next))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use crate::dispatch::client::{BackendClient, SubmitError};
    use crate::dispatch::webhook::MediaItem;
    use async_trait::async_trait;

    pub(crate) struct NoopClient;

    #[async_trait]
    impl BackendClient for NoopClient {
        async fn submit(&self, _: &BackendInstance, _: &str, _: &MediaItem) -> Result<(), SubmitError> {
            Ok(())
        }
    }

    pub(crate) struct NoopFactory;

    impl ClientFactory for NoopFactory {
        fn build(
            &self,
            _: BackendFamily,
            _: &InstanceConfig,
        ) -> Result<Arc<dyn BackendClient>, reqwest::Error> {
            Ok(Arc::new(NoopClient))
        }
    }

    pub(crate) fn config_with(radarr: usize, lidarr: usize) -> RelayConfig {
        let mut config = RelayConfig::default();
        config.auth.api_key = "secret".into();
        config.listener.bind_address = "127.0.0.1:0".into();
        for i in 0..radarr {
            config
                .radarr
                .push(InstanceConfig::new(format!("http://radarr-{i}.local:7878"), format!("r{i}")));
        }
        for i in 0..lidarr {
            config
                .lidarr
                .push(InstanceConfig::new(format!("http://lidarr-{i}.local:8686"), format!("l{i}")));
        }
        config
    }

    #[test]
    fn build_keeps_family_order_and_indexes() {
        let generation = RegistryGeneration::build(1, &config_with(3, 1), &NoopFactory).unwrap();
        let radarr = generation.instances(BackendFamily::Radarr);
        assert_eq!(radarr.len(), 3);
        for (i, instance) in radarr.iter().enumerate() {
            assert_eq!(instance.index, i + 1);
            assert_eq!(instance.base_url.host_str(), Some(format!("radarr-{i}.local").as_str()));
            assert_eq!(instance.name, format!("radarr {}", i + 1));
        }
        assert_eq!(generation.instances(BackendFamily::Lidarr).len(), 1);
        assert!(generation.instances(BackendFamily::Sonarr).is_empty());
        assert!(generation.secret().verify("secret"));
        assert!(generation.admin_key().is_none());
    }

    #[test]
    fn base_path_is_normalized() {
        assert_eq!(normalize_base_path(""), "");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path("/relay/"), "/relay");
        assert_eq!(normalize_base_path("relay"), "/relay");
    }

    #[test]
    fn with_secret_shares_instances() {
        let first = RegistryGeneration::build(1, &config_with(2, 0), &NoopFactory).unwrap();
        let second = first.with_secret(2, SharedSecret::new("rotated"));

        assert_eq!(second.id(), 2);
        assert!(second.secret().verify("rotated"));
        assert!(!second.secret().verify("secret"));
        assert!(second.source_secret().verify("secret"));
        for (a, b) in first
            .instances(BackendFamily::Radarr)
            .iter()
            .zip(second.instances(BackendFamily::Radarr))
        {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn publish_returns_previous_generation() {
        let live = LiveGeneration::new(RegistryGeneration::build(1, &config_with(1, 0), &NoopFactory).unwrap());
        let pinned = live.load();

        let previous = live.publish(RegistryGeneration::build(2, &config_with(2, 0), &NoopFactory).unwrap());
        assert_eq!(previous.id(), 1);
        assert_eq!(live.load().id(), 2);
        // A reader that captured the old snapshot keeps seeing it unchanged.
        assert_eq!(pinned.id(), 1);
        assert_eq!(pinned.instances(BackendFamily::Radarr).len(), 1);
    }
}
