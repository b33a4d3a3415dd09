//! Backend API clients.
//!
//! # Responsibilities
//! - Define the submit seam between the relay and a backend instance
//! - Provide the reqwest-based client used in production
//! - Build one client per configured instance (timeout and TLS differ per instance)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde_json::{json, Value};

use crate::config::InstanceConfig;
use crate::dispatch::webhook::MediaItem;
use crate::registry::{BackendFamily, BackendInstance};

/// The only action the HTTP client knows how to forward.
pub const ADD_ACTION: &str = "add";

/// Longest backend error body echoed back to the caller.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("action {0:?} is not supported")]
    UnsupportedAction(String),
    #[error("instance url cannot be extended with an API path")]
    InvalidUrl,
    #[error("instance api key is not a valid header value")]
    InvalidApiKey,
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Submits items to one backend instance.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn submit(
        &self,
        instance: &BackendInstance,
        action: &str,
        item: &MediaItem,
    ) -> Result<(), SubmitError>;
}

/// Builds the client stored inside each instance of a new generation.
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        family: BackendFamily,
        config: &InstanceConfig,
    ) -> Result<Arc<dyn BackendClient>, reqwest::Error>;
}

/// Produces [`HttpBackendClient`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn build(
        &self,
        _family: BackendFamily,
        config: &InstanceConfig,
    ) -> Result<Arc<dyn BackendClient>, reqwest::Error> {
        Ok(Arc::new(HttpBackendClient::for_instance(config)?))
    }
}

/// Talks to a backend's v1/v3 REST API.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
}

impl HttpBackendClient {
    pub fn for_instance(config: &InstanceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()?;
        Ok(Self { http })
    }
}

/// API path segments for adding an item of the given family.
pub fn resource_path(family: BackendFamily) -> [&'static str; 3] {
    match family {
        BackendFamily::Radarr => ["api", "v3", "movie"],
        BackendFamily::Sonarr => ["api", "v3", "series"],
        BackendFamily::Lidarr => ["api", "v1", "artist"],
        BackendFamily::Readarr => ["api", "v1", "book"],
    }
}

fn search_option(family: BackendFamily) -> &'static str {
    match family {
        BackendFamily::Radarr => "searchForMovie",
        BackendFamily::Sonarr => "searchForMissingEpisodes",
        BackendFamily::Lidarr => "searchForMissingAlbums",
        BackendFamily::Readarr => "searchForNewBook",
    }
}

/// JSON body sent to the backend for an `add`.
///
/// Extra fields from the webhook (quality profile, root folder...) pass through
/// untouched; the relay only fills in what it validated.
pub fn add_body(family: BackendFamily, item: &MediaItem) -> Value {
    let mut body = item.extra.clone();
    let (field, value) = item.external_id.json_field();
    body.insert(field.to_string(), value);
    if let Some(title) = &item.title {
        body.insert("title".into(), json!(title));
    }
    if let Some(year) = item.year {
        body.insert("year".into(), json!(year));
    }
    body.entry("monitored").or_insert(json!(true));
    body.entry("addOptions").or_insert_with(|| {
        let mut options = serde_json::Map::new();
        options.insert(search_option(family).to_string(), json!(true));
        Value::Object(options)
    });
    Value::Object(body)
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn submit(
        &self,
        instance: &BackendInstance,
        action: &str,
        item: &MediaItem,
    ) -> Result<(), SubmitError> {
        if action != ADD_ACTION {
            return Err(SubmitError::UnsupportedAction(action.to_string()));
        }

        let mut url = instance.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SubmitError::InvalidUrl)?
            .pop_if_empty()
            .extend(resource_path(instance.family));

        let mut key = HeaderValue::from_str(&instance.api_key).map_err(|_| SubmitError::InvalidApiKey)?;
        key.set_sensitive(true);

        let response = self
            .http
            .post(url)
            .header("X-Api-Key", key)
            .json(&add_body(instance.family, item))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(SubmitError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
