//! A single configured backend instance.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::dispatch::client::{BackendClient, SubmitError};
use crate::dispatch::webhook::MediaItem;
use crate::registry::BackendFamily;

/// One connection target, immutable for the lifetime of its generation.
///
/// `index` is the 1-based position inside the family list of the generation
/// that built it. A later generation may give the same backend another index.
pub struct BackendInstance {
    pub family: BackendFamily,
    pub index: usize,
    pub name: String,
    pub base_url: Url,
    pub api_key: String,
    pub timeout: Duration,
    pub tls_verify: bool,
    pub(crate) client: Arc<dyn BackendClient>,
}

impl BackendInstance {
    /// Forward an item to this instance through its client.
    pub async fn submit(&self, action: &str, item: &MediaItem) -> Result<(), SubmitError> {
        self.client.submit(self, action, item).await
    }
}

impl fmt::Debug for BackendInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendInstance")
            .field("family", &self.family)
            .field("index", &self.index)
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("tls_verify", &self.tls_verify)
            .finish_non_exhaustive()
    }
}
