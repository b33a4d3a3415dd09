//! Webhook payload parsing and per-family validation.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::registry::BackendFamily;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("request body is not a JSON object: {0}")]
    Malformed(String),
    #[error("{family} payload is missing required field {field}")]
    MissingField {
        family: BackendFamily,
        field: &'static str,
    },
    #[error("{family} payload field {field} is invalid")]
    InvalidField {
        family: BackendFamily,
        field: &'static str,
    },
}

/// Parsed request body, before family-specific validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IncomingWebhook {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    /// 1-based instance index, used when the path does not carry one.
    #[serde(default)]
    pub instance: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IncomingWebhook {
    /// Parse a request body. An empty body is an empty payload.
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// Instance index requested by the body, defaulting to the first instance.
    pub fn instance_index(&self) -> i64 {
        self.instance.unwrap_or(1)
    }
}

/// The family-specific identifier of a media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalId {
    Tmdb(u64),
    Tvdb(u64),
    MusicBrainz(String),
    Goodreads(String),
}

impl ExternalId {
    /// JSON field that carries the id for a family.
    pub const fn field_name(family: BackendFamily) -> &'static str {
        match family {
            BackendFamily::Radarr => "tmdbId",
            BackendFamily::Sonarr => "tvdbId",
            BackendFamily::Lidarr => "foreignArtistId",
            BackendFamily::Readarr => "foreignBookId",
        }
    }

    pub fn json_field(&self) -> (&'static str, Value) {
        match self {
            ExternalId::Tmdb(id) => ("tmdbId", json!(id)),
            ExternalId::Tvdb(id) => ("tvdbId", json!(id)),
            ExternalId::MusicBrainz(id) => ("foreignArtistId", json!(id)),
            ExternalId::Goodreads(id) => ("foreignBookId", json!(id)),
        }
    }

    fn extract(family: BackendFamily, value: Value) -> Result<Self, PayloadError> {
        let field = Self::field_name(family);
        let invalid = || PayloadError::InvalidField { family, field };
        match family {
            BackendFamily::Radarr | BackendFamily::Sonarr => {
                let id = match &value {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                }
                .filter(|id| *id > 0)
                .ok_or_else(invalid)?;
                Ok(if family == BackendFamily::Radarr {
                    ExternalId::Tmdb(id)
                } else {
                    ExternalId::Tvdb(id)
                })
            }
            BackendFamily::Lidarr | BackendFamily::Readarr => {
                let id = match value {
                    Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(invalid()),
                };
                Ok(if family == BackendFamily::Lidarr {
                    ExternalId::MusicBrainz(id)
                } else {
                    ExternalId::Goodreads(id)
                })
            }
        }
    }
}

/// A validated item ready to be submitted to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub title: Option<String>,
    pub year: Option<u32>,
    pub external_id: ExternalId,
    /// Remaining payload fields, forwarded to the backend as-is.
    pub extra: Map<String, Value>,
}

impl MediaItem {
    pub fn from_webhook(family: BackendFamily, webhook: IncomingWebhook) -> Result<Self, PayloadError> {
        let IncomingWebhook {
            title,
            year,
            instance: _,
            mut fields,
        } = webhook;

        let field = ExternalId::field_name(family);
        let raw = match fields.remove(field) {
            Some(Value::Null) | None => return Err(PayloadError::MissingField { family, field }),
            Some(v) => v,
        };
        let external_id = ExternalId::extract(family, raw)?;

        Ok(Self {
            title,
            year,
            external_id,
            extra: fields,
        })
    }
}
