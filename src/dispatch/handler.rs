//! Per-family dispatch of a resolved webhook.

use crate::dispatch::webhook::{IncomingWebhook, MediaItem};
use crate::http::response::{ApiError, ApiResponse};
use crate::registry::BackendFamily;
use crate::routing::RequestContext;

fn noun(family: BackendFamily) -> &'static str {
    match family {
        BackendFamily::Radarr => "movie",
        BackendFamily::Sonarr => "series",
        BackendFamily::Lidarr => "artist",
        BackendFamily::Readarr => "book",
    }
}

/// Validate the payload for the bound family and submit it to the bound instance.
///
/// A context without an instance (unknown app) is acknowledged without doing
/// anything. Payload problems are client errors; backend failures become 502s.
pub async fn dispatch(
    ctx: RequestContext,
    action: &str,
    webhook: IncomingWebhook,
) -> Result<ApiResponse, ApiError> {
    let Some(instance) = ctx.instance else {
        return Ok(ApiResponse::ok(format!("{}: unknown app, nothing to do", ctx.app)));
    };

    let family = instance.family;
    let item = MediaItem::from_webhook(family, webhook)?;
    let (_, id) = item.external_id.json_field();

    instance.submit(action, &item).await.map_err(|e| {
        tracing::warn!(
            %family,
            index = instance.index,
            action,
            error = %e,
            "Backend submit failed"
        );
        e
    })?;

    tracing::info!(%family, index = instance.index, action, "Item submitted");
    let label = item.title.as_deref().unwrap_or("item");
    Ok(ApiResponse::ok(format!(
        "{} {label} ({id}) sent to {} ({action})",
        noun(family),
        instance.name
    )))
}
