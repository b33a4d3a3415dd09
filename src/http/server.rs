//! HTTP server setup and webhook handlers.
//!
//! # Responsibilities
//! - Create the Axum Router with webhook, admin and fallback handlers
//! - Wire up middleware (tracing, timeout, request ID, authentication)
//! - Mount everything under the generation's base path
//! - Compose resolution and dispatch inside the request timer

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::Uri,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::dispatch::{dispatch, IncomingWebhook, PayloadError, ADD_ACTION};
use crate::http::auth::{authenticate, PinnedGeneration};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{ApiError, ApiResponse};
use crate::lifecycle::ControlHandle;
use crate::observability::metrics;
use crate::registry::{BackendFamily, LiveGeneration, RegistryGeneration};
use crate::routing::{parse_index, timed, InstanceResolver};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub live: LiveGeneration,
    pub control: ControlHandle,
}

/// Builds the router served by one listener incarnation.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the Axum router for the given generation's bind parameters.
    ///
    /// Base path and request timeout are fixed for the life of the listener;
    /// changing either goes through a listener restart.
    #[allow(deprecated)]
    pub fn router(&self, generation: &RegistryGeneration) -> Router {
        let api = Router::new()
            .route("/api/{app}/{id}/{*action}", post(webhook_handler))
            .route("/api/{app}", post(short_webhook_handler))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                authenticate,
            ))
            .merge(admin::router(self.state.clone()))
            .with_state(self.state.clone());

        let base_path = generation.bind().base_path.as_str();
        let app = if base_path.is_empty() {
            api
        } else {
            Router::new().nest(base_path, api)
        };

        app.fallback(not_found).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(propagate_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(generation.request_timeout())),
        )
    }
}

/// `POST /api/{app}/{id}/{*action}`
async fn webhook_handler(
    Extension(PinnedGeneration(generation)): Extension<PinnedGeneration>,
    Path((app, id, action)): Path<(String, String, String)>,
    body: Body,
) -> Response {
    let started = Instant::now();
    let limit = generation.max_body_bytes();
    let resolver = InstanceResolver::new(generation);

    let response = timed(async {
        let result = async {
            let index = parse_index(&id)?;
            let ctx = resolver.bind(&app, index)?;
            let webhook = read_webhook(body, limit).await?;
            dispatch(ctx, action.trim_matches('/'), webhook).await
        }
        .await;
        into_response(result)
    })
    .await;

    metrics::record_webhook(family_label(&app), response.status().as_u16(), started);
    response
}

/// `POST /api/{app}`: action `add`, instance index taken from the body.
async fn short_webhook_handler(
    Extension(PinnedGeneration(generation)): Extension<PinnedGeneration>,
    Path(app): Path<String>,
    body: Body,
) -> Response {
    let started = Instant::now();
    let limit = generation.max_body_bytes();
    let resolver = InstanceResolver::new(generation);

    let response = timed(async {
        let result = async {
            let webhook = read_webhook(body, limit).await?;
            let ctx = resolver.bind(&app, webhook.instance_index())?;
            dispatch(ctx, ADD_ACTION, webhook).await
        }
        .await;
        into_response(result)
    })
    .await;

    metrics::record_webhook(family_label(&app), response.status().as_u16(), started);
    response
}

async fn read_webhook(body: Body, limit: usize) -> Result<IncomingWebhook, PayloadError> {
    let bytes: Bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| PayloadError::Malformed(format!("unreadable body: {e}")))?;
    IncomingWebhook::parse(&bytes)
}

fn into_response(result: Result<ApiResponse, ApiError>) -> Response {
    match result {
        Ok(ok) => ok.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Metric label for the app segment; unknown apps share one label.
fn family_label(app: &str) -> &'static str {
    BackendFamily::from_path_segment(app)
        .map(BackendFamily::path_segment)
        .unwrap_or("unknown")
}

async fn not_found(uri: Uri) -> Response {
    ApiError::NotFound(uri.path().to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::client::{BackendClient, ClientFactory, SubmitError};
    use crate::dispatch::MediaItem;
    use crate::config::InstanceConfig;
    use crate::registry::generation::tests::config_with;
    use crate::registry::BackendInstance;
    use crate::routing::X_REQUEST_TIME;
    use async_trait::async_trait;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl BackendClient for Recorder {
        async fn submit(
            &self,
            instance: &BackendInstance,
            action: &str,
            _item: &MediaItem,
        ) -> Result<(), SubmitError> {
            if action != ADD_ACTION {
                return Err(SubmitError::UnsupportedAction(action.to_string()));
            }
            self.calls.lock().unwrap().push((
                instance.family.to_string(),
                instance.index,
                action.to_string(),
            ));
            Ok(())
        }
    }

    struct Shared(Arc<Recorder>);

    impl ClientFactory for Shared {
        fn build(
            &self,
            _: BackendFamily,
            _: &InstanceConfig,
        ) -> Result<Arc<dyn BackendClient>, reqwest::Error> {
            Ok(self.0.clone())
        }
    }

    fn app_with(base_path: &str) -> (Router, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut config = config_with(2, 1);
        config.listener.base_path = base_path.to_string();
        let generation = RegistryGeneration::build(1, &config, &Shared(recorder.clone())).unwrap();
        let live = LiveGeneration::new(generation);
        let state = AppState {
            live: live.clone(),
            control: ControlHandle::detached(),
        };
        let router = HttpServer::new(state).router(&live.load());
        (router, recorder)
    }

    fn app() -> (Router, Arc<Recorder>) {
        app_with("")
    }

    fn post(uri: &str, key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_of(response: Response) -> ApiResponse {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const MOVIE: &str = r#"{"title":"Heat","tmdbId":949}"#;

    #[tokio::test]
    async fn valid_request_is_dispatched_and_timed() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post("/api/radarr/2/add", Some("secret"), MOVIE))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_TIME));
        assert!(response.headers().contains_key("x-request-id"));
        assert!(body_of(response).await.status);
        assert_eq!(
            recorder.calls.lock().unwrap().as_slice(),
            &[("radarr".to_string(), 2, "add".to_string())]
        );
    }

    #[tokio::test]
    async fn id_past_the_end_is_unprocessable() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post("/api/radarr/5/add", Some("secret"), MOVIE))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().contains_key(X_REQUEST_TIME));
        let body = body_of(response).await;
        assert!(!body.status);
        assert!(body.message.contains("radarr"));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn id_zero_is_unprocessable() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/api/lidarr/0/add", Some("secret"), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn id_beyond_i64_is_unprocessable() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post("/api/radarr/99999999999999999999/add", Some("secret"), MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_secret_wins_over_bad_id() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/api/radarr/99/add", Some("wrong"), MOVIE))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key(X_REQUEST_TIME));
        assert_eq!(body_of(response).await, ApiResponse::error("unauthorized"));
    }

    #[tokio::test]
    async fn missing_secret_is_unauthorized() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/api/radarr/1/add", None, MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn secret_in_query_is_accepted() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/api/radarr/1/add?apikey=secret", None, MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn non_numeric_id_is_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/api/radarr/one/add", Some("secret"), MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post("/api/radarr/1/add", Some("secret"), "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_app_is_acknowledged() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post("/api/prowlarr/7/add", Some("secret"), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_action_is_not_found() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/api/radarr/1/delete", Some("secret"), MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn short_route_defaults_to_first_instance() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post("/api/radarr", Some("secret"), MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.calls.lock().unwrap()[0].1, 1);
    }

    #[tokio::test]
    async fn short_route_honors_body_instance() {
        let (app, recorder) = app();
        let response = app
            .oneshot(post(
                "/api/radarr",
                Some("secret"),
                r#"{"tmdbId":949,"instance":2}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorder.calls.lock().unwrap()[0].1, 2);
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let (app, _) = app();
        let response = app
            .oneshot(post("/nothing/here", Some("secret"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!body_of(response).await.status);
    }

    #[tokio::test]
    async fn routes_live_under_base_path() {
        let (app, _) = app_with("/relay");
        let response = app
            .clone()
            .oneshot(post("/relay/api/radarr/1/add", Some("secret"), MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post("/api/radarr/1/add", Some("secret"), MOVIE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
