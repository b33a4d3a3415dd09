//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use webhook_relay::config::{parse_config, ConfigError, ConfigSource, RelayConfig};
use webhook_relay::dispatch::HttpClientFactory;
use webhook_relay::lifecycle::{ControlHandle, ReconfigurationController, ShutdownError};

pub const SECRET: &str = "relay-secret";
pub const ADMIN_KEY: &str = "admin-key";

/// One request received by a mock backend.
#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: u16,
    hits: Arc<Mutex<Vec<Hit>>>,
}

/// A fake *arr instance that records every request.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }
}

/// Start a mock backend on an ephemeral port answering every POST with `status`.
pub async fn start_mock_backend(status: u16) -> MockBackend {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        hits: hits.clone(),
    };

    let app = Router::new()
        .route("/{*path}", post(record))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, hits }
}

async fn record(
    State(state): State<MockState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.hits.lock().unwrap().push(Hit {
        path: format!("/{path}"),
        api_key: headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    let status = StatusCode::from_u16(state.status).unwrap();
    (status, Json(serde_json::json!({ "id": 1 })))
}

/// Configuration that tests rewrite between reloads.
#[derive(Clone)]
pub struct MemorySource(Arc<Mutex<String>>);

impl MemorySource {
    pub fn new(toml: &str) -> Self {
        Self(Arc::new(Mutex::new(toml.to_string())))
    }

    pub fn set(&self, toml: &str) {
        *self.0.lock().unwrap() = toml.to_string();
    }
}

impl ConfigSource for MemorySource {
    fn load(&self) -> Result<RelayConfig, ConfigError> {
        parse_config(&self.0.lock().unwrap())
    }
}

/// Builder for relay TOML.
pub struct ConfigBuilder {
    secret: String,
    rotation: &'static str,
    instances: Vec<(&'static str, String, String)>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            secret: SECRET.to_string(),
            rotation: "swap",
            instances: Vec::new(),
        }
    }

    pub fn secret(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    pub fn rotation(mut self, rotation: &'static str) -> Self {
        self.rotation = rotation;
        self
    }

    /// Add an instance of `family` with api key `key`.
    pub fn instance(mut self, family: &'static str, url: impl Into<String>, key: &str) -> Self {
        self.instances.push((family, url.into(), key.to_string()));
        self
    }

    pub fn build(&self) -> String {
        let mut toml = format!(
            "[listener]\nbind_address = \"127.0.0.1:0\"\nrequest_timeout_secs = 10\n\n\
             [auth]\napi_key = \"{}\"\n\n\
             [lifecycle]\nshutdown_timeout_secs = 1\nrotation = \"{}\"\n\n\
             [admin]\nenabled = true\napi_key = \"{ADMIN_KEY}\"\n",
            self.secret, self.rotation
        );
        for (family, url, key) in &self.instances {
            toml.push_str(&format!(
                "\n[[{family}]]\nurl = \"{url}\"\napi_key = \"{key}\"\ntimeout_secs = 5\n"
            ));
        }
        toml
    }
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub control: ControlHandle,
    pub task: JoinHandle<Result<(), ShutdownError>>,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.control.terminate();
        self.task.await.unwrap().unwrap();
    }
}

/// Start a relay serving `source` with the real HTTP backend client.
pub async fn start_relay(source: &MemorySource) -> RunningRelay {
    let controller = ReconfigurationController::start(source.clone(), Arc::new(HttpClientFactory))
        .await
        .unwrap();
    let addr = controller.local_addr().unwrap();
    let control = controller.handle();
    let task = tokio::spawn(controller.run());
    RunningRelay {
        addr,
        control,
        task,
    }
}

/// A client that ignores environment proxies and keeps no idle connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn send_webhook(
    client: &reqwest::Client,
    url: &str,
    secret: &str,
    body: &str,
) -> reqwest::Response {
    client
        .post(url)
        .header("x-api-key", secret)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}
