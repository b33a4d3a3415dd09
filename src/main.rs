//! Webhook relay
//!
//! Receives authenticated webhooks and forwards them to the configured
//! radarr, sonarr, lidarr and readarr instances.
//!
//! # Architecture Overview
//!
//! ```text
//!     Webhook                ┌──────────────────────────────────────────────┐
//!     ───────────────────────┼─▶ net ─▶ http auth ─▶ routing ─▶ dispatch ───┼──▶ Backend
//!                            │   listener  (secret)   (resolver)  (client)  │    instance
//!                            │                  ▲                           │
//!                            │                  │ live generation           │
//!                            │           ┌──────┴────────┐                  │
//!     SIGHUP / admin ────────┼──────────▶│  lifecycle    │◀── config (TOML) │
//!     SIGTERM ───────────────┼──────────▶│  controller   │                  │
//!                            │           └───────────────┘                  │
//!                            └──────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use webhook_relay::config::watcher::ConfigWatcher;
use webhook_relay::config::{ConfigSource, FileConfigSource};
use webhook_relay::dispatch::HttpClientFactory;
use webhook_relay::lifecycle::{spawn_signal_handler, ReconfigurationController};
use webhook_relay::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "webhook-relay", version)]
#[command(about = "Relay authenticated webhooks to *arr instances", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let source = FileConfigSource::new(cli.config.clone());

    let config = match source.load() {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webhook-relay starting");

    if cli.check {
        tracing::info!(path = %cli.config.display(), "Configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let watch_path = config
        .lifecycle
        .watch_config
        .then(|| source.watch_path().map(Path::to_path_buf))
        .flatten();
    let controller =
        ReconfigurationController::start_with(config, source, Arc::new(HttpClientFactory)).await?;
    let control = controller.handle();

    spawn_signal_handler(control.clone());

    // Dropping the watcher stops it, so keep it for the life of the process.
    let _watcher = if let Some(path) = watch_path {
        match ConfigWatcher::new(&path, control).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, SIGHUP still reloads");
                None
            }
        }
    } else {
        None
    };

    controller.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
