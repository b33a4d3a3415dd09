//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::lifecycle::ControlHandle;

/// A watcher that turns configuration file changes into reload requests.
pub struct ConfigWatcher {
    path: PathBuf,
    control: ControlHandle,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher feeding the given controller.
    pub fn new(path: &Path, control: ControlHandle) -> Self {
        Self {
            path: path.to_path_buf(),
            control,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let control = self.control.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, requesting reload");
                        if !control.request_reload() {
                            tracing::warn!("Controller is not accepting reload requests");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
