//! Reconfiguration controller.
//!
//! # Responsibilities
//! - Own the live generation pointer and the running listener
//! - Serialize every transition (reload, rotation, terminate) on one task
//! - Publish status (phase, generation id, bound address) for observers
//!
//! # Design Decisions
//! - Requests arrive over a channel; handlers and signal tasks never mutate
//!   shared state themselves
//! - Termination has its own single-slot channel, so queued reloads can
//!   never crowd it out
//! - A rejected reload leaves the previous generation live
//! - Transitions that rebind the listener answer the caller before draining,
//!   since the caller may itself be a request on the listener being drained
//! - Losing the listener during a restart is fatal for `run`

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::{ConfigError, ConfigSource, RelayConfig, RotationMode};
use crate::dispatch::ClientFactory;
use crate::http::server::{AppState, HttpServer};
use crate::lifecycle::shutdown::{drain, ShutdownError};
use crate::net::{self, ListenerError, RunningServer};
use crate::observability::metrics;
use crate::registry::{GenerationError, LiveGeneration, RegistryGeneration, SharedSecret};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Serving,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub phase: Phase,
    pub generation: u64,
    pub address: Option<SocketAddr>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to build initial generation: {0}")]
    Generation(#[from] GenerationError),
    #[error("Failed to start listener: {0}")]
    Listener(#[from] ListenerError),
}

/// Outcome of a rejected reload or rotation.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot build generation: {0}")]
    Generation(#[from] GenerationError),
    #[error("new secret must not be empty")]
    EmptySecret,
    #[error("listener failed to start: {0}")]
    Listener(#[from] ListenerError),
    #[error("listener was lost during restart")]
    ListenerDown,
    #[error("controller is not running")]
    Stopped,
}

type Reply = Option<oneshot::Sender<Result<u64, ControlError>>>;

pub(crate) enum ControlCommand {
    Reload { reply: Reply },
    Rotate { secret: String, reply: Reply },
}

/// Receiving ends of a [`ControlHandle`], for tests that stand in for the controller.
#[cfg(test)]
pub(crate) struct ControlInbox {
    pub commands: mpsc::Receiver<ControlCommand>,
    pub shutdown: mpsc::Receiver<()>,
}

/// Cloneable handle for requesting transitions and observing status.
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<ControlCommand>,
    shutdown: mpsc::Sender<()>,
    status: watch::Receiver<ControllerStatus>,
}

impl ControlHandle {
    /// Reload from the configuration source and wait for the outcome.
    pub async fn reload(&self) -> Result<u64, ControlError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlCommand::Reload { reply: Some(tx) }).await?;
        rx.await.map_err(|_| ControlError::Stopped)?
    }

    /// Replace the webhook secret and wait for the outcome.
    pub async fn rotate_secret(&self, secret: impl Into<String>) -> Result<u64, ControlError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlCommand::Rotate {
            secret: secret.into(),
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| ControlError::Stopped)?
    }

    /// Queue a reload without waiting. Usable from non-async contexts.
    pub fn request_reload(&self) -> bool {
        self.commands
            .try_send(ControlCommand::Reload { reply: None })
            .is_ok()
    }

    /// Request graceful termination. Returns false only when the controller is gone.
    ///
    /// Repeated requests coalesce into the one already pending.
    pub fn terminate(&self) -> bool {
        match self.shutdown.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    /// Wait until the controller reports `phase`.
    pub async fn wait_for_phase(&self, phase: Phase) -> ControllerStatus {
        let mut status = self.status.clone();
        if let Ok(current) = status.wait_for(|s| s.phase == phase).await {
            return current.clone();
        }
        let current = status.borrow().clone();
        current
    }

    /// Wait until a generation with at least this id is live.
    pub async fn wait_for_generation(&self, id: u64) -> ControllerStatus {
        let mut status = self.status.clone();
        if let Ok(current) = status.wait_for(|s| s.generation >= id).await {
            return current.clone();
        }
        let current = status.borrow().clone();
        current
    }

    async fn send(&self, command: ControlCommand) -> Result<(), ControlError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControlError::Stopped)
    }

    /// A handle whose requests land on the returned receiver.
    #[cfg(test)]
    pub(crate) fn pair() -> (Self, ControlInbox) {
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let (_, status) = watch::channel(ControllerStatus {
            phase: Phase::Serving,
            generation: 0,
            address: None,
        });
        let inbox = ControlInbox {
            commands: commands_rx,
            shutdown: shutdown_rx,
        };
        (Self { commands, shutdown, status }, inbox)
    }

    /// A handle with no controller behind it; every request fails with `Stopped`.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (commands, _) = mpsc::channel(1);
        let (shutdown, _) = mpsc::channel(1);
        let (_, status) = watch::channel(ControllerStatus {
            phase: Phase::Serving,
            generation: 0,
            address: None,
        });
        Self { commands, shutdown, status }
    }
}

/// Rotated secret, remembered so later reloads keep it.
struct Rotated {
    secret: SharedSecret,
    /// Config secret in force when the rotation happened.
    source: SharedSecret,
}

/// Owns the live generation and the listener; applies transitions one at a time.
pub struct ReconfigurationController {
    source: Box<dyn ConfigSource>,
    factory: Arc<dyn ClientFactory>,
    live: LiveGeneration,
    server: HttpServer,
    listener: Option<RunningServer>,
    commands: mpsc::Receiver<ControlCommand>,
    shutdown: mpsc::Receiver<()>,
    status: watch::Sender<ControllerStatus>,
    handle: ControlHandle,
    next_id: u64,
    rotated: Option<Rotated>,
    fatal: Option<ShutdownError>,
}

impl ReconfigurationController {
    /// Load the initial configuration from `source` and start serving.
    pub async fn start(
        source: impl ConfigSource,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, StartupError> {
        let config = source.load()?;
        Self::start_with(config, source, factory).await
    }

    /// Start serving an already loaded configuration; `source` feeds reloads.
    pub async fn start_with(
        config: RelayConfig,
        source: impl ConfigSource,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, StartupError> {
        let generation = RegistryGeneration::build(1, &config, factory.as_ref())?;
        let bind = generation.bind().clone();
        let live = LiveGeneration::new(generation);

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown) = mpsc::channel(1);
        let (status, status_rx) = watch::channel(ControllerStatus {
            phase: Phase::Serving,
            generation: 1,
            address: None,
        });
        let handle = ControlHandle {
            commands: commands_tx,
            shutdown: shutdown_tx,
            status: status_rx,
        };

        let server = HttpServer::new(AppState {
            live: live.clone(),
            control: handle.clone(),
        });
        let listener = net::start(server.router(&live.load()), bind.address, bind.tls.as_ref()).await?;
        let address = listener.local_addr();
        status.send_modify(|s| s.address = Some(address));
        metrics::set_generation(1);

        tracing::info!(
            address = %address,
            base_path = %bind.base_path,
            generation = 1,
            "Relay serving"
        );

        Ok(Self {
            source: Box::new(source),
            factory,
            live,
            server,
            listener: Some(listener),
            commands,
            shutdown,
            status,
            handle,
            next_id: 2,
            rotated: None,
            fatal: None,
        })
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    pub fn live(&self) -> LiveGeneration {
        self.live.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(RunningServer::local_addr)
    }

    /// Process transitions until terminated, then drain and stop.
    pub async fn run(mut self) -> Result<(), ShutdownError> {
        loop {
            // Termination wins over anything still queued.
            let next = tokio::select! {
                biased;
                _ = self.shutdown.recv() => None,
                command = self.commands.recv() => command,
            };
            let Some(command) = next else {
                break;
            };

            match command {
                ControlCommand::Reload { mut reply } => {
                    let result = self.reload(&mut reply).await;
                    match &result {
                        Ok(id) => {
                            metrics::record_reload("applied");
                            tracing::info!(generation = id, "Reload applied");
                        }
                        Err(e) => {
                            metrics::record_reload("rejected");
                            tracing::error!(
                                error = %e,
                                generation = self.live.load().id(),
                                "Reload rejected, keeping current generation"
                            );
                        }
                    }
                    respond(reply, result);
                }
                ControlCommand::Rotate { secret, mut reply } => {
                    let result = self.rotate(secret, &mut reply).await;
                    match &result {
                        Ok(id) => tracing::info!(generation = id, "Secret rotated"),
                        Err(e) => tracing::error!(error = %e, "Secret rotation failed"),
                    }
                    respond(reply, result);
                }
            }

            if let Some(e) = self.fatal.take() {
                self.set_phase(Phase::Stopped);
                return Err(e);
            }
        }

        self.shutdown().await
    }

    async fn reload(&mut self, reply: &mut Reply) -> Result<u64, ControlError> {
        let config = self.source.load()?;
        let id = self.next_id;
        let mut next = RegistryGeneration::build(id, &config, self.factory.as_ref())?;

        let carried = self
            .rotated
            .as_ref()
            .filter(|rotated| *next.source_secret() == rotated.source)
            .map(|rotated| rotated.secret.clone());
        let source_changed = self.rotated.is_some() && carried.is_none();
        if let Some(secret) = carried {
            next = next.with_secret(id, secret);
        }

        let current = self.live.load();
        if next.bind() == current.bind() {
            self.publish(next);
        } else {
            tracing::info!(
                from = %current.bind().address,
                to = %next.bind().address,
                "Bind parameters changed, restarting listener"
            );
            self.restart(next, reply).await?;
        }

        if source_changed {
            tracing::info!("Configured secret changed, dropping rotated secret");
            self.rotated = None;
        }
        Ok(id)
    }

    async fn rotate(&mut self, secret: String, reply: &mut Reply) -> Result<u64, ControlError> {
        if secret.trim().is_empty() {
            return Err(ControlError::EmptySecret);
        }

        let secret = SharedSecret::new(&secret);
        let current = self.live.load();
        let id = self.next_id;
        let next = current.with_secret(id, secret.clone());

        match current.rotation() {
            RotationMode::Swap => self.publish(next),
            RotationMode::Restart => self.restart(next, reply).await?,
        }

        self.rotated = Some(Rotated {
            secret,
            source: current.source_secret().clone(),
        });
        Ok(id)
    }

    /// Make `next` live without touching the listener.
    fn publish(&mut self, next: RegistryGeneration) {
        let id = next.id();
        let previous = self.live.publish(next);
        self.next_id = id + 1;
        self.status.send_modify(|s| s.generation = id);
        metrics::set_generation(id);
        tracing::debug!(from = previous.id(), to = id, "Generation published");
    }

    /// Replace the listener while making `next` live.
    ///
    /// A new address is bound before the old listener is drained, so a bind
    /// failure leaves everything as it was. Same-address restarts must drain
    /// first; the restarted listener reuses the exact address bound before.
    async fn restart(&mut self, next: RegistryGeneration, reply: &mut Reply) -> Result<(), ControlError> {
        let current = self.live.load();
        let timeout = current.shutdown_timeout();
        let same_address = next.bind().address == current.bind().address;

        if !same_address {
            let bind = next.bind().clone();
            let replacement =
                net::start(self.server.router(&next), bind.address, bind.tls.as_ref()).await?;
            let address = replacement.local_addr();
            let id = next.id();
            self.publish(next);
            let previous = self.listener.replace(replacement);
            self.status.send_modify(|s| s.address = Some(address));
            respond(reply.take(), Ok(id));

            if let Some(previous) = previous {
                if let Err(e) = drain(previous, timeout).await {
                    tracing::error!(error = %e, "Previous listener did not drain cleanly");
                }
            }
            return Ok(());
        }

        let address = self
            .listener
            .as_ref()
            .map(RunningServer::local_addr)
            .unwrap_or(next.bind().address);
        respond(reply.take(), Ok(next.id()));

        self.set_phase(Phase::Draining);
        if let Some(previous) = self.listener.take() {
            if let Err(e) = drain(previous, timeout).await {
                self.fatal = Some(e);
                return Err(ControlError::ListenerDown);
            }
        }

        let router = self.server.router(&next);
        let tls = next.bind().tls.clone();
        self.publish(next);

        match net::start(router, address, tls.as_ref()).await {
            Ok(listener) => {
                self.listener = Some(listener);
                self.set_phase(Phase::Serving);
                tracing::info!(address = %address, "Listener restarted");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, address = %address, "Listener restart failed");
                self.fatal = Some(ShutdownError::Rebind(e));
                Err(ControlError::ListenerDown)
            }
        }
    }

    async fn shutdown(mut self) -> Result<(), ShutdownError> {
        tracing::info!("Termination requested");
        self.set_phase(Phase::Draining);
        let timeout = self.live.load().shutdown_timeout();

        let result = match self.listener.take() {
            Some(listener) => drain(listener, timeout).await,
            None => Ok(()),
        };

        self.status.send_modify(|s| {
            s.phase = Phase::Stopped;
            s.address = None;
        });
        tracing::info!("Relay stopped");
        result
    }

    fn set_phase(&self, phase: Phase) {
        self.status.send_modify(|s| s.phase = phase);
    }
}

fn respond(reply: Reply, result: Result<u64, ControlError>) {
    if let Some(tx) = reply {
        let _ = tx.send(result);
    }
}
