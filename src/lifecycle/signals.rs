//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals into controller requests
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT while draining forces exit with status 1
//! - SIGHUP triggers config reload, not shutdown

use tokio::task::JoinHandle;

use crate::lifecycle::ControlHandle;

/// Spawn the task that forwards OS signals to the controller.
pub fn spawn_signal_handler(control: ControlHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = listen(control).await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
    })
}

#[cfg(unix)]
async fn listen(control: ControlHandle) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminating = false;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, reloading configuration");
                if !control.request_reload() {
                    tracing::warn!("Reload request dropped, controller busy or stopped");
                }
            }
            _ = terminate.recv() => on_terminate(&control, "SIGTERM", &mut terminating),
            _ = interrupt.recv() => on_terminate(&control, "SIGINT", &mut terminating),
        }
    }
}

#[cfg(not(unix))]
async fn listen(control: ControlHandle) -> std::io::Result<()> {
    let mut terminating = false;
    loop {
        tokio::signal::ctrl_c().await?;
        on_terminate(&control, "Ctrl-C", &mut terminating);
    }
}

fn on_terminate(control: &ControlHandle, name: &str, terminating: &mut bool) {
    if *terminating {
        tracing::warn!(signal = name, "Second termination signal, forcing exit");
        std::process::exit(1);
    }
    if control.terminate() {
        *terminating = true;
        tracing::info!(signal = name, "Termination signal received, draining");
    } else {
        tracing::warn!(signal = name, "Termination request not accepted, controller stopped");
    }
}
