//! Bounded listener drain.
//!
//! # Responsibilities
//! - Stop accepting new connections
//! - Let in-flight requests finish, up to the shutdown timeout
//! - Force-close whatever remains and wait for the listener task to exit
//!
//! # Design Decisions
//! - Hitting the timeout is not an error: connections are closed and the
//!   address is released either way
//! - A listener task that still does not exit after the grace period is
//!   aborted and reported as a ShutdownError

use std::io;
use std::time::Duration;

use tokio::task::JoinError;

use crate::net::{ListenerError, RunningServer};

/// Extra time given to the listener task after the drain deadline.
const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("listener failed while serving: {0}")]
    Serve(#[source] io::Error),
    #[error("listener task did not complete: {0}")]
    Join(#[from] JoinError),
    #[error("listener did not stop within {0:?} and was aborted")]
    Stuck(Duration),
    #[error("listener could not be restarted: {0}")]
    Rebind(#[source] ListenerError),
}

/// Drain `server` and wait until its address is released.
pub async fn drain(server: RunningServer, timeout: Duration) -> Result<(), ShutdownError> {
    let local_addr = server.local_addr();
    let RunningServer { handle, mut task, .. } = server;

    tracing::info!(
        address = %local_addr,
        active_connections = handle.connection_count(),
        timeout_secs = timeout.as_secs_f64(),
        "Draining listener"
    );
    handle.graceful_shutdown(Some(timeout));

    match tokio::time::timeout(timeout + STOP_GRACE, &mut task).await {
        Ok(joined) => joined?.map_err(ShutdownError::Serve)?,
        Err(_) => {
            task.abort();
            let _ = task.await;
            tracing::error!(address = %local_addr, "Listener stuck, task aborted");
            return Err(ShutdownError::Stuck(timeout));
        }
    }

    tracing::info!(address = %local_addr, "Listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net;
    use axum::{routing::get, Router};

    #[tokio::test]
    async fn drain_releases_address() {
        let server = net::start(Router::new(), "127.0.0.1:0".parse().unwrap(), None)
            .await
            .unwrap();
        let addr = server.local_addr();

        drain(server, Duration::from_secs(1)).await.unwrap();

        // Same address can be bound again immediately.
        let again = net::start(Router::new(), addr, None).await.unwrap();
        assert_eq!(again.local_addr(), addr);
        drain(again, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn slow_request_is_cut_off_at_timeout() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let server = net::start(router, "127.0.0.1:0".parse().unwrap(), None)
            .await
            .unwrap();
        let url = format!("http://{}/slow", server.local_addr());
        let request = tokio::spawn(async move { reqwest::get(url).await });

        // Let the request reach the handler.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        drain(server, Duration::from_millis(300)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(request.await.unwrap().is_err());
    }
}
