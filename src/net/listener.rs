//! TCP listener startup.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Hand the bound socket to axum-server, with or without TLS
//! - Keep the server Handle so the listener can be drained later

use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::TlsConfig;
use crate::net::tls::load_tls_config;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Failed to load TLS configuration: {0}")]
    Tls(#[source] io::Error),
}

/// A listener that is accepting connections on a background task.
#[derive(Debug)]
pub struct RunningServer {
    pub(crate) handle: Handle,
    pub(crate) task: JoinHandle<io::Result<()>>,
    local_addr: SocketAddr,
}

impl RunningServer {
    /// The address actually bound (differs from the configured one for port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently open on this listener.
    pub fn active_connections(&self) -> usize {
        self.handle.connection_count()
    }
}

/// Bind `addr` and start serving `router` on it.
pub async fn start(
    router: Router,
    addr: SocketAddr,
    tls: Option<&TlsConfig>,
) -> Result<RunningServer, ListenerError> {
    let bind_err = |source| ListenerError::Bind { addr, source };

    let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;
    let listener = listener.into_std().map_err(bind_err)?;

    let handle = Handle::new();
    let app = router.into_make_service();

    let task = match tls {
        None => {
            let server = axum_server::from_tcp(listener).handle(handle.clone());
            tokio::spawn(async move { server.serve(app).await })
        }
        Some(tls) => {
            let config = load_tls_config(tls).await?;
            let server = axum_server::from_tcp_rustls(listener, config).handle(handle.clone());
            tokio::spawn(async move { server.serve(app).await })
        }
    };

    tracing::info!(
        address = %local_addr,
        tls = tls.is_some(),
        "Listener bound"
    );

    Ok(RunningServer {
        handle,
        task,
        local_addr,
    })
}
