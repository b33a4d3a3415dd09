//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;
use crate::net::listener::ListenerError;

/// Load the rustls acceptor configuration for the listener.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, ListenerError> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);

    for path in [cert_path, key_path] {
        if !path.exists() {
            return Err(ListenerError::Tls(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("TLS file not found: {}", path.display()),
            )));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(ListenerError::Tls)
}
