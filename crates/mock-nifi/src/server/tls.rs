//! TLS listener setup using rustls.
//!
//! The server certificate, key, and optional client CA bundle are read from
//! PEM files. When a client CA is supplied every connection must present a
//! certificate chaining to it.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use hyper::{body::Incoming, Request};
use hyper_util::rt::TokioIo;
use rustls::{server::WebPkiClientVerifier, RootCertStore, ServerConfig};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, warn};

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// With `client_ca_pem`, clients must authenticate with a certificate issued by
/// one of the CAs in the bundle.
///
/// # Errors
///
/// Returns an error if the certificate, key, or CA bundle cannot be parsed, or
/// if rustls rejects the configuration.
pub fn build_server_config(
    cert_pem: &[u8],
    key_pem: &[u8],
    client_ca_pem: Option<&[u8]>,
) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in PEM data");
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .context("failed to read TLS private key")?
        .context("no private key found in PEM data")?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .context("failed to select TLS protocol versions")?;

    let builder = match client_ca_pem {
        Some(ca_pem) => {
            let mut roots = RootCertStore::empty();
            for cert in rustls_pemfile::certs(&mut std::io::BufReader::new(ca_pem)) {
                let cert = cert.context("failed to parse client CA bundle")?;
                roots.add(cert).context("invalid client CA certificate")?;
            }
            if roots.is_empty() {
                anyhow::bail!("no certificates found in client CA bundle");
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .context("failed to build client certificate verifier")?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let config = builder
        .with_single_cert(certs, key)
        .context("failed to build rustls ServerConfig")?;

    Ok(Arc::new(config))
}

/// Accept TLS connections on `listener` and serve `router` over HTTP/1.1.
///
/// Handshake and connection failures are logged and do not stop the loop.
///
/// # Errors
///
/// Returns an error only if accepting on the listener fails.
pub async fn serve(listener: TcpListener, config: Arc<ServerConfig>, router: Router) -> Result<()> {
    let acceptor = TlsAcceptor::from(config);
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let acceptor = acceptor.clone();
        let router = router.clone();

        tokio::spawn(async move {
            let tls = match acceptor.accept(stream).await {
                Ok(tls) => tls,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                router.clone().oneshot(req)
            });
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(tls), service)
                .await
            {
                debug!(peer = %peer, error = %e, "connection closed with error");
            }
        });
    }
}
