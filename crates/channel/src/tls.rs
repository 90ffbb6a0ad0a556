//! TLS context construction for both connection roles.
//!
//! The server role is backed by a certificate chain and a private key; the
//! client role by a CA trust bundle with optional peer-hostname override.
//! Material is supplied as PEM bytes and parsed with `rustls-pemfile`; both
//! resulting configs carry the channel's ALPN preference list so the
//! handshake advertises exactly the configured tokens.

use crate::error::{ChannelError, Result};
use rustls::pki_types::PrivateKeyDer;
use std::sync::Arc;
use weft_wire_protocol::PreferenceList;

/// Server-side TLS identity: certificate chain plus private key, PEM-encoded.
#[derive(Debug, Clone)]
pub struct ServerTlsSettings {
    pub cert_chain_pem: Vec<u8>,
    pub private_key_pem: Vec<u8>,
}

/// Client-side trust settings: a CA bundle and, optionally, the hostname to
/// verify the peer certificate against (the connect-time default is used when
/// absent).
#[derive(Debug, Clone)]
pub struct ClientTlsSettings {
    pub ca_bundle_pem: Vec<u8>,
    pub peer_hostname: Option<String>,
}

/// Role-specific TLS context produced by a config snapshot.
#[derive(Debug, Clone)]
pub enum TlsContext {
    Client(Arc<rustls::ClientConfig>),
    Server(Arc<rustls::ServerConfig>),
}

impl TlsContext {
    /// The ALPN tokens this context advertises, in preference order.
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        match self {
            TlsContext::Client(config) => &config.alpn_protocols,
            TlsContext::Server(config) => &config.alpn_protocols,
        }
    }
}

pub(crate) fn build_server_tls(
    settings: &ServerTlsSettings,
    preferences: &PreferenceList,
) -> Result<Arc<rustls::ServerConfig>> {
    let certs = parse_cert_chain(&settings.cert_chain_pem)?;
    let key = parse_private_key(&settings.private_key_pem)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = preferences.alpn_wire_format();

    tracing::debug!(
        target: "weft::channel::tls",
        alpn = ?preferences,
        "server TLS context ready"
    );
    Ok(Arc::new(config))
}

pub(crate) fn build_client_tls(
    settings: &ClientTlsSettings,
    preferences: &PreferenceList,
) -> Result<Arc<rustls::ClientConfig>> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in parse_cert_chain(&settings.ca_bundle_pem)? {
        roots.add(cert)?;
    }
    if roots.is_empty() {
        return Err(ChannelError::InvalidConfiguration(
            "CA bundle contains no certificates".into(),
        ));
    }

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = preferences.alpn_wire_format();

    tracing::debug!(
        target: "weft::channel::tls",
        alpn = ?preferences,
        peer_hostname = ?settings.peer_hostname,
        "client TLS context ready"
    );
    Ok(Arc::new(config))
}

fn parse_cert_chain(pem: &[u8]) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let mut reader = pem;
    let mut certs = Vec::new();
    for item in rustls_pemfile::certs(&mut reader) {
        let cert = item.map_err(|e| {
            ChannelError::InvalidConfiguration(format!("unparseable certificate PEM: {e}"))
        })?;
        certs.push(cert);
    }
    if certs.is_empty() {
        return Err(ChannelError::InvalidConfiguration(
            "certificate chain is empty".into(),
        ));
    }
    Ok(certs)
}

/// PKCS#8 is the common case; SEC1 EC keys are accepted as a fallback.
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = pem;
    for item in rustls_pemfile::pkcs8_private_keys(&mut reader) {
        if let Ok(key) = item {
            return Ok(PrivateKeyDer::from(key));
        }
    }
    let mut reader = pem;
    for item in rustls_pemfile::ec_private_keys(&mut reader) {
        if let Ok(key) = item {
            return Ok(PrivateKeyDer::from(key));
        }
    }
    Err(ChannelError::InvalidConfiguration(
        "no supported private key found (expected PKCS#8 or SEC1 PEM)".into(),
    ))
}
