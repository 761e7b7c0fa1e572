//! TLS client setup for `h2` sessions.
//!
//! # Responsibilities
//! - Build a rustls client config offering only `h2` via ALPN
//! - Trust webpki roots, plus an optional PEM bundle from disk
//! - Optionally skip certificate verification (test servers, self-signed)
//! - Reject peers that do not select `h2`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;

use crate::net::TransportError;

const ALPN_H2: &[u8] = b"h2";

/// TLS knobs carried from session options.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// Verify the server certificate chain and name.
    pub verify: bool,
    /// Extra PEM-encoded roots to trust.
    pub ca_file: Option<PathBuf>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify: true,
            ca_file: None,
        }
    }
}

/// Run the TLS handshake over `tcp` and require `h2` to be negotiated.
pub async fn connect(
    tcp: TcpStream,
    host: &str,
    options: &TlsOptions,
) -> Result<TlsStream<TcpStream>, TransportError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportError::Tls(format!("invalid server name: {}", host)))?;

    let config = client_config(options).await?;
    let tls = TlsConnector::from(config).connect(server_name, tcp).await?;

    match tls.get_ref().1.alpn_protocol() {
        Some(protocol) if protocol == ALPN_H2 => Ok(tls),
        other => {
            tracing::warn!(
                host = %host,
                alpn = ?other.map(String::from_utf8_lossy),
                "Peer refused h2"
            );
            Err(TransportError::AlpnRejected)
        }
    }
}

/// The crypto provider every session uses, independent of any process default.
fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

async fn client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>, TransportError> {
    let builder = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(e.to_string()))?;

    let mut config = if options.verify {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        if let Some(path) = &options.ca_file {
            for cert in load_certs(path).await? {
                roots
                    .add(cert)
                    .map_err(|e| TransportError::Tls(format!("bad certificate in {:?}: {}", path, e)))?;
            }
        }
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth()
    };
    config.alpn_protocols = vec![ALPN_H2.to_vec()];
    Ok(Arc::new(config))
}

/// Load every certificate from a PEM file.
async fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    if !path.exists() {
        return Err(TransportError::Tls(format!(
            "CA bundle not found: {:?}",
            path
        )));
    }
    let pem = tokio::fs::read(path).await?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice()).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(TransportError::Tls(format!("no certificates in {:?}", path)));
    }
    Ok(certs)
}

/// Accepts any server certificate.
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
