//! TLS client configuration and handshakes.
//!
//! Certificate verification is a caller-visible choice. With verification
//! off, the chain and hostname are not checked but handshake signatures
//! still are, so the session is at least bound to the presented key.

use crate::error::{ProbeError, ProbeResult};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// How TLS sessions are established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    /// Check the server chain against the Mozilla roots and the hostname.
    pub verify_certificates: bool,
}

impl TlsOptions {
    pub const fn verified() -> Self {
        Self {
            verify_certificates: true,
        }
    }
}

/// Build a connector for the given options.
pub fn build_connector(options: TlsOptions) -> ProbeResult<TlsConnector> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::TlsHandshake(e.to_string()))?;

    let config = if options.verify_certificates {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        warn!("TLS certificate verification is disabled for this session");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(UnverifiedChain { provider }))
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Run the client handshake over an established TCP connection.
pub async fn handshake(
    tcp: TcpStream,
    host: &str,
    options: TlsOptions,
) -> ProbeResult<TlsStream<TcpStream>> {
    let connector = build_connector(options)?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ProbeError::TlsHandshake(format!("invalid server name '{host}': {e}")))?;

    debug!(host, verify = options.verify_certificates, "starting TLS handshake");
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| ProbeError::TlsHandshake(e.to_string()))
}

/// Accepts any certificate chain but still verifies handshake signatures.
#[derive(Debug)]
struct UnverifiedChain {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for UnverifiedChain {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
