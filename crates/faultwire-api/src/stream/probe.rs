// ── Reachability probe ──
//
// Opens a throwaway socket to the stream server, optionally completing a
// TLS handshake, then drops it. Never touches the long-lived connection.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CipherSuite, DigitallySignedStruct, SignatureScheme};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::Error;

/// Upper bound on a whole probe, connect and handshake included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// TLS 1.2 only, ECDHE with AES-GCM.
const ALLOWED_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
];

/// Check that `host:port` accepts connections within `timeout`.
pub async fn probe(host: &str, port: u16, tls: bool, timeout: Duration) -> Result<(), Error> {
    let attempt = async {
        let tcp = TcpStream::connect((host, port)).await?;
        debug!(host, port, tls, "probe socket connected");

        if tls {
            let connector = TlsConnector::from(Arc::new(fixed_policy_config()?));
            let server_name = ServerName::try_from(host.to_owned())
                .map_err(|e| Error::Tls(format!("invalid server name '{host}': {e}")))?;
            let mut stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| Error::Tls(e.to_string()))?;
            // Best-effort close_notify; the handshake already proved reachability.
            let _ = stream.shutdown().await;
            debug!(host, port, "probe TLS handshake completed");
        }

        Ok::<(), Error>(())
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| Error::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })?
}

/// Client config pinned to TLS 1.2 and [`ALLOWED_SUITES`], accepting any
/// server certificate (management servers routinely use self-signed ones).
fn fixed_policy_config() -> Result<rustls::ClientConfig, Error> {
    let mut provider = rustls::crypto::ring::default_provider();
    provider
        .cipher_suites
        .retain(|suite| ALLOWED_SUITES.contains(&suite.suite()));
    let schemes = provider.signature_verification_algorithms.supported_schemes();

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&[&rustls::version::TLS12])
        .map_err(|e| Error::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { schemes }))
        .with_no_client_auth();

    Ok(config)
}

#[derive(Debug)]
struct AcceptAnyServerCert {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
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
        self.schemes.clone()
    }
}
