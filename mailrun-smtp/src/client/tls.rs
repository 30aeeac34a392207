//! TLS handshake for SMTPS and STARTTLS.

use std::sync::Arc;

use mailrun_common::tracing;
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{
        self, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        pki_types::{CertificateDer, ServerName, UnixTime},
    },
};

use super::error::{ClientError, Result};

fn native_roots() -> Result<RootCertStore> {
    let loaded = rustls_native_certs::load_native_certs();
    if !loaded.errors.is_empty() {
        tracing::warn!(errors = ?loaded.errors, "Skipped unreadable system certificates");
    }

    let mut roots = RootCertStore::empty();
    for cert in loaded.certs {
        roots
            .add(cert)
            .map_err(|e| ClientError::TlsError(format!("Rejected system certificate: {e}")))?;
    }
    Ok(roots)
}

fn connector(accept_invalid_certs: bool) -> Result<TlsConnector> {
    let mut config = ClientConfig::builder()
        .with_root_certificates(native_roots()?)
        .with_no_client_auth();

    if accept_invalid_certs {
        tracing::warn!("Relay certificate verification is disabled");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyCert));
    }

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Run the client handshake over `stream`, verifying the relay as `domain`.
pub(super) async fn handshake(
    stream: TcpStream,
    domain: &str,
    accept_invalid_certs: bool,
) -> Result<TlsStream<TcpStream>> {
    let name = ServerName::try_from(domain.to_owned())
        .map_err(|e| ClientError::TlsError(format!("{domain} is not a valid server name: {e}")))?;

    connector(accept_invalid_certs)?
        .connect(name, stream)
        .await
        .map_err(|e| ClientError::TlsError(format!("Handshake with {domain} failed: {e}")))
}

/// Accepts whatever certificate the relay presents.
#[derive(Debug)]
struct AcceptAnyCert;

type Verdict<T> = std::result::Result<T, rustls::Error>;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _leaf: &CertificateDer<'_>,
        _chain: &[CertificateDer<'_>],
        _name: &ServerName<'_>,
        _ocsp: &[u8],
        _at: UnixTime,
    ) -> Verdict<ServerCertVerified> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _payload: &[u8],
        _cert: &CertificateDer<'_>,
        _signature: &DigitallySignedStruct,
    ) -> Verdict<HandshakeSignatureValid> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _payload: &[u8],
        _cert: &CertificateDer<'_>,
        _signature: &DigitallySignedStruct,
    ) -> Verdict<HandshakeSignatureValid> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
        ]
    }
}
