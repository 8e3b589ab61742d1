//! rustls verifier that accepts exactly one pinned certificate.
//!
//! The server's end-entity certificate must be byte-identical to the pinned
//! DER. No chain building, name matching, or validity-period check is done,
//! so self-signed certificates with `CA:TRUE`, no subject alternative names,
//! or an expired `notAfter` are accepted as long as they are the pinned one.
//! Handshake signatures are still verified against the presented key.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::warn;

#[derive(Debug)]
pub struct AnchorVerifier {
    anchor: CertificateDer<'static>,
    provider: Arc<CryptoProvider>,
    rejections: AtomicUsize,
}

impl AnchorVerifier {
    pub fn new(anchor_der: &[u8]) -> Self {
        Self {
            anchor: CertificateDer::from(anchor_der.to_vec()),
            provider: Arc::new(ring::default_provider()),
            rejections: AtomicUsize::new(0),
        }
    }

    /// Number of handshakes refused because the certificate did not match.
    pub fn rejections(&self) -> usize {
        self.rejections.load(Ordering::SeqCst)
    }

    /// Client configuration that verifies servers with this verifier only.
    pub fn client_config(self: &Arc<Self>) -> Result<ClientConfig, rustls::Error> {
        let config = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::clone(self) as Arc<dyn ServerCertVerifier>)
            .with_no_client_auth();
        Ok(config)
    }
}

impl ServerCertVerifier for AnchorVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.anchor.as_ref() {
            return Ok(ServerCertVerified::assertion());
        }
        self.rejections.fetch_add(1, Ordering::SeqCst);
        warn!(server = ?server_name, "server certificate differs from the pinned certificate");
        Err(rustls::Error::InvalidCertificate(
            CertificateError::ApplicationVerificationFailure,
        ))
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
