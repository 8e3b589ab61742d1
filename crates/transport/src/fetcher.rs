//! Retrieves a server's certificate over an unverified TLS connection.

use std::time::Duration;

use async_trait::async_trait;
use protocol::{ApiError, CertificateFetcher, Endpoint};
use reqwest::tls::TlsInfo;
use tracing::{debug, instrument};

use crate::invoker::error_chain;

/// [`CertificateFetcher`] that performs one HTTPS request with certificate
/// verification disabled and reads the peer certificate from the TLS session.
///
/// The response status is irrelevant; only the completed handshake matters.
#[derive(Debug, Clone)]
pub struct TlsPeerFetcher {
    timeout: Duration,
}

impl TlsPeerFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CertificateFetcher for TlsPeerFetcher {
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn fetch_certificate(&self, endpoint: &Endpoint) -> Result<Vec<u8>, ApiError> {
        let fail = |message: String| ApiError::CertificateFetch {
            endpoint: endpoint.to_string(),
            message,
        };

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(true)
            .tls_info(true)
            .timeout(self.timeout)
            .build()
            .map_err(|e| fail(error_chain(&e)))?;

        let response = client
            .get(endpoint.api_url())
            .send()
            .await
            .map_err(|e| fail(error_chain(&e)))?;

        let der = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(TlsInfo::peer_certificate)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| fail("server presented no certificate".to_string()))?;

        debug!(bytes = der.len(), status = response.status().as_u16(), "peer certificate retrieved");
        Ok(der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pem::decode_pem;
    use crate::testing::{TlsServer, CA_CERT, CA_KEY, LEAF_CERT, LEAF_KEY};

    #[tokio::test]
    async fn returns_the_certificate_the_server_presents() {
        for (cert, key) in [(CA_CERT, CA_KEY), (LEAF_CERT, LEAF_KEY)] {
            let server = TlsServer::start(cert, key).await;

            let der = TlsPeerFetcher::new(Duration::from_secs(5))
                .fetch_certificate(&server.endpoint())
                .await
                .unwrap();

            assert_eq!(der, decode_pem(cert).unwrap());
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_fetch_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();

        let err = TlsPeerFetcher::new(Duration::from_secs(2))
            .fetch_certificate(&endpoint)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "CERTIFICATE_FETCH_ERROR");
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
