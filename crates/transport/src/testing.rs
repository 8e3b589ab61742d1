//! HTTPS server for tests: real rustls handshakes with a fixture key pair.

use std::net::SocketAddr;
use std::sync::Arc;

use protocol::Endpoint;
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::pem::decode_pem;

/// Self-signed with `CA:TRUE` and no subject alternative names.
pub const CA_CERT: &str = include_str!("../testdata/localhost.pem");
pub const CA_KEY: &[u8] = include_bytes!("../testdata/localhost.key.der");

/// Self-signed with `CA:FALSE` and `DNS:localhost, IP:127.0.0.1`.
pub const LEAF_CERT: &str = include_str!("../testdata/leaf.pem");
pub const LEAF_KEY: &[u8] = include_bytes!("../testdata/leaf.key.der");

const HEALTHY_BODY: &str = r#"{"data":{"ok":true}}"#;

/// Answers every request with `200 {"data":{"ok":true}}`. Stops on drop.
pub struct TlsServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TlsServer {
    pub async fn start(cert_pem: &str, key_der: &[u8]) -> Self {
        let cert = CertificateDer::from(decode_pem(cert_pem).unwrap());
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der.to_vec()));
        let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    if let Ok(mut tls) = acceptor.accept(stream).await {
                        let _ = respond(&mut tls).await;
                    }
                });
            }
        });
        Self { addr, task }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port()).unwrap()
    }
}

impl Drop for TlsServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reads one HTTP/1.1 request (headers plus `content-length` body) and
/// writes the canned response.
async fn respond<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&chunk[..n]);
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while request.len() < header_end + length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{HEALTHY_BODY}",
        HEALTHY_BODY.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
