//! Trust-on-first-use certificate pinning.
//!
//! [`TrustStore::establish`] is the only way to obtain a [`PinnedTls`], and a
//! [`PinnedTls`] is the only way to build an [`crate::HttpInvoker`]. No call
//! can therefore be dispatched before the endpoint's anchor exists.
//!
//! ## Cache layout
//!
//! One file per endpoint: `{cert_dir}/{cache_key}.crt`, e.g.
//! `certs/example_com_7777.crt`, holding a single PEM `CERTIFICATE` block.
//!
//! ## Concurrency
//!
//! Writes go to a uniquely named temporary file which is then hard-linked into
//! place. Linking fails if the target exists, so the first writer wins, a
//! curated file is never replaced, and readers never observe a partial file.
//! Racing initialisations may fetch twice but always agree on the result.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use protocol::{ApiError, CertificateFetcher, ClientOptions, Endpoint, TrustAnchor};
use reqwest::ClientBuilder;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::pem::{decode_pem, encode_pem};
use crate::verifier::AnchorVerifier;
use crate::TlsPeerFetcher;

const CERT_EXTENSION: &str = "crt";

// ---------------------------------------------------------------------------
// PinnedTls
// ---------------------------------------------------------------------------

/// TLS configuration for one endpoint whose trust anchor is established.
///
/// In pinned mode the server must present exactly the anchor's certificate
/// (see [`crate::verifier`]).
#[derive(Debug, Clone)]
pub struct PinnedTls {
    anchor: TrustAnchor,
    verifier: Option<Arc<AnchorVerifier>>,
}

impl PinnedTls {
    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// `true` if certificate validation is disabled entirely.
    pub fn skips_verification(&self) -> bool {
        self.verifier.is_none()
    }

    /// Handshakes refused so far because the server presented a different
    /// certificate. Always zero when verification is skipped.
    pub fn rejections(&self) -> usize {
        self.verifier.as_ref().map_or(0, |v| v.rejections())
    }

    /// A reqwest builder that accepts only the pinned certificate, or any
    /// certificate when verification is skipped.
    pub fn client_builder(&self) -> Result<ClientBuilder, ApiError> {
        let Some(verifier) = &self.verifier else {
            return Ok(reqwest::Client::builder()
                .use_rustls_tls()
                .danger_accept_invalid_certs(true));
        };
        let config = verifier
            .client_config()
            .map_err(|e| ApiError::CertificateRead {
                path: self.anchor.cache_file().display().to_string(),
                message: e.to_string(),
            })?;
        Ok(reqwest::Client::builder().use_preconfigured_tls(config))
    }
}

// ---------------------------------------------------------------------------
// TrustStore
// ---------------------------------------------------------------------------

/// Establishes and caches one trust anchor per endpoint.
#[derive(Debug, Clone)]
pub struct TrustStore<F = TlsPeerFetcher> {
    cert_dir: PathBuf,
    fetcher: F,
}

impl TrustStore<TlsPeerFetcher> {
    /// Store rooted at `options.cert_dir`, fetching under `options.timeout()`.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(&options.cert_dir, TlsPeerFetcher::new(options.timeout()))
    }
}

impl<F: CertificateFetcher> TrustStore<F> {
    pub fn new(cert_dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            fetcher,
        }
    }

    /// Path of the cache file for `endpoint`.
    pub fn cache_path(&self, endpoint: &Endpoint) -> PathBuf {
        self.cert_dir
            .join(format!("{}.{CERT_EXTENSION}", endpoint.cache_key()))
    }

    /// Returns the TLS configuration for `endpoint`, fetching and caching its
    /// certificate first if no cache file exists.
    ///
    /// With `skip_verification` the anchor is still established and cached,
    /// but the returned configuration does not validate against it.
    ///
    /// # Errors
    ///
    /// [`ApiError::CertificateFetch`], [`ApiError::CertificateWrite`], or
    /// [`ApiError::CertificateRead`].
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn establish(
        &self,
        endpoint: &Endpoint,
        skip_verification: bool,
    ) -> Result<PinnedTls, ApiError> {
        let anchor = self.anchor(endpoint).await?;
        let verifier = if skip_verification {
            warn!("certificate verification disabled; pinned anchor cached but not enforced");
            None
        } else {
            Some(Arc::new(AnchorVerifier::new(anchor.der())))
        };
        Ok(PinnedTls { anchor, verifier })
    }

    /// Loads the cached anchor for `endpoint`, creating it if absent.
    pub async fn anchor(&self, endpoint: &Endpoint) -> Result<TrustAnchor, ApiError> {
        let path = self.cache_path(endpoint);
        if let Some(anchor) = read_cached(endpoint, &path).await? {
            debug!(path = %path.display(), "using cached certificate");
            return Ok(anchor);
        }

        info!(path = %path.display(), "no cached certificate; fetching from server");
        let der = self.fetcher.fetch_certificate(endpoint).await?;
        let created = persist_if_absent(&self.cert_dir, &path, &encode_pem(&der)).await?;
        if !created {
            debug!(path = %path.display(), "certificate cache appeared concurrently; keeping existing file");
        }

        read_cached(endpoint, &path)
            .await?
            .ok_or_else(|| ApiError::CertificateWrite {
                path: path.display().to_string(),
                message: "cache file missing after write".to_string(),
            })
    }
}

/// Reads and decodes a cache file; `Ok(None)` if it does not exist.
async fn read_cached(endpoint: &Endpoint, path: &Path) -> Result<Option<TrustAnchor>, ApiError> {
    let read_error = |message: String| ApiError::CertificateRead {
        path: path.display().to_string(),
        message,
    };

    let pem = match tokio::fs::read_to_string(path).await {
        Ok(pem) => pem,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_error(e.to_string())),
    };
    let der = decode_pem(&pem).map_err(|e| read_error(e.to_string()))?;
    Ok(Some(TrustAnchor::new(
        endpoint.clone(),
        der,
        pem,
        path.to_path_buf(),
    )))
}

/// Writes `pem` to `path` unless the file already exists.
///
/// Returns `true` if this call created the file.
async fn persist_if_absent(dir: &Path, path: &Path, pem: &str) -> Result<bool, ApiError> {
    let write_error = |target: &Path, e: std::io::Error| ApiError::CertificateWrite {
        path: target.display().to_string(),
        message: e.to_string(),
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| write_error(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let result = match tokio::fs::write(&staging, pem).await {
        Ok(()) => match tokio::fs::hard_link(&staging, path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(write_error(path, e)),
        },
        Err(e) => Err(write_error(&staging, e)),
    };

    if let Err(e) = tokio::fs::remove_file(&staging).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %staging.display(), error = %e, "failed to remove staging file");
        }
    }
    result
}
