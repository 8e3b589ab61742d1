//! TLS transport for the management API client.
//!
//! Implements the [`protocol::RemoteInvoker`] and [`protocol::CertificateFetcher`]
//! ports over reqwest + rustls, and pins each server's self-signed certificate
//! on first contact.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Certificate retrieval, the on-disk trust cache, HTTP
//! framing, and deadline enforcement all live here. The [`protocol`] crate
//! sees only its port traits.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`trust`] | `TrustStore`, `PinnedTls` |
//! | [`fetcher`] | `TlsPeerFetcher` |
//! | [`invoker`] | `HttpInvoker` |
//! | [`verifier`] | `AnchorVerifier`, the exact-match rustls verifier |
//! | [`pem`] | PEM encoding of the cached certificate |

use std::sync::Arc;

use protocol::{ApiError, ClientOptions, Endpoint, ServerClient};
use tracing::info;

pub mod fetcher;
pub mod invoker;
pub mod pem;
pub mod trust;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::TlsPeerFetcher;
pub use invoker::HttpInvoker;
pub use trust::{PinnedTls, TrustStore};

/// Establishes trust for `endpoint` and returns a client bound to it.
///
/// # Errors
///
/// Any trust bootstrap failure; no call is possible until it is resolved.
pub async fn connect(endpoint: &Endpoint, options: ClientOptions) -> Result<ServerClient, ApiError> {
    let tls = TrustStore::from_options(&options)
        .establish(endpoint, options.skip_ssl_verification)
        .await?;
    let invoker = HttpInvoker::new(&tls)?;
    info!(
        endpoint = %endpoint,
        certificate = %tls.anchor().cache_file().display(),
        "connected"
    );
    Ok(ServerClient::new(Arc::new(invoker), options))
}
