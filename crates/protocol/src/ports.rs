//! Port traits implemented by the `transport` crate.
//!
//! The domain code in this crate calls remote functions and fetches
//! certificates only through these traits, so it can be exercised with
//! in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::{ApiError, BearerToken, Endpoint, RpcOutcome, RpcRequest};

/// The single "invoke remote function" primitive.
///
/// `auth` is the token snapshot taken by the caller at dispatch time;
/// implementations must not consult any other session state.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    /// Executes one call under a single deadline covering the whole
    /// request/response cycle.
    ///
    /// # Errors
    ///
    /// Exactly one [`ApiError`] per failure: [`ApiError::Timeout`] when the
    /// deadline passes, [`ApiError::Network`] for connection failures,
    /// [`ApiError::HttpStatus`] for non-success statuses, and
    /// [`ApiError::Application`] for errors reported inside a 200 JSON body.
    async fn invoke(
        &self,
        request: RpcRequest,
        auth: Option<&BearerToken>,
        timeout: Duration,
    ) -> Result<RpcOutcome, ApiError>;
}

/// Retrieves a server's leaf certificate over an unverified connection.
#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    /// Returns the DER-encoded certificate the server presented.
    ///
    /// # Errors
    ///
    /// [`ApiError::CertificateFetch`] if the connection fails or no
    /// certificate was presented.
    async fn fetch_certificate(&self, endpoint: &Endpoint) -> Result<Vec<u8>, ApiError>;
}
