//! Domain layer of the dedicated server management API client.
//!
//! This crate defines what a remote call is, how its response is interpreted,
//! and how failures are classified. It performs no I/O: the `transport` crate
//! implements [`RemoteInvoker`] and [`CertificateFetcher`] over TLS, and
//! everything here is driven through those traits.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | `Endpoint`, `BearerToken` |
//! | [`types`] | `RpcRequest`, `RpcOutcome`, `TrustAnchor`, `ProbeReport`, privilege levels |
//! | [`errors`] | `ApiError` taxonomy and the `ApiFailure` reporting shape |
//! | [`response`] | Content-type classification and response decoding |
//! | [`config`] | `ClientOptions` |
//! | [`session`] | `AuthSession` bearer-token holder |
//! | [`backoff`] | Per-attempt deadline schedule |
//! | [`ports`] | Traits implemented by infrastructure |
//! | [`probe`] | `RetryingProbe` health checking |
//! | [`client`] | `ServerClient` facade |

pub mod backoff;
pub mod client;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod probe;
pub mod response;
pub mod session;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use backoff::BackoffPolicy;
pub use client::ServerClient;
pub use config::ClientOptions;
pub use errors::{ApiError, ApiFailure, ErrorKind};
pub use identifiers::{BearerToken, Endpoint, API_PATH, DEFAULT_PORT};
pub use ports::{CertificateFetcher, RemoteInvoker};
pub use probe::{RetryingProbe, DEFAULT_RETRIES, HEALTH_CHECK_FUNCTION};
pub use response::{decode_response, needs_body, ResponseKind};
pub use session::AuthSession;
pub use types::{
    Attachment, Envelope, MinimumPrivilegeLevel, ProbeReport, RpcBody, RpcOutcome, RpcRequest,
    TrustAnchor,
};
