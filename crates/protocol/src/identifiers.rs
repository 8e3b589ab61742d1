//! Newtype identifiers for the remote server and its credentials.
//!
//! [`Endpoint`] is the immutable identity of the remote server and the key
//! under which trust material is cached. [`BearerToken`] wraps the opaque
//! authentication token issued by the login functions.

use serde::{Deserialize, Serialize};

use crate::ApiError;

/// Port the dedicated server listens on when none is configured.
pub const DEFAULT_PORT: u16 = 7777;

/// Path of the single RPC endpoint on the remote server.
pub const API_PATH: &str = "/api/v1";

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Host and port of one remote server.
///
/// Used both to build the request URL and as the cache key for the server's
/// pinned certificate. Two endpoints are the same server only if host and port
/// both match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint, rejecting an empty or whitespace-only host.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ApiError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(ApiError::InvalidParameter {
                message: "host must not be empty".to_string(),
            });
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Origin (`https://host:port`) of the server. IPv6 literals are bracketed.
    pub fn origin(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("https://[{}]:{}", self.host, self.port)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }

    /// Full URL of the RPC endpoint.
    pub fn api_url(&self) -> String {
        format!("{}{}", self.origin(), API_PATH)
    }

    /// Filesystem-safe key for this endpoint, e.g. `example_com_7777`.
    ///
    /// Every host character other than an ASCII alphanumeric or `-` becomes `_`.
    pub fn cache_key(&self) -> String {
        let host: String = self
            .host
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// BearerToken
// ---------------------------------------------------------------------------

/// Opaque authentication token sent as `Authorization: Bearer <token>`.
///
/// `Debug` redacts the value so tokens never reach log output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Creates a token, returning `None` if the value is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.is_empty() {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Returns the raw token for placing in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}
