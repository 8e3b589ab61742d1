//! Client configuration.
//!
//! Every field has a default so a partial TOML table (or none at all)
//! deserialises into a usable [`ClientOptions`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::BackoffPolicy;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_CERT_DIR: &str = "certs";

/// Options consumed by the trust store, the invoker, and the health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Disables certificate validation entirely. The certificate is still
    /// fetched and cached.
    pub skip_ssl_verification: bool,

    /// Deadline for each regular call, in milliseconds.
    pub timeout_ms: u64,

    /// Deadline of the first health-check attempt, in milliseconds. Later
    /// attempts add one second each.
    pub health_check_timeout_ms: u64,

    /// Directory holding one pinned certificate per endpoint.
    pub cert_dir: PathBuf,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            skip_ssl_verification: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            health_check_timeout_ms: DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
        }
    }
}

impl ClientOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    /// Per-attempt deadline schedule for health probes.
    pub fn health_check_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::linear(self.health_check_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = ClientOptions::default();
        assert!(!options.skip_ssl_verification);
        assert_eq!(options.timeout(), Duration::from_millis(10_000));
        assert_eq!(options.health_check_timeout(), Duration::from_millis(1_000));
        assert_eq!(options.cert_dir, PathBuf::from("certs"));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let options: ClientOptions =
            serde_json::from_str(r#"{"timeout_ms": 2500, "skip_ssl_verification": true}"#)
                .unwrap();
        assert_eq!(options.timeout_ms, 2500);
        assert!(options.skip_ssl_verification);
        assert_eq!(options.health_check_timeout_ms, DEFAULT_HEALTH_CHECK_TIMEOUT_MS);
    }

    #[test]
    fn backoff_uses_health_check_timeout_as_base() {
        let options = ClientOptions {
            health_check_timeout_ms: 500,
            ..ClientOptions::default()
        };
        assert_eq!(
            options.health_check_backoff().deadline(0),
            Duration::from_millis(500)
        );
    }
}
