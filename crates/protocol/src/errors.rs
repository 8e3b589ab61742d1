//! Error taxonomy for every failure the client can surface.
//!
//! [`ApiError`] is a single tagged enum: callers match on the variant (or on
//! [`ApiError::kind`]) instead of inspecting types at runtime. Every variant
//! has a stable string code, and [`ApiError::to_failure`] projects any error
//! onto the `{code, message}` shape reported to users.

use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when a non-success HTTP response carries no body.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Message used when an application error omits `errorMessage`.
pub const DEFAULT_APPLICATION_MESSAGE: &str = "API error";

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Discriminant of [`ApiError`], for callers that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CertificateFetch,
    CertificateWrite,
    CertificateRead,
    CertificateMismatch,
    Network,
    Timeout,
    HttpStatus,
    Application,
    Decode,
    InvalidParameter,
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Every failure produced by trust bootstrap, request delivery, or decoding.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiError {
    /// The server's certificate could not be retrieved.
    ///
    /// Fatal for every later call on the endpoint until the server is reachable.
    ///
    /// Produced by: the certificate fetcher during trust bootstrap.
    #[error("Failed to fetch certificate from {endpoint}: {message}")]
    CertificateFetch {
        /// `host:port` of the server.
        endpoint: String,
        /// Connection or handshake failure, including its causes.
        message: String,
    },

    /// The fetched certificate could not be persisted to the cache directory.
    ///
    /// Produced by: the trust store when creating the directory or the file.
    #[error("Failed to write certificate cache '{path}': {message}")]
    CertificateWrite {
        /// File or directory that could not be written.
        path: String,
        /// Underlying I/O error.
        message: String,
    },

    /// A cached certificate exists but could not be read or decoded.
    ///
    /// Delete the file to force a fresh fetch.
    ///
    /// Produced by: the trust store, and by the invoker when the TLS backend
    /// refuses the cached certificate.
    #[error("Failed to read certificate cache '{path}': {message}")]
    CertificateRead {
        /// Cache file that was read.
        path: String,
        /// I/O, PEM, or TLS backend error.
        message: String,
    },

    /// The server presented a certificate other than the pinned one.
    ///
    /// Either the server's certificate changed or something else answered on
    /// the endpoint. Delete the cache file to trust the new certificate.
    ///
    /// Produced by: the invoker when the TLS handshake fails the pin check.
    #[error("Server certificate does not match the pinned certificate '{path}': {message}")]
    CertificateMismatch {
        /// Cache file holding the pinned certificate.
        path: String,
        /// Handshake error, including its causes.
        message: String,
    },

    /// Connection-level failure (refused, reset, DNS) that is not a timeout.
    ///
    /// Produced by: the invoker when the request cannot be delivered.
    #[error("Network error: {message}. Please check your host and port.")]
    Network {
        /// Transport error, including its causes.
        message: String,
    },

    /// The request/response cycle exceeded its deadline.
    ///
    /// Produced by: the invoker's per-call deadline.
    #[error("Request timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Deadline that expired.
        timeout: Duration,
    },

    /// The server answered with a status other than 200 or 204.
    ///
    /// Produced by: response decoding.
    #[error("API error: {body}. Status code: {status}")]
    HttpStatus {
        /// HTTP status code of the response.
        status: u16,
        /// Response text, or [`UNKNOWN_ERROR_MESSAGE`] when empty.
        body: String,
    },

    /// The server reported an `errorCode` inside a 200 JSON response.
    ///
    /// Produced by: response decoding.
    #[error("{code}: {message}")]
    Application {
        /// Server-supplied `errorCode`, reported unchanged.
        code: String,
        /// Server-supplied `errorMessage`, or [`DEFAULT_APPLICATION_MESSAGE`].
        message: String,
    },

    /// A 200 response declared JSON but its body could not be parsed, or a
    /// successful result lacked a field the caller requires.
    ///
    /// Produced by: response decoding, login token extraction.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// Parser error or name of the missing field.
        message: String,
    },

    /// Local input was rejected before anything was sent.
    ///
    /// Produced by: request and endpoint constructors, privilege parsing.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// What was wrong with the input.
        message: String,
    },
}

impl ApiError {
    /// Builds an [`ApiError::HttpStatus`], substituting [`UNKNOWN_ERROR_MESSAGE`]
    /// for an empty body.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let body = if body.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            body
        };
        Self::HttpStatus { status, body }
    }

    /// Builds an [`ApiError::Application`], substituting
    /// [`DEFAULT_APPLICATION_MESSAGE`] when the server sent no message.
    pub fn application(code: impl Into<String>, message: Option<String>) -> Self {
        Self::Application {
            code: code.into(),
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_APPLICATION_MESSAGE.to_string()),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CertificateFetch { .. } => ErrorKind::CertificateFetch,
            Self::CertificateWrite { .. } => ErrorKind::CertificateWrite,
            Self::CertificateRead { .. } => ErrorKind::CertificateRead,
            Self::CertificateMismatch { .. } => ErrorKind::CertificateMismatch,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::Application { .. } => ErrorKind::Application,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
        }
    }

    /// Stable machine-readable code, e.g. `TIMEOUT_ERROR` or `API_ERROR_500`.
    ///
    /// Application errors return the server-supplied code unchanged.
    pub fn code(&self) -> Cow<'_, str> {
        match self {
            Self::CertificateFetch { .. } => Cow::Borrowed("CERTIFICATE_FETCH_ERROR"),
            Self::CertificateWrite { .. } => Cow::Borrowed("CERTIFICATE_WRITE_ERROR"),
            Self::CertificateRead { .. } => Cow::Borrowed("CERTIFICATE_READ_ERROR"),
            Self::CertificateMismatch { .. } => Cow::Borrowed("CERTIFICATE_MISMATCH_ERROR"),
            Self::Network { .. } => Cow::Borrowed("NETWORK_ERROR"),
            Self::Timeout { .. } => Cow::Borrowed("TIMEOUT_ERROR"),
            Self::HttpStatus { status, .. } => Cow::Owned(format!("API_ERROR_{status}")),
            Self::Application { code, .. } => Cow::Borrowed(code),
            Self::Decode { .. } => Cow::Borrowed("DECODE_ERROR"),
            Self::InvalidParameter { .. } => Cow::Borrowed("INVALID_PARAMETER"),
        }
    }

    /// Human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Application { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Projects this error onto the `{code, message}` reporting shape.
    pub fn to_failure(&self) -> ApiFailure {
        ApiFailure {
            code: self.code().into_owned(),
            message: self.message(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApiFailure
// ---------------------------------------------------------------------------

/// Flat `{code, message}` view of an [`ApiError`], suitable for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
