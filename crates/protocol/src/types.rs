//! Request, result, and trust value types shared by the client and transport.
//!
//! [`RpcRequest`] is built fresh for every call and consumed by the invoker.
//! [`RpcOutcome`] is what a successful call yields, shaped by the response's
//! declared content type. [`TrustAnchor`] is the pinned certificate for one
//! [`Endpoint`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiError, Endpoint};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A binary file carried by a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Name of the multipart form field.
    pub field_name: String,
    /// File name reported to the server.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// MIME type of the part; `None` lets the transport pick a default.
    pub content_type: Option<String>,
}

/// What a request carries besides the function name.
///
/// Exactly one shape per call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcBody {
    /// `{"function": name}`
    Empty,
    /// `{"function": name, "data": payload}`
    Payload(Value),
    /// A multipart body holding only the attachment.
    Attachment(Attachment),
}

/// One logical remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    function: String,
    body: RpcBody,
}

/// JSON envelope sent for structured calls.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub function: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
}

impl RpcRequest {
    /// Creates a request with no payload. Rejects an empty function name.
    pub fn new(function: impl Into<String>) -> Result<Self, ApiError> {
        let function = function.into();
        if function.trim().is_empty() {
            return Err(ApiError::InvalidParameter {
                message: "function name must not be empty".to_string(),
            });
        }
        Ok(Self {
            function,
            body: RpcBody::Empty,
        })
    }

    /// Replaces the body with a structured payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.body = RpcBody::Payload(payload);
        self
    }

    /// Replaces the body with a binary attachment.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.body = RpcBody::Attachment(attachment);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn body(&self) -> &RpcBody {
        &self.body
    }

    /// Splits the request into its function name and body.
    pub fn into_parts(self) -> (String, RpcBody) {
        (self.function, self.body)
    }

    /// Returns the JSON envelope, or `None` for attachment requests.
    pub fn envelope(&self) -> Option<Envelope<'_>> {
        match &self.body {
            RpcBody::Empty => Some(Envelope {
                function: &self.function,
                data: None,
            }),
            RpcBody::Payload(value) => Some(Envelope {
                function: &self.function,
                data: Some(value),
            }),
            RpcBody::Attachment(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Successful result of a call, decoded according to the response content type.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    /// The `data` field of a JSON response (or `{}` for 204).
    Json(Value),
    /// Body of a response with any non-JSON, non-binary content type.
    Text(String),
    /// Body of an `application/octet-stream` response, unmodified.
    Binary(Vec<u8>),
}

impl RpcOutcome {
    /// The result of a `204 No Content` response.
    pub fn empty() -> Self {
        Self::Json(Value::Object(serde_json::Map::new()))
    }

    /// Returns the JSON value if this is a JSON outcome.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text if this is a text outcome.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the bytes if this is a binary outcome.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Aggregate result of a health probe. Never an error; failure is a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub success: bool,
    pub data: Option<RpcOutcome>,
    pub message: Option<String>,
}

impl ProbeReport {
    pub fn succeeded(data: RpcOutcome) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Privilege levels
// ---------------------------------------------------------------------------

/// Privilege level requested from the login functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinimumPrivilegeLevel {
    NotAuthenticated,
    Client,
    Administrator,
    InitialAdmin,
    #[serde(rename = "APIToken")]
    ApiToken,
}

impl MinimumPrivilegeLevel {
    /// Wire name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NotAuthenticated",
            Self::Client => "Client",
            Self::Administrator => "Administrator",
            Self::InitialAdmin => "InitialAdmin",
            Self::ApiToken => "APIToken",
        }
    }
}

impl std::fmt::Display for MinimumPrivilegeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MinimumPrivilegeLevel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::NotAuthenticated,
            Self::Client,
            Self::Administrator,
            Self::InitialAdmin,
            Self::ApiToken,
        ]
        .into_iter()
        .find(|level| level.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| ApiError::InvalidParameter {
            message: format!("unknown privilege level '{s}'"),
        })
    }
}

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

/// The pinned certificate of one endpoint.
///
/// Created once per endpoint by the trust store and never mutated afterwards.
/// Deleting the cache file externally forces a fresh fetch on the next
/// establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    endpoint: Endpoint,
    der: Vec<u8>,
    pem: String,
    cache_file: PathBuf,
}

impl TrustAnchor {
    pub fn new(endpoint: Endpoint, der: Vec<u8>, pem: String, cache_file: PathBuf) -> Self {
        Self {
            endpoint,
            der,
            pem,
            cache_file,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// DER-encoded certificate bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// PEM text exactly as stored in the cache file.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_without_payload_has_only_function() {
        let request = RpcRequest::new("QueryServerState").unwrap();
        let json = serde_json::to_value(request.envelope().unwrap()).unwrap();
        assert_eq!(json, json!({"function": "QueryServerState"}));
    }

    #[test]
    fn envelope_with_payload_carries_data() {
        let request = RpcRequest::new("HealthCheck")
            .unwrap()
            .with_payload(json!({"ClientCustomData": ""}));
        let json = serde_json::to_value(request.envelope().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"function": "HealthCheck", "data": {"ClientCustomData": ""}})
        );
    }

    #[test]
    fn attachment_request_has_no_envelope() {
        let request = RpcRequest::new("UploadSaveGame")
            .unwrap()
            .with_payload(json!({"SaveName": "a"}))
            .with_attachment(Attachment {
                field_name: "saveGameFile".to_string(),
                file_name: "a.sav".to_string(),
                bytes: vec![1, 2, 3],
                content_type: None,
            });
        assert!(request.envelope().is_none());
        assert!(matches!(request.body(), RpcBody::Attachment(_)));
    }

    #[test]
    fn empty_function_name_is_rejected() {
        assert!(RpcRequest::new("").is_err());
    }

    #[test]
    fn empty_outcome_is_empty_object() {
        assert_eq!(RpcOutcome::empty().as_json(), Some(&json!({})));
    }

    #[test]
    fn privilege_level_round_trips_wire_names() {
        assert_eq!(
            serde_json::to_value(MinimumPrivilegeLevel::ApiToken).unwrap(),
            json!("APIToken")
        );
        assert_eq!(
            "administrator".parse::<MinimumPrivilegeLevel>().unwrap(),
            MinimumPrivilegeLevel::Administrator
        );
        assert!("root".parse::<MinimumPrivilegeLevel>().is_err());
    }
}
