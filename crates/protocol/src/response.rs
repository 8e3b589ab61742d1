//! Status-first, then content-type, decoding of server responses.
//!
//! The transport reads the status line, the `Content-Type` header, and the
//! full body, then hands them to [`decode_response`]. Nothing here touches the
//! network, so every decoding rule is covered by plain unit tests.

use serde_json::Value;

use crate::{ApiError, RpcOutcome};

/// How a 200 response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// `application/json`: an envelope with `data` or `errorCode`/`errorMessage`.
    Json,
    /// `application/octet-stream`: raw bytes.
    Binary,
    /// Anything else, including a missing header.
    Text,
}

impl ResponseKind {
    /// Classifies a `Content-Type` header value.
    ///
    /// Matching ignores case and any parameters, so
    /// `Application/JSON; charset=utf-8` is [`ResponseKind::Json`].
    pub fn classify(content_type: Option<&str>) -> Self {
        let Some(value) = content_type else {
            return Self::Text;
        };
        let essence = value.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("application/json") {
            Self::Json
        } else if essence.eq_ignore_ascii_case("application/octet-stream") {
            Self::Binary
        } else {
            Self::Text
        }
    }
}

/// Whether the transport must read the body for this status.
///
/// A 204 succeeds without looking at the body.
pub fn needs_body(status: u16) -> bool {
    status != 204
}

/// Decodes one response into a result or a typed error.
///
/// - 204 → `{}` regardless of body.
/// - 200 → dispatch on [`ResponseKind::classify`].
/// - anything else → [`ApiError::HttpStatus`] carrying the body text.
pub fn decode_response(
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<RpcOutcome, ApiError> {
    match status {
        204 => Ok(RpcOutcome::empty()),
        200 => decode_success(ResponseKind::classify(content_type), body),
        other => Err(ApiError::http_status(
            other,
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

fn decode_success(kind: ResponseKind, body: &[u8]) -> Result<RpcOutcome, ApiError> {
    match kind {
        ResponseKind::Json => decode_json(body),
        ResponseKind::Binary => Ok(RpcOutcome::Binary(body.to_vec())),
        ResponseKind::Text => Ok(RpcOutcome::Text(
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

fn decode_json(body: &[u8]) -> Result<RpcOutcome, ApiError> {
    let mut parsed: Value = serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        message: format!("invalid JSON body: {e}"),
    })?;

    if let Some(code) = error_code(&parsed) {
        let message = parsed
            .get("errorMessage")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Err(ApiError::application(code, message));
    }

    let data = parsed
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok(RpcOutcome::Json(data))
}

/// Returns the application error code if the envelope carries a non-empty one.
fn error_code(envelope: &Value) -> Option<String> {
    match envelope.get("errorCode")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
