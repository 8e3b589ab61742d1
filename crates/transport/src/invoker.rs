//! reqwest-based implementation of [`RemoteInvoker`].
//!
//! One `POST` to the endpoint's `/api/v1` per call. The whole cycle (connect,
//! send, read body) runs inside a single `tokio::time::timeout`; when it
//! expires the in-flight future is dropped, which cancels the request and
//! releases the timer.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use protocol::{
    decode_response, needs_body, ApiError, Attachment, BearerToken, Envelope, RemoteInvoker,
    RpcBody, RpcOutcome, RpcRequest,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use crate::PinnedTls;

const DEFAULT_ATTACHMENT_TYPE: &str = "application/octet-stream";

/// Sends calls over a client that trusts exactly one pinned certificate.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
    url: String,
    tls: Option<PinnedTls>,
}

impl HttpInvoker {
    /// Builds the invoker for the endpoint `tls` was established for.
    ///
    /// # Errors
    ///
    /// [`ApiError::CertificateRead`] if the pinned certificate is rejected by
    /// the TLS backend.
    pub fn new(tls: &PinnedTls) -> Result<Self, ApiError> {
        let client = tls.client_builder()?.build().map_err(|e| ApiError::CertificateRead {
            path: tls.anchor().cache_file().display().to_string(),
            message: error_chain(&e),
        })?;
        Ok(Self {
            client,
            url: tls.anchor().endpoint().api_url(),
            tls: Some(tls.clone()),
        })
    }

    /// Invoker speaking plain HTTP to `url`, for tests against a local mock.
    #[cfg(test)]
    pub(crate) fn plaintext(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            tls: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn rejections(&self) -> usize {
        self.tls.as_ref().map_or(0, PinnedTls::rejections)
    }

    /// Reports a connection failure as a pin mismatch if the verifier refused
    /// a handshake since `rejections_before`.
    fn classify(&self, err: ApiError, rejections_before: usize) -> ApiError {
        match (err, &self.tls) {
            (ApiError::Network { message }, Some(tls)) if tls.rejections() > rejections_before => {
                ApiError::CertificateMismatch {
                    path: tls.anchor().cache_file().display().to_string(),
                    message,
                }
            }
            (err, _) => err,
        }
    }

    fn build_request(
        &self,
        request: RpcRequest,
        auth: Option<&BearerToken>,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut builder = self.client.post(&self.url);
        if let Some(token) = auth {
            builder = builder.bearer_auth(token.expose());
        }

        let (function, body) = request.into_parts();
        let builder = match body {
            RpcBody::Attachment(attachment) => builder.multipart(attachment_form(attachment)?),
            RpcBody::Payload(data) => builder.json(&Envelope {
                function: &function,
                data: Some(&data),
            }),
            RpcBody::Empty => builder.json(&Envelope {
                function: &function,
                data: None,
            }),
        };
        Ok(builder)
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<RpcOutcome, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        let status = response.status().as_u16();
        if !needs_body(status) {
            return decode_response(status, None, &[]);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        debug!(status, content_type = ?content_type, bytes = body.len(), "response received");
        decode_response(status, content_type.as_deref(), &body)
    }
}

#[async_trait]
impl RemoteInvoker for HttpInvoker {
    async fn invoke(
        &self,
        request: RpcRequest,
        auth: Option<&BearerToken>,
        timeout: Duration,
    ) -> Result<RpcOutcome, ApiError> {
        let span = debug_span!(
            "rpc",
            function = %request.function(),
            request_id = %Uuid::new_v4(),
            timeout_ms = timeout.as_millis() as u64,
            authenticated = auth.is_some(),
        );

        async move {
            let builder = self.build_request(request, auth)?;
            let rejections = self.rejections();
            let result = match tokio::time::timeout(timeout, self.execute(builder, timeout)).await {
                Ok(result) => result.map_err(|err| self.classify(err, rejections)),
                Err(_elapsed) => Err(ApiError::Timeout { timeout }),
            };
            if let Err(err) = &result {
                warn!(code = %err.code(), error = %err, "call failed");
            }
            result
        }
        .instrument(span)
        .await
    }
}

fn attachment_form(attachment: Attachment) -> Result<Form, ApiError> {
    let Attachment {
        field_name,
        file_name,
        bytes,
        content_type,
    } = attachment;
    let mime = content_type.unwrap_or_else(|| DEFAULT_ATTACHMENT_TYPE.to_string());
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(&mime)
        .map_err(|e| ApiError::InvalidParameter {
            message: format!("attachment content type '{mime}': {e}"),
        })?;
    Ok(Form::new().part(field_name, part))
}

/// Maps a reqwest failure onto the taxonomy. Timeouts raised inside reqwest
/// are reported like the outer deadline.
fn transport_error(err: &reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout { timeout }
    } else {
        ApiError::Network {
            message: error_chain(err),
        }
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
