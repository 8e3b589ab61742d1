//! [`ServerClient`]: the entry point wrapper calls go through.
//!
//! Owns the session and an invoker. Every call snapshots the session token
//! immediately before dispatch and hands it to the invoker explicitly.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::{
    ApiError, AuthSession, BearerToken, ClientOptions, MinimumPrivilegeLevel, ProbeReport,
    RemoteInvoker, RetryingProbe, RpcOutcome, RpcRequest,
};

/// Field of a login result holding the issued token.
const TOKEN_FIELD: &str = "authenticationToken";

/// Client for one remote server.
///
/// `Send + Sync`; concurrent calls through a shared reference are independent
/// except for the session token they observe.
pub struct ServerClient {
    invoker: Arc<dyn RemoteInvoker>,
    session: AuthSession,
    options: ClientOptions,
}

impl ServerClient {
    pub fn new(invoker: Arc<dyn RemoteInvoker>, options: ClientOptions) -> Self {
        Self {
            invoker,
            session: AuthSession::new(),
            options,
        }
    }

    /// Starts the session with a pre-issued token.
    pub fn with_token(mut self, token: BearerToken) -> Self {
        self.session = AuthSession::with_token(token);
        self
    }

    /// Installs a pre-issued `token` and confirms the server accepts it.
    ///
    /// # Errors
    ///
    /// Whatever `VerifyAuthenticationToken` fails with, typically an
    /// [`ApiError::Application`] for a revoked or malformed token.
    pub async fn with_verified_token(self, token: BearerToken) -> Result<Self, ApiError> {
        let client = self.with_token(token);
        client.verify_authentication_token().await?;
        Ok(client)
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Calls `function` with an optional payload under the configured timeout.
    pub async fn invoke(
        &self,
        function: &str,
        payload: Option<Value>,
    ) -> Result<RpcOutcome, ApiError> {
        let mut request = RpcRequest::new(function)?;
        if let Some(payload) = payload {
            request = request.with_payload(payload);
        }
        self.invoke_request(request).await
    }

    /// Dispatches a prepared request (e.g. one carrying an attachment).
    pub async fn invoke_request(&self, request: RpcRequest) -> Result<RpcOutcome, ApiError> {
        let token = self.session.current();
        self.invoker
            .invoke(request, token.as_ref(), self.options.timeout())
            .await
    }

    /// Probes the server with `HealthCheck`, retrying up to `retries` times.
    pub async fn health_check(&self, custom_data: &str, retries: u32) -> ProbeReport {
        RetryingProbe::new(self.options.health_check_backoff())
            .probe(self.invoker.as_ref(), &self.session, custom_data, retries)
            .await
    }

    /// Logs in without a password and stores the issued token.
    #[instrument(skip(self))]
    pub async fn passwordless_login(&self, level: MinimumPrivilegeLevel) -> Result<(), ApiError> {
        let result = self
            .invoke(
                "PasswordlessLogin",
                Some(json!({ "MinimumPrivilegeLevel": level })),
            )
            .await?;
        self.store_token(result)
    }

    /// Logs in with a password and stores the issued token.
    #[instrument(skip(self, password))]
    pub async fn password_login(
        &self,
        level: MinimumPrivilegeLevel,
        password: &str,
    ) -> Result<(), ApiError> {
        let result = self
            .invoke(
                "PasswordLogin",
                Some(json!({ "MinimumPrivilegeLevel": level, "Password": password })),
            )
            .await?;
        self.store_token(result)
    }

    /// Checks that the current token is accepted by the server.
    pub async fn verify_authentication_token(&self) -> Result<(), ApiError> {
        self.invoke("VerifyAuthenticationToken", None).await.map(|_| ())
    }

    fn store_token(&self, result: RpcOutcome) -> Result<(), ApiError> {
        let token = result
            .as_json()
            .and_then(|data| data.get(TOKEN_FIELD))
            .and_then(Value::as_str)
            .and_then(BearerToken::new)
            .ok_or_else(|| ApiError::Decode {
                message: format!("login result carried no '{TOKEN_FIELD}'"),
            })?;
        self.session.set_from_login(token);
        info!("login succeeded; session token replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{oneshot, Notify};

    use super::*;

    /// Records each call and answers from a queue of canned results.
    #[derive(Default)]
    struct ScriptedInvoker {
        responses: Mutex<Vec<Result<RpcOutcome, ApiError>>>,
        seen: Mutex<Vec<(String, Option<Value>, Option<String>, Duration)>>,
    }

    impl ScriptedInvoker {
        fn answering(responses: Vec<Result<RpcOutcome, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl RemoteInvoker for ScriptedInvoker {
        async fn invoke(
            &self,
            request: RpcRequest,
            auth: Option<&BearerToken>,
            timeout: Duration,
        ) -> Result<RpcOutcome, ApiError> {
            let data = request.envelope().and_then(|e| e.data.cloned());
            self.seen.lock().unwrap().push((
                request.function().to_string(),
                data,
                auth.map(|t| t.expose().to_string()),
                timeout,
            ));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(RpcOutcome::empty()))
        }
    }

    fn client(invoker: Arc<ScriptedInvoker>) -> ServerClient {
        ServerClient::new(invoker, ClientOptions::default())
    }

    #[tokio::test]
    async fn invoke_uses_configured_timeout_and_payload() {
        let invoker = ScriptedInvoker::answering(vec![]);
        let client = ServerClient::new(
            invoker.clone(),
            ClientOptions {
                timeout_ms: 1234,
                ..ClientOptions::default()
            },
        );

        client
            .invoke("SaveGame", Some(json!({"SaveName": "a"})))
            .await
            .unwrap();

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].0, "SaveGame");
        assert_eq!(seen[0].1, Some(json!({"SaveName": "a"})));
        assert_eq!(seen[0].2, None);
        assert_eq!(seen[0].3, Duration::from_millis(1234));
    }

    #[tokio::test]
    async fn login_token_is_sent_on_subsequent_calls() {
        let invoker = ScriptedInvoker::answering(vec![Ok(RpcOutcome::Json(
            json!({"authenticationToken": "abc"}),
        ))]);
        let client = client(invoker.clone());

        client
            .passwordless_login(MinimumPrivilegeLevel::Client)
            .await
            .unwrap();
        client.invoke("QueryServerState", None).await.unwrap();

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].0, "PasswordlessLogin");
        assert_eq!(seen[0].1, Some(json!({"MinimumPrivilegeLevel": "Client"})));
        assert_eq!(seen[0].2, None);
        assert_eq!(seen[1].2.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn password_login_overwrites_previous_token() {
        let invoker = ScriptedInvoker::answering(vec![Ok(RpcOutcome::Json(
            json!({"authenticationToken": "admin-token"}),
        ))]);
        let client = client(invoker.clone()).with_token(BearerToken::new("old").unwrap());

        client
            .password_login(MinimumPrivilegeLevel::Administrator, "hunter2")
            .await
            .unwrap();

        assert_eq!(
            client.session().current(),
            BearerToken::new("admin-token")
        );
        let seen = invoker.seen.lock().unwrap();
        assert_eq!(
            seen[0].1,
            Some(json!({"MinimumPrivilegeLevel": "Administrator", "Password": "hunter2"}))
        );
        assert_eq!(seen[0].2.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn pre_issued_token_is_verified_with_the_server() {
        let invoker = ScriptedInvoker::answering(vec![]);

        let client = client(invoker.clone())
            .with_verified_token(BearerToken::new("api-token").unwrap())
            .await
            .unwrap();

        assert_eq!(client.session().current(), BearerToken::new("api-token"));
        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].0, "VerifyAuthenticationToken");
        assert_eq!(seen[0].1, None);
        assert_eq!(seen[0].2.as_deref(), Some("api-token"));
    }

    #[tokio::test]
    async fn rejected_pre_issued_token_is_an_error() {
        let invoker = ScriptedInvoker::answering(vec![Err(ApiError::application(
            "invalid_token",
            Some("Token is not valid".to_string()),
        ))]);

        let Err(err) = client(invoker)
            .with_verified_token(BearerToken::new("revoked").unwrap())
            .await
        else {
            panic!("revoked token was accepted");
        };

        assert_eq!(err.code(), "invalid_token");
    }

    #[tokio::test]
    async fn login_without_token_leaves_session_untouched() {
        let invoker = ScriptedInvoker::answering(vec![Ok(RpcOutcome::Json(json!({})))]);
        let client = client(invoker).with_token(BearerToken::new("keep").unwrap());

        let err = client
            .passwordless_login(MinimumPrivilegeLevel::Client)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "DECODE_ERROR");
        assert_eq!(client.session().current(), BearerToken::new("keep"));
    }

    #[tokio::test]
    async fn failed_login_propagates_error_unchanged() {
        let failure = ApiError::application("wrong_password", Some("nope".to_string()));
        let invoker = ScriptedInvoker::answering(vec![Err(failure.clone())]);
        let client = client(invoker);

        let err = client
            .password_login(MinimumPrivilegeLevel::Client, "bad")
            .await
            .unwrap_err();

        assert_eq!(err, failure);
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn empty_function_name_is_rejected_before_dispatch() {
        let invoker = ScriptedInvoker::answering(vec![]);
        let client = client(invoker.clone());

        let err = client.invoke("", None).await.unwrap_err();

        assert_eq!(err.code(), "INVALID_PARAMETER");
        assert!(invoker.seen.lock().unwrap().is_empty());
    }

    /// Holds the first call open until released, recording the token it saw.
    struct GatedInvoker {
        started: Notify,
        release: Mutex<Option<oneshot::Receiver<()>>>,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl RemoteInvoker for GatedInvoker {
        async fn invoke(
            &self,
            request: RpcRequest,
            auth: Option<&BearerToken>,
            _timeout: Duration,
        ) -> Result<RpcOutcome, ApiError> {
            self.seen.lock().unwrap().push((
                request.function().to_string(),
                auth.map(|t| t.expose().to_string()),
            ));
            let gate = self.release.lock().unwrap().take();
            if let Some(gate) = gate {
                self.started.notify_one();
                let _ = gate.await;
            }
            Ok(RpcOutcome::empty())
        }
    }

    #[tokio::test]
    async fn in_flight_call_keeps_its_token_snapshot() {
        let (release, gate) = oneshot::channel();
        let invoker = Arc::new(GatedInvoker {
            started: Notify::new(),
            release: Mutex::new(Some(gate)),
            seen: Mutex::default(),
        });
        let client = Arc::new(ServerClient::new(invoker.clone(), ClientOptions::default()));

        let in_flight = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.invoke("QueryServerState", None).await }
        });
        invoker.started.notified().await;

        client
            .session()
            .set_from_login(BearerToken::new("fresh").unwrap());
        release.send(()).unwrap();
        in_flight.await.unwrap().unwrap();
        client.invoke("GetServerOptions", None).await.unwrap();

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0], ("QueryServerState".to_string(), None));
        assert_eq!(
            seen[1],
            ("GetServerOptions".to_string(), Some("fresh".to_string()))
        );
    }

    #[tokio::test]
    async fn health_check_uses_configured_base_timeout() {
        let invoker = ScriptedInvoker::answering(vec![
            Err(ApiError::Network {
                message: "refused".to_string(),
            }),
            Ok(RpcOutcome::Json(json!({"health": "healthy"}))),
        ]);
        let client = ServerClient::new(
            invoker.clone(),
            ClientOptions {
                health_check_timeout_ms: 200,
                ..ClientOptions::default()
            },
        );

        let report = client.health_check("", 3).await;

        assert!(report.success);
        let deadlines: Vec<_> = invoker.seen.lock().unwrap().iter().map(|s| s.3).collect();
        assert_eq!(
            deadlines,
            vec![Duration::from_millis(200), Duration::from_millis(1200)]
        );
    }
}
