//! Bounded-retry liveness probing.

use serde_json::json;
use tracing::{debug, warn};

use crate::{AuthSession, BackoffPolicy, ProbeReport, RemoteInvoker, RpcRequest};

/// Remote function called by the probe.
pub const HEALTH_CHECK_FUNCTION: &str = "HealthCheck";

/// Number of attempts made when the caller does not say otherwise.
pub const DEFAULT_RETRIES: u32 = 3;

/// Calls `HealthCheck` until one attempt succeeds or the attempts run out.
///
/// Attempts are strictly sequential; attempt `i` runs under
/// [`BackoffPolicy::deadline`]`(i)`. Intermediate failures are swallowed and
/// only the last one is reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryingProbe {
    policy: BackoffPolicy,
}

impl RetryingProbe {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    /// Probes the server. Never fails; failure is reported in the result.
    ///
    /// The session token is snapshotted afresh for every attempt.
    pub async fn probe<I>(
        &self,
        invoker: &I,
        session: &AuthSession,
        custom_data: &str,
        retries: u32,
    ) -> ProbeReport
    where
        I: RemoteInvoker + ?Sized,
    {
        let mut last_error = None;

        for (attempt, deadline) in self.policy.deadlines(retries).enumerate() {
            let request = match RpcRequest::new(HEALTH_CHECK_FUNCTION) {
                Ok(request) => request.with_payload(json!({ "ClientCustomData": custom_data })),
                Err(err) => return ProbeReport::failed(err.message()),
            };
            let token = session.current();

            debug!(
                attempt,
                deadline_ms = deadline.as_millis() as u64,
                "health check attempt"
            );
            match invoker.invoke(request, token.as_ref(), deadline).await {
                Ok(data) => return ProbeReport::succeeded(data),
                Err(err) => {
                    warn!(attempt, code = %err.code(), error = %err, "health check attempt failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => ProbeReport::failed(format!(
                "Health check failed after {retries} attempts: {}",
                err.message()
            )),
            None => ProbeReport::failed("Health check failed"),
        }
    }
}
