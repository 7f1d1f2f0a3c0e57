//! The resilience envelope.
//!
//! Every outbound call (database, cache, external HTTP API) runs through
//! `Envelope::execute`, which applies the circuit check, the per-attempt
//! timeout, and retry with backoff, then returns the value or a
//! `FailureKind`.
//!
//! # Data Flow
//! ```text
//! execute(identity, policy, operation)
//!     → registry.rs   (find circuit, admit or reject)
//!     → timeouts.rs   (run attempt under deadline / cancellation)
//!     → retries.rs    (classify failure)
//!     → backoff.rs    (delay before next attempt)
//!     → registry.rs   (record outcome, maybe trip the circuit)
//! ```

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{CircuitSnapshot, CircuitStatus};
use crate::resilience::error::FailureKind;
use crate::resilience::policy::CallPolicy;
use crate::resilience::registry::CircuitRegistry;
use crate::resilience::retries::Retryable;
use crate::resilience::timeouts::{pause, run_attempt, AttemptResult, AttemptStatus, CallAttempt};

/// Execution wrapper shared by all dependency call sites of a service.
#[derive(Debug, Clone)]
pub struct Envelope {
    registry: Arc<CircuitRegistry>,
}

impl Envelope {
    pub fn new(registry: Arc<CircuitRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    /// Read-only circuit snapshot for `identity`.
    pub fn status(&self, identity: &str) -> Option<CircuitSnapshot> {
        self.registry.status(identity)
    }

    /// Run `operation` against the circuit `identity` under `policy`.
    ///
    /// The operation may be invoked up to `policy.max_attempts()` times and
    /// must be safe to repeat.
    pub async fn execute<T, E, F, Fut>(
        &self,
        identity: &str,
        policy: &CallPolicy,
        operation: F,
    ) -> Result<T, FailureKind<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        self.execute_with_cancel(identity, policy, &CancellationToken::new(), operation)
            .await
    }

    /// Like `execute`, aborting with `FailureKind::Cancelled` as soon as
    /// `cancel` fires, whether an attempt or a backoff sleep is pending.
    pub async fn execute_with_cancel<T, E, F, Fut>(
        &self,
        identity: &str,
        policy: &CallPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, FailureKind<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let result = self.run(identity, policy, cancel, &mut operation).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(failure) => failure.label(),
        };
        metrics::record_call(identity, outcome);
        result
    }

    async fn run<T, E, F, Fut>(
        &self,
        identity: &str,
        policy: &CallPolicy,
        cancel: &CancellationToken,
        operation: &mut F,
    ) -> Result<T, FailureKind<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        if cancel.is_cancelled() {
            return Err(FailureKind::Cancelled { identity: identity.to_string() });
        }

        let circuit = self.registry.circuit(identity);
        let Some(mut permit) = circuit.try_acquire(policy) else {
            return Err(FailureKind::CircuitOpen { identity: identity.to_string() });
        };

        let mut attempt = 1;
        loop {
            let mut record = CallAttempt::start(attempt);
            metrics::record_attempt(identity);

            let last_error = match run_attempt(operation(), policy.timeout(), cancel).await {
                AttemptResult::Completed(Ok(value)) => {
                    permit.succeed();
                    return Ok(value);
                }
                AttemptResult::Cancelled => {
                    return Err(FailureKind::Cancelled { identity: identity.to_string() });
                }
                AttemptResult::Completed(Err(source)) if !source.is_retryable() => {
                    return Err(FailureKind::NonRetryable {
                        identity: identity.to_string(),
                        source,
                    });
                }
                AttemptResult::Completed(Err(source)) => {
                    record.status = AttemptStatus::Failure;
                    Some(source)
                }
                AttemptResult::TimedOut => {
                    record.status = AttemptStatus::Timeout;
                    None
                }
            };

            tracing::debug!(
                circuit = %identity,
                attempt = record.attempt_number,
                status = ?record.status,
                elapsed_ms = record.elapsed().as_millis() as u64,
                probe = permit.is_probe(),
                "Attempt failed"
            );

            let status = permit.fail();
            if permit.is_probe() {
                if status == CircuitStatus::Closed {
                    // A sibling probe closed the circuit while this one ran.
                    return Err(final_failure(identity, policy, attempt, last_error));
                }
                return Err(FailureKind::CircuitOpen { identity: identity.to_string() });
            }

            if status == CircuitStatus::Closed && attempt <= policy.max_retries() {
                let delay = calculate_backoff(policy, attempt);
                tracing::debug!(circuit = %identity, attempt, delay = ?delay, "Retrying after backoff");
                if !pause(delay, cancel).await {
                    return Err(FailureKind::Cancelled { identity: identity.to_string() });
                }
                attempt += 1;
                continue;
            }

            permit.exhaust(policy);
            return Err(final_failure(identity, policy, attempt, last_error));
        }
    }
}

/// `DependencyFailure` carrying the last error, or `Timeout` when the last
/// attempt timed out.
fn final_failure<E>(
    identity: &str,
    policy: &CallPolicy,
    attempts: u32,
    last_error: Option<E>,
) -> FailureKind<E> {
    match last_error {
        Some(source) => FailureKind::DependencyFailure {
            identity: identity.to_string(),
            attempts,
            source,
        },
        None => FailureKind::Timeout {
            identity: identity.to_string(),
            timeout: policy.timeout(),
            attempts,
        },
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(Arc::new(CircuitRegistry::default()))
    }
}
