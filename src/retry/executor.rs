//! Retrying executor.
//!
//! Executes one unit of work with bounded retries, consulting the bound
//! circuit breaker before every attempt. The breaker gate never consumes
//! retry budget: a denied call returns immediately so callers can route
//! to fallback resolution.

use crate::breaker::CircuitBreaker;
use crate::error::{DependencyError, ExecuteError};
use crate::observability::metrics;
use crate::retry::backoff::backoff_delay;
use crate::retry::policy::RetryPolicy;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Execute `op` under `policy`, gated by `breaker`.
///
/// Each attempt is bounded by `call_timeout`; a timed-out attempt counts
/// as a retryable timeout failure. One success/failure record lands on
/// the breaker per attempt. Dropping the returned future abandons the
/// loop between suspension points.
pub async fn execute<T, F, Fut>(
    breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    call_timeout: Duration,
    mut op: F,
) -> Result<T, ExecuteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DependencyError>>,
{
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let delay = backoff_delay(attempt, policy);
            tracing::debug!(
                dependency = %breaker.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Backing off before retry"
            );
            sleep(delay).await;
        }

        // Gate after the backoff: the breaker may have opened while waiting.
        if !breaker.allow() {
            return Err(ExecuteError::BreakerOpen(breaker.name().to_string()));
        }

        let outcome = match timeout(call_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(DependencyError::Timeout(call_timeout)),
        };

        match outcome {
            Ok(value) => {
                breaker.record_success();
                metrics::record_call(breaker.name(), "success");
                return Ok(value);
            }
            Err(err) => {
                breaker.record_failure(err.is_timeout());

                if !policy.retryable(err.class()) {
                    tracing::warn!(
                        dependency = %breaker.name(),
                        error = %err,
                        "Non-retryable failure, failing fast"
                    );
                    metrics::record_call(breaker.name(), "non_retryable");
                    return Err(ExecuteError::NonRetryable(err));
                }

                attempt += 1;
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        dependency = %breaker.name(),
                        attempts = attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    metrics::record_call(breaker.name(), "exhausted");
                    return Err(ExecuteError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                tracing::warn!(
                    dependency = %breaker.name(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Attempt failed, will retry"
                );
                metrics::record_retry(breaker.name());
            }
        }
    }
}
