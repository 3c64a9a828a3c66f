//! Exponential-backoff retry wrapper for spawns.
//!
//! Only transient failures retry; anything else propagates immediately.
//! Delays follow 500 ms → 1000 ms → 2000 ms (multiplier 2, capped at 5 s)
//! with at most three attempts by default. Intermediate errors are
//! observable only through the emitted [`RetryMetrics`].

use chrono::{DateTime, Utc};
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Error fragments that identify a transient failure worth retrying.
pub const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "ECONNREFUSED",
    "spawn failed",
    "agent crashed",
    "connection reset",
    "ETIMEDOUT",
    "process exited",
    "ENOTFOUND",
    "EPIPE",
];

/// True iff the error message matches a transient pattern.
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
}

/// One recorded intermediate failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryError {
    /// The failure text.
    pub message: String,
    /// When the attempt failed.
    pub timestamp: DateTime<Utc>,
}

/// How a wrapped spawn ultimately ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOutcome {
    /// An attempt succeeded.
    Success,
    /// Every attempt failed with a transient error.
    Exhausted,
    /// A non-transient error stopped the attempts early.
    NonTransient,
}

/// Telemetry for one wrapped spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryMetrics {
    /// The task being spawned, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Attempts made (including the successful one, if any).
    pub attempts: u32,
    /// Every intermediate failure, oldest first.
    pub errors: Vec<RetryError>,
    /// Wall-clock duration across all attempts and delays, in ms.
    pub total_duration_ms: u64,
    /// How the wrapper finished.
    pub final_outcome: RetryOutcome,
}

/// Backoff tunables.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts (first try included).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Backoff multiplier.
    pub multiplier: u32,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// The delay applied after a given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        (self.initial_delay * factor).min(self.max_delay)
    }
}

/// Runs `op` with transient-error retries, returning the final result and
/// the metrics record. `op` receives the 1-based attempt number.
pub async fn retry_spawn<T, F, Fut>(
    task_id: Option<String>,
    policy: &RetryPolicy,
    mut op: F,
) -> (ConductorResult<T>, RetryMetrics)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ConductorResult<T>>,
{
    let started = std::time::Instant::now();
    let mut errors = Vec::new();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                let metrics = RetryMetrics {
                    task_id,
                    attempts: attempt,
                    errors,
                    total_duration_ms: started.elapsed().as_millis() as u64,
                    final_outcome: RetryOutcome::Success,
                };
                return (Ok(value), metrics);
            }
            Err(e) => {
                let message = e.to_string();
                let transient = is_transient(&message);
                errors.push(RetryError {
                    message,
                    timestamp: Utc::now(),
                });

                if !transient {
                    warn!(?task_id, attempt, error = %e, "non-transient spawn failure");
                    let metrics = RetryMetrics {
                        task_id,
                        attempts: attempt,
                        errors,
                        total_duration_ms: started.elapsed().as_millis() as u64,
                        final_outcome: RetryOutcome::NonTransient,
                    };
                    return (Err(e), metrics);
                }
                if attempt >= policy.max_attempts {
                    warn!(?task_id, attempt, error = %e, "spawn retries exhausted");
                    let metrics = RetryMetrics {
                        task_id,
                        attempts: attempt,
                        errors,
                        total_duration_ms: started.elapsed().as_millis() as u64,
                        final_outcome: RetryOutcome::Exhausted,
                    };
                    return (Err(e), metrics);
                }

                let delay = policy.delay_for(attempt);
                debug!(?task_id, attempt, delay_ms = delay.as_millis() as u64, "retrying spawn");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_transient_classification() {
        assert!(is_transient("spawn failed: ECONNREFUSED 127.0.0.1"));
        assert!(is_transient("agent crashed with signal 9"));
        assert!(is_transient("Timed out: command exceeded 300 ms"));
        assert!(is_transient("read ETIMEDOUT"));
        assert!(!is_transient("validation failed: bad plan"));
        assert!(!is_transient("permission denied"));
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        // Capped at 5 s well before overflow.
        assert_eq!(policy.delay_for(6), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let (result, metrics) = retry_spawn(Some("t1".into()), &RetryPolicy::default(), |_| {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conductor_core::ConductorError::Engine(
                        "spawn failed: connection reset".into(),
                    ))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.errors.len(), 2);
        assert_eq!(metrics.final_outcome, RetryOutcome::Success);
        assert_eq!(metrics.task_id.as_deref(), Some("t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_propagates_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let (result, metrics) = retry_spawn(None, &RetryPolicy::default(), |_| {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(conductorerr("gate failed: not ready"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.attempts, 1);
        assert_eq!(metrics.final_outcome, RetryOutcome::NonTransient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let (result, metrics) = retry_spawn(Some("t2".into()), &RetryPolicy::default(), |n| async move {
            Err::<u32, _>(conductorerr(&format!("attempt {n}: agent crashed")))
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("attempt 3"));
        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.errors.len(), 3);
        assert_eq!(metrics.final_outcome, RetryOutcome::Exhausted);
    }

    fn conductorerr(msg: &str) -> ConductorError {
        ConductorError::Engine(msg.to_string())
    }
}
