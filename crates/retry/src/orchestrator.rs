use std::{fmt::Display, future::Future};

use tracing::{info, warn};

use fedlink_common::now_millis;

use crate::{
    backoff::BackoffPolicy,
    ledger::{LedgerKeying, LedgerStatus, RetryLedger, RetryOperation, RetryStatus},
};

/// Attempt and backoff limits for [`RetryOrchestrator::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Generic bounded-retry executor with an observable ledger.
///
/// Invocations run independently; the backoff sleep of one never blocks
/// another. The ledger lock is synchronous and is never held across an
/// `.await` point.
pub struct RetryOrchestrator {
    policy: RetryPolicy,
    ledger: RetryLedger,
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_keying(policy, LedgerKeying::default())
    }

    pub fn with_keying(policy: RetryPolicy, keying: LedgerKeying) -> Self {
        Self {
            policy,
            ledger: RetryLedger::new(keying),
        }
    }

    /// Run `operation` up to `max_attempts` times.
    ///
    /// Returns the first success; on exhaustion the last error propagates
    /// unchanged and a terminal `Failed` record stays in the ledger until
    /// [`clear_failed`](Self::clear_failed) is called.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation_id: &str,
        context: serde_json::Value,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let key = self.ledger.key_for(operation_id);
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation_id, attempt, "operation succeeded after retry");
                    }
                    self.ledger.discard(&key);
                    return Ok(value);
                },
                Err(err) if attempt == max_attempts => {
                    warn!(
                        operation_id,
                        attempts = attempt,
                        error = %err,
                        "operation failed, retries exhausted"
                    );
                    self.ledger.record(
                        &key,
                        RetryOperation {
                            operation_id: operation_id.to_string(),
                            attempts: attempt,
                            status: RetryStatus::Failed,
                            last_error: err.to_string(),
                            next_retry_at: None,
                            context: context.clone(),
                        },
                    );
                    return Err(err);
                },
                Err(err) => {
                    let wait = self.policy.backoff.delay_after(attempt);
                    warn!(
                        operation_id,
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "operation failed, backing off before retry"
                    );
                    self.ledger.record(
                        &key,
                        RetryOperation {
                            operation_id: operation_id.to_string(),
                            attempts: attempt,
                            status: RetryStatus::Retrying,
                            last_error: err.to_string(),
                            next_retry_at: Some(now_millis() + wait.as_millis() as i64),
                            context: context.clone(),
                        },
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }

        unreachable!("loop returns on the final attempt")
    }

    // ── Administrative surface (read-only with respect to in-flight work) ──

    pub fn status(&self) -> LedgerStatus {
        self.ledger.status()
    }

    pub fn failed_operations(&self) -> Vec<RetryOperation> {
        self.ledger.failed_operations()
    }

    pub fn retrying_operations(&self) -> Vec<RetryOperation> {
        self.ledger.retrying_operations()
    }

    pub fn clear_failed(&self) -> usize {
        self.ledger.clear_failed()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: BackoffPolicy {
                base_delay_ms: 10,
                max_delay_ms: 40,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_leaves_no_trace() {
        let retry = RetryOrchestrator::new(quick_policy());
        let result: Result<i32, String> = retry
            .execute("noop", serde_json::Value::Null, || async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert!(retry.status().operations.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_failures_clears_ledger_entry() {
        let retry = RetryOrchestrator::new(quick_policy());
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = retry
            .execute("flaky", serde_json::json!({"target": "registry"}), || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(format!("transient failure {attempt}"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(
            retry.status().operations.is_empty(),
            "successful invocations must be removed, not retained"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_last_error_and_records_failure() {
        let retry = RetryOrchestrator::new(quick_policy());
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry
            .execute("doomed", serde_json::Value::Null, || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("error {attempt}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "error 3");
        let failed = retry.failed_operations();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].operation_id, "doomed");
        assert_eq!(failed[0].attempts, 3);
        assert_eq!(failed[0].status, RetryStatus::Failed);
        assert_eq!(failed[0].last_error, "error 3");
        assert!(failed[0].next_retry_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_failed_reports_count() {
        let retry = RetryOrchestrator::new(quick_policy());
        for id in ["a", "b"] {
            let _: Result<(), &str> = retry
                .execute(id, serde_json::Value::Null, || async { Err("nope") })
                .await;
        }
        assert_eq!(retry.failed_operations().len(), 2);
        assert_eq!(retry.clear_failed(), 2);
        assert!(retry.failed_operations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_invocations_track_independently() {
        let retry = RetryOrchestrator::new(quick_policy());
        for _ in 0..2 {
            let _: Result<(), &str> = retry
                .execute("same-op", serde_json::Value::Null, || async { Err("down") })
                .await;
        }
        // Default keying: both exhausted invocations stay visible.
        assert_eq!(retry.failed_operations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn by_operation_id_keying_dedupes() {
        let retry =
            RetryOrchestrator::with_keying(quick_policy(), LedgerKeying::ByOperationId);
        for _ in 0..2 {
            let _: Result<(), &str> = retry
                .execute("same-op", serde_json::Value::Null, || async { Err("down") })
                .await;
        }
        assert_eq!(retry.failed_operations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_suspension_does_not_block_other_invocations() {
        use std::sync::Arc;

        let retry = Arc::new(RetryOrchestrator::new(RetryPolicy {
            max_attempts: 2,
            backoff: BackoffPolicy {
                base_delay_ms: 60_000,
                max_delay_ms: 60_000,
            },
        }));

        // First invocation fails once and parks in a long backoff sleep.
        let slow = {
            let retry = Arc::clone(&retry);
            tokio::spawn(async move {
                let calls = AtomicU32::new(0);
                let _: Result<(), &str> = retry
                    .execute("slow", serde_json::Value::Null, || {
                        let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
                        async move { if first { Err("transient") } else { Ok(()) } }
                    })
                    .await;
            })
        };

        // Let the first invocation reach its backoff sleep.
        tokio::task::yield_now().await;
        assert_eq!(retry.retrying_operations().len(), 1);

        // An unrelated invocation completes while the other is suspended.
        let fast: Result<i32, &str> = retry
            .execute("fast", serde_json::Value::Null, || async { Ok(1) })
            .await;
        assert_eq!(fast.unwrap(), 1);

        slow.await.unwrap();
        assert!(retry.status().operations.is_empty());
    }
}
