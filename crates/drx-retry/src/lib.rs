// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-retry
//!
//! Retry policy and transient-error classification.
//!
//! Portal HTTP calls and datastore upserts share one retry discipline: up to
//! three attempts with exponential backoff starting at 500 ms, retrying only
//! failures classified as transient. The classification lives here so the
//! portal adapter and the result DAO cannot drift apart.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Implemented by error types that can distinguish transient failures.
///
/// Transient means: retrying the same operation may plausibly succeed —
/// timeouts, connection resets, 5xx responses, resource exhaustion. A parse
/// failure or a 4xx is not transient.
pub trait Transient {
    /// `true` when the failure is worth retrying.
    fn is_transient(&self) -> bool;

    /// `true` when the failure indicates a dead connection and the caller
    /// should re-create its client before the next attempt.
    fn is_connection_error(&self) -> bool {
        false
    }
}

/// Message-based classification for errors that only surface as text
/// (datastore drivers, subprocess output).
#[must_use]
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("temporarily unavailable")
        || lower.contains("eagain")
        || lower.contains("ewouldblock")
        || lower.contains("connection reset")
        || lower.contains("connection closed")
        || lower.contains("disconnected")
        || lower.contains("timed out")
        || lower.contains("timeout")
}

/// Message-based connection-error detection, mirroring
/// [`Transient::is_connection_error`].
#[must_use]
pub fn is_connection_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection reset")
        || lower.contains("connection closed")
        || lower.contains("disconnected")
        || lower.contains("broken pipe")
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How many attempts to make and how long to wait between them.
///
/// Delay before attempt `k` (1-based retries) is `base · 2^(k-1)`, capped at
/// `max_delay`. The default is the project-wide discipline: three attempts,
/// 0.5 s base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Useful in tests and dry runs.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// The delay to sleep after a failed attempt (0-based `attempt`).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.min(16);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run `operation` under `policy`, retrying transient failures.
///
/// The closure receives the 0-based attempt number; callers that hold a
/// client can use a non-zero attempt as the signal to rebuild it after a
/// connection error.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or immediately for a
/// non-transient failure.
pub async fn run_with<T, E, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_transient() && attempt + 1 < policy.max_attempts;
                if !retryable {
                    return Err(err);
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    target: "drx.retry",
                    op = op_name,
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        message: String,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            is_transient_message(&self.message)
        }

        fn is_connection_error(&self) -> bool {
            is_connection_message(&self.message)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[test]
    fn classification_matches_known_transients() {
        assert!(is_transient_message("Resource temporarily unavailable"));
        assert!(is_transient_message("connection reset by peer"));
        assert!(is_transient_message("request timed out"));
        assert!(!is_transient_message("template not found"));
    }

    #[test]
    fn connection_errors_are_a_subset() {
        assert!(is_connection_message("Connection reset by peer"));
        assert!(!is_connection_message("Resource temporarily unavailable"));
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(10), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_transients() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> =
            run_with(&fast_policy(3), "stub", |_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError {
                            message: "Resource temporarily unavailable".into(),
                        })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = run_with(&fast_policy(3), "stub", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(TestError {
                    message: "template not found".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = run_with(&fast_policy(3), "stub", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(TestError {
                    message: "connection reset".into(),
                })
            }
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempt_number_is_passed_through() {
        let seen = std::sync::Mutex::new(Vec::new());
        let _ = run_with::<(), TestError, _, _>(&fast_policy(3), "stub", |attempt| {
            seen.lock().unwrap().push(attempt);
            async {
                Err(TestError {
                    message: "timeout".into(),
                })
            }
        })
        .await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn policy_serde_roundtrip() {
        let policy = RetryPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        let back: RetryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
