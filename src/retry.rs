//! Bounded retry with randomized backoff around one completion exchange.
//!
//! The unit performs exactly one logical request for a work item, masking
//! transient failures. It never touches the checkpoint store; persisting a
//! success is the caller's job, which keeps this unit reusable in isolation.

use crate::client::CompletionBackend;
use crate::response::ChatResponse;
use crate::types::Message;
use crate::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Attempt budget and timing for one work item.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts. Zero means no attempt is made and the
    /// item fails immediately.
    pub max_attempts: u32,
    /// Upper bound on a single attempt's duration. `Duration::ZERO` means
    /// wait indefinitely. An overrun counts as a failed attempt.
    pub timeout: Duration,
    /// Before each retry (never before the first attempt) the unit sleeps
    /// `uniform(0, 1) * backoff_base`. The randomization spreads retries of
    /// many concurrent units apart instead of hammering the endpoint in
    /// lockstep.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            timeout: Duration::ZERO,
            backoff_base: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Drive one conversation to completion within the policy's budget.
///
/// Retryable errors consume attempts until the budget is exhausted, which
/// yields [`Error::Exhausted`] wrapping the last failure. Non-retryable
/// errors propagate immediately without consuming further attempts.
pub async fn execute<B>(backend: &B, messages: &[Message], policy: &RetryPolicy) -> Result<ChatResponse>
where
    B: CompletionBackend + ?Sized,
{
    if policy.max_attempts == 0 {
        return Err(Error::Exhausted {
            attempts: 0,
            last: Box::new(Error::configuration("attempt budget is zero")),
        });
    }

    let mut last: Option<Error> = None;
    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let jitter: f64 = rand::thread_rng().gen();
            sleep(policy.backoff_base.mul_f64(jitter)).await;
        }

        let outcome = if policy.timeout.is_zero() {
            backend.complete(messages).await
        } else {
            match timeout(policy.timeout, backend.complete(messages)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    after: policy.timeout,
                }),
            }
        };

        match outcome {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() => {
                debug!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "attempt failed"
                );
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    warn!(attempts = policy.max_attempts, "attempt budget exhausted");
    Err(Error::Exhausted {
        attempts: policy.max_attempts,
        last: Box::new(
            last.unwrap_or_else(|| Error::configuration("exhausted without a recorded error")),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Choice, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok_response(text: &str) -> ChatResponse {
        ChatResponse {
            id: Some("chatcmpl-test".into()),
            model: Some("test-model".into()),
            created: None,
            choices: vec![Choice {
                index: 0,
                message: Some(Message::assistant(text)),
                finish_reason: Some("stop".into()),
            }],
            usage: Some(Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            }),
            error: None,
        }
    }

    /// Fails the first `failures` calls, then succeeds. Records when each
    /// attempt arrived.
    struct Flaky {
        calls: AtomicU32,
        attempt_times: std::sync::Mutex<Vec<tokio::time::Instant>>,
        failures: u32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                attempt_times: std::sync::Mutex::new(Vec::new()),
                failures,
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for Flaky {
        async fn complete(&self, _messages: &[Message]) -> Result<ChatResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.attempt_times
                .lock()
                .unwrap()
                .push(tokio::time::Instant::now());
            if call < self.failures {
                Err(Error::invalid_response("transient"))
            } else {
                Ok(ok_response("done"))
            }
        }
    }

    #[tokio::test]
    async fn succeeds_after_two_failures() {
        let backend = Flaky::new(2);
        let policy = RetryPolicy::new(3);
        let resp = execute(&backend, &[Message::user("hi")], &policy)
            .await
            .unwrap();
        assert_eq!(resp.content(), Some("done"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_once_before_each_retry_never_before_the_first() {
        let backend = Flaky::new(2);
        let base = Duration::from_secs(1);
        let policy = RetryPolicy::new(3).with_backoff_base(base);
        let start = tokio::time::Instant::now();
        execute(&backend, &[Message::user("hi")], &policy)
            .await
            .unwrap();

        // With the clock paused, only the backoff sleeps advance time, so
        // the attempt timestamps count the sleeps exactly.
        let attempts = backend.attempt_times.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0], start);
        for pair in attempts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap > Duration::ZERO);
            assert!(gap < base);
        }
    }

    #[tokio::test]
    async fn always_failing_makes_exactly_max_attempts() {
        let backend = Flaky::new(u32::MAX);
        let policy = RetryPolicy::new(4);
        let err = execute(&backend, &[Message::user("hi")], &policy)
            .await
            .unwrap_err();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        match err {
            Error::Exhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, Error::InvalidResponse { .. }));
            }
            other => panic!("expected Exhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn zero_attempts_fails_without_calling_backend() {
        let backend = Flaky::new(0);
        let policy = RetryPolicy::new(0);
        let err = execute(&backend, &[Message::user("hi")], &policy)
            .await
            .unwrap_err();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(err, Error::Exhausted { attempts: 0, .. }));
    }

    struct Slow;

    #[async_trait]
    impl CompletionBackend for Slow {
        async fn complete(&self, _messages: &[Message]) -> Result<ChatResponse> {
            sleep(Duration::from_secs(60)).await;
            Ok(ok_response("too late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failed_attempt() {
        let policy = RetryPolicy::new(2).with_timeout(Duration::from_millis(50));
        let err = execute(&Slow, &[Message::user("hi")], &policy)
            .await
            .unwrap_err();
        match err {
            Error::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, Error::Timeout { .. }));
            }
            other => panic!("expected Exhausted, got {other}"),
        }
    }

    struct Fatal;

    #[async_trait]
    impl CompletionBackend for Fatal {
        async fn complete(&self, _messages: &[Message]) -> Result<ChatResponse> {
            Err(Error::configuration("missing credential"))
        }
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let policy = RetryPolicy::new(5);
        let err = execute(&Fatal, &[Message::user("hi")], &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
