//! Retry with exponential backoff for the language-model boundary
//!
//! Retrying is a small state machine: `Attempting(n)` runs the operation,
//! a retryable failure moves to `Backoff { delay }`, and a spent budget or a
//! non-retryable failure ends in `Exhausted`. Whether and how long to wait is
//! decided by the pure [`decide`] function, so the policy is testable without
//! sleeping; the driver takes its clock and randomness from the caller.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LlmError;

/// Backoff parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Cap on the exponential delay (before jitter)
    pub max_delay_ms: u64,
    /// Maximum jitter as a fraction of the delay
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// `min(2^attempt * base, max)` without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again
    Retry(Duration),
    /// Give up and surface the error
    Fail,
}

/// Decide whether attempt number `attempt` (0-based) should be retried
///
/// `jitter_unit` is a uniform sample from `[0, 1)`; the added jitter is
/// `delay * policy.jitter * jitter_unit`. A provider retry-after hint
/// replaces the computed delay entirely.
pub fn decide(policy: &RetryPolicy, error: &LlmError, attempt: u32, jitter_unit: f64) -> RetryDecision {
    if !error.is_retryable() || attempt.saturating_add(1) >= policy.max_attempts {
        return RetryDecision::Fail;
    }
    if let LlmError::RateLimited {
        retry_after: Some(wait),
    } = error
    {
        return RetryDecision::Retry(*wait);
    }
    let delay = policy.backoff(attempt);
    let jitter = delay.mul_f64(policy.jitter.max(0.0) * jitter_unit.clamp(0.0, 1.0));
    RetryDecision::Retry(delay + jitter)
}

/// States of the retry driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Running attempt `n` (0-based)
    Attempting(u32),
    /// Waiting before the attempt after `attempt`
    Backoff {
        /// The attempt that failed
        attempt: u32,
        /// How long to wait
        delay: Duration,
    },
    /// No further attempts will be made
    Exhausted,
}

/// Something that can wait
pub trait Sleeper {
    /// Block for `duration`
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A uniform sample from `[0, 1)` drawn from the process's hash seed
pub fn random_unit() -> f64 {
    let mut hasher = RandomState::new().build_hasher();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    hasher.write_u128(nanos);
    (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64
}

/// Drives an operation through the retry state machine
pub struct Retrier<'a> {
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
    jitter: Box<dyn FnMut() -> f64 + 'a>,
}

impl<'a> Retrier<'a> {
    /// A retrier with random jitter
    pub fn new(policy: RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Retrier {
            policy,
            sleeper,
            jitter: Box::new(random_unit),
        }
    }

    /// Replace the jitter source
    pub fn with_jitter(mut self, jitter: impl FnMut() -> f64 + 'a) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent
    ///
    /// `op` receives the 0-based attempt number.
    pub fn run<T>(&mut self, mut op: impl FnMut(u32) -> Result<T, LlmError>) -> Result<T, LlmError> {
        let mut state = RetryState::Attempting(0);
        let mut last_error = None;
        loop {
            match state {
                RetryState::Attempting(attempt) => match op(attempt) {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        let unit = (self.jitter)();
                        state = match decide(&self.policy, &err, attempt, unit) {
                            RetryDecision::Retry(delay) => {
                                warn!(
                                    attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %err,
                                    "retrying completion call"
                                );
                                RetryState::Backoff { attempt, delay }
                            }
                            RetryDecision::Fail => RetryState::Exhausted,
                        };
                        last_error = Some(err);
                    }
                },
                RetryState::Backoff { attempt, delay } => {
                    self.sleeper.sleep(delay);
                    state = RetryState::Attempting(attempt + 1);
                }
                RetryState::Exhausted => {
                    return Err(last_error
                        .unwrap_or_else(|| LlmError::Call("retry budget exhausted".to_string())));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    fn call_error() -> LlmError {
        LlmError::Call("503".to_string())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(8_000));
        assert_eq!(policy.backoff(4), Duration::from_millis(10_000));
        assert_eq!(policy.backoff(63), Duration::from_millis(10_000));
        assert_eq!(policy.backoff(200), Duration::from_millis(10_000));
    }

    #[test]
    fn test_decide_adds_bounded_jitter() {
        let policy = RetryPolicy::default();
        assert_eq!(
            decide(&policy, &call_error(), 0, 0.0),
            RetryDecision::Retry(Duration::from_millis(1_000))
        );
        let RetryDecision::Retry(delay) = decide(&policy, &call_error(), 1, 1.0) else {
            panic!("expected a retry");
        };
        assert!(delay > Duration::from_millis(2_599) && delay < Duration::from_millis(2_601));
    }

    #[test]
    fn test_retry_after_takes_precedence() {
        let policy = RetryPolicy::default();
        let err = LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(
            decide(&policy, &err, 0, 0.9),
            RetryDecision::Retry(Duration::from_secs(42))
        );
        let no_hint = LlmError::RateLimited { retry_after: None };
        assert_eq!(
            decide(&policy, &no_hint, 0, 0.0),
            RetryDecision::Retry(Duration::from_millis(1_000))
        );
    }

    #[test]
    fn test_config_error_never_retries() {
        let policy = RetryPolicy::default();
        let err = LlmError::Config("missing credential".to_string());
        assert_eq!(decide(&policy, &err, 0, 0.0), RetryDecision::Fail);
    }

    #[test]
    fn test_budget_exhaustion() {
        let policy = RetryPolicy::default();
        assert!(matches!(decide(&policy, &call_error(), 1, 0.0), RetryDecision::Retry(_)));
        assert_eq!(decide(&policy, &call_error(), 2, 0.0), RetryDecision::Fail);
    }

    #[test]
    fn test_retrier_succeeds_after_failures() {
        let sleeper = RecordingSleeper::default();
        let mut retrier = Retrier::new(RetryPolicy::default(), &sleeper).with_jitter(|| 0.0);
        let result = retrier.run(|attempt| if attempt < 2 { Err(call_error()) } else { Ok(attempt) });
        assert_eq!(result, Ok(2));
        assert_eq!(
            *sleeper.slept.borrow(),
            vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
        );
    }

    #[test]
    fn test_retrier_surfaces_last_error() {
        let sleeper = RecordingSleeper::default();
        let mut retrier = Retrier::new(RetryPolicy::default(), &sleeper).with_jitter(|| 0.5);
        let mut calls = 0;
        let result: Result<(), _> = retrier.run(|attempt| {
            calls += 1;
            Err(LlmError::Call(format!("attempt {}", attempt)))
        });
        assert_eq!(result, Err(LlmError::Call("attempt 2".to_string())));
        assert_eq!(calls, 3);
        assert_eq!(sleeper.slept.borrow().len(), 2);
    }

    #[test]
    fn test_retrier_stops_on_config_error() {
        let sleeper = RecordingSleeper::default();
        let mut retrier = Retrier::new(RetryPolicy::default(), &sleeper);
        let mut calls = 0;
        let result: Result<(), _> = retrier.run(|_| {
            calls += 1;
            Err(LlmError::Config("unknown provider".to_string()))
        });
        assert!(matches!(result, Err(LlmError::Config(_))));
        assert_eq!(calls, 1);
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[test]
    fn test_random_unit_range() {
        for _ in 0..100 {
            let x = random_unit();
            assert!((0.0..1.0).contains(&x));
        }
    }
}
