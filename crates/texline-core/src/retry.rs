//! Bounded retry with a fixed delay between attempts

use std::time::Duration;

use crate::shutdown::is_shutdown_requested;

/// How often and how patiently to retry a fallible upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Sleep between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(7),
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `attempt_fn` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempt budget is spent.
    ///
    /// Returns `Ok(T)` on first success, or the final `Err` on exhaustion /
    /// non-retryable error. A requested shutdown stops retrying early.
    pub fn run<T, E: std::fmt::Display>(
        &self,
        label: &str,
        mut attempt_fn: impl FnMut() -> Result<T, E>,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match attempt_fn() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    if is_shutdown_requested() {
                        log::debug!("{label}: shutdown requested, not retrying");
                        return Err(e);
                    }
                    log::warn!(
                        "[Retry {attempt}/{max_attempts}] {label}: {e}. Retrying in {:?}...",
                        self.delay
                    );
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => {
                    if is_retryable(&e) {
                        log::error!("{label}: failed after {max_attempts} attempts: {e}");
                    } else {
                        log::debug!("{label}: not retrying: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FAST: RetryPolicy = RetryPolicy::new(3, Duration::ZERO);

    #[derive(Debug)]
    enum TestError {
        Transient,
        Terminal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn retryable(e: &TestError) -> bool {
        matches!(e, TestError::Transient)
    }

    #[test]
    fn first_success_single_attempt() {
        let calls = Cell::new(0);
        let out: Result<u32, TestError> = FAST.run(
            "ok",
            || {
                calls.set(calls.get() + 1);
                Ok(7)
            },
            retryable,
        );
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn transient_then_success() {
        let calls = Cell::new(0);
        let out = FAST.run(
            "flaky",
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok("done")
                }
            },
            retryable,
        );
        assert_eq!(out.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhaustion_returns_last_error() {
        let calls = Cell::new(0);
        let out: Result<(), TestError> = FAST.run(
            "down",
            || {
                calls.set(calls.get() + 1);
                Err(TestError::Transient)
            },
            retryable,
        );
        assert!(matches!(out, Err(TestError::Transient)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn terminal_error_short_circuits() {
        let calls = Cell::new(0);
        let out: Result<(), TestError> = FAST.run(
            "missing",
            || {
                calls.set(calls.get() + 1);
                Err(TestError::Terminal)
            },
            retryable,
        );
        assert!(matches!(out, Err(TestError::Terminal)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let calls = Cell::new(0);
        let _: Result<(), TestError> = policy.run(
            "zero",
            || {
                calls.set(calls.get() + 1);
                Err(TestError::Transient)
            },
            retryable,
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(7));
    }
}
