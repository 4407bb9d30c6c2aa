use std::time::Duration;

use crate::config::RetryConfig;

/// Why a request went unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response within the interest lifetime.
    Timeout,
    /// The network reported that nobody has the content.
    NotFound,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up on this request.
    NoRetry,
    /// Re-express after the given delay (zero = now).
    RetryAfter(Duration),
}

/// Exponential backoff with an optional attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first); `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if kind == ErrorKind::NotFound {
            return RetryDecision::NoRetry;
        }
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return RetryDecision::NoRetry;
            }
        }
        // base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_never_retried() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::NotFound), RetryDecision::NoRetry);
    }

    #[test]
    fn default_retries_forever_without_delay() {
        let p = RetryPolicy::default();
        for attempt in [1, 2, 100, u32::MAX] {
            assert_eq!(
                p.decide(attempt, ErrorKind::Timeout),
                RetryDecision::RetryAfter(Duration::ZERO)
            );
        }
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            max_attempts: None,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(
            p.decide(1, ErrorKind::Timeout),
            RetryDecision::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            p.decide(3, ErrorKind::Timeout),
            RetryDecision::RetryAfter(Duration::from_millis(400))
        );
        assert_eq!(
            p.decide(30, ErrorKind::Timeout),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy {
            max_attempts: Some(3),
            ..RetryPolicy::default()
        };
        assert!(matches!(p.decide(1, ErrorKind::Timeout), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, ErrorKind::Timeout), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Timeout), RetryDecision::NoRetry);
    }
}
