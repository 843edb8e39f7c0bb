//! Retry decisions for a single send.

use crate::error::RelayError;
use crate::transport::SendOutcome;
use std::time::Duration;

/// What to do after a send attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// The send was acknowledged.
    Done,
    /// Wait, then attempt again.
    RetryAfter(Duration),
    /// Stop trying; the entry stays undelivered.
    GiveUp(RelayError),
}

/// Bounded retry policy.
///
/// Attempts are numbered from 0; with `max_retries = 3` a send is tried at
/// most four times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    /// Added to the destination's retry-after on flood control.
    pub rate_limit_padding: Duration,
    /// Timeout backoff unit: attempt `n` waits `backoff_base * 2^n`.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_padding: Duration::from_secs(1),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Timeout backoff before attempt `attempt + 1`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }

    /// Decide the next step after attempt `attempt` produced `outcome`.
    pub fn decide(&self, attempt: u32, outcome: &SendOutcome) -> RetryDecision {
        let exhausted = attempt >= self.max_retries;

        match outcome {
            SendOutcome::Delivered => RetryDecision::Done,
            SendOutcome::RateLimited { retry_after } if exhausted => {
                RetryDecision::GiveUp(RelayError::RateLimited {
                    retry_after: *retry_after,
                })
            }
            SendOutcome::RateLimited { retry_after } => {
                RetryDecision::RetryAfter(retry_after.saturating_add(self.rate_limit_padding))
            }
            SendOutcome::TimedOut if exhausted => RetryDecision::GiveUp(RelayError::TimedOut),
            SendOutcome::TimedOut => RetryDecision::RetryAfter(self.backoff_for(attempt)),
            SendOutcome::Failed { cause } => {
                RetryDecision::GiveUp(RelayError::Transport(cause.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_delivered_is_done() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.decide(0, &SendOutcome::Delivered),
            RetryDecision::Done
        ));
        assert!(matches!(
            policy.decide(3, &SendOutcome::Delivered),
            RetryDecision::Done
        ));
    }

    #[test]
    fn test_rate_limited_waits_retry_after_plus_padding() {
        let policy = RetryPolicy::default();
        let outcome = SendOutcome::RateLimited {
            retry_after: secs(17),
        };
        match policy.decide(0, &outcome) {
            RetryDecision::RetryAfter(delay) => assert_eq!(delay, secs(18)),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_timeout_backs_off_exponentially() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..3)
            .map(|attempt| match policy.decide(attempt, &SendOutcome::TimedOut) {
                RetryDecision::RetryAfter(delay) => delay,
                other => panic!("unexpected decision: {:?}", other),
            })
            .collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(4)]);
    }

    #[test]
    fn test_gives_up_when_exhausted() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.decide(3, &SendOutcome::TimedOut),
            RetryDecision::GiveUp(RelayError::TimedOut)
        ));
        assert!(matches!(
            policy.decide(
                3,
                &SendOutcome::RateLimited {
                    retry_after: secs(5)
                }
            ),
            RetryDecision::GiveUp(RelayError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_other_failures_never_retry() {
        let policy = RetryPolicy::default();
        let outcome = SendOutcome::Failed {
            cause: "Bad Request".into(),
        };
        assert!(matches!(
            policy.decide(0, &outcome),
            RetryDecision::GiveUp(RelayError::Transport(_))
        ));
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        assert!(matches!(
            policy.decide(0, &SendOutcome::TimedOut),
            RetryDecision::GiveUp(_)
        ));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy {
            backoff_base: Duration::MAX,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_for(40), Duration::MAX);
    }
}
