use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Linear,
    Exponential,
}

/// Retry, backoff, and timeout policy for a single workflow step.
///
/// `delay_for_attempt` implements the §4.E schedule: `delay * attempt` for
/// linear backoff, `delay * 2^(attempt - 1)` for exponential. Attempts are
/// 1-indexed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    pub timeout: Duration,
}

impl StepPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: Backoff, timeout: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff,
            timeout,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.delay.saturating_mul(attempt.max(1)),
            Backoff::Exponential => {
                let exp = attempt.saturating_sub(1).min(16);
                self.delay.saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX))
            }
        }
    }

    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }
}

/// The six fixed step policies from the deployment workflow table.
pub mod policies {
    use super::{Backoff, StepPolicy};
    use std::time::Duration;

    pub fn validate_and_prepare() -> StepPolicy {
        StepPolicy::new(3, Duration::from_secs(2), Backoff::Linear, Duration::from_secs(60))
    }

    pub fn create_sandbox() -> StepPolicy {
        StepPolicy::new(2, Duration::from_secs(5), Backoff::Exponential, Duration::from_secs(60))
    }

    pub fn sync_files() -> StepPolicy {
        StepPolicy::new(3, Duration::from_secs(3), Backoff::Linear, Duration::from_secs(60))
    }

    pub fn build_project() -> StepPolicy {
        StepPolicy::new(2, Duration::from_secs(10), Backoff::Linear, Duration::from_secs(60))
    }

    pub fn deploy_to_cloudflare() -> StepPolicy {
        StepPolicy::new(5, Duration::from_secs(5), Backoff::Exponential, Duration::from_secs(60))
    }

    pub fn update_database_and_cleanup() -> StepPolicy {
        StepPolicy::new(3, Duration::from_secs(2), Backoff::Linear, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff_scales_with_attempt() {
        let p = StepPolicy::new(3, Duration::from_secs(2), Backoff::Linear, Duration::from_secs(60));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(6));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let p = StepPolicy::new(5, Duration::from_secs(5), Backoff::Exponential, Duration::from_secs(60));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(20));
        assert_eq!(p.delay_for_attempt(4), Duration::from_secs(40));
    }

    #[test]
    fn attempts_remaining() {
        let p = policies::create_sandbox();
        assert!(p.has_attempts_remaining(1));
        assert!(!p.has_attempts_remaining(2));
    }
}
