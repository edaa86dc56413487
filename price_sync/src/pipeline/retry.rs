use std::time::Duration;

/// Delay between fetch attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial`, doubled per retry, never above `cap`.
    Exponential { initial: Duration, cap: Duration },
}

/// How often and how patiently a fetch is retried.
///
/// `max_attempts` counts the first attempt: 3 means one call plus two retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Three attempts, five seconds apart.
    pub fn observed() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        }
    }

    /// `max_attempts` attempts without any delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
        }
    }

    /// Attempts actually made; never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before attempt number `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, cap } => {
                let factor = 2u32.saturating_pow(attempt - 2);
                initial.saturating_mul(factor).min(cap)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::observed()
    }
}
