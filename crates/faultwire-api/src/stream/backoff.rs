// ── Reconnect backoff ──

use std::time::Duration;

/// Default delay before the first reconnect.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(15);

/// Default cap on reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff: `delay(n) = min(base * 2^n, max)`, no jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempts: 0,
        }
    }

    /// Reconnect attempts scheduled since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay for a given attempt number, without touching the counter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        1_u32
            .checked_shl(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Delay for the next attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
