use std::time::Duration;

/// Base restart interval.
pub const BASE_INTERVAL: Duration = Duration::from_secs(15);
/// Restart interval ceiling.
pub const MAX_INTERVAL: Duration = Duration::from_secs(120);

/// Interval of the recurring restart timer.
///
/// Always `min(base × 2^n, max)` for the number `n` of consecutive failed
/// restart cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new(BASE_INTERVAL, MAX_INTERVAL)
    }
}

impl RestartBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Double the interval, capped at the ceiling. Returns the new interval.
    pub fn double(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.max);
        self.current
    }

    /// Back to the base interval. Returns it.
    pub fn reset(&mut self) -> Duration {
        self.current = self.base;
        self.current
    }
}
