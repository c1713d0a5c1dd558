// Spectrum emission rate limiter

/// Counts analyzed samples and reports when a spectrum emission is due.
///
/// The count only resets when a spectrum is actually emitted, so a window
/// that is due but fails analysis leaves the next window due as well.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: u64,
    accumulated: u64,
}

impl RateLimiter {
    /// `interval` is in samples; zero is treated as one.
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            accumulated: 0,
        }
    }

    /// Add `samples` and return whether an emission is due
    pub fn advance(&mut self, samples: u64) -> bool {
        self.accumulated = self.accumulated.saturating_add(samples);
        self.accumulated >= self.interval
    }

    /// Call after an emission
    pub fn reset(&mut self) {
        self.accumulated = 0;
    }

    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}
