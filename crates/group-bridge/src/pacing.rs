//! Randomized pauses between consecutive bulk group operations

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    /// No pause at all
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// A delay drawn uniformly from `[min_ms, max_ms]`
    pub fn next_delay(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
