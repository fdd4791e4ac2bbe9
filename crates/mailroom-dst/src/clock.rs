//! Deterministic clock for simulation
//!
//! Explicit time control, no system time dependencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Deterministic simulation clock
///
/// Time only advances when explicitly told to, enabling reproducible tests.
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Current time in milliseconds since epoch
    current_time_ms: Arc<AtomicU64>,
}

impl SimClock {
    /// Create a new SimClock starting at a specific millisecond timestamp
    pub fn from_millis(ms: u64) -> Self {
        Self {
            current_time_ms: Arc::new(AtomicU64::new(ms)),
        }
    }

    /// Get the current time in milliseconds since epoch
    pub fn now_ms(&self) -> u64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }

    /// Advance time by the given number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.current_time_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC for predictable test behavior
        Self::from_millis(1_704_067_200_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advance_ms() {
        let clock = SimClock::from_millis(0);
        assert_eq!(clock.now_ms(), 0);

        clock.advance_ms(1000);
        assert_eq!(clock.now_ms(), 1000);

        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1500);
    }

    #[test]
    fn test_clock_clones_share_time() {
        let clock = SimClock::from_millis(10);
        let other = clock.clone();

        other.advance_ms(5);
        assert_eq!(clock.now_ms(), 15);
    }
}
