//! Time abstraction
//!
//! Every timestamp the runtime takes (message creation, scheduler
//! bookkeeping, actor statistics) goes through [`TimeProvider`], so
//! time-dependent behavior such as fair-scheduler starvation can be tested
//! deterministically.
//!
//! ```text
//!            ┌─────────────────────────────┐
//!            │  Runtime (same code)        │
//!            └──────────────┬──────────────┘
//!                           │ TimeProvider
//!              ┌────────────┴────────────┐
//!        ┌─────▼─────┐             ┌─────▼─────┐
//!        │ WallClock │             │  SimTime  │
//!        │ (tokio)   │             │ (dst)     │
//!        └───────────┘             └───────────┘
//! ```

use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider abstraction
///
/// Code that needs the current time or a sleep takes an
/// `Arc<dyn TimeProvider>` instead of calling `SystemTime::now()` directly.
///
/// # Implementations
///
/// - `WallClockTime`: Production - uses the system clock
/// - `SimTime` (in mailroom-dst): deterministic, advanced explicitly
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Get current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    ///
    /// In production: actual tokio::time::sleep
    /// In simulation: advances simulated time, returns immediately
    async fn sleep_ms(&self, ms: u64);

    /// Get monotonic timestamp (for measuring durations)
    fn monotonic_ms(&self) -> u64 {
        self.now_ms()
    }
}

/// Production time provider using wall clock
#[derive(Debug, Clone, Default)]
pub struct WallClockTime;

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_time_now_ms() {
        let clock = WallClockTime::new();
        let now = clock.now_ms();

        // Should be a reasonable timestamp (after 2020)
        assert!(now > 1577836800000);

        let now2 = clock.now_ms();
        assert!(now2 >= now);
        assert!(now2 - now < 1000);
    }

    #[tokio::test]
    async fn test_wall_clock_time_sleep() {
        let clock = WallClockTime::new();
        let start = clock.monotonic_ms();

        clock.sleep_ms(10).await;

        let elapsed = clock.monotonic_ms() - start;
        assert!(elapsed >= 9, "elapsed: {}", elapsed);
    }
}
