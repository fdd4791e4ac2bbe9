//! Simulated time provider
//!
//! `SimTime` implements [`TimeProvider`] on top of a [`SimClock`]: sleeping
//! advances the clock instantly and yields to the tokio scheduler, so loops
//! that idle through the provider make progress without real delays.

use async_trait::async_trait;
use mailroom_core::TimeProvider;
use std::sync::Arc;

use crate::clock::SimClock;

/// Simulated time provider
#[derive(Clone, Debug)]
pub struct SimTime {
    /// Reference to simulation clock
    clock: Arc<SimClock>,
}

impl SimTime {
    /// Create a new SimTime from a SimClock
    pub fn new(clock: Arc<SimClock>) -> Self {
        Self { clock }
    }

    /// Create a SimTime with its own clock starting at `ms`
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Arc::new(SimClock::from_millis(ms)))
    }

    /// Get the underlying SimClock
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

#[async_trait]
impl TimeProvider for SimTime {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    async fn sleep_ms(&self, ms: u64) {
        self.clock.advance_ms(ms);

        // Let other tasks observe the new time before the sleeper resumes
        tokio::task::yield_now().await;
    }
}
