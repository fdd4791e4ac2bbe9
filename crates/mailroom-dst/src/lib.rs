//! Mailroom DST - Deterministic Simulation Testing
//!
//! Controlled time for tests of time-dependent runtime behavior, such as the
//! fair scheduler's starvation window or the dispatcher's idle wait.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailroom_dst::{SimClock, SimTime};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(SimClock::from_millis(0));
//! let time = Arc::new(SimTime::new(clock.clone()));
//! let scheduler = FairScheduler::with_time(5_000, time);
//! clock.advance_ms(6_000);
//! ```

pub mod clock;
pub mod time;

pub use clock::SimClock;
pub use time::SimTime;
