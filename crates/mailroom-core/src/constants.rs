//! Constants for Mailroom
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Actor Limits
// =============================================================================

/// Maximum length of an actor name in bytes
pub const ACTOR_NAME_LENGTH_BYTES_MAX: usize = 256;

// =============================================================================
// Message Limits
// =============================================================================

/// Maximum length of a message type tag in bytes
pub const MESSAGE_TYPE_LENGTH_BYTES_MAX: usize = 256;

/// Type tag of the sentinel returned when peeking an empty mailbox
pub const EMPTY_MESSAGE_TYPE: &str = "empty";

// =============================================================================
// Dispatcher Limits
// =============================================================================

/// Default idle wait between dispatch cycles when no actor has work (1 ms)
pub const DISPATCHER_IDLE_QUANTUM_MS_DEFAULT: u64 = 1;

/// Maximum idle wait between dispatch cycles (1 sec)
///
/// Bounds how long a dispatcher shutdown can go unobserved.
pub const DISPATCHER_IDLE_QUANTUM_MS_MAX: u64 = 1000;

// =============================================================================
// Scheduler Limits
// =============================================================================

/// Default starvation window for the fair scheduler (5 sec)
pub const FAIR_STARVATION_WINDOW_MS_DEFAULT: u64 = 5 * 1000;

/// Maximum starvation window for the fair scheduler (1 hour)
pub const FAIR_STARVATION_WINDOW_MS_MAX: u64 = 60 * 60 * 1000;
