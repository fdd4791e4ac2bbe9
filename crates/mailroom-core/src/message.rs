//! Messages and actor identifiers
//!
//! A [`Message`] is an immutable value: a type tag, optional sender and
//! target ids, a heterogeneous [`Payload`], a [`Priority`] and a creation
//! timestamp. Only the priority may be reassigned, and only before the
//! message is submitted.

use crate::constants::{EMPTY_MESSAGE_TYPE, MESSAGE_TYPE_LENGTH_BYTES_MAX};
use crate::error::{Error, Result};
use crate::io::{TimeProvider, WallClockTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ActorId
// =============================================================================

/// Unique identifier for an actor
///
/// 128 random bits (a v4 UUID), generated once at actor construction.
/// Collisions are treated as impossible.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ActorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| Error::InvalidActorId {
            id: s.to_string(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Message priority, ordered `Low < Normal < High < Critical`
#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// Numeric rank of this priority
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Dynamically typed payload value
pub type PayloadValue = serde_json::Value;

/// String-keyed map of dynamically typed values
///
/// Reads are type-checked: a missing key or a value that does not convert to
/// the requested type is an error, never a panic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(HashMap<String, PayloadValue>);

impl Payload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    ///
    /// Values that fail to serialize are stored as `null`.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(PayloadValue::Null);
        self.0.insert(key.into(), value);
    }

    /// Read a value as `T`
    ///
    /// # Errors
    /// `PayloadKeyNotFound` if the key is absent, `PayloadTypeMismatch` if the
    /// stored value does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.0.get(key).ok_or_else(|| Error::PayloadKeyNotFound {
            key: key.to_string(),
        })?;

        T::deserialize(value).map_err(|e| Error::PayloadTypeMismatch {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read a value as `T`, falling back to `default` on any failure
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Check whether the payload holds a key
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries (order unspecified)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, PayloadValue)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, PayloadValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// Message
// =============================================================================

/// One unit of communication between actors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    message_type: String,
    sender_id: Option<ActorId>,
    target_id: Option<ActorId>,
    payload: Payload,
    priority: Priority,
    created_at_ms: u64,
}

impl Message {
    /// Create a message stamped with the production wall clock
    ///
    /// For deterministic tests, use `new_with_time`.
    pub fn new(
        message_type: impl Into<String>,
        sender_id: Option<ActorId>,
        target_id: Option<ActorId>,
    ) -> Self {
        Self::new_with_time(message_type, sender_id, target_id, &WallClockTime::new())
    }

    /// Create a message stamped with an injected time provider
    pub fn new_with_time(
        message_type: impl Into<String>,
        sender_id: Option<ActorId>,
        target_id: Option<ActorId>,
        time: &dyn TimeProvider,
    ) -> Self {
        let message_type = message_type.into();
        debug_assert!(!message_type.is_empty(), "message type must not be empty");
        debug_assert!(message_type.len() <= MESSAGE_TYPE_LENGTH_BYTES_MAX);

        Self {
            message_type,
            sender_id,
            target_id,
            payload: Payload::new(),
            priority: Priority::Normal,
            created_at_ms: time.monotonic_ms(),
        }
    }

    /// The sentinel returned when peeking an empty mailbox
    pub fn empty() -> Self {
        Self {
            message_type: EMPTY_MESSAGE_TYPE.to_string(),
            sender_id: None,
            target_id: None,
            payload: Payload::new(),
            priority: Priority::Normal,
            created_at_ms: 0,
        }
    }

    /// Check whether this is the empty-mailbox sentinel
    pub fn is_empty_sentinel(&self) -> bool {
        self.message_type == EMPTY_MESSAGE_TYPE
            && self.sender_id.is_none()
            && self.target_id.is_none()
            && self.payload.is_empty()
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Reassign the priority before submission
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Copy of this message addressed from `sender` to `target`
    ///
    /// Payload, priority and creation time are preserved.
    pub fn readdressed(self, sender_id: Option<ActorId>, target_id: Option<ActorId>) -> Self {
        Self {
            sender_id,
            target_id,
            ..self
        }
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn sender_id(&self) -> Option<ActorId> {
        self.sender_id
    }

    pub fn target_id(&self) -> Option<ActorId> {
        self.target_id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Creation timestamp (monotonic ms of the provider that stamped it)
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}
