//! Error types for Mailroom
//!
//! Explicit error types with context, using thiserror. No failure in the
//! runtime is fatal: every error is returned to the caller and logged where
//! it happened.

use thiserror::Error;

/// Result type alias for Mailroom operations
pub type Result<T> = std::result::Result<T, Error>;

/// Mailroom error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Registry Errors
    // =========================================================================
    #[error("Actor not found: {id}")]
    ActorNotFound { id: String },

    #[error("Actor already registered: {id}")]
    ActorAlreadyRegistered { id: String },

    #[error("Actor {id} is bound to another live dispatcher")]
    ActorOwnedElsewhere { id: String },

    #[error("Invalid actor ID: {id}, reason: {reason}")]
    InvalidActorId { id: String, reason: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Actor {actor} cannot {operation} in state {state}")]
    InvalidLifecycleTransition {
        actor: String,
        operation: String,
        state: String,
    },

    #[error("Actor not running: {id}, state: {state}")]
    ActorNotRunning { id: String, state: String },

    #[error("Actor {actor} rejected message in state {state}")]
    MessageRejected { actor: String, state: String },

    // =========================================================================
    // Dispatcher Errors
    // =========================================================================
    #[error("Dispatcher no longer exists")]
    DispatcherGone,

    #[error("Dispatcher is already running")]
    DispatcherAlreadyRunning,

    // =========================================================================
    // Payload Errors
    // =========================================================================
    #[error("Key not found in payload: {key}")]
    PayloadKeyNotFound { key: String },

    #[error("Type mismatch for payload key '{key}': {reason}")]
    PayloadTypeMismatch { key: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// Create an actor not found error
    pub fn actor_not_found(id: impl ToString) -> Self {
        Self::ActorNotFound { id: id.to_string() }
    }

    /// Create an invalid lifecycle transition error
    pub fn invalid_transition(
        actor: impl Into<String>,
        operation: impl Into<String>,
        state: impl ToString,
    ) -> Self {
        Self::InvalidLifecycleTransition {
            actor: actor.into(),
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error is a rejection the caller may safely ignore
    ///
    /// Lifecycle violations and dropped deliveries leave the system in a
    /// consistent state; they are reported, never escalated.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::InvalidLifecycleTransition { .. }
                | Self::ActorNotFound { .. }
                | Self::ActorNotRunning { .. }
                | Self::MessageRejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::actor_not_found("test-actor");
        assert!(err.to_string().contains("test-actor"));

        let err = Error::invalid_transition("worker", "start", "created");
        assert_eq!(err.to_string(), "Actor worker cannot start in state created");
    }

    #[test]
    fn test_error_is_benign() {
        assert!(Error::MessageRejected {
            actor: "a".into(),
            state: "stopped".into()
        }
        .is_benign());
        assert!(Error::actor_not_found("x").is_benign());
        assert!(!Error::DispatcherGone.is_benign());
        assert!(!Error::internal("boom").is_benign());
    }
}
