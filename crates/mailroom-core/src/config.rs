//! Configuration for Mailroom
//!
//! Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Main configuration for Mailroom
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailroomConfig {
    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl MailroomConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.dispatcher.validate()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| Error::InvalidConfiguration {
            field: "<toml>".into(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables on top of this configuration
    ///
    /// Reads:
    /// - `MAILROOM_SCHEDULER`: scheduler kind (round_robin, priority, message_priority, fair)
    /// - `MAILROOM_IDLE_QUANTUM_MS`: idle wait between dispatch cycles
    /// - `MAILROOM_STARVATION_WINDOW_MS`: fair scheduler starvation window
    ///
    /// Unparseable values are rejected rather than silently ignored.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(kind) = std::env::var("MAILROOM_SCHEDULER") {
            self.dispatcher.scheduler.kind = kind.parse()?;
        }

        if let Ok(value) = std::env::var("MAILROOM_IDLE_QUANTUM_MS") {
            self.dispatcher.idle_quantum_ms =
                value.parse().map_err(|_| Error::InvalidConfiguration {
                    field: "dispatcher.idle_quantum_ms".into(),
                    reason: format!("'{}' is not a number", value),
                })?;
        }

        if let Ok(value) = std::env::var("MAILROOM_STARVATION_WINDOW_MS") {
            self.dispatcher.scheduler.starvation_window_ms =
                value.parse().map_err(|_| Error::InvalidConfiguration {
                    field: "dispatcher.scheduler.starvation_window_ms".into(),
                    reason: format!("'{}' is not a number", value),
                })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Idle wait between dispatch cycles when no actor has work (milliseconds)
    #[serde(default = "default_idle_quantum_ms")]
    pub idle_quantum_ms: u64,

    /// Scheduling policy installed at construction
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_idle_quantum_ms() -> u64 {
    DISPATCHER_IDLE_QUANTUM_MS_DEFAULT
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            idle_quantum_ms: default_idle_quantum_ms(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl DispatcherConfig {
    /// Validate the dispatcher configuration
    pub fn validate(&self) -> Result<()> {
        if self.idle_quantum_ms == 0 {
            return Err(Error::invalid_config(
                "dispatcher.idle_quantum_ms",
                "must be positive",
            ));
        }

        if self.idle_quantum_ms > DISPATCHER_IDLE_QUANTUM_MS_MAX {
            return Err(Error::invalid_config(
                "dispatcher.idle_quantum_ms",
                format!(
                    "{} exceeds limit {}",
                    self.idle_quantum_ms, DISPATCHER_IDLE_QUANTUM_MS_MAX
                ),
            ));
        }

        self.scheduler.validate()
    }
}

/// Scheduling policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Which policy to use
    #[serde(default)]
    pub kind: SchedulerKind,

    /// Maximum wait before the fair policy forces selection (milliseconds)
    ///
    /// Only read by the fair policy.
    #[serde(default = "default_starvation_window_ms")]
    pub starvation_window_ms: u64,
}

fn default_starvation_window_ms() -> u64 {
    FAIR_STARVATION_WINDOW_MS_DEFAULT
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::default(),
            starvation_window_ms: default_starvation_window_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration for the given policy with default parameters
    pub fn of(kind: SchedulerKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.starvation_window_ms == 0 {
            return Err(Error::invalid_config(
                "dispatcher.scheduler.starvation_window_ms",
                "must be positive",
            ));
        }

        if self.starvation_window_ms > FAIR_STARVATION_WINDOW_MS_MAX {
            return Err(Error::invalid_config(
                "dispatcher.scheduler.starvation_window_ms",
                format!(
                    "{} exceeds limit {}",
                    self.starvation_window_ms, FAIR_STARVATION_WINDOW_MS_MAX
                ),
            ));
        }

        Ok(())
    }
}

/// Available scheduling policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Rotate through candidates
    #[default]
    RoundRobin,
    /// Highest actor-level priority first
    Priority,
    /// Actor holding the highest-priority queued message first
    MessagePriority,
    /// Least recently served first, with a starvation bound
    Fair,
}

impl SchedulerKind {
    /// All policies, in declaration order
    pub const ALL: [SchedulerKind; 4] = [
        SchedulerKind::RoundRobin,
        SchedulerKind::Priority,
        SchedulerKind::MessagePriority,
        SchedulerKind::Fair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::RoundRobin => "round_robin",
            SchedulerKind::Priority => "priority",
            SchedulerKind::MessagePriority => "message_priority",
            SchedulerKind::Fair => "fair",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        SchedulerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                Error::invalid_config(
                    "dispatcher.scheduler.kind",
                    format!(
                        "unknown scheduler '{}' (expected round_robin, priority, message_priority or fair)",
                        s
                    ),
                )
            })
    }
}
