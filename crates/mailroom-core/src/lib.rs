//! Mailroom Core
//!
//! Core types, errors, and constants for the Mailroom actor runtime.
//!
//! # Overview
//!
//! Mailroom is a single-process actor runtime: actors own a mailbox and a
//! table of handlers keyed by message type, and a dispatcher repeatedly picks
//! one runnable actor (through a pluggable scheduling policy) and lets it
//! process exactly one message.
//!
//! This crate holds everything the runtime shares with applications:
//! - [`Message`], [`Priority`], [`Payload`] and [`ActorId`]
//! - The [`Error`] type and [`Result`] alias
//! - Explicit limits in [`constants`]
//! - Validated configuration in [`config`]
//! - The [`TimeProvider`] abstraction used for every timestamp
//! - Logging setup in [`telemetry`]

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod message;
pub mod telemetry;

pub use config::{DispatcherConfig, MailroomConfig, SchedulerConfig, SchedulerKind};
pub use constants::*;
pub use error::{Error, Result};
pub use io::{TimeProvider, WallClockTime};
pub use message::{ActorId, Message, Payload, PayloadValue, Priority};
pub use telemetry::{init_telemetry, TelemetryConfig};
