//! Mailroom Runtime
//!
//! Actors, mailboxes, scheduling policies and the dispatcher loop.
//!
//! # Overview
//!
//! The runtime provides:
//! - Actors with an explicit lifecycle (created, initialized, running,
//!   stopping, stopped) and an unbounded FIFO mailbox
//! - Handler tables keyed by message type
//! - Four interchangeable scheduling policies
//! - A dispatcher that owns the actor registry, routes messages and steps
//!   exactly one actor per cycle
//!
//! # Execution model
//!
//! Message handling is single-stepper: whichever task drives the dispatcher
//! loop is the only one invoking handlers. Other tasks may register actors,
//! deliver messages, swap the scheduler or stop the loop at any time.

pub mod actor;
pub mod dispatcher;
pub mod mailbox;
pub mod scheduler;

pub use actor::{
    Actor, ActorBehavior, ActorBuilder, ActorState, ActorStats, Handler, NoopBehavior,
};
pub use dispatcher::Dispatcher;
pub use mailbox::Mailbox;
pub use scheduler::{
    from_config, FairScheduler, MessagePriorityScheduler, PriorityFn, PriorityScheduler,
    RoundRobinScheduler, Scheduler,
};
