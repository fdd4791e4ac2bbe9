//! Demonstration workloads
//!
//! Application-level actors driven through the public runtime API: the
//! two-actor ping-pong exchange and a fan-out of independent workers.

use anyhow::{Context, Result};
use mailroom_core::config::DispatcherConfig;
use mailroom_core::message::{ActorId, Message, Payload, Priority};
use mailroom_runtime::{Actor, ActorBehavior, ActorState, Dispatcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default count at which the ping-pong exchange ends
pub const PING_PONG_LIMIT_DEFAULT: i64 = 10;

// =============================================================================
// Ping-pong
// =============================================================================

/// Handlers for the ping-pong exchange
///
/// - `ping(c)` answers `pong(c + 1)`
/// - `pong(c)` with `c < limit` answers `high_priority(c)` when `c` is even
///   and `ping(c)` when odd; at the limit the exchange ends
/// - `high_priority(c)` answers `ping(c)`
#[derive(Debug, Clone, Copy)]
pub struct PingPongBehavior {
    limit: i64,
}

impl PingPongBehavior {
    pub fn new(limit: i64) -> Self {
        Self { limit }
    }
}

fn count_of(message: &Message) -> Option<i64> {
    match message.payload().get::<i64>("count") {
        Ok(count) => Some(count),
        Err(e) => {
            debug!(message_type = %message.message_type(), error = %e, "Malformed ping-pong message");
            None
        }
    }
}

fn reply(actor: &Actor, to: &Message, message_type: &str, count: i64, priority: Priority) {
    let Some(sender) = to.sender_id() else {
        debug!(actor_id = %actor.id(), "Nobody to reply to");
        return;
    };
    let message = Message::new(message_type, Some(actor.id()), Some(sender))
        .with_payload(Payload::new().with("count", count))
        .with_priority(priority);
    if let Err(e) = actor.send(sender, message) {
        debug!(actor_id = %actor.id(), error = %e, "Reply not sent");
    }
}

impl ActorBehavior for PingPongBehavior {
    fn on_initialize(&self, actor: &Actor) {
        actor.register_handler("ping", |actor, msg| {
            if let Some(count) = count_of(msg) {
                info!(actor = %actor.name(), count, "ping");
                reply(actor, msg, "pong", count + 1, Priority::Normal);
            }
        });

        let limit = self.limit;
        actor.register_handler("pong", move |actor, msg| {
            let Some(count) = count_of(msg) else {
                return;
            };
            info!(actor = %actor.name(), count, "pong");
            if count >= limit {
                return;
            }
            if count % 2 == 0 {
                reply(actor, msg, "high_priority", count, Priority::High);
            } else {
                reply(actor, msg, "ping", count, Priority::Normal);
            }
        });

        actor.register_handler("high_priority", |actor, msg| {
            if let Some(count) = count_of(msg) {
                info!(actor = %actor.name(), count, "high priority");
                reply(actor, msg, "ping", count, Priority::Normal);
            }
        });
    }

    fn on_state_changed(&self, actor: &Actor, old: ActorState, new: ActorState) {
        debug!(actor = %actor.name(), from = %old, to = %new, "Ping-pong actor state changed");
    }
}

/// Number of messages handled by a ping-pong exchange starting at count 1
///
/// The first ping and its pong always happen. Every pong below the limit
/// then adds one more round: a ping and the next pong, plus a high-priority
/// message when the count is even.
pub fn expected_ping_pong_messages(limit: i64) -> u64 {
    let rounds: u64 = (2..limit.max(2))
        .map(|count| if count % 2 == 0 { 3 } else { 2 })
        .sum();
    2 + rounds
}

/// Outcome of a ping-pong run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPongReport {
    pub scheduler: &'static str,
    pub handled: u64,
    pub elapsed: Duration,
}

/// Run the ping-pong exchange between two actors until it goes quiet
pub async fn run_ping_pong(config: DispatcherConfig, limit: i64) -> Result<PingPongReport> {
    let dispatcher = Dispatcher::with_config(config);
    let behavior = PingPongBehavior::new(limit);
    let first = spawn_started(&dispatcher, Actor::with_behavior("Actor1", behavior))?;
    let second = spawn_started(&dispatcher, Actor::with_behavior("Actor2", behavior))?;

    let started = Instant::now();
    let initial = Message::new("ping", Some(first), Some(second))
        .with_payload(Payload::new().with("count", 1));
    dispatcher
        .deliver_message(initial)
        .context("Failed to deliver the initial ping")?;

    drive_until_idle(&dispatcher).await?;

    Ok(PingPongReport {
        scheduler: dispatcher.scheduler_name(),
        handled: dispatcher.total_processed(),
        elapsed: started.elapsed(),
    })
}

// =============================================================================
// Fan-out
// =============================================================================

/// Outcome of a fan-out run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    pub scheduler: &'static str,
    /// Actor names and processed counts, in registration order
    pub processed: Vec<(String, u64)>,
    pub elapsed: Duration,
}

/// Queue `messages` messages on each of `actors` workers before the loop
/// starts, then run until every mailbox is empty
pub async fn run_fan_out(
    config: DispatcherConfig,
    actors: usize,
    messages: usize,
) -> Result<FanOutReport> {
    let dispatcher = Dispatcher::with_config(config);

    let mut ids = Vec::with_capacity(actors);
    for i in 0..actors {
        let actor = Actor::new(format!("worker-{}", i));
        actor.register_handler("test", |actor, msg| {
            debug!(actor = %actor.name(), priority = %msg.priority(), "work item");
        });
        ids.push(spawn_started(&dispatcher, actor)?);
    }

    for (i, &id) in ids.iter().enumerate() {
        for j in 0..messages {
            let priority = if (i + j) % 3 == 0 {
                Priority::High
            } else {
                Priority::Normal
            };
            let message = Message::new("test", None, Some(id))
                .with_payload(Payload::new().with("index", j))
                .with_priority(priority);
            dispatcher
                .deliver_message(message)
                .with_context(|| format!("Failed to queue work for actor {}", id))?;
        }
    }

    let started = Instant::now();
    drive_until_idle(&dispatcher).await?;

    let processed = ids
        .iter()
        .filter_map(|&id| dispatcher.find_actor(id))
        .map(|actor| (actor.name().to_string(), actor.stats().processed_count))
        .collect();

    Ok(FanOutReport {
        scheduler: dispatcher.scheduler_name(),
        processed,
        elapsed: started.elapsed(),
    })
}

// =============================================================================
// Driving
// =============================================================================

fn spawn_started(dispatcher: &Arc<Dispatcher>, actor: Actor) -> Result<ActorId> {
    let actor = Arc::new(actor);
    dispatcher
        .register_actor(actor.clone())
        .with_context(|| format!("Failed to register {}", actor.name()))?;
    actor.initialize()?;
    actor.start()?;
    Ok(actor.id())
}

/// Run the dispatcher loop on its own task until no actor has work left
///
/// Must run on a current-thread runtime: the loop only yields between
/// cycles, so observing no work here means the exchange is over.
async fn drive_until_idle(dispatcher: &Arc<Dispatcher>) -> Result<()> {
    let task = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run().await }
    });

    while !dispatcher.is_running() || dispatcher.has_work() {
        tokio::task::yield_now().await;
    }

    dispatcher.stop();
    task.await.context("Dispatcher task panicked")??;

    info!(processed = dispatcher.total_processed(), "Dispatcher idle");
    Ok(())
}
