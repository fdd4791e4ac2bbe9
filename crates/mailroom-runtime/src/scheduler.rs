//! Scheduling policies
//!
//! A [`Scheduler`] picks one actor out of the runnable candidates the
//! dispatcher hands it each cycle. Candidates are always listed in
//! registration order and every one of them has at least one pending
//! message. Policies may keep private state between calls and are never
//! shared between dispatchers.

use crate::actor::Actor;
use mailroom_core::config::{SchedulerConfig, SchedulerKind};
use mailroom_core::constants::FAIR_STARVATION_WINDOW_MS_DEFAULT;
use mailroom_core::io::{TimeProvider, WallClockTime};
use mailroom_core::message::{ActorId, Priority};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Policy deciding which runnable actor processes the next message
pub trait Scheduler: Send {
    /// Pick one of `candidates`, or `None` when there are none
    fn choose(&mut self, candidates: &[Arc<Actor>]) -> Option<Arc<Actor>>;

    /// Short policy name for logs
    fn name(&self) -> &'static str;

    /// Drop any state kept for an actor that left the registry
    fn forget(&mut self, _actor_id: ActorId) {}
}

/// Build the policy described by a configuration
pub fn from_config(config: &SchedulerConfig, time: Arc<dyn TimeProvider>) -> Box<dyn Scheduler> {
    match config.kind {
        SchedulerKind::RoundRobin => Box::new(RoundRobinScheduler::new()),
        SchedulerKind::Priority => Box::new(PriorityScheduler::new()),
        SchedulerKind::MessagePriority => Box::new(MessagePriorityScheduler::new()),
        SchedulerKind::Fair => Box::new(FairScheduler::with_time(config.starvation_window_ms, time)),
    }
}

// =============================================================================
// RoundRobin
// =============================================================================

/// Cycles through candidates with a persistent cursor
///
/// Over any N consecutive calls with the same N candidates, each candidate
/// is chosen exactly once.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    cursor: usize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn choose(&mut self, candidates: &[Arc<Actor>]) -> Option<Arc<Actor>> {
        if candidates.is_empty() {
            return None;
        }

        let index = self.cursor % candidates.len();
        self.cursor = (index + 1) % candidates.len();
        Some(candidates[index].clone())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Scores an actor; higher is scheduled first
pub type PriorityFn = Arc<dyn Fn(&Actor) -> i64 + Send + Sync>;

/// Picks the candidate with the highest score from a priority function
///
/// Ties go to the earliest candidate. The default function scores an actor
/// 1 when it has pending messages and 0 otherwise. Since every candidate has
/// pending messages, the default always picks the first candidate; supply a
/// real function with [`PriorityScheduler::with_priority_fn`].
pub struct PriorityScheduler {
    priority_fn: PriorityFn,
}

impl PriorityScheduler {
    pub fn new() -> Self {
        Self::with_priority_fn(|actor: &Actor| i64::from(actor.has_messages()))
    }

    pub fn with_priority_fn<F>(priority_fn: F) -> Self
    where
        F: Fn(&Actor) -> i64 + Send + Sync + 'static,
    {
        Self {
            priority_fn: Arc::new(priority_fn),
        }
    }
}

impl Default for PriorityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PriorityScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityScheduler").finish_non_exhaustive()
    }
}

impl Scheduler for PriorityScheduler {
    fn choose(&mut self, candidates: &[Arc<Actor>]) -> Option<Arc<Actor>> {
        let mut best: Option<(&Arc<Actor>, i64)> = None;
        for actor in candidates {
            let score = (self.priority_fn)(actor);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((actor, score)),
            }
        }
        best.map(|(actor, _)| actor.clone())
    }

    fn name(&self) -> &'static str {
        "priority"
    }
}

// =============================================================================
// MessagePriority
// =============================================================================

/// Picks the candidate holding the most urgent pending message
///
/// Each candidate is scored by the priority of the first highest-priority
/// message in its mailbox. Ties go to the earliest candidate.
///
/// Scoring scans every pending message of every candidate, so each choice
/// costs time proportional to the total number of queued messages. The scan
/// stops early once a `Critical` message is found.
#[derive(Debug, Default)]
pub struct MessagePriorityScheduler;

impl MessagePriorityScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for MessagePriorityScheduler {
    fn choose(&mut self, candidates: &[Arc<Actor>]) -> Option<Arc<Actor>> {
        let mut best: Option<(&Arc<Actor>, Priority)> = None;
        for actor in candidates {
            let priority = actor.peek_highest_priority_message().priority();
            match best {
                Some((_, best_priority)) if priority <= best_priority => {}
                _ => best = Some((actor, priority)),
            }
            if priority == Priority::Critical {
                break;
            }
        }
        best.map(|(actor, _)| actor.clone())
    }

    fn name(&self) -> &'static str {
        "message_priority"
    }
}

// =============================================================================
// Fair
// =============================================================================

/// Serves the candidate that has waited longest since it was last chosen
///
/// The first candidate that was never served, or whose last service is
/// more than `starvation_window_ms` in the past, is chosen outright.
/// Otherwise the candidate with the oldest service timestamp wins, ties
/// going to the earliest candidate.
#[derive(Debug)]
pub struct FairScheduler {
    starvation_window_ms: u64,
    last_served_ms: HashMap<ActorId, u64>,
    time: Arc<dyn TimeProvider>,
}

impl FairScheduler {
    /// Create a fair scheduler on the wall clock
    pub fn new(starvation_window_ms: u64) -> Self {
        Self::with_time(starvation_window_ms, Arc::new(WallClockTime::new()))
    }

    /// Create a fair scheduler with an injected time provider
    pub fn with_time(starvation_window_ms: u64, time: Arc<dyn TimeProvider>) -> Self {
        debug_assert!(starvation_window_ms > 0, "starvation window must be positive");

        Self {
            starvation_window_ms,
            last_served_ms: HashMap::new(),
            time,
        }
    }

    pub fn starvation_window_ms(&self) -> u64 {
        self.starvation_window_ms
    }

    /// When an actor was last chosen (monotonic ms)
    pub fn last_served_ms(&self, actor_id: ActorId) -> Option<u64> {
        self.last_served_ms.get(&actor_id).copied()
    }

    fn is_starved(&self, actor_id: ActorId, now_ms: u64) -> bool {
        match self.last_served_ms.get(&actor_id) {
            None => true,
            Some(&served_ms) => now_ms.saturating_sub(served_ms) > self.starvation_window_ms,
        }
    }
}

impl Default for FairScheduler {
    fn default() -> Self {
        Self::new(FAIR_STARVATION_WINDOW_MS_DEFAULT)
    }
}

impl Scheduler for FairScheduler {
    fn choose(&mut self, candidates: &[Arc<Actor>]) -> Option<Arc<Actor>> {
        let now_ms = self.time.monotonic_ms();

        let chosen = match candidates
            .iter()
            .find(|actor| self.is_starved(actor.id(), now_ms))
        {
            Some(actor) => actor,
            None => {
                let mut oldest: Option<(&Arc<Actor>, u64)> = None;
                for actor in candidates {
                    let served_ms = self.last_served_ms(actor.id()).unwrap_or(0);
                    match oldest {
                        Some((_, oldest_ms)) if served_ms >= oldest_ms => {}
                        _ => oldest = Some((actor, served_ms)),
                    }
                }
                oldest?.0
            }
        };

        self.last_served_ms.insert(chosen.id(), now_ms);
        Some(chosen.clone())
    }

    fn name(&self) -> &'static str {
        "fair"
    }

    fn forget(&mut self, actor_id: ActorId) {
        self.last_served_ms.remove(&actor_id);
    }
}
