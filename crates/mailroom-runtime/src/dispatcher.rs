//! Actor dispatcher
//!
//! The dispatcher owns the actor registry, routes messages between actors
//! and runs the scheduling loop: each cycle it collects the runnable actors
//! that have pending messages, lets the scheduling policy pick one, and has
//! that actor process exactly one message.
//!
//! No dispatcher lock is held while a handler runs or across an `.await`,
//! so handlers may register actors, send messages, swap the scheduler or
//! stop the loop.

use crate::actor::{Actor, ActorState};
use crate::scheduler::{self, Scheduler};
use indexmap::IndexMap;
use mailroom_core::config::DispatcherConfig;
use mailroom_core::error::{Error, Result};
use mailroom_core::io::{TimeProvider, WallClockTime};
use mailroom_core::message::{ActorId, Message};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Clears the loop-active flag on drop
struct LoopGuard<'a> {
    active: &'a AtomicBool,
}

impl<'a> LoopGuard<'a> {
    fn acquire(active: &'a AtomicBool) -> Result<Self> {
        active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::DispatcherAlreadyRunning)?;
        Ok(Self { active })
    }
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Actor registry, message router and scheduling loop
///
/// Always handled through an `Arc`: actors keep a weak reference back to
/// the dispatcher that registered them.
pub struct Dispatcher {
    /// Registered actors, in registration order
    actors: RwLock<IndexMap<ActorId, Arc<Actor>>>,
    /// Current scheduling policy
    scheduler: Mutex<Box<dyn Scheduler>>,
    /// Set while `run` is looping
    running: AtomicBool,
    /// Set by `stop`, consumed when `run` exits
    stop_requested: AtomicBool,
    /// Set while some task is driving the loop
    loop_active: AtomicBool,
    /// Messages processed across all actors
    processed_count: AtomicU64,
    config: DispatcherConfig,
    time: Arc<dyn TimeProvider>,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration on the wall clock
    pub fn new() -> Arc<Self> {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create a dispatcher on the wall clock
    pub fn with_config(config: DispatcherConfig) -> Arc<Self> {
        Self::with_time(config, Arc::new(WallClockTime::new()))
    }

    /// Create a dispatcher with an injected time provider
    ///
    /// The initial scheduling policy is built from `config.scheduler` and
    /// shares the same time provider.
    pub fn with_time(config: DispatcherConfig, time: Arc<dyn TimeProvider>) -> Arc<Self> {
        debug_assert!(config.validate().is_ok(), "invalid dispatcher config");

        let scheduler = scheduler::from_config(&config.scheduler, time.clone());
        Arc::new(Self {
            actors: RwLock::new(IndexMap::new()),
            scheduler: Mutex::new(scheduler),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            loop_active: AtomicBool::new(false),
            processed_count: AtomicU64::new(0),
            config,
            time,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// The time provider shared with the scheduler and child actors
    pub fn time(&self) -> Arc<dyn TimeProvider> {
        self.time.clone()
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Add an actor to the registry
    ///
    /// Fails if the id is already registered or the actor is bound to
    /// another dispatcher that is still alive. If the loop is active, the
    /// actor is initialized and started right away.
    pub fn register_actor(self: &Arc<Self>, actor: Arc<Actor>) -> Result<()> {
        let actor_id = actor.id();
        {
            let mut actors = self.actors.write();
            if actors.contains_key(&actor_id) {
                warn!(actor_id = %actor_id, "Actor already registered");
                return Err(Error::ActorAlreadyRegistered {
                    id: actor_id.to_string(),
                });
            }
            if let Err(e) = actor.bind(self) {
                warn!(actor_id = %actor_id, error = %e, "Actor owned by another dispatcher");
                return Err(e);
            }
            actors.insert(actor_id, actor.clone());
        }

        info!(actor_id = %actor_id, name = %actor.name(), "Actor registered");

        if self.loop_active.load(Ordering::SeqCst) {
            self.onboard(&actor);
        }
        Ok(())
    }

    /// Remove an actor from the registry and stop it immediately
    ///
    /// Pending messages are discarded. Returns the removed actor, or `None`
    /// if the id was not registered.
    pub fn remove_actor(&self, actor_id: ActorId) -> Option<Arc<Actor>> {
        let actor = self.actors.write().shift_remove(&actor_id)?;

        self.scheduler.lock().forget(actor_id);
        if let Err(e) = actor.stop_immediately() {
            warn!(actor_id = %actor_id, error = %e, "Failed to stop removed actor");
        }
        actor.unbind();

        info!(actor_id = %actor_id, name = %actor.name(), "Actor removed");
        Some(actor)
    }

    pub fn find_actor(&self, actor_id: ActorId) -> Option<Arc<Actor>> {
        self.actors.read().get(&actor_id).cloned()
    }

    /// Registered actor ids in registration order
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.read().keys().copied().collect()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.read().len()
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Enqueue a message on its target actor
    ///
    /// Rejected if the target id is unset or unknown, or if the target is
    /// not `Running`. Rejections are logged and leave the registry and all
    /// mailboxes untouched.
    pub fn deliver_message(&self, message: Message) -> Result<()> {
        let Some(target_id) = message.target_id() else {
            warn!(message_type = %message.message_type(), "Message has no target");
            return Err(Error::actor_not_found("<unset>"));
        };

        let Some(target) = self.find_actor(target_id) else {
            warn!(
                target = %target_id,
                message_type = %message.message_type(),
                "Target actor not found"
            );
            return Err(Error::actor_not_found(target_id));
        };

        target.receive_routed(message)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Replace the scheduling policy
    ///
    /// Takes effect from the next cycle.
    pub fn set_scheduler(&self, scheduler: Box<dyn Scheduler>) {
        let name = scheduler.name();
        *self.scheduler.lock() = scheduler;
        info!(scheduler = name, "Scheduler replaced");
    }

    pub fn scheduler_name(&self) -> &'static str {
        self.scheduler.lock().name()
    }

    /// Runnable actors with pending messages, in registration order
    pub fn candidates(&self) -> Vec<Arc<Actor>> {
        self.actors
            .read()
            .values()
            .filter(|actor| actor.is_schedulable())
            .cloned()
            .collect()
    }

    /// Check if any runnable actor has a pending message
    pub fn has_work(&self) -> bool {
        self.actors
            .read()
            .values()
            .any(|actor| actor.is_schedulable())
    }

    /// Run one scheduling cycle
    ///
    /// Returns true if a message was processed. Must not be called
    /// concurrently with another task driving the loop. The handler runs to
    /// completion on the caller's thread; there is no per-handler time
    /// budget, so a handler that never returns stalls every actor.
    pub fn step(&self) -> bool {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return false;
        }

        let chosen = self.scheduler.lock().choose(&candidates);
        let Some(actor) = chosen else {
            return false;
        };

        let processed = actor.process_next_message();
        if processed {
            self.processed_count.fetch_add(1, Ordering::Relaxed);
        }
        processed
    }

    /// Messages processed across all actors
    pub fn total_processed(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Loop
    // =========================================================================

    /// Initialize and start an actor that has not been started yet
    fn onboard(&self, actor: &Actor) {
        let result = match actor.state() {
            ActorState::Created => actor.initialize().and_then(|_| actor.start()),
            ActorState::Initialized => actor.start(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            debug!(actor_id = %actor.id(), error = %e, "Actor not onboarded");
        }
    }

    fn onboard_all(&self) {
        let actors: Vec<_> = self.actors.read().values().cloned().collect();
        for actor in &actors {
            self.onboard(actor);
        }
    }

    /// Run the scheduling loop until [`stop`](Self::stop) is called
    ///
    /// On entry, every registered actor still in `Created` or `Initialized`
    /// is brought to `Running`. The loop yields to the tokio scheduler after
    /// each processed message and sleeps one idle quantum when there is no
    /// work. On exit every running actor begins a graceful stop.
    ///
    /// A [`stop`](Self::stop) issued before the loop starts is honored: the
    /// loop exits after onboarding without processing anything. Handlers are
    /// not preempted: a stop is only observed between cycles, and a handler
    /// that never returns blocks the loop for good.
    ///
    /// Fails with [`Error::DispatcherAlreadyRunning`] if another task is
    /// already driving the loop.
    #[instrument(skip(self), level = "info")]
    pub async fn run(&self) -> Result<()> {
        let _guard = match LoopGuard::acquire(&self.loop_active) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Dispatcher loop already active");
                return Err(e);
            }
        };
        self.running.store(true, Ordering::SeqCst);

        info!(
            scheduler = self.scheduler_name(),
            actors = self.actor_count(),
            "Dispatcher starting"
        );
        self.onboard_all();

        let mut processed: u64 = 0;
        while !self.stop_requested.load(Ordering::SeqCst) {
            if self.step() {
                processed += 1;
                tokio::task::yield_now().await;
            } else {
                self.time.sleep_ms(self.config.idle_quantum_ms).await;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.stop_requested.store(false, Ordering::SeqCst);
        self.stop_running_actors();
        info!(processed, "Dispatcher stopped");
        Ok(())
    }

    /// Step until no actor has work left
    ///
    /// Onboards actors like [`run`](Self::run) but does not touch the
    /// running flag and leaves actors running afterwards. Returns the
    /// number of messages processed.
    pub fn run_until_idle(&self) -> Result<u64> {
        let _guard = LoopGuard::acquire(&self.loop_active)?;
        self.onboard_all();

        let mut processed: u64 = 0;
        while self.step() {
            processed += 1;
        }

        debug!(processed, "Dispatcher idle");
        Ok(processed)
    }

    /// Ask the loop to exit after the current cycle
    ///
    /// The request stays pending until a [`run`](Self::run) observes it, so
    /// calling this right after spawning the loop still stops it.
    pub fn stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            info!("Dispatcher stop requested");
        }
    }

    /// Check if the loop is active and has not been told to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.stop_requested.load(Ordering::SeqCst)
    }

    fn stop_running_actors(&self) {
        let actors: Vec<_> = self.actors.read().values().cloned().collect();
        for actor in actors.iter().filter(|a| a.is_running()) {
            if let Err(e) = actor.stop() {
                warn!(actor_id = %actor.id(), error = %e, "Failed to stop actor");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("actors", &self.actor_count())
            .field("scheduler", &self.scheduler_name())
            .field("running", &self.is_running())
            .finish()
    }
}
