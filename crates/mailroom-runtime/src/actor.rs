//! Actors and lifecycle management
//!
//! An [`Actor`] owns an identity, a mailbox, a handler table keyed by
//! message type and an explicit lifecycle state. State and mailbox live
//! behind one lock so that every lifecycle transition is atomic with respect
//! to concurrent enqueues and state reads.
//!
//! Handlers and lifecycle hooks are always invoked with no lock held, so a
//! handler may freely call back into its own actor or into the dispatcher.

use crate::dispatcher::Dispatcher;
use crate::mailbox::Mailbox;
use mailroom_core::constants::ACTOR_NAME_LENGTH_BYTES_MAX;
use mailroom_core::error::{Error, Result};
use mailroom_core::io::{TimeProvider, WallClockTime};
use mailroom_core::message::{ActorId, Message};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Actor lifecycle state
///
/// State transitions:
/// ```text
///   Created ──initialize──> Initialized ──start──> Running
///      │                        │                     │
///      └──────────stop──────────┴─────────stop────────┤
///                                                     v
///                       Stopped <──mailbox drained── Stopping
/// ```
///
/// `stop_immediately` jumps from any non-stopped state straight to
/// `Stopped`, discarding whatever is still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActorState {
    /// Constructed, not yet initialized
    #[default]
    Created,
    /// Handlers are registered, not yet started
    Initialized,
    /// Accepting and processing messages
    Running,
    /// Draining the mailbox; still accepts messages
    Stopping,
    /// Terminal
    Stopped,
}

impl ActorState {
    /// Check if the dispatcher may step an actor in this state
    pub fn is_runnable(&self) -> bool {
        matches!(self, ActorState::Running | ActorState::Stopping)
    }

    /// Check if `receive` enqueues in this state
    pub fn accepts_messages(&self) -> bool {
        self.is_runnable()
    }

    /// Check if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActorState::Stopped)
    }

    /// Check if a transition is valid for the lifecycle state machine
    pub fn can_transition_to(&self, next: ActorState) -> bool {
        match (self, next) {
            (ActorState::Created, ActorState::Initialized) => true,
            (ActorState::Initialized, ActorState::Running) => true,
            // Graceful stop is valid from any live state
            (
                ActorState::Created | ActorState::Initialized | ActorState::Running,
                ActorState::Stopping,
            ) => true,
            // Immediate stop, or the end of a graceful drain
            (
                ActorState::Created
                | ActorState::Initialized
                | ActorState::Running
                | ActorState::Stopping,
                ActorState::Stopped,
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorState::Created => write!(f, "created"),
            ActorState::Initialized => write!(f, "initialized"),
            ActorState::Running => write!(f, "running"),
            ActorState::Stopping => write!(f, "stopping"),
            ActorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Counters for one actor
///
/// Uses monotonic timestamps (u64 ms) so tests can run on simulated time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorStats {
    /// Messages dequeued and dispatched, handled or not
    pub processed_count: u64,
    /// Dispatched messages with no registered handler
    pub unhandled_count: u64,
    /// Dispatched messages whose handler panicked
    pub failed_count: u64,
    /// Messages refused because of the actor's state
    pub rejected_count: u64,
    /// Messages dropped by an immediate stop
    pub discarded_count: u64,
    /// Messages ever accepted into the mailbox
    pub enqueued_count: u64,
    /// Messages ever taken off the mailbox for dispatch
    pub dequeued_count: u64,
    /// Last time a message was dispatched (monotonic ms)
    pub last_processed_at_ms: Option<u64>,
}

/// A message handler
///
/// Receives the actor it is registered on and the message being processed.
pub type Handler = Arc<dyn Fn(&Actor, &Message) + Send + Sync>;

/// Per-actor customization hooks
///
/// Both hooks run on the caller's task with no actor lock held.
pub trait ActorBehavior: Send + Sync {
    /// Called once, right after the actor enters `Initialized`
    ///
    /// This is where handlers are normally registered.
    fn on_initialize(&self, _actor: &Actor) {}

    /// Called after every lifecycle transition
    fn on_state_changed(&self, _actor: &Actor, _old: ActorState, _new: ActorState) {}
}

/// Behavior with no hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBehavior;

impl ActorBehavior for NoopBehavior {}

/// State guarded together
#[derive(Debug, Default)]
struct ActorCore {
    state: ActorState,
    mailbox: Mailbox,
    stats: ActorStats,
}

impl ActorCore {
    fn set_state(&mut self, next: ActorState) -> (ActorState, ActorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        let old = self.state;
        self.state = next;
        (old, next)
    }

    /// Finish a graceful drain once the mailbox is empty
    fn settle(&mut self, changes: &mut Vec<(ActorState, ActorState)>) {
        if self.state == ActorState::Stopping && self.mailbox.is_empty() {
            changes.push(self.set_state(ActorState::Stopped));
        }
    }
}

enum Outcome {
    Handled,
    Unhandled,
    Failed,
}

/// An actor: identity, mailbox, handler table and lifecycle
pub struct Actor {
    id: ActorId,
    name: String,
    core: Mutex<ActorCore>,
    handlers: RwLock<HashMap<String, Handler>>,
    owner: RwLock<Weak<Dispatcher>>,
    behavior: Arc<dyn ActorBehavior>,
    /// Clock for statistics timestamps
    time: RwLock<Arc<dyn TimeProvider>>,
    /// Set when the builder was given a clock; otherwise the actor adopts
    /// the clock of the dispatcher it is registered with
    time_pinned: bool,
}

impl Actor {
    /// Create an actor with no hooks
    ///
    /// Timestamps come from the wall clock until the actor is registered,
    /// then from the dispatcher's time provider.
    pub fn new(name: impl Into<String>) -> Self {
        ActorBuilder::new(name).build()
    }

    /// Create an actor with the given hooks
    pub fn with_behavior(name: impl Into<String>, behavior: impl ActorBehavior + 'static) -> Self {
        ActorBuilder::new(name).behavior(behavior).build()
    }

    /// Start building an actor
    pub fn builder(name: impl Into<String>) -> ActorBuilder {
        ActorBuilder::new(name)
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ActorState {
        self.core.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ActorState::Running
    }

    /// Number of pending messages
    pub fn mailbox_len(&self) -> usize {
        self.core.lock().mailbox.len()
    }

    /// Check if at least one message is pending
    pub fn has_messages(&self) -> bool {
        !self.core.lock().mailbox.is_empty()
    }

    /// Check if the dispatcher may step this actor right now
    pub fn is_schedulable(&self) -> bool {
        let core = self.core.lock();
        core.state.is_runnable() && !core.mailbox.is_empty()
    }

    /// Snapshot of this actor's counters
    ///
    /// Every accepted message is accounted for exactly once:
    /// `enqueued_count == dequeued_count + discarded_count + mailbox_len()`.
    pub fn stats(&self) -> ActorStats {
        let core = self.core.lock();
        ActorStats {
            enqueued_count: core.mailbox.enqueued_count(),
            dequeued_count: core.mailbox.dequeued_count(),
            ..core.stats.clone()
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Move from `Created` to `Initialized` and run the initialize hook
    pub fn initialize(&self) -> Result<()> {
        self.advance("initialize", ActorState::Created, ActorState::Initialized)?;
        self.behavior.on_initialize(self);
        Ok(())
    }

    /// Move from `Initialized` to `Running`
    pub fn start(&self) -> Result<()> {
        self.advance("start", ActorState::Initialized, ActorState::Running)
    }

    /// Begin a graceful stop
    ///
    /// The actor keeps accepting and processing messages until its mailbox
    /// is empty, then becomes `Stopped`. Stopping an actor that is already
    /// stopping or stopped is a no-op.
    pub fn stop(&self) -> Result<()> {
        let changes = {
            let mut core = self.core.lock();
            if matches!(core.state, ActorState::Stopping | ActorState::Stopped) {
                return Ok(());
            }
            let mut changes = vec![core.set_state(ActorState::Stopping)];
            core.settle(&mut changes);
            changes
        };

        info!(actor_id = %self.id, name = %self.name, "Actor stopping");
        self.notify(&changes);
        Ok(())
    }

    /// Discard all pending messages and become `Stopped` at once
    ///
    /// Discarded messages are counted in [`ActorStats::discarded_count`].
    pub fn stop_immediately(&self) -> Result<()> {
        let (change, discarded) = {
            let mut core = self.core.lock();
            if core.state == ActorState::Stopped {
                return Ok(());
            }
            let discarded = core.mailbox.drain().len();
            core.stats.discarded_count += discarded as u64;
            (core.set_state(ActorState::Stopped), discarded)
        };

        info!(
            actor_id = %self.id,
            name = %self.name,
            discarded,
            "Actor stopped immediately"
        );
        self.notify(&[change]);
        Ok(())
    }

    fn advance(&self, operation: &'static str, from: ActorState, to: ActorState) -> Result<()> {
        let change = {
            let mut core = self.core.lock();
            if core.state != from {
                let state = core.state;
                drop(core);
                warn!(
                    actor_id = %self.id,
                    name = %self.name,
                    operation,
                    state = %state,
                    "Invalid lifecycle transition"
                );
                return Err(Error::invalid_transition(self.name.as_str(), operation, state));
            }
            core.set_state(to)
        };

        self.notify(&[change]);
        Ok(())
    }

    fn notify(&self, changes: &[(ActorState, ActorState)]) {
        for &(old, new) in changes {
            debug!(
                actor_id = %self.id,
                name = %self.name,
                from = %old,
                to = %new,
                "Actor state changed"
            );
            self.behavior.on_state_changed(self, old, new);
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Register the handler for a message type, replacing any previous one
    pub fn register_handler<F>(&self, message_type: impl Into<String>, handler: F)
    where
        F: Fn(&Actor, &Message) + Send + Sync + 'static,
    {
        let message_type = message_type.into();
        debug_assert!(!message_type.is_empty(), "message type must not be empty");
        self.handlers.write().insert(message_type, Arc::new(handler));
    }

    /// Remove the handler for a message type
    pub fn remove_handler(&self, message_type: &str) -> bool {
        self.handlers.write().remove(message_type).is_some()
    }

    pub fn has_handler(&self, message_type: &str) -> bool {
        self.handlers.read().contains_key(message_type)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Enqueue a message
    ///
    /// Accepted only while `Running` or `Stopping`; otherwise the message
    /// is dropped, counted as rejected and reported as an error.
    pub fn receive(&self, message: Message) -> Result<()> {
        self.enqueue(message, |state| state.accepts_messages())
            .map_err(|state| Error::MessageRejected {
                actor: self.name.clone(),
                state: state.to_string(),
            })
    }

    /// Enqueue a routed message; only a `Running` actor accepts it
    pub(crate) fn receive_routed(&self, message: Message) -> Result<()> {
        self.enqueue(message, |state| state == ActorState::Running)
            .map_err(|state| Error::ActorNotRunning {
                id: self.id.to_string(),
                state: state.to_string(),
            })
    }

    fn enqueue(
        &self,
        message: Message,
        admit: impl Fn(ActorState) -> bool,
    ) -> std::result::Result<(), ActorState> {
        let mut core = self.core.lock();
        if !admit(core.state) {
            core.stats.rejected_count += 1;
            let state = core.state;
            drop(core);
            warn!(
                actor_id = %self.id,
                name = %self.name,
                message_type = %message.message_type(),
                state = %state,
                "Message rejected"
            );
            return Err(state);
        }

        core.mailbox.push(message);
        Ok(())
    }

    /// Dequeue one message and dispatch it to its handler
    ///
    /// Returns true if a message was dispatched, whether or not a handler
    /// was registered for it. A stopping actor whose mailbox runs empty
    /// becomes `Stopped` here.
    pub fn process_next_message(&self) -> bool {
        let mut changes = Vec::new();
        let message = {
            let mut core = self.core.lock();
            if !core.state.is_runnable() {
                return false;
            }
            match core.mailbox.pop() {
                Some(message) => message,
                None => {
                    core.settle(&mut changes);
                    drop(core);
                    self.notify(&changes);
                    return false;
                }
            }
        };

        let outcome = self.dispatch(&message);

        {
            let mut core = self.core.lock();
            let stats = &mut core.stats;
            stats.processed_count += 1;
            match outcome {
                Outcome::Handled => {}
                Outcome::Unhandled => stats.unhandled_count += 1,
                Outcome::Failed => stats.failed_count += 1,
            }
            stats.last_processed_at_ms = Some(self.time.read().monotonic_ms());
            core.settle(&mut changes);
        }

        self.notify(&changes);
        true
    }

    fn dispatch(&self, message: &Message) -> Outcome {
        let handler = self.handlers.read().get(message.message_type()).cloned();
        let Some(handler) = handler else {
            warn!(
                actor_id = %self.id,
                name = %self.name,
                message_type = %message.message_type(),
                "No handler for message type"
            );
            return Outcome::Unhandled;
        };

        match catch_unwind(AssertUnwindSafe(|| handler(self, message))) {
            Ok(()) => Outcome::Handled,
            Err(panic) => {
                error!(
                    actor_id = %self.id,
                    name = %self.name,
                    message_type = %message.message_type(),
                    panic = %panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                Outcome::Failed
            }
        }
    }

    /// Copy of the message at the head of the mailbox
    ///
    /// Returns [`Message::empty`] when nothing is pending.
    pub fn peek_next_message(&self) -> Message {
        self.core
            .lock()
            .mailbox
            .peek()
            .cloned()
            .unwrap_or_else(Message::empty)
    }

    /// Copy of the first pending message with the highest priority
    ///
    /// Returns [`Message::empty`] when nothing is pending.
    pub fn peek_highest_priority_message(&self) -> Message {
        self.core
            .lock()
            .mailbox
            .peek_highest_priority()
            .cloned()
            .unwrap_or_else(Message::empty)
    }

    // =========================================================================
    // Dispatcher access
    // =========================================================================

    /// The dispatcher this actor is registered with, if it still exists
    pub fn owner(&self) -> Option<Arc<Dispatcher>> {
        self.owner.read().upgrade()
    }

    /// Route a message to another actor through the owning dispatcher
    ///
    /// An unset sender becomes this actor's id and the target is always
    /// `target`. Delivery is fire-and-forget: if the dispatcher drops the
    /// message (unknown or non-running target) this still returns `Ok`.
    /// Fails only when the owning dispatcher no longer exists.
    pub fn send(&self, target: ActorId, message: Message) -> Result<()> {
        let Some(dispatcher) = self.owner() else {
            warn!(
                actor_id = %self.id,
                target = %target,
                "Cannot send: dispatcher no longer exists"
            );
            return Err(Error::DispatcherGone);
        };

        let sender = message.sender_id().unwrap_or(self.id);
        let message = message.readdressed(Some(sender), Some(target));
        if let Err(e) = dispatcher.deliver_message(message) {
            debug!(actor_id = %self.id, target = %target, error = %e, "Message dropped");
        }
        Ok(())
    }

    /// Create a hook-less actor and register it with the owning dispatcher
    pub fn create_child(&self, name: impl Into<String>) -> Result<Arc<Actor>> {
        self.create_child_with(name, NoopBehavior)
    }

    /// Create an actor with the given hooks and register it with the owning
    /// dispatcher
    ///
    /// The child shares the dispatcher's time provider. If the dispatcher
    /// loop is running, the child is initialized and started immediately.
    pub fn create_child_with(
        &self,
        name: impl Into<String>,
        behavior: impl ActorBehavior + 'static,
    ) -> Result<Arc<Actor>> {
        let Some(dispatcher) = self.owner() else {
            warn!(actor_id = %self.id, "Cannot create child: dispatcher no longer exists");
            return Err(Error::DispatcherGone);
        };

        let child = Arc::new(
            ActorBuilder::new(name)
                .behavior(behavior)
                .time(dispatcher.time())
                .build(),
        );
        dispatcher.register_actor(child.clone())?;

        debug!(parent = %self.id, child = %child.id, name = %child.name, "Child actor created");
        Ok(child)
    }

    /// Record the owning dispatcher
    ///
    /// Fails if another dispatcher that is still alive already owns this
    /// actor. An actor built without an explicit clock switches to the
    /// dispatcher's time provider.
    pub(crate) fn bind(&self, dispatcher: &Arc<Dispatcher>) -> Result<()> {
        let mut owner = self.owner.write();
        if let Some(current) = owner.upgrade() {
            if !Arc::ptr_eq(&current, dispatcher) {
                return Err(Error::ActorOwnedElsewhere {
                    id: self.id.to_string(),
                });
            }
        }
        *owner = Arc::downgrade(dispatcher);
        if !self.time_pinned {
            *self.time.write() = dispatcher.time();
        }
        Ok(())
    }

    pub(crate) fn unbind(&self) {
        *self.owner.write() = Weak::new();
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &core.state)
            .field("mailbox_len", &core.mailbox.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn wall_clock() -> Arc<dyn TimeProvider> {
    Arc::new(WallClockTime::new())
}

/// Builder for [`Actor`]
pub struct ActorBuilder {
    name: String,
    behavior: Arc<dyn ActorBehavior>,
    time: Option<Arc<dyn TimeProvider>>,
}

impl ActorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: Arc::new(NoopBehavior),
            time: None,
        }
    }

    /// Set the lifecycle hooks
    pub fn behavior(mut self, behavior: impl ActorBehavior + 'static) -> Self {
        self.behavior = Arc::new(behavior);
        self
    }

    /// Set hooks that the caller keeps a handle to
    pub fn shared_behavior(mut self, behavior: Arc<dyn ActorBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set the time provider used for statistics timestamps
    ///
    /// Without one the actor starts on the wall clock and adopts the time
    /// provider of the dispatcher it is registered with.
    pub fn time(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn build(self) -> Actor {
        debug_assert!(
            self.name.len() <= ACTOR_NAME_LENGTH_BYTES_MAX,
            "actor name exceeds ACTOR_NAME_LENGTH_BYTES_MAX"
        );

        Actor {
            id: ActorId::generate(),
            name: self.name,
            core: Mutex::new(ActorCore::default()),
            handlers: RwLock::new(HashMap::new()),
            owner: RwLock::new(Weak::new()),
            behavior: self.behavior,
            time_pinned: self.time.is_some(),
            time: RwLock::new(self.time.unwrap_or_else(wall_clock)),
        }
    }
}
