//! Actor lifecycle tests
//!
//! Lifecycle transitions observed through the state-change hook, driven
//! both directly and through a dispatcher.

use mailroom_core::error::Error;
use mailroom_core::message::Message;
use mailroom_runtime::{Actor, ActorBehavior, ActorState, Dispatcher};
use parking_lot::Mutex;
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

#[derive(Default)]
struct TransitionLog {
    transitions: Mutex<Vec<(ActorState, ActorState)>>,
}

impl TransitionLog {
    fn observed(&self) -> Vec<ActorState> {
        let transitions = self.transitions.lock();
        let mut states = vec![ActorState::Created];
        states.extend(transitions.iter().map(|&(_, new)| new));
        states
    }
}

impl ActorBehavior for TransitionLog {
    fn on_state_changed(&self, _actor: &Actor, old: ActorState, new: ActorState) {
        self.transitions.lock().push((old, new));
    }
}

fn logged_actor(name: &str) -> (Arc<Actor>, Arc<TransitionLog>) {
    let log = Arc::new(TransitionLog::default());
    let actor = Arc::new(Actor::builder(name).shared_behavior(log.clone()).build());
    actor.register_handler("work", |_, _| {});
    (actor, log)
}

const ORDER: [ActorState; 5] = [
    ActorState::Created,
    ActorState::Initialized,
    ActorState::Running,
    ActorState::Stopping,
    ActorState::Stopped,
];

/// Observed states form a subsequence of the canonical order
fn assert_canonical(states: &[ActorState]) {
    let positions: Vec<usize> = states
        .iter()
        .map(|s| ORDER.iter().position(|o| o == s).unwrap())
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "non-canonical lifecycle: {:?}",
        states
    );
}

fn work() -> Message {
    Message::new("work", None, None)
}

// =============================================================================
// Lifecycle scripts
// =============================================================================

fn full_graceful(a: &Actor) {
    a.initialize().unwrap();
    a.start().unwrap();
    a.receive(work()).unwrap();
    a.stop().unwrap();
    while a.process_next_message() {}
}

fn immediate_from_running(a: &Actor) {
    a.initialize().unwrap();
    a.start().unwrap();
    a.receive(work()).unwrap();
    a.stop_immediately().unwrap();
}

fn immediate_from_created(a: &Actor) {
    a.stop_immediately().unwrap();
}

fn graceful_before_start(a: &Actor) {
    a.initialize().unwrap();
    a.stop().unwrap();
}

fn immediate_while_draining(a: &Actor) {
    a.initialize().unwrap();
    a.start().unwrap();
    a.receive(work()).unwrap();
    a.stop().unwrap();
    a.stop_immediately().unwrap();
}

fn illegal_calls_ignored(a: &Actor) {
    let _ = a.start();
    a.initialize().unwrap();
    let _ = a.initialize();
    a.start().unwrap();
    let _ = a.start();
    a.stop().unwrap();
    let _ = a.initialize();
    let _ = a.stop();
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_lifecycle_sequences_are_canonical() {
    let scripts: [(&str, fn(&Actor)); 6] = [
        ("full graceful", full_graceful),
        ("immediate from running", immediate_from_running),
        ("immediate from created", immediate_from_created),
        ("graceful before start", graceful_before_start),
        ("immediate while draining", immediate_while_draining),
        ("illegal calls ignored", illegal_calls_ignored),
    ];

    for (label, script) in scripts {
        let (actor, log) = logged_actor(label);
        script(&actor);
        assert_canonical(&log.observed());
        assert_eq!(actor.state(), ActorState::Stopped, "{}", label);
    }
}

#[test]
fn test_stopped_is_absorbing() {
    let (actor, log) = logged_actor("done");
    actor.stop_immediately().unwrap();
    let before = log.transitions.lock().len();

    assert!(matches!(
        actor.initialize(),
        Err(Error::InvalidLifecycleTransition { .. })
    ));
    assert!(actor.start().unwrap_err().is_benign());
    actor.stop().unwrap();
    actor.stop_immediately().unwrap();

    assert_eq!(actor.state(), ActorState::Stopped);
    assert_eq!(log.transitions.lock().len(), before);
}

#[test]
fn test_receive_never_grows_inactive_mailbox() {
    let (actor, _log) = logged_actor("gate");

    for _ in 0..3 {
        assert!(actor.receive(work()).is_err());
    }
    actor.initialize().unwrap();
    assert!(actor.receive(work()).is_err());
    assert_eq!(actor.mailbox_len(), 0);

    actor.start().unwrap();
    actor.receive(work()).unwrap();
    actor.stop_immediately().unwrap();
    assert!(actor.receive(work()).is_err());
    assert_eq!(actor.mailbox_len(), 0);
    assert_eq!(actor.stats().rejected_count, 5);
}

#[test]
fn test_graceful_stop_waits_for_drain_under_dispatcher() {
    let dispatcher = Dispatcher::new();
    let (actor, log) = logged_actor("drainer");
    let id = actor.id();
    dispatcher.register_actor(actor.clone()).unwrap();
    dispatcher.run_until_idle().unwrap();

    for _ in 0..5 {
        dispatcher
            .deliver_message(Message::new("work", None, Some(id)))
            .unwrap();
    }
    actor.stop().unwrap();

    // Each step keeps the actor stopping until the last message is gone
    for remaining in (1..5).rev() {
        assert!(dispatcher.step());
        assert_eq!(actor.mailbox_len(), remaining);
        assert_eq!(actor.state(), ActorState::Stopping);
    }
    assert!(dispatcher.step());
    assert_eq!(actor.state(), ActorState::Stopped);
    assert_eq!(actor.stats().processed_count, 5);
    assert!(!dispatcher.has_work());

    assert_canonical(&log.observed());
}

#[test]
fn test_stop_immediately_empties_mailbox_regardless_of_content() {
    let dispatcher = Dispatcher::new();
    let (actor, _log) = logged_actor("flushed");
    let id = actor.id();
    dispatcher.register_actor(actor.clone()).unwrap();
    dispatcher.run_until_idle().unwrap();

    for kind in ["work", "unknown", "work"] {
        dispatcher
            .deliver_message(Message::new(kind, None, Some(id)))
            .unwrap();
    }
    actor.stop_immediately().unwrap();

    assert_eq!(actor.mailbox_len(), 0);
    assert_eq!(actor.stats().discarded_count, 3);
    assert_eq!(actor.stats().processed_count, 0);
    assert!(!dispatcher.step());
}

#[test]
fn test_handler_may_stop_its_own_actor() {
    let dispatcher = Dispatcher::new();
    let actor = Arc::new(Actor::new("self-stopper"));
    actor.register_handler("quit", |actor, _| {
        actor.stop().unwrap();
    });
    actor.register_handler("work", |_, _| {});
    let id = actor.id();
    dispatcher.register_actor(actor.clone()).unwrap();
    dispatcher.run_until_idle().unwrap();

    for kind in ["quit", "work", "work"] {
        dispatcher
            .deliver_message(Message::new(kind, None, Some(id)))
            .unwrap();
    }

    assert_eq!(dispatcher.run_until_idle().unwrap(), 3);
    assert_eq!(actor.state(), ActorState::Stopped);
}
