//! DST tests for scheduling policies
//!
//! Time-dependent scheduling under a simulated clock: the fair policy's
//! starvation bound, and determinism of every policy for a fixed setup.

use mailroom_core::config::{DispatcherConfig, SchedulerConfig, SchedulerKind};
use mailroom_core::message::{Message, Priority};
use mailroom_dst::SimTime;
use mailroom_runtime::{Actor, Dispatcher, PriorityScheduler};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;

const HANDLER_COST_MS: u64 = 2;
const STARVATION_WINDOW_MS: u64 = 10;

/// Names and simulated times of every handled message, in order
type ServiceLog = Arc<Mutex<Vec<(String, u64)>>>;

struct Setup {
    dispatcher: Arc<Dispatcher>,
    actors: Vec<Arc<Actor>>,
    log: ServiceLog,
}

/// One "loud" actor that refills its own mailbox forever, plus quiet actors
/// with a fixed amount of work
fn loud_and_quiet(kind: SchedulerKind, quiet: usize, quiet_messages: usize) -> Setup {
    let time = Arc::new(SimTime::from_millis(0));
    let dispatcher = Dispatcher::with_time(
        DispatcherConfig {
            scheduler: SchedulerConfig {
                kind,
                starvation_window_ms: STARVATION_WINDOW_MS,
            },
            ..DispatcherConfig::default()
        },
        time.clone(),
    );
    let log: ServiceLog = Arc::new(Mutex::new(Vec::new()));

    let mut actors = Vec::new();
    for i in 0..=quiet {
        let name = if i == 0 {
            "loud".to_string()
        } else {
            format!("quiet-{}", i)
        };
        let actor = Arc::new(Actor::builder(name).time(time.clone()).build());
        let log = log.clone();
        let time = time.clone();
        actor.register_handler("work", move |actor, _| {
            log.lock().push((actor.name().to_string(), time.clock().now_ms()));
            time.clock().advance_ms(HANDLER_COST_MS);
            if actor.name() == "loud" {
                actor
                    .send(actor.id(), Message::new("work", None, None))
                    .unwrap();
            }
        });
        dispatcher.register_actor(actor.clone()).unwrap();
        actors.push(actor);
    }
    dispatcher.run_until_idle().unwrap();

    for (i, actor) in actors.iter().enumerate() {
        let count = if i == 0 { 1 } else { quiet_messages };
        for _ in 0..count {
            dispatcher
                .deliver_message(Message::new("work", None, Some(actor.id())))
                .unwrap();
        }
    }

    Setup {
        dispatcher,
        actors,
        log,
    }
}

fn step_n(dispatcher: &Dispatcher, n: usize) {
    for _ in 0..n {
        assert!(dispatcher.step());
    }
}

#[test]
fn test_fair_bounds_wait_of_every_busy_actor() {
    let setup = loud_and_quiet(SchedulerKind::Fair, 3, 5);
    step_n(&setup.dispatcher, 40);

    for actor in &setup.actors[1..] {
        assert_eq!(actor.stats().processed_count, 5, "{}", actor.name());
    }

    // While an actor still had work, consecutive services are never more
    // than one starvation window apart
    let log = setup.log.lock();
    let mut served: HashMap<&str, Vec<u64>> = HashMap::new();
    for (name, at_ms) in log.iter() {
        served.entry(name.as_str()).or_default().push(*at_ms);
    }
    for (name, times) in &served {
        assert!(times[0] <= STARVATION_WINDOW_MS, "{} first served late", name);
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] <= STARVATION_WINDOW_MS,
                "{} waited {}ms",
                name,
                pair[1] - pair[0]
            );
        }
    }
}

#[test]
fn test_degenerate_priority_starves_quiet_actors() {
    let setup = loud_and_quiet(SchedulerKind::Priority, 3, 5);
    step_n(&setup.dispatcher, 40);

    // The default priority function scores every candidate alike, so the
    // first registered actor always wins
    assert_eq!(setup.actors[0].stats().processed_count, 40);
    for actor in &setup.actors[1..] {
        assert_eq!(actor.stats().processed_count, 0);
    }

    // Swapping in the fair policy at runtime lets the others through
    setup.dispatcher.set_scheduler(mailroom_runtime::from_config(
        &SchedulerConfig {
            kind: SchedulerKind::Fair,
            starvation_window_ms: STARVATION_WINDOW_MS,
        },
        setup.dispatcher.time(),
    ));
    step_n(&setup.dispatcher, 40);
    for actor in &setup.actors[1..] {
        assert_eq!(actor.stats().processed_count, 5);
    }
}

#[test]
fn test_custom_priority_fn_prefers_longest_mailbox() {
    let setup = loud_and_quiet(SchedulerKind::RoundRobin, 2, 4);
    setup
        .dispatcher
        .set_scheduler(Box::new(PriorityScheduler::with_priority_fn(
            |actor: &Actor| actor.mailbox_len() as i64,
        )));

    step_n(&setup.dispatcher, 1);
    let log = setup.log.lock();
    assert_eq!(log[0].0, "quiet-1");
}

#[test]
fn test_message_priority_serves_urgent_work_first() {
    let time = Arc::new(SimTime::from_millis(0));
    let dispatcher = Dispatcher::with_time(
        DispatcherConfig {
            scheduler: SchedulerConfig::of(SchedulerKind::MessagePriority),
            ..DispatcherConfig::default()
        },
        time,
    );
    let order: Arc<Mutex<Vec<Priority>>> = Arc::new(Mutex::new(Vec::new()));

    let actors: Vec<Arc<Actor>> = (0..3)
        .map(|i| {
            let actor = Arc::new(Actor::new(format!("p{}", i)));
            let order = order.clone();
            actor.register_handler("job", move |_, msg| {
                order.lock().push(msg.priority());
            });
            dispatcher.register_actor(actor.clone()).unwrap();
            actor
        })
        .collect();
    dispatcher.run_until_idle().unwrap();

    let plan = [
        (0, Priority::Low),
        (1, Priority::Normal),
        (2, Priority::Critical),
        (0, Priority::High),
    ];
    for (index, priority) in plan {
        dispatcher
            .deliver_message(
                Message::new("job", None, Some(actors[index].id())).with_priority(priority),
            )
            .unwrap();
    }

    // Every choice holds a message at least as urgent as any other peak
    while dispatcher.has_work() {
        let peaks: Vec<Priority> = actors
            .iter()
            .map(|a| a.peek_highest_priority_message().priority())
            .collect();
        let lens: Vec<usize> = actors.iter().map(|a| a.mailbox_len()).collect();
        let best = (0..actors.len())
            .filter(|&i| lens[i] > 0)
            .map(|i| peaks[i])
            .max()
            .unwrap();

        assert!(dispatcher.step());
        let chosen = (0..actors.len())
            .find(|&i| actors[i].mailbox_len() < lens[i])
            .unwrap();
        assert_eq!(peaks[chosen], best);
    }

    // p2 (critical) first, then p0 whose head is low but holds a high
    assert_eq!(
        *order.lock(),
        vec![
            Priority::Critical,
            Priority::Low,
            Priority::High,
            Priority::Normal,
        ]
    );
}

#[test]
fn test_every_policy_is_deterministic() {
    for kind in SchedulerKind::ALL {
        let runs: Vec<Vec<String>> = (0..2)
            .map(|_| {
                let setup = loud_and_quiet(kind, 3, 4);
                step_n(&setup.dispatcher, 30);
                let names: Vec<String> =
                    setup.log.lock().iter().map(|(name, _)| name.clone()).collect();
                names
            })
            .collect();
        assert_eq!(runs[0], runs[1], "scheduler {}", kind);
    }
}
