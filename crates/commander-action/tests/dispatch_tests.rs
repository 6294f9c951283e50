use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use commander_action::{
    combine_payload, same_action, trigger, watch, ActionBuilder, Commands, PayloadError,
    PayloadFn, Value, WorkStatus,
};
use commander_core::{SessionEvent, SharedConfig};

const WAIT: Duration = Duration::from_secs(5);

fn commands() -> Commands {
    Commands::new(SharedConfig::default()).unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// Core scenarios
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_double_scenario() {
    let commands = commands();
    commands.set(
        ActionBuilder::new()
            .name("double")
            .payload_value(21)
            .execute_integer(|_, n| Ok(Value::Integer(n * 2)))
            .build(),
        Vec::<String>::new(),
    );

    let work = commands.dispatch("double").unwrap();
    work.wait_timeout(WAIT).await.unwrap();

    let cached = commands.latest_result("double").unwrap();
    assert_eq!(cached.id(), work.id());
    assert_eq!(cached.result(), Value::Integer(42));
    assert_eq!(cached.status(), WorkStatus::Succeeded);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_key_dispatches_help() {
    let commands = commands();
    let mut events = commands.subscribe();

    let dispatcher = commands.get("frobnicate");
    assert!(same_action(dispatcher.action(), &commands.lookup("help").unwrap()));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::UnknownCommand {
            key: "frobnicate".to_string()
        }
    );

    let work = dispatcher.dispatch().unwrap();
    work.wait_timeout(WAIT).await.unwrap();
    assert_eq!(work.name(), "help");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_then_get_until_overwritten() {
    let commands = commands();
    let first = ActionBuilder::new().name("job").build();
    commands.set(Arc::clone(&first), ["j"]);
    commands.set(ActionBuilder::new().name("other").build(), Vec::<String>::new());
    commands.remove(["unrelated"]);

    assert!(same_action(commands.get("job").action(), &first));
    assert!(same_action(commands.get("J").action(), &first));

    let second = ActionBuilder::new().name("job").build();
    commands.set(Arc::clone(&second), Vec::<String>::new());
    assert!(same_action(commands.get("job").action(), &second));
    // The alias still points at the first binding.
    assert!(same_action(commands.get("j").action(), &first));
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_works_complete_in_enqueue_order() {
    let commands = commands();
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..8 {
        let order = Arc::clone(&order);
        commands.set(
            ActionBuilder::new()
                .name(format!("step-{i}"))
                .execute_fn(move |_, _| {
                    std::thread::sleep(Duration::from_millis(2));
                    order.lock().unwrap().push(i);
                    Ok(Value::None)
                })
                .build(),
            Vec::<String>::new(),
        );
    }

    let works: Vec<_> = (0..8)
        .map(|i| commands.dispatch(&format!("step-{i}")).unwrap())
        .collect();
    for work in &works {
        work.wait_timeout(WAIT).await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
    let finished: Vec<_> = works.iter().map(|w| w.finished_at().unwrap()).collect();
    assert!(finished.windows(2).all(|pair| pair[0] <= pair[1]));
}

// =============================================================================
// Skip signal
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_skip_is_complete_without_running_execute() {
    let commands = commands();
    let ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ran);
    commands.set(
        ActionBuilder::new()
            .name("memo")
            .payload_skip("remembered")
            .execute_fn(move |_, _| {
                *flag.lock().unwrap() = true;
                Ok(Value::None)
            })
            .build(),
        Vec::<String>::new(),
    );
    let mut events = commands.subscribe();

    let work = commands.dispatch("memo").unwrap();
    assert!(work.is_complete());
    assert_eq!(work.status(), WorkStatus::Skipped);
    assert_eq!(work.result(), Value::from("remembered"));
    assert_eq!(commands.latest_result("memo").unwrap().id(), work.id());

    // Later work still runs, and the skipped execute never did.
    let help = commands.dispatch("help").unwrap();
    help.wait_timeout(WAIT).await.unwrap();
    assert!(!*ran.lock().unwrap());

    let mut saw_skip = false;
    while let Ok(event) = events.try_recv() {
        saw_skip |= matches!(event, SessionEvent::ExecuteSkipped { ref name } if name == "memo");
    }
    assert!(saw_skip);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_skip_behind_queued_work_stays_latest() {
    let commands = commands();
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock().unwrap();

    let waiting = Arc::clone(&gate);
    commands.set(
        ActionBuilder::new()
            .name("blocker")
            .execute_fn(move |_, _| {
                let _pass = waiting.lock().unwrap();
                Ok(Value::None)
            })
            .build(),
        Vec::<String>::new(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    commands.set(
        ActionBuilder::new()
            .name("flip")
            .payload_fn(move |_| match counted.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(Value::Integer(1)),
                _ => Err(PayloadError::Skip(Value::Integer(2))),
            })
            .execute_fn(|_, payload| Ok(payload))
            .build(),
        Vec::<String>::new(),
    );

    let blocker = commands.dispatch("blocker").unwrap();
    let queued = commands.dispatch("flip").unwrap();
    let skipped = commands.dispatch("flip").unwrap();
    assert_eq!(skipped.status(), WorkStatus::Skipped);
    assert!(!queued.is_complete());

    drop(held);
    blocker.wait_timeout(WAIT).await.unwrap();
    queued.wait_timeout(WAIT).await.unwrap();
    assert_eq!(queued.result(), Value::Integer(1));

    let cached = commands.latest_result("flip").unwrap();
    assert_eq!(cached.id(), skipped.id());
    assert_eq!(cached.result(), Value::Integer(2));
}

// =============================================================================
// Registry deltas
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_deltas_apply_only_after_success() {
    let commands = commands();
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock().unwrap();

    let waiting = Arc::clone(&gate);
    let unlocked = ActionBuilder::new().name("unlocked").build();
    let parent = ActionBuilder::new()
        .name("unlock")
        .execute_fn(move |_, _| {
            let _pass = waiting.lock().unwrap();
            Ok(Value::None)
        })
        .removals(["help"])
        .build();
    commands.set(trigger(parent, vec![unlocked]), Vec::<String>::new());

    let work = commands.dispatch("unlock").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!work.is_complete());
    assert!(commands.lookup("unlocked").is_none());
    assert!(commands.lookup("help").is_some());

    drop(held);
    work.wait_timeout(WAIT).await.unwrap();
    eventually(|| commands.lookup("unlocked").is_some()).await;
    eventually(|| commands.lookup("help").is_none()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_work_applies_no_deltas() {
    let commands = commands();
    let mut events = commands.subscribe();
    let parent = ActionBuilder::new()
        .name("fragile")
        .execute_fn(|_, _| Err(commander_action::ExecuteError::Failed("broken".into())))
        .removals(["help"])
        .build();
    commands.set(
        trigger(parent, vec![ActionBuilder::new().name("bonus").build()]),
        Vec::<String>::new(),
    );

    let work = commands.dispatch("fragile").unwrap();
    work.wait_timeout(WAIT).await.unwrap();
    assert!(work.failure());
    assert_eq!(work.result(), Value::from("Execute failed: broken"));

    // Wait for the completion notice so the waiter has run.
    tokio::time::timeout(WAIT, async {
        loop {
            if let SessionEvent::DispatchFinished { name, .. } = events.recv().await.unwrap() {
                if name == "fragile" {
                    break;
                }
            }
        }
    })
    .await
    .unwrap();
    assert!(commands.lookup("bonus").is_none());
    assert!(commands.lookup("help").is_some());
    assert!(commands.latest_result("fragile").unwrap().failure());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_payload_error_leaves_no_trace() {
    let commands = commands();
    commands.set(
        ActionBuilder::new()
            .name("refuses")
            .payload_fn(|_| Err(PayloadError::Failed("nope".into())))
            .additions({
                let mut additions = BTreeMap::new();
                additions.insert("never".to_string(), ActionBuilder::new().name("never").build());
                additions
            })
            .build(),
        Vec::<String>::new(),
    );

    assert!(commands.dispatch("refuses").is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(commands.latest_result("refuses").is_none());
    assert!(commands.lookup("never").is_none());
}

// =============================================================================
// Watch
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_unlocks_stop_and_stop_is_idempotent() {
    let commands = commands();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let child = ActionBuilder::new()
        .name("poll")
        .payload_value(7)
        .execute_fn(move |_, payload| {
            recorder.lock().unwrap().push(payload.clone());
            Ok(payload)
        })
        .build();
    commands.set(watch(child, Duration::from_millis(30)), Vec::<String>::new());

    let work = commands.dispatch("watch-poll").unwrap();
    work.wait_timeout(WAIT).await.unwrap();
    assert!(work.success());
    eventually(|| commands.lookup("stop-poll").is_some()).await;
    eventually(|| seen.lock().unwrap().len() >= 2).await;

    let stop = commands.dispatch("stop-poll").unwrap();
    stop.wait_timeout(WAIT).await.unwrap();
    assert_eq!(stop.result(), Value::from("stopped"));

    let ticks = seen.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(seen.lock().unwrap().len(), ticks);
    assert!(seen.lock().unwrap().iter().all(|p| *p == Value::Integer(7)));

    let again = commands.dispatch("stop-poll").unwrap();
    again.wait_timeout(WAIT).await.unwrap();
    assert!(again.success());
    assert_eq!(again.result(), Value::from("already stopped"));
    assert!(commands.lookup("stop-poll").is_some());
}

// =============================================================================
// Combinators through the registry
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_combine_payload_dispatch() {
    let commands = commands();
    let mut options: BTreeMap<String, PayloadFn> = BTreeMap::new();
    options.insert(
        "a".to_string(),
        Arc::new(|_: &SharedConfig| Err(PayloadError::Failed("a broke".into()))),
    );
    options.insert("b".to_string(), Arc::new(|_: &SharedConfig| Ok(Value::Integer(7))));
    commands.set(
        ActionBuilder::new()
            .name("both")
            .payload(combine_payload(options))
            .execute_mapping(|_, map| Ok(Value::Mapping(map)))
            .build(),
        Vec::<String>::new(),
    );

    let work = commands.dispatch("both").unwrap();
    work.wait_timeout(WAIT).await.unwrap();
    let result = work.result();
    assert_eq!(result.get("b"), Some(&Value::Integer(7)));
    assert!(matches!(result.get("a"), Some(Value::Error(_))));
}

// =============================================================================
// Introspection
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_introspection() {
    let commands = commands();
    let shared = ActionBuilder::new().name("deploy").tags(["ops", "risky"]).build();
    commands.set(Arc::clone(&shared), ["ship", "push"]);
    commands.set(
        ActionBuilder::new().name("status").tags(["ops"]).build(),
        Vec::<String>::new(),
    );

    assert_eq!(commands.aliases("ship"), vec!["deploy", "push", "ship"]);
    let ops: Vec<String> = commands.filter_actions(["ops"]).iter().map(|a| a.name()).collect();
    assert_eq!(ops, vec!["deploy", "status"]);
    let tags = commands.known_tags();
    assert!(tags.contains(&"risky".to_string()));

    commands.remove(["push"]);
    let known = commands.known_commands();
    assert!(known.contains(&"ship".to_string()));
    assert!(!known.contains(&"push".to_string()));
}
