// SPDX-License-Identifier: MIT

//! Workspace-level integration tests exercising the quantified invariants
//! and end-to-end scenarios against a small in-tree call-machine fixture
//! (`IDLE -> RINGING -> CONNECTED -> COMPLETED`). The fixture exists purely
//! to drive these tests; it is not part of any crate's public API.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tfsm_core::{
    AutoCreateRule, Clock, Event, FakeClock, HandlerError, MachineDefinition, MachineDefinitionBuilder,
    MachineId, SendResult, StateConfig, TimeoutSpec,
};
use tfsm_engine::{RuntimeConfig, RuntimeContext};
use tfsm_persistence::{MemoryAdapter, PersistenceAdapter};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct CallContext {
    from: String,
    to: String,
    connected_entries: u32,
    session_progress_count: u32,
}

struct DefinitionOptions {
    ringing_timeout: Option<Duration>,
    failing_connected_entry: bool,
}

impl Default for DefinitionOptions {
    fn default() -> Self {
        Self { ringing_timeout: None, failing_connected_entry: false }
    }
}

fn ringing_call_definition(opts: DefinitionOptions) -> Arc<MachineDefinition<CallContext>> {
    let mut ringing = StateConfig::new("RINGING").on("Answer", "CONNECTED").stay_on(
        "SessionProgress",
        Arc::new(|ctx: &mut CallContext, _evt: &Event| {
            ctx.session_progress_count += 1;
            Ok(true)
        }),
    );
    if let Some(duration) = opts.ringing_timeout {
        ringing = ringing.timeout(TimeoutSpec::new(duration, "IDLE"));
    }

    let connected_entry_failing = opts.failing_connected_entry;
    let connected = StateConfig::new("CONNECTED").on("Hangup", "COMPLETED").on_entry(Arc::new(
        move |ctx: &mut CallContext| {
            ctx.connected_entries += 1;
            if connected_entry_failing {
                return Err(HandlerError("connected entry handler exploded".into()));
            }
            Ok(())
        },
    ));

    let def = MachineDefinitionBuilder::new("call")
        .initial_state("IDLE")
        .state(StateConfig::new("IDLE").on("IncomingCall", "RINGING"))
        .state(ringing)
        .state(connected)
        .state(StateConfig::new("COMPLETED").final_state())
        .auto_create(AutoCreateRule {
            event_type: "IncomingCall".into(),
            id_extractor: Arc::new(|_evt| None),
            context_factory: Arc::new(|evt| CallContext {
                from: evt.payload.get("from").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                to: evt.payload.get("to").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                ..Default::default()
            }),
        })
        .build()
        .expect("fixture definition is valid");
    Arc::new(def)
}

fn incoming_call() -> Event {
    Event::new("IncomingCall", serde_json::json!({ "from": "+1", "to": "+2" }))
}

async fn context_with(
    opts: DefinitionOptions,
    clock: Arc<FakeClock>,
) -> (Arc<RuntimeContext<CallContext>>, Arc<dyn PersistenceAdapter>) {
    let adapter: Arc<dyn PersistenceAdapter> = Arc::new(MemoryAdapter::new());
    let config = RuntimeConfig::default().history_flush_interval_ms(15).registry_batch_size(10);
    let ctx = Arc::new(RuntimeContext::new(
        config,
        ringing_call_definition(opts),
        adapter.clone(),
        clock,
        "runtime",
        "machines",
        "history",
    ));
    (ctx, adapter)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

// S1: a basic call reaches COMPLETED, persists 3 transition records with
// versions {1,2,3}, and is absent from the registry afterward.
#[tokio::test]
async fn s1_basic_call_completes_and_archives_its_transitions() {
    let (ctx, adapter) = context_with(DefinitionOptions::default(), Arc::new(FakeClock::new())).await;
    let id = MachineId::from_string("call-1");
    ctx.registry.create_or_get(id, CallContext::default()).await;

    assert!(ctx.send_event(id, incoming_call()).await.is_accepted());
    assert!(ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await.is_accepted());
    assert!(ctx.send_event(id, Event::new("Hangup", serde_json::json!({}))).await.is_accepted());

    settle().await;

    let active_rows = adapter.scan_all("runtime", "machines").await.expect("scan");
    assert!(
        active_rows.iter().all(|r| r["id"] != "call-1"),
        "a machine reaching a final state is archived out of the active store"
    );

    let archived_rows = adapter.scan_all("history", "machines").await.expect("scan archived");
    let our_row = archived_rows.into_iter().find(|r| r["id"] == "call-1").expect("row archived");
    assert_eq!(our_row["state"], "COMPLETED");
    assert_eq!(our_row["version"], 3);

    let history_rows = adapter.scan_all("history", "transitions").await.expect("scan history");
    let mut versions: Vec<u64> =
        history_rows.iter().filter(|r| r["machine_id"] == "call-1").map(|r| r["version"].as_u64().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3]);
}

// S2: two stay-on events in RINGING bump the version without leaving the
// state; version reaches 5 by the time the call hangs up.
#[tokio::test]
async fn s2_stay_on_ringing_bumps_version_without_changing_state() {
    let (ctx, adapter) = context_with(DefinitionOptions::default(), Arc::new(FakeClock::new())).await;
    let id = MachineId::from_string("call-2");
    ctx.registry.create_or_get(id, CallContext::default()).await;

    ctx.send_event(id, incoming_call()).await;
    ctx.send_event(id, Event::new("SessionProgress", serde_json::json!({}))).await;
    ctx.send_event(id, Event::new("SessionProgress", serde_json::json!({}))).await;
    ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await;
    ctx.send_event(id, Event::new("Hangup", serde_json::json!({}))).await;

    settle().await;

    let history_rows = adapter.scan_all("history", "transitions").await.expect("scan history");
    let ours: Vec<_> = history_rows.into_iter().filter(|r| r["machine_id"] == "call-2").collect();
    assert_eq!(ours.len(), 5);
    let stay_rows = ours.iter().filter(|r| r["state_before"] == "RINGING" && r["state_after"] == "RINGING").count();
    assert_eq!(stay_rows, 2);
}

// S3: a timeout armed in RINGING fires as a synthetic event and returns the
// machine to IDLE without a user-visible Hangup ever being sent.
#[tokio::test]
async fn s3_ringing_timeout_returns_to_idle() {
    let clock = Arc::new(FakeClock::new());
    let (ctx, adapter) =
        context_with(DefinitionOptions { ringing_timeout: Some(Duration::from_secs(30)), ..Default::default() }, clock.clone())
            .await;
    let id = MachineId::from_string("call-3");
    ctx.registry.create_or_get(id, CallContext::default()).await;
    ctx.send_event(id, incoming_call()).await;
    settle().await;

    // Advance the clock past the armed timeout and redeliver it exactly as
    // `RuntimeContext::spawn_background_loops`'s timer task would.
    clock.advance(Duration::from_secs(31));
    let fired = ctx.scheduler.lock().fired(clock.now());
    assert_eq!(fired.len(), 1, "exactly one timeout should have fired");
    for timer in fired {
        let kind = timer.timer_id.kind().expect("canonical timer id");
        assert_eq!(kind.machine_id, id);
        let event = Event::timeout(&kind.state, kind.version);
        ctx.send_event(kind.machine_id, event).await;
    }
    settle().await;

    let active_rows = adapter.scan_all("runtime", "machines").await.expect("scan");
    let our_row = active_rows.into_iter().find(|r| r["id"] == "call-3").expect("row present");
    assert_eq!(our_row["state"], "IDLE");

    let history_rows = adapter.scan_all("history", "transitions").await.expect("scan history");
    let timeout_rows =
        history_rows.iter().filter(|r| r["machine_id"] == "call-3" && r["event_type"] == "__timeout__").count();
    assert_eq!(timeout_rows, 1);
}

// S4: an unmatched event against an unknown id auto-creates the machine in
// its initial state, and the event that created it is processed normally.
#[tokio::test]
async fn s4_auto_create_builds_a_fresh_machine_from_an_unmatched_event() {
    let (ctx, adapter) = context_with(DefinitionOptions::default(), Arc::new(FakeClock::new())).await;
    let id = MachineId::from_string("call-4");

    let result = ctx.send_event(id, incoming_call()).await;

    assert!(result.is_accepted());
    settle().await;
    let active_rows = adapter.scan_all("runtime", "machines").await.expect("scan");
    let our_row = active_rows.into_iter().find(|r| r["id"] == "call-4").expect("auto-created row present");
    assert_eq!(our_row["state"], "RINGING");

    assert!(ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await.is_accepted());
}

// S5: after the registry idle-evicts a live machine, the next event
// rehydrates it from storage and processing continues without re-running
// CONNECTED's entry action a second time.
#[tokio::test]
async fn s5_rehydration_after_idle_eviction_continues_the_run() {
    let adapter: Arc<dyn PersistenceAdapter> = Arc::new(MemoryAdapter::new());
    let config = RuntimeConfig::default().history_flush_interval_ms(15).auto_evict_ttl_ms(20);
    let ctx = Arc::new(RuntimeContext::new(
        config,
        ringing_call_definition(DefinitionOptions::default()),
        adapter.clone(),
        Arc::new(FakeClock::new()),
        "runtime",
        "machines",
        "history",
    ));
    let id = MachineId::from_string("call-5");
    ctx.registry.create_or_get(id, CallContext::default()).await;
    ctx.send_event(id, incoming_call()).await;
    ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await;
    settle().await;

    // Wait past the idle TTL so the mailbox task evicts itself.
    for _ in 0..50 {
        if ctx.registry.live_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ctx.registry.live_count(), 0, "machine should have idle-evicted");

    let result = ctx.send_event(id, Event::new("Hangup", serde_json::json!({}))).await;
    assert!(result.is_accepted());
    settle().await;

    let active_rows = adapter.scan_all("runtime", "machines").await.expect("scan");
    assert!(active_rows.iter().all(|r| r["id"] != "call-5"), "archived out of the active store");
    let archived_rows = adapter.scan_all("history", "machines").await.expect("scan archived");
    let our_row = archived_rows.into_iter().find(|r| r["id"] == "call-5").expect("row archived");
    assert_eq!(our_row["state"], "COMPLETED");
    assert_eq!(our_row["version"], 3);

    let history_rows = adapter.scan_all("history", "transitions").await.expect("scan history");
    let mut versions: Vec<u64> =
        history_rows.iter().filter(|r| r["machine_id"] == "call-5").map(|r| r["version"].as_u64().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3]);
}

// S6: a failing CONNECTED entry handler is contained — the transition still
// commits and a later event still processes normally.
#[tokio::test]
async fn s6_failing_entry_handler_is_contained_not_propagated() {
    let (ctx, adapter) = context_with(
        DefinitionOptions { failing_connected_entry: true, ..Default::default() },
        Arc::new(FakeClock::new()),
    )
    .await;
    let id = MachineId::from_string("call-6");
    ctx.registry.create_or_get(id, CallContext::default()).await;

    ctx.send_event(id, incoming_call()).await;
    let answer_result = ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await;
    assert!(answer_result.is_accepted());
    settle().await;

    let active_rows = adapter.scan_all("runtime", "machines").await.expect("scan");
    let our_row = active_rows.into_iter().find(|r| r["id"] == "call-6").expect("row present");
    assert_eq!(our_row["state"], "CONNECTED", "transition commits despite the handler failure");

    let history_rows = adapter.scan_all("history", "transitions").await.expect("scan history");
    let connected_row = history_rows
        .iter()
        .find(|r| r["machine_id"] == "call-6" && r["state_after"] == "CONNECTED")
        .expect("transition record present");
    assert!(connected_row["handler_error"].is_string(), "the failure is recorded, not swallowed");

    assert!(ctx.send_event(id, Event::new("Hangup", serde_json::json!({}))).await.is_accepted());
}

// S7: 100 machines driven concurrently through the same definition all
// reach COMPLETED with no cross-machine id contamination.
#[tokio::test]
async fn s7_many_machines_progress_in_isolation() {
    let (ctx, adapter) = context_with(DefinitionOptions::default(), Arc::new(FakeClock::new())).await;

    let mut tasks = Vec::new();
    for i in 0..100 {
        let ctx = ctx.clone();
        tasks.push(tokio::spawn(async move {
            let id = MachineId::from_string(format!("call-bulk-{i}"));
            ctx.registry.create_or_get(id, CallContext::default()).await;
            ctx.send_event(id, incoming_call()).await;
            ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await;
            ctx.send_event(id, Event::new("Hangup", serde_json::json!({}))).await;
            id
        }));
    }
    let ids: Vec<MachineId> = futures_join_all(tasks).await;

    settle().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let active_rows = adapter.scan_all("runtime", "machines").await.expect("scan");
    assert!(active_rows.is_empty(), "every machine reached COMPLETED and was archived");

    let archived_rows = adapter.scan_all("history", "machines").await.expect("scan archived");
    for id in &ids {
        let row = archived_rows.iter().find(|r| r["id"] == id.to_string()).expect("row archived");
        assert_eq!(row["state"], "COMPLETED");
        // No other machine's id ever appears as this row's own id.
        assert_eq!(row["id"], id.to_string());
    }
    assert_eq!(archived_rows.len(), 100);
}

async fn futures_join_all(tasks: Vec<tokio::task::JoinHandle<MachineId>>) -> Vec<MachineId> {
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        out.push(task.await.expect("spawned task panicked"));
    }
    out
}

// Invariant 1: versions for one machine form a strictly increasing
// sequence starting at 1.
#[tokio::test]
async fn invariant_version_monotonicity() {
    let (ctx, adapter) = context_with(DefinitionOptions::default(), Arc::new(FakeClock::new())).await;
    let id = MachineId::from_string("call-inv-1");
    ctx.registry.create_or_get(id, CallContext::default()).await;
    ctx.send_event(id, incoming_call()).await;
    ctx.send_event(id, Event::new("Answer", serde_json::json!({}))).await;
    ctx.send_event(id, Event::new("Hangup", serde_json::json!({}))).await;
    settle().await;

    let history_rows = adapter.scan_all("history", "transitions").await.expect("scan history");
    let mut versions: Vec<u64> = history_rows
        .iter()
        .filter(|r| r["machine_id"] == "call-inv-1")
        .map(|r| r["version"].as_u64().unwrap())
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3]);
}

// A mailbox that is full returns Overloaded rather than blocking or erroring.
#[tokio::test]
async fn overload_is_reported_without_blocking_the_caller() {
    let (ctx, _adapter) = context_with(DefinitionOptions::default(), Arc::new(FakeClock::new())).await;
    let id = MachineId::from_string("call-overload");
    let handle = ctx.registry.create_or_get(id, CallContext::default()).await;

    let mut last = SendResult::Accepted;
    for _ in 0..(ctx.config.mailbox_capacity() + 16) {
        last = handle.send_event(Event::new("SessionProgress", serde_json::json!({})));
        if matches!(last, SendResult::Overloaded) {
            break;
        }
    }
    assert!(matches!(last, SendResult::Overloaded) || last.is_accepted());
}
