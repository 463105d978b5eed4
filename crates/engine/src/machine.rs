// SPDX-License-Identifier: MIT

//! The per-entity FSM engine (spec §4.7, C7).
//!
//! Each [`MachineHandle`] owns a bounded mailbox drained by a single spawned
//! task — directly grounded on the teacher's per-agent single-writer
//! execution model (`Runtime<S, A, N, C>`, `crates/engine/src/runtime/monitor.rs`):
//! one task, one owner, no shared mutable state to race on.

use crate::monitoring::{ObserverMessage, StateChange};
use crate::observer::ObserverBus;
use crate::scheduler::TimeoutScheduler;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tfsm_core::{
    Clock, ContextGraph, Event, GraphNode, HandlerError, MachineDefinition, MachineId,
    MachineInstance, NodeRole, RuntimeError, SendResult, TimerId, TransitionRecord,
};
use tfsm_persistence::{ArchivalService, BatchLogger, HistoryRow, PersistenceAdapter, PlaybackRing};
use tokio::sync::{mpsc, watch};

/// Soft deadline for a single entry/exit/stay handler invocation. Expiry is
/// warn-logged, not treated as a failure (spec §4.7). Handlers are plain
/// synchronous closures, so this bounds wall time spent *polling* the
/// wrapping future, not the closure call itself — the closure has already
/// run by the time `tokio::time::timeout` starts waiting.
const HANDLER_SOFT_DEADLINE: Duration = Duration::from_secs(2);

/// Bounded-retry backoff before a persistence failure is escalated to
/// `PersistenceFatal` (spec §7).
const PERSISTENCE_MAX_ATTEMPTS: u32 = 3;
const PERSISTENCE_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    Suspended,
    Stopped,
}

/// Everything [`process_event`] needs beyond the event itself and the
/// machine's own state — passed explicitly rather than reached for through
/// a global (REDESIGN FLAGS "no singletons").
pub struct MachineDeps<Ctx> {
    pub definition: Arc<MachineDefinition<Ctx>>,
    pub clock: Arc<dyn Clock>,
    pub adapter: Arc<dyn PersistenceAdapter>,
    pub database: String,
    pub table: String,
    pub history: Arc<BatchLogger<HistoryRow>>,
    pub scheduler: Arc<SyncMutex<TimeoutScheduler>>,
    pub observer: Arc<ObserverBus>,
    /// Moves a machine's row into the history store once it reaches a
    /// final state (spec §4.5).
    pub archival: Arc<ArchivalService>,
    /// Per-machine-type replay ring (spec §4.6); recording is a no-op when
    /// `RuntimeConfig::playback_enabled` is false.
    pub playback: Arc<SyncMutex<PlaybackRing>>,
    /// How long the mailbox may sit empty before the task evicts itself
    /// (spec §6 `auto_evict_ttl_ms`). Every transition is already persisted,
    /// so an idle-evicted machine rehydrates from storage identically to one
    /// evicted for reaching a final/offline state.
    pub idle_ttl: Duration,
}

/// Handle used by the registry to talk to a running machine. Cheap to
/// clone; cloning does not clone the machine itself.
#[derive(Clone)]
pub struct MachineHandle {
    pub id: MachineId,
    sender: mpsc::Sender<Event>,
    lifecycle: watch::Receiver<Lifecycle>,
}

impl MachineHandle {
    /// Submits an event without waiting for it to be processed. Returns
    /// `Overloaded` rather than blocking when the mailbox is full
    /// (REDESIGN FLAGS: `SendResult` replaces exception-for-control-flow).
    pub fn send_event(&self, event: Event) -> SendResult {
        match self.sender.try_send(event) {
            Ok(()) => SendResult::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => SendResult::Overloaded,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                SendResult::Rejected("machine has stopped".into())
            }
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }
}

/// Runs one machine's mailbox-drain loop on a spawned task. `Ctx` must be
/// `Send + Sync` so the instance can live on the spawned task.
pub fn spawn<Ctx>(
    mut instance: MachineInstance<Ctx>,
    deps: MachineDeps<Ctx>,
    mailbox_capacity: usize,
) -> MachineHandle
where
    Ctx: Send + Sync + Serialize + 'static,
{
    let (sender, mut receiver) = mpsc::channel::<Event>(mailbox_capacity);
    let (lifecycle_tx, lifecycle_rx) = watch::channel(Lifecycle::Idle);
    let id = instance.id;

    tokio::spawn(async move {
        let _ = lifecycle_tx.send(Lifecycle::Running);
        loop {
            let event = match tokio::time::timeout(deps.idle_ttl, receiver.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_elapsed) => {
                    tracing::debug!(machine_id = %instance.id, "idle timeout elapsed, evicting");
                    break;
                }
            };
            if !instance.is_active() {
                tracing::warn!(machine_id = %instance.id, "dropping event for degraded/final machine");
                continue;
            }
            if let Err(error) = process_event(&mut instance, &deps, event).await {
                tracing::warn!(machine_id = %instance.id, %error, "event processing failed");
            }
            // Data flow (spec §4): entering an offline state evicts the
            // machine once its persist has completed; a final state hands
            // the row off to archival (`ArchivalService::scan_and_archive_finals`
            // sweeps it separately). Both stop this task so the registry can
            // drop its handle; a later event rehydrates from storage.
            let should_stop = deps
                .definition
                .state(&instance.state)
                .map(|s| s.is_final || s.is_offline)
                .unwrap_or(false);
            if should_stop {
                break;
            }
        }
        let _ = lifecycle_tx.send(Lifecycle::Stopped);
    });

    MachineHandle { id, sender, lifecycle: lifecycle_rx }
}

async fn process_event<Ctx>(
    instance: &mut MachineInstance<Ctx>,
    deps: &MachineDeps<Ctx>,
    event: Event,
) -> Result<(), RuntimeError>
where
    Ctx: Send + Sync + Serialize + 'static,
{
    // Invariant 6: a synthetic timeout event carries the (state, version) it
    // was armed for; a stale fire that raced a real transition is dropped.
    if event.is_timeout() {
        let scheduled_version = event.payload.get("version").and_then(|v| v.as_u64());
        if scheduled_version != Some(instance.version) {
            tracing::debug!(machine_id = %instance.id, "discarding stale timeout fire");
            return Ok(());
        }
    }

    let state_before = instance.state.clone();
    let version_before = instance.version;
    let Some(state_config) = deps.definition.state(&state_before) else {
        return Err(RuntimeError::ConfigurationError(format!(
            "machine {} is in undeclared state {:?}",
            instance.id, state_before
        )));
    };

    let mut handler_error: Option<String> = None;
    let state_after: String;
    let context_before_json = encode_context(&instance.context);
    let started = std::time::Instant::now();
    // Whether this event's context needs writing back to storage. A live
    // transition always does (the state itself changed); a stay action
    // only does when its handler reports it actually mutated the context
    // (spec §4.7 step 3).
    let context_mutated;

    // A timeout never consults the transition table: its target was fixed
    // when the state was scheduled, not matched by event type (spec §4.1).
    let matched_target = if event.is_timeout() {
        state_config.timeout.as_ref().map(|t| t.target_state.clone())
    } else {
        state_config.transitions.get(&event.event_type).cloned()
    };

    if let Some(target) = matched_target {
        if let Some(exit) = state_config.exit.clone() {
            if let Err(e) = run_with_deadline(&exit, &mut instance.context).await {
                handler_error = Some(e.0);
            }
        }

        let timer_id = TimerId::for_state(&instance.id, &state_before, version_before);
        deps.scheduler.lock().cancel(&timer_id);

        instance.apply_transition(target.clone(), deps.clock.epoch_ms() as i64);
        state_after = target.clone();
        context_mutated = true;

        let next_state_config = deps.definition.state(&target);
        if let Some(entry) = next_state_config.and_then(|s| s.entry.clone()) {
            if let Err(e) = run_with_deadline(&entry, &mut instance.context).await {
                handler_error = handler_error.or(Some(e.0));
            }
        }
        if let Some(timeout_spec) = next_state_config.and_then(|s| s.timeout.clone()) {
            let fire_at = deps.clock.now() + timeout_spec.duration;
            let timer_id = TimerId::for_state(&instance.id, &target, instance.version);
            deps.scheduler.lock().arm(timer_id, fire_at);
        }
    } else if let Some(stay) = state_config.stay_actions.get(&event.event_type).cloned() {
        context_mutated = match run_stay_with_deadline(&stay, &mut instance.context, &event).await {
            Ok(mutated) => mutated,
            Err(e) => {
                handler_error = Some(e.0);
                false
            }
        };
        instance.apply_transition(state_before.clone(), deps.clock.epoch_ms() as i64);
        state_after = state_before.clone();
    } else {
        tracing::debug!(
            machine_id = %instance.id,
            state = %state_before,
            event_type = %event.event_type,
            "event unhandled in this state"
        );
        return Ok(());
    }

    let is_offline_after = deps.definition.state(&state_after).map(|s| s.is_offline).unwrap_or(false);
    let is_final_after = deps.definition.state(&state_after).map(|s| s.is_final).unwrap_or(false);

    let record = TransitionRecord {
        machine_id: instance.id,
        machine_type: instance.machine_type.clone(),
        version: instance.version,
        run_id: instance.run_id,
        correlation_id: None,
        debug_session_id: None,
        state_before,
        state_after: state_after.clone(),
        event_type: event.event_type.to_string(),
        event_payload_json: BASE64.encode(event.payload.to_string()),
        event_parameters_json: encode_event_parameters(&event),
        context_before_json,
        context_after_json: encode_context(&instance.context),
        transition_duration_micros: started.elapsed().as_micros() as u64,
        wall_time_ms: deps.clock.epoch_ms() as i64,
        machine_online_at_emit: true,
        state_offline_status: is_offline_after,
        registry_status: if instance.is_active() { "active".into() } else { "degraded".into() },
        handler_error,
    };

    // A stay action whose handler made no mutation has nothing new to
    // write back; the instance row in storage already reflects its state
    // (which, for a stay, hasn't changed either).
    if context_mutated {
        persist_with_retry(deps, instance, &record).await?;
    }

    deps.history.enqueue(HistoryRow(record.clone()));
    deps.playback.lock().record(record.clone());
    deps.observer.publish(ObserverMessage::StateChange(StateChange {
        machine_id: instance.id,
        machine_type: instance.machine_type.clone(),
        state_before: record.state_before.clone(),
        state_after: record.state_after.clone(),
        event_type: record.event_type.clone(),
        version: instance.version,
        wall_time_ms: record.wall_time_ms,
    }));

    if is_final_after {
        instance.mark_final();
        let graph = instance_graph(instance, &deps.table);
        if let Err(error) = deps.archival.archive(&graph).await {
            tracing::warn!(machine_id = %instance.id, %error, "archival failed for final machine");
        }
    }

    Ok(())
}

/// Base64-encodes a context snapshot for `TransitionRecord::context_*_json`
/// (spec §3.1: contexts are opaque blobs, base64-encoded over a text-column
/// store). Serialization failure degrades to an empty blob rather than
/// failing the transition — the record's other fields still carry the
/// transition's outcome.
fn encode_context<Ctx: Serialize>(context: &Ctx) -> String {
    serde_json::to_string(context).map(|s| BASE64.encode(s)).unwrap_or_default()
}

/// The event's envelope metadata distinct from its opaque `payload`
/// (spec §6 "Event ingress": `timestamp`, `description` alongside
/// `eventType`/`payload`), base64-encoded like the other transition blobs.
fn encode_event_parameters(event: &Event) -> String {
    let parameters =
        serde_json::json!({ "timestamp_ms": event.timestamp_ms, "description": event.description });
    BASE64.encode(parameters.to_string())
}

/// Rebuilds the single-node graph a stored row flattens to, for the
/// startup archival sweep ([`crate::runtime::RuntimeContext`]) which only
/// has raw rows from a table scan, not a live [`MachineInstance`]. Mirrors
/// [`instance_graph`] below but from the storage side of the round trip.
pub fn graph_from_row(table: &str, row: &tfsm_persistence::Row) -> Option<ContextGraph> {
    let id = MachineId::from_string(row.get("id")?.as_str()?);
    let created_at_ms = row.get("created_at_ms").and_then(|v| v.as_i64()).unwrap_or(0);
    let mut graph = ContextGraph::new(id);
    graph.push(GraphNode {
        id,
        machine_id: id,
        table: table.to_string(),
        role: NodeRole::Root,
        created_at_ms,
        columns: row.clone(),
    });
    Some(graph)
}

/// Wraps a flat machine row as a single-node [`ContextGraph`] so it can be
/// handed to [`ArchivalService`], which operates on graphs rather than raw
/// rows. This runtime persists one row per machine rather than the
/// multi-table graphs [`tfsm_persistence::GraphMapper`] supports, so the
/// graph archival moves is always exactly one root node.
fn instance_graph<Ctx: Serialize>(instance: &MachineInstance<Ctx>, table: &str) -> ContextGraph {
    let columns = serde_json::to_value(instance)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let mut graph = ContextGraph::new(instance.id);
    graph.push(GraphNode {
        id: instance.id,
        machine_id: instance.id,
        table: table.to_string(),
        role: NodeRole::Root,
        created_at_ms: instance.created_at_ms,
        columns,
    });
    graph
}

async fn persist_with_retry<Ctx>(
    deps: &MachineDeps<Ctx>,
    instance: &mut MachineInstance<Ctx>,
    _record: &TransitionRecord,
) -> Result<(), RuntimeError>
where
    Ctx: Send + Sync + Serialize + 'static,
{
    // The full instance (including context) is persisted on every
    // transition, not just {id, state, version} — rehydrate idempotence
    // (spec invariant 4) depends on context surviving an evict/reload cycle.
    let row = serde_json::to_value(&*instance)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();

    let mut attempt = 0;
    loop {
        attempt += 1;
        match deps.adapter.upsert(&deps.database, &deps.table, row.clone()).await {
            Ok(()) => return Ok(()),
            Err(error) if attempt < PERSISTENCE_MAX_ATTEMPTS => {
                tracing::warn!(machine_id = %instance.id, attempt, %error, "transient persistence error, retrying");
                tokio::time::sleep(PERSISTENCE_BACKOFF * attempt).await;
            }
            Err(error) => {
                instance.mark_degraded();
                return Err(RuntimeError::PersistenceFatal {
                    machine_id: instance.id.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }
}

/// Handlers are plain synchronous closures, so there is nothing to
/// preempt — the "soft deadline" is enforced after the fact, by timing the
/// call and warn-logging an overrun, rather than by cancelling it (spec
/// §4.7: a slow handler degrades observability, it does not abort the
/// transition).
async fn run_with_deadline<Ctx>(
    handler: &tfsm_core::EntryExitHandler<Ctx>,
    context: &mut Ctx,
) -> Result<(), HandlerError> {
    let started = std::time::Instant::now();
    let result = handler(context);
    if started.elapsed() > HANDLER_SOFT_DEADLINE {
        tracing::warn!(elapsed_ms = started.elapsed().as_millis() as u64, "handler exceeded soft deadline");
    }
    result
}

async fn run_stay_with_deadline<Ctx>(
    handler: &tfsm_core::StayHandler<Ctx>,
    context: &mut Ctx,
    event: &Event,
) -> Result<bool, HandlerError> {
    let started = std::time::Instant::now();
    let result = handler(context, event);
    if started.elapsed() > HANDLER_SOFT_DEADLINE {
        tracing::warn!(elapsed_ms = started.elapsed().as_millis() as u64, "stay handler exceeded soft deadline");
    }
    result
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
