// SPDX-License-Identifier: MIT

//! Directory of live machines (spec §4.8, C8).
//!
//! Grounded on the teacher's use of `parking_lot::RwLock` as the directory
//! lock throughout `oj-core`/`oj-adapters`: many concurrent readers resolve
//! an id to a handle, writers only take the lock to insert/remove on
//! create/evict.

use crate::machine::{self, Lifecycle, MachineDeps, MachineHandle};
use crate::monitoring::{ObserverMessage, StateChange};
use crate::observer::ObserverBus;
use crate::scheduler::TimeoutScheduler;
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tfsm_core::{
    Clock, Event, InstanceStatus, MachineDefinition, MachineId, MachineInstance, RegistryEvent,
    RegistryEventKind, RunId, SendResult,
};
use tfsm_persistence::{
    ArchivalService, BatchLogger, HistoryRow, PersistenceAdapter, PlaybackRing, RegistryEventRow,
};

/// Shared, cloneable dependencies every machine spawned by this registry is
/// built with — one copy of each `Arc`, not one per machine.
pub struct RegistryDeps {
    pub clock: Arc<dyn Clock>,
    pub adapter: Arc<dyn PersistenceAdapter>,
    pub database: String,
    pub table: String,
    pub history: Arc<BatchLogger<HistoryRow>>,
    pub registry_history: Arc<BatchLogger<RegistryEventRow>>,
    pub scheduler: Arc<SyncMutex<TimeoutScheduler>>,
    pub observer: Arc<ObserverBus>,
    pub archival: Arc<ArchivalService>,
    pub playback: Arc<SyncMutex<PlaybackRing>>,
    pub mailbox_capacity: usize,
    pub idle_ttl: Duration,
}

/// Directory of live [`MachineHandle`]s for one machine type, plus the
/// auto-create/rehydrate/reject dispatch spec §4.8 describes.
pub struct Registry<Ctx> {
    definition: Arc<MachineDefinition<Ctx>>,
    deps: RegistryDeps,
    handles: RwLock<HashMap<MachineId, MachineHandle>>,
}

impl<Ctx> Registry<Ctx>
where
    Ctx: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub fn new(definition: Arc<MachineDefinition<Ctx>>, deps: RegistryDeps) -> Self {
        Self { definition, deps, handles: RwLock::new(HashMap::new()) }
    }

    /// Number of machines currently held in memory (not a count of all
    /// machines that exist in storage).
    pub fn live_count(&self) -> usize {
        self.handles.read().len()
    }

    fn deps_for_machine(&self) -> MachineDeps<Ctx> {
        MachineDeps {
            definition: self.definition.clone(),
            clock: self.deps.clock.clone(),
            adapter: self.deps.adapter.clone(),
            database: self.deps.database.clone(),
            table: self.deps.table.clone(),
            history: self.deps.history.clone(),
            scheduler: self.deps.scheduler.clone(),
            observer: self.deps.observer.clone(),
            archival: self.deps.archival.clone(),
            playback: self.deps.playback.clone(),
            idle_ttl: self.deps.idle_ttl,
        }
    }

    fn publish_registry_event(&self, machine_id: MachineId, kind: RegistryEventKind, reason: Option<&str>) {
        let now_ms = self.deps.clock.epoch_ms() as i64;
        let mut event = RegistryEvent::new(machine_id, kind, now_ms);
        if let Some(reason) = reason {
            event = event.with_reason(reason.to_string());
        }
        self.deps.registry_history.enqueue(RegistryEventRow(event));
    }

    /// Resolves `machine_id` and delivers `event` to it, creating or
    /// rehydrating as needed (spec §4.8):
    /// - live in the registry: deliver directly.
    /// - not live, but `event`'s type matches a declared auto-create rule:
    ///   construct a fresh instance, persist it, then deliver.
    /// - not live, but a row exists in active storage: rehydrate, then
    ///   deliver (no entry action re-runs; rehydration is a storage read).
    /// - otherwise: reject.
    pub async fn send_event(&self, machine_id: MachineId, event: Event) -> SendResult {
        if let Some(handle) = self.live_handle(&machine_id) {
            return handle.send_event(event);
        }

        if let Some(rule) = self.definition.auto_create.get(&event.event_type).cloned() {
            let context = (rule.context_factory)(&event);
            let now_ms = self.deps.clock.epoch_ms() as i64;
            let instance = MachineInstance::new(
                machine_id,
                self.definition.machine_type.clone(),
                RunId::new(),
                self.definition.initial_state.clone(),
                context,
                now_ms,
            );
            match self.persist_initial(&instance).await {
                Ok(()) => {
                    let handle = self.spawn_and_register(instance);
                    self.publish_registry_event(machine_id, RegistryEventKind::Create, None);
                    self.deps.observer.publish(ObserverMessage::StateChange(StateChange {
                        machine_id,
                        machine_type: self.definition.machine_type.clone(),
                        state_before: String::new(),
                        state_after: self.definition.initial_state.clone(),
                        event_type: event.event_type.to_string(),
                        version: 0,
                        wall_time_ms: now_ms,
                    }));
                    return handle.send_event(event);
                }
                Err(reason) => {
                    self.publish_registry_event(machine_id, RegistryEventKind::Error, Some(&reason));
                    return SendResult::Rejected(reason);
                }
            }
        }

        match self.rehydrate(machine_id).await {
            Some(handle) => {
                self.publish_registry_event(machine_id, RegistryEventKind::Rehydrate, None);
                handle.send_event(event)
            }
            None => SendResult::Rejected(format!("no such machine: {machine_id}")),
        }
    }

    /// Explicitly creates a machine (or returns its existing handle) without
    /// requiring an auto-create-eligible event.
    pub async fn create_or_get(&self, machine_id: MachineId, context: Ctx) -> MachineHandle {
        if let Some(handle) = self.live_handle(&machine_id) {
            return handle;
        }
        let now_ms = self.deps.clock.epoch_ms() as i64;
        let instance = MachineInstance::new(
            machine_id,
            self.definition.machine_type.clone(),
            RunId::new(),
            self.definition.initial_state.clone(),
            context,
            now_ms,
        );
        let _ = self.persist_initial(&instance).await;
        let handle = self.spawn_and_register(instance);
        self.publish_registry_event(machine_id, RegistryEventKind::Create, None);
        handle
    }

    fn live_handle(&self, machine_id: &MachineId) -> Option<MachineHandle> {
        let handles = self.handles.read();
        let handle = handles.get(machine_id)?;
        if handle.lifecycle() == Lifecycle::Stopped {
            return None;
        }
        Some(handle.clone())
    }

    fn spawn_and_register(&self, instance: MachineInstance<Ctx>) -> MachineHandle {
        let id = instance.id;
        let handle = machine::spawn(instance, self.deps_for_machine(), self.deps.mailbox_capacity);
        self.handles.write().insert(id, handle.clone());
        handle
    }

    async fn persist_initial(&self, instance: &MachineInstance<Ctx>) -> Result<(), String> {
        let row = serde_json::to_value(instance)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        self.deps
            .adapter
            .upsert(&self.deps.database, &self.deps.table, row)
            .await
            .map_err(|e| e.to_string())
    }

    /// Loads a machine's row from active storage and spawns it. If the
    /// state it was persisted in had an armed timeout whose deadline has
    /// already passed (the registry was down, or the machine sat evicted
    /// past the deadline), the overdue timeout is delivered immediately as
    /// the first event the freshly-spawned handle sees — otherwise a
    /// machine parked past its deadline would simply wait forever, since
    /// nothing re-arms a timer for a handle that no longer exists.
    async fn rehydrate(&self, machine_id: MachineId) -> Option<MachineHandle> {
        let rows = self
            .deps
            .adapter
            .scan_by_column_in(&self.deps.database, &self.deps.table, "id", &[machine_id.to_string()])
            .await
            .ok()?;
        let row = rows.into_iter().next()?;
        let instance: MachineInstance<Ctx> = serde_json::from_value(serde_json::Value::Object(row)).ok()?;
        if !matches!(instance.status, InstanceStatus::Active) {
            return None;
        }

        let overdue_timeout = self.definition.state(&instance.state).and_then(|s| s.timeout.as_ref()).and_then(|timeout| {
            let deadline_ms = instance.updated_at_ms + timeout.duration.as_millis() as i64;
            let now_ms = self.deps.clock.epoch_ms() as i64;
            (now_ms >= deadline_ms).then(|| Event::timeout(&instance.state, instance.version))
        });

        let handle = self.spawn_and_register(instance);
        if let Some(event) = overdue_timeout {
            let _ = handle.send_event(event);
        }
        Some(handle)
    }

    /// Drops handles whose mailbox-drain task has already stopped (spec
    /// §4.8 eviction on offline/final). Intended to run on a
    /// `tokio::time::interval` from [`crate::runtime::RuntimeContext`].
    pub fn sweep_stopped(&self) -> usize {
        let mut handles = self.handles.write();
        let before = handles.len();
        handles.retain(|_, handle| handle.lifecycle() != Lifecycle::Stopped);
        before - handles.len()
    }
}

/// Default interval between [`Registry::sweep_stopped`] passes.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
