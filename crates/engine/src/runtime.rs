// SPDX-License-Identifier: MIT

//! `RuntimeContext`: the one value built at startup, threaded through
//! explicitly (spec §9 "no global singletons").
//!
//! Grounded on the teacher's `Runtime<S, A, N, C>` struct
//! (`crates/engine/src/runtime/mod.rs`), constructed once in the daemon's
//! startup path and passed down rather than reached for through a
//! module-level `static`/`lazy_static`/`OnceLock`.

use crate::config::RuntimeConfig;
use crate::observer::ObserverBus;
use crate::registry::{Registry, RegistryDeps, SWEEP_INTERVAL};
use crate::scheduler::TimeoutScheduler;
use parking_lot::Mutex as SyncMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tfsm_core::{Clock, Event, MachineDefinition, MachineId, SendResult};
use tfsm_persistence::{
    ArchivalService, BatchLogger, BatchLoggerConfig, HistoryRow, PersistenceAdapter, PlaybackRing,
    RegistryEventRow,
};

/// Everything one machine type's runtime needs: its registry, the shared
/// timeout scheduler, the observer fan-out, and the batch loggers/archival
/// service writing to the configured backing store.
pub struct RuntimeContext<Ctx> {
    pub config: RuntimeConfig,
    pub registry: Arc<Registry<Ctx>>,
    pub scheduler: Arc<SyncMutex<TimeoutScheduler>>,
    pub observer: Arc<ObserverBus>,
    pub archival: Arc<ArchivalService>,
    clock: Arc<dyn Clock>,
    table: String,
    final_states: Vec<String>,
}

impl<Ctx> RuntimeContext<Ctx>
where
    Ctx: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Wires up one machine type's full runtime: batch loggers, scheduler,
    /// observer bus, archival service, and the registry that ties them
    /// together. `database`/`table` name the active-store location this
    /// machine type's rows live in; `history_database` names the
    /// archival target.
    pub fn new(
        config: RuntimeConfig,
        definition: Arc<MachineDefinition<Ctx>>,
        adapter: Arc<dyn PersistenceAdapter>,
        clock: Arc<dyn Clock>,
        database: impl Into<String>,
        table: impl Into<String>,
        history_database: impl Into<String>,
    ) -> Self {
        let database = database.into();
        let table = table.into();
        let history_database = history_database.into();

        let final_states: Vec<String> =
            definition.states.values().filter(|s| s.is_final).map(|s| s.name.clone()).collect();

        let observer = Arc::new(ObserverBus::with_capacity(1024));
        let scheduler = Arc::new(SyncMutex::new(TimeoutScheduler::new()));

        let history = Arc::new(BatchLogger::spawn(
            BatchLoggerConfig {
                queue_capacity: config.history_batch_size * 4,
                flush_interval: config.history_flush_interval(),
                flush_size: config.history_batch_size,
                database: history_database.clone(),
                table: "transitions".into(),
            },
            adapter.clone(),
        ));
        let registry_history = Arc::new(BatchLogger::spawn(
            BatchLoggerConfig {
                queue_capacity: config.registry_batch_size * 4,
                flush_interval: config.history_flush_interval(),
                flush_size: config.registry_batch_size,
                database: history_database.clone(),
                table: "registry_events".into(),
            },
            adapter.clone(),
        ));

        // Active and history typically live in the same backing store under
        // different database namespaces, so both adapter handles point at
        // the same underlying `adapter`.
        let archival = Arc::new(ArchivalService::new(
            adapter.clone(),
            adapter.clone(),
            database.clone(),
            history_database,
        ));

        let playback = Arc::new(SyncMutex::new({
            let mut ring = PlaybackRing::new(config.playback_max_size);
            ring.set_enabled(config.playback_enabled);
            ring
        }));

        let registry_deps = RegistryDeps {
            clock: clock.clone(),
            adapter: adapter.clone(),
            database: database.clone(),
            table: table.clone(),
            history,
            registry_history,
            scheduler: scheduler.clone(),
            observer: observer.clone(),
            archival: archival.clone(),
            playback,
            mailbox_capacity: config.mailbox_capacity(),
            idle_ttl: config.idle_eviction_after(),
        };
        let registry = Arc::new(Registry::new(definition, registry_deps));

        Self { config, registry, scheduler, observer, archival, clock, table, final_states }
    }

    pub async fn send_event(&self, machine_id: MachineId, event: Event) -> SendResult {
        self.registry.send_event(machine_id, event).await
    }

    /// Runs the registry-sweep and timeout-delivery background loops until
    /// the returned handles are dropped or aborted. Intended to be spawned
    /// once at startup.
    pub fn spawn_background_loops(self: &Arc<Self>) -> BackgroundLoops {
        let sweep_registry = self.registry.clone();
        let sweep_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let evicted = sweep_registry.sweep_stopped();
                if evicted > 0 {
                    tracing::debug!(evicted, "registry sweep dropped stopped handles");
                }
            }
        });

        let timer_registry = self.registry.clone();
        let timer_scheduler = self.scheduler.clone();
        let timer_clock = self.clock.clone();
        let timer_task = tokio::spawn(async move {
            loop {
                let next_deadline = timer_scheduler.lock().next_deadline();
                match next_deadline {
                    Some(deadline) => {
                        let now = timer_clock.now();
                        if deadline > now {
                            tokio::time::sleep(deadline - now).await;
                        }
                        let fired = timer_scheduler.lock().fired(timer_clock.now());
                        for timer in fired {
                            if let Some(kind) = timer.timer_id.kind() {
                                let event = Event::timeout(&kind.state, kind.version);
                                let _ = timer_registry.send_event(kind.machine_id, event).await;
                            }
                        }
                    }
                    None => {
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
        });

        let archival = self.archival.clone();
        let archival_table = self.table.clone();
        let archival_final_states = self.final_states.clone();
        let retention_days = self.config.retention_days;
        let retention_clock = self.clock.clone();
        let archival_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tfsm_persistence::RETENTION_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                match archival
                    .scan_and_archive_finals(&archival_table, &archival_final_states, |row| {
                        crate::machine::graph_from_row(&archival_table, row)
                    })
                    .await
                {
                    Ok(archived) if archived > 0 => {
                        tracing::debug!(archived, "archival sweep moved finished machines to history");
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(%error, "archival sweep failed"),
                }
                if let Err(error) = archival
                    .enforce_retention(&archival_table, retention_clock.epoch_ms() as i64, retention_days)
                    .await
                {
                    tracing::warn!(%error, "retention enforcement failed");
                }
            }
        });

        BackgroundLoops { sweep_task, timer_task, archival_task }
    }
}

/// Handles to the background tasks a [`RuntimeContext`] drives. Dropping
/// (or aborting) these stops the loops; the `RuntimeContext` itself keeps
/// working synchronously regardless.
pub struct BackgroundLoops {
    pub sweep_task: tokio::task::JoinHandle<()>,
    pub timer_task: tokio::task::JoinHandle<()>,
    pub archival_task: tokio::task::JoinHandle<()>,
}

impl Drop for BackgroundLoops {
    fn drop(&mut self) {
        self.sweep_task.abort();
        self.timer_task.abort();
        self.archival_task.abort();
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
