// SPDX-License-Identifier: MIT

//! Per-entity mutable state (spec §2 `MachineInstance`).

use crate::id::{MachineId, RunId};
use serde::{Deserialize, Serialize};

/// Whether a machine instance still accepts events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Normal operation; events are dispatched to the FSM engine.
    Active,
    /// A `PersistenceFatal` error was observed; the machine refuses further
    /// events until an operator intervenes (spec §7).
    Degraded,
    /// The machine reached a final state and is pending eviction/archival.
    Final,
}

/// The mutable, per-entity half of a machine: which state it is in, what
/// version it is on, and the run this lineage belongs to. The immutable
/// half — transitions, handlers, timeouts — lives in
/// [`MachineDefinition`](crate::definition::MachineDefinition) and is shared
/// across every instance of the same machine type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInstance<Ctx> {
    pub id: MachineId,
    pub machine_type: String,
    pub run_id: RunId,
    pub state: String,
    pub version: u64,
    pub status: InstanceStatus,
    pub context: Ctx,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl<Ctx> MachineInstance<Ctx> {
    pub fn new(
        id: MachineId,
        machine_type: impl Into<String>,
        run_id: RunId,
        initial_state: impl Into<String>,
        context: Ctx,
        now_ms: i64,
    ) -> Self {
        Self {
            id,
            machine_type: machine_type.into(),
            run_id,
            state: initial_state.into(),
            version: 0,
            status: InstanceStatus::Active,
            context,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Reconstructs an instance from a persisted snapshot (spec §4.8
    /// "rehydrate"). Unlike [`MachineInstance::new`], this restores an
    /// existing version/state verbatim and never runs an entry action —
    /// rehydration is a storage read, not a transition.
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrated(
        id: MachineId,
        machine_type: impl Into<String>,
        run_id: RunId,
        state: impl Into<String>,
        version: u64,
        status: InstanceStatus,
        context: Ctx,
        created_at_ms: i64,
        updated_at_ms: i64,
    ) -> Self {
        Self {
            id,
            machine_type: machine_type.into(),
            run_id,
            state: state.into(),
            version,
            status,
            context,
            created_at_ms,
            updated_at_ms,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, InstanceStatus::Active)
    }

    /// Applies a transition's bookkeeping: new state, incremented version,
    /// refreshed timestamp. Does not run handlers — the engine does that
    /// before calling this.
    pub fn apply_transition(&mut self, new_state: impl Into<String>, now_ms: i64) {
        self.state = new_state.into();
        self.version += 1;
        self.updated_at_ms = now_ms;
    }

    pub fn mark_degraded(&mut self) {
        self.status = InstanceStatus::Degraded;
    }

    pub fn mark_final(&mut self) {
        self.status = InstanceStatus::Final;
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
