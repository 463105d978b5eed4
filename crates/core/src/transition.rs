// SPDX-License-Identifier: MIT

//! The durable transition record (spec §3.1 `TransitionRecord`, §6
//! "Transition log table").

use crate::id::{MachineId, RunId};
use serde::{Deserialize, Serialize};

/// One committed (or same-state "stay") transition for a single machine.
///
/// `(machine_id, version)` is unique (invariant 2). Payloads and contexts
/// are stored as opaque blobs — base64-encoded when surfaced over a row
/// store that only speaks text columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub machine_id: MachineId,
    pub machine_type: String,
    pub version: u64,
    pub run_id: RunId,
    pub correlation_id: Option<String>,
    pub debug_session_id: Option<String>,
    pub state_before: String,
    pub state_after: String,
    pub event_type: String,
    /// Opaque payload, base64-encoded when persisted to a text column.
    pub event_payload_json: String,
    pub event_parameters_json: String,
    pub context_before_json: String,
    pub context_after_json: String,
    pub transition_duration_micros: u64,
    pub wall_time_ms: i64,
    pub machine_online_at_emit: bool,
    pub state_offline_status: bool,
    pub registry_status: String,
    /// Set when a handler threw during this transition (spec §4.7 failure
    /// semantics); the machine still completed the transition.
    pub handler_error: Option<String>,
}

impl TransitionRecord {
    /// True when this record represents a stay-action ("same-state") entry
    /// (spec §4.7 step 3, scenario S2).
    pub fn is_same_state(&self) -> bool {
        self.state_before == self.state_after
    }

    /// True when this record was caused by the timeout scheduler rather
    /// than an externally-submitted event.
    pub fn is_synthetic_timeout(&self) -> bool {
        self.event_type == crate::event::EventType::timeout().as_str()
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
