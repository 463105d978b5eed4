// SPDX-License-Identifier: MIT

//! Wire DTOs for the external monitoring/UI layer (spec §6).
//!
//! The engine never opens a socket itself (the WebSocket/UI layer is an
//! out-of-scope external collaborator); it only produces these messages on
//! [`crate::observer::ObserverBus`] for whatever transport a consumer wires up.

use serde::{Deserialize, Serialize};
use tfsm_core::MachineId;

/// Outbound: a machine committed a transition (including stay actions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub machine_id: MachineId,
    pub machine_type: String,
    pub state_before: String,
    pub state_after: String,
    pub event_type: String,
    pub version: u64,
    pub wall_time_ms: i64,
}

/// Outbound: a timeout was (re-)armed and is counting down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutCountdown {
    pub machine_id: MachineId,
    pub state: String,
    pub fires_at_ms: i64,
}

/// Outbound: summary row for a treeview-style live dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeviewStoreUpdate {
    pub machine_id: MachineId,
    pub machine_type: String,
    pub state: String,
    pub version: u64,
    pub is_degraded: bool,
    pub updated_at_ms: i64,
}

/// One message broadcast to observer subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObserverMessage {
    StateChange(StateChange),
    TimeoutCountdown(TimeoutCountdown),
    TreeviewStoreUpdate(TreeviewStoreUpdate),
}

/// Inbound: a command an external UI can issue back into the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventCommand {
    /// Submit an event to a machine, as if it arrived from the outside world.
    SendEvent { machine_id: MachineId, event_type: String, payload: serde_json::Value },
    /// Select a machine for focused observation (UI-local; no runtime effect
    /// beyond being echoed back so multiple UI clients can stay in sync).
    SelectMachine { machine_id: MachineId },
    /// Adjust the verbosity of the log stream this connection receives.
    SetLogLevel { level: String },
}

#[cfg(test)]
#[path = "monitoring_tests.rs"]
mod tests;
