// SPDX-License-Identifier: MIT

//! Registry lifecycle events (spec §3.1 `RegistryEvent`, §6 "Registry event
//! table").

use crate::id::MachineId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryEventKind {
    Create,
    Remove,
    Rehydrate,
    Evict,
    Error,
}

crate::simple_display! {
    RegistryEventKind {
        Create => "CREATE",
        Remove => "REMOVE",
        Rehydrate => "REHYDRATE",
        Evict => "EVICT",
        Error => "ERROR",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEvent {
    pub machine_id: MachineId,
    pub kind: RegistryEventKind,
    pub reason: Option<String>,
    pub event_timestamp_ms: i64,
}

impl RegistryEvent {
    pub fn new(machine_id: MachineId, kind: RegistryEventKind, timestamp_ms: i64) -> Self {
        Self { machine_id, kind, reason: None, event_timestamp_ms: timestamp_ms }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
#[path = "registry_event_tests.rs"]
mod tests;
