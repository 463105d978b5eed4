// SPDX-License-Identifier: MIT

//! Row wrappers bridging `tfsm-core` record types into [`crate::batch::BatchLogger`].
//!
//! A direct `impl From<TransitionRecord> for serde_json::Map<...>` would be
//! an orphan impl here (neither type is local to this crate), so each
//! record type gets a thin newtype instead.

use serde::Serialize;
use tfsm_core::{RegistryEvent, TransitionRecord};

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow(pub TransitionRecord);

impl From<HistoryRow> for serde_json::Map<String, serde_json::Value> {
    fn from(row: HistoryRow) -> Self {
        let mut map = serde_json::to_value(&row.0)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        map.insert(
            "id".into(),
            serde_json::Value::String(format!("{}:{}", row.0.machine_id, row.0.version)),
        );
        map
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryEventRow(pub RegistryEvent);

impl From<RegistryEventRow> for serde_json::Map<String, serde_json::Value> {
    fn from(row: RegistryEventRow) -> Self {
        let mut map = serde_json::to_value(&row.0)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        map.insert(
            "id".into(),
            serde_json::Value::String(format!("{}:{}", row.0.machine_id, row.0.event_timestamp_ms)),
        );
        map
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
