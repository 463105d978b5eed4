// SPDX-License-Identifier: MIT

//! Copy-then-delete archival of finished machines into a separate history
//! store (spec §4.5, C5).

use crate::adapter::{AdapterError, PersistenceAdapter, Row};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tfsm_core::ContextGraph;

/// Moves completed machines' graphs from the active database into a history
/// database, deduplicating on `(id, version)` so a re-run after a partial
/// failure never double-archives a row.
pub struct ArchivalService {
    active: Arc<dyn PersistenceAdapter>,
    history: Arc<dyn PersistenceAdapter>,
    active_database: String,
    history_database: String,
}

impl ArchivalService {
    pub fn new(
        active: Arc<dyn PersistenceAdapter>,
        history: Arc<dyn PersistenceAdapter>,
        active_database: impl Into<String>,
        history_database: impl Into<String>,
    ) -> Self {
        Self {
            active,
            history,
            active_database: active_database.into(),
            history_database: history_database.into(),
        }
    }

    /// Archives one machine's graph: copy every node to history, then
    /// delete it from the active store. Both adapters key rows by `id`, so
    /// re-running this after a partial failure is naturally idempotent —
    /// the history-side upsert just overwrites the same row rather than
    /// duplicating it (spec §4.5 "(id, version) dedup on redo").
    pub async fn archive(&self, graph: &ContextGraph) -> Result<(), AdapterError> {
        for node in &graph.nodes {
            let mut row: Row = node.columns.clone();
            row.insert("id".into(), serde_json::Value::String(node.id.to_string()));
            row.insert("machine_id".into(), serde_json::Value::String(node.machine_id.to_string()));
            row.insert(
                "created_at_ms".into(),
                serde_json::Value::Number(node.created_at_ms.into()),
            );
            self.history.upsert(&self.history_database, &node.table, row).await?;
            self.active.delete_by_id(&self.active_database, &node.table, node.id.as_str()).await?;
        }
        Ok(())
    }

    /// Startup pass: scans every table named in `final_states` for rows
    /// belonging to machines already in a final state and archives them.
    /// `graphs_for` supplies the caller's way of turning a found row into
    /// the full [`ContextGraph`] to archive (the adapter only knows rows,
    /// not graph shape).
    pub async fn scan_and_archive_finals<F>(
        &self,
        table: &str,
        final_states: &[String],
        graphs_for: F,
    ) -> Result<usize, AdapterError>
    where
        F: Fn(&Row) -> Option<ContextGraph>,
    {
        let rows = self.active.scan_all(&self.active_database, table).await?;
        let mut archived = 0;
        for row in rows {
            let state_matches = row
                .get("state")
                .and_then(|v| v.as_str())
                .map(|s| final_states.iter().any(|fs| fs == s))
                .unwrap_or(false);
            if !state_matches {
                continue;
            }
            if let Some(graph) = graphs_for(&row) {
                self.archive(&graph).await?;
                archived += 1;
            }
        }
        Ok(archived)
    }

    /// Deletes history rows older than `retention_days`. Intended to be
    /// called from a periodic `tokio::time::interval` loop.
    pub async fn enforce_retention(
        &self,
        table: &str,
        now_ms: i64,
        retention_days: u32,
    ) -> Result<usize, AdapterError> {
        let cutoff_ms = now_ms - i64::from(retention_days) * 24 * 3600 * 1000;
        let rows = self.history.scan_all(&self.history_database, table).await?;
        let mut deleted_ids = HashSet::new();
        for row in rows {
            let created_at_ms = row.get("created_at_ms").and_then(|v| v.as_i64()).unwrap_or(i64::MAX);
            if created_at_ms < cutoff_ms {
                if let Some(id) = row.get("id").and_then(|v| v.as_str()) {
                    self.history.delete_by_id(&self.history_database, table, id).await?;
                    deleted_ids.insert(id.to_string());
                }
            }
        }
        Ok(deleted_ids.len())
    }
}

/// Default interval between `enforce_retention` sweeps.
pub const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[cfg(test)]
#[path = "archival_tests.rs"]
mod tests;
