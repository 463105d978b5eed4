// SPDX-License-Identifier: MIT

//! Flattens a machine's context into a [`ContextGraph`] and back (spec §4.2, C2).
//!
//! Every node this mapper produces carries `machine_id` as its foreign
//! reference, generalizing the teacher's `OwnerId` tagging pattern
//! (`crates/core/src/owner.rs`) from a closed two-variant enum to an open,
//! per-context-type schema.

use crate::adapter::{AdapterError, PersistenceAdapter, Row};
use chrono::Utc;
use tfsm_core::{ContextGraph, GraphNode, MachineId, NodeRole, TableSchema};

/// Tells the mapper which tables make up a context type's graph and how
/// each flattens into columns. Implemented once per machine type.
pub trait GraphSchema: Send + Sync {
    fn tables(&self) -> Vec<TableSchema>;

    /// Flatten a machine's context into graph nodes. The root node (whose
    /// `id == machine_id`) must be present exactly once.
    fn flatten(&self, machine_id: MachineId, context: &serde_json::Value) -> Vec<GraphNode>;

    /// Reconstruct a context value from a loaded graph's nodes.
    fn hydrate(&self, graph: &ContextGraph) -> serde_json::Value;
}

fn node_to_row(node: &GraphNode) -> Row {
    let mut row = node.columns.clone();
    row.insert("id".into(), serde_json::Value::String(node.id.to_string()));
    row.insert("machine_id".into(), serde_json::Value::String(node.machine_id.to_string()));
    row.insert(
        "created_at_ms".into(),
        serde_json::Value::Number(node.created_at_ms.into()),
    );
    row
}

fn row_to_node(table: &str, role: NodeRole, row: &Row) -> Option<GraphNode> {
    let id = MachineId::from_string(row.get("id")?.as_str()?);
    let machine_id = MachineId::from_string(row.get("machine_id")?.as_str()?);
    let created_at_ms = row.get("created_at_ms").and_then(|v| v.as_i64()).unwrap_or(0);
    let mut columns = row.clone();
    columns.remove("id");
    columns.remove("machine_id");
    columns.remove("created_at_ms");
    Some(GraphNode { id, machine_id, table: table.to_string(), role, created_at_ms, columns })
}

/// Persists and loads [`ContextGraph`]s through a [`PersistenceAdapter`],
/// driven by a per-machine-type [`GraphSchema`].
pub struct GraphMapper<'a> {
    adapter: &'a dyn PersistenceAdapter,
    database: String,
}

impl<'a> GraphMapper<'a> {
    pub fn new(adapter: &'a dyn PersistenceAdapter, database: impl Into<String>) -> Self {
        Self { adapter, database: database.into() }
    }

    pub async fn persist_graph(&self, graph: &ContextGraph) -> Result<(), AdapterError> {
        for node in &graph.nodes {
            self.adapter.upsert(&self.database, &node.table, node_to_row(node)).await?;
        }
        Ok(())
    }

    pub async fn load_graph(
        &self,
        schema: &dyn GraphSchema,
        machine_id: MachineId,
    ) -> Result<ContextGraph, AdapterError> {
        let mut graph = ContextGraph::new(machine_id);
        for table_schema in schema.tables() {
            let rows = self
                .adapter
                .scan_by_column_in(
                    &self.database,
                    &table_schema.table,
                    "machine_id",
                    &[machine_id.to_string()],
                )
                .await?;
            for row in rows {
                if let Some(node) = row_to_node(&table_schema.table, table_schema.role, &row) {
                    graph.push(node);
                }
            }
        }
        Ok(graph)
    }

    pub async fn validate_consistency(&self, graph: &ContextGraph) -> bool {
        graph.validate_consistency()
    }
}

/// Stamps a freshly-flattened node with the current wall clock if the schema
/// didn't already set one. Small helper so `GraphSchema::flatten`
/// implementations don't each need their own clock plumbing.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod tests;
