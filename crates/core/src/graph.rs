// SPDX-License-Identifier: MIT

//! Context-graph data model (spec §3.1 `ContextGraph`, §4.2 mapper).

use crate::id::MachineId;
use serde::{Deserialize, Serialize};

/// The role a node plays within its machine's graph, declared at schema
/// registration time (spec §4.2: "the mapper is told ... which fields are
/// child lists, which are singletons ... which are scalar columns").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// The persisting entity itself. Exactly one per graph; `id == machine_id`.
    Root,
    /// At most one per logical type per graph; shares the machine id (spec §3.1).
    Singleton,
    /// Zero or more per logical type; carries `machine_id` as a foreign reference.
    Child,
}

/// Declares the shape of one table within a context type's graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub role: NodeRole,
}

impl TableSchema {
    pub fn root(table: impl Into<String>) -> Self {
        Self { table: table.into(), role: NodeRole::Root }
    }

    pub fn singleton(table: impl Into<String>) -> Self {
        Self { table: table.into(), role: NodeRole::Singleton }
    }

    pub fn child(table: impl Into<String>) -> Self {
        Self { table: table.into(), role: NodeRole::Child }
    }
}

/// One row discovered while flattening a context into its graph.
///
/// `id` is the row's own identity (equal to `machine_id` for root/singleton
/// nodes, a distinct per-row id for child nodes). `machine_id` is always the
/// foreign reference back to the owning machine (invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: MachineId,
    pub machine_id: MachineId,
    pub table: String,
    pub role: NodeRole,
    pub created_at_ms: i64,
    pub columns: serde_json::Map<String, serde_json::Value>,
}

/// A rooted set of records reachable from one machine's persisting entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextGraph {
    pub machine_id: MachineId,
    pub nodes: Vec<GraphNode>,
}

impl ContextGraph {
    pub fn new(machine_id: MachineId) -> Self {
        Self { machine_id, nodes: Vec::new() }
    }

    pub fn push(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Invariant 3: every node's `machine_id` foreign reference equals the
    /// graph's owning machine id.
    pub fn validate_consistency(&self) -> bool {
        self.nodes.iter().all(|n| n.machine_id == self.machine_id)
    }

    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| matches!(n.role, NodeRole::Root))
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
