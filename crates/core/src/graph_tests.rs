// SPDX-License-Identifier: MIT

use super::*;

fn node(machine_id: MachineId, id: MachineId, role: NodeRole) -> GraphNode {
    GraphNode {
        id,
        machine_id,
        table: "t".into(),
        role,
        created_at_ms: 0,
        columns: serde_json::Map::new(),
    }
}

#[test]
fn validate_consistency_accepts_well_formed_graph() {
    let machine_id = MachineId::from_string("mch-1");
    let mut graph = ContextGraph::new(machine_id);
    graph.push(node(machine_id, machine_id, NodeRole::Root));
    graph.push(node(machine_id, MachineId::from_string("mch-child-1"), NodeRole::Child));
    assert!(graph.validate_consistency());
}

#[test]
fn validate_consistency_rejects_foreign_machine_id() {
    let machine_id = MachineId::from_string("mch-1");
    let other = MachineId::from_string("mch-2");
    let mut graph = ContextGraph::new(machine_id);
    graph.push(node(machine_id, machine_id, NodeRole::Root));
    graph.push(node(other, MachineId::from_string("mch-child-1"), NodeRole::Child));
    assert!(!graph.validate_consistency());
}

#[test]
fn root_finds_the_root_node() {
    let machine_id = MachineId::from_string("mch-1");
    let mut graph = ContextGraph::new(machine_id);
    graph.push(node(machine_id, MachineId::from_string("mch-child-1"), NodeRole::Child));
    graph.push(node(machine_id, machine_id, NodeRole::Root));
    let root = graph.root().unwrap();
    assert_eq!(root.id, machine_id);
}
