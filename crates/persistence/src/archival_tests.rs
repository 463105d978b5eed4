// SPDX-License-Identifier: MIT

use super::*;
use crate::memory::MemoryAdapter;
use serde_json::json;
use tfsm_core::{GraphNode, MachineId, NodeRole};

fn graph_for(machine_id: MachineId, created_at_ms: i64) -> ContextGraph {
    let mut graph = ContextGraph::new(machine_id);
    graph.push(GraphNode {
        id: machine_id,
        machine_id,
        table: "calls".into(),
        role: NodeRole::Root,
        created_at_ms,
        columns: json!({"state": "COMPLETED"}).as_object().unwrap().clone(),
    });
    graph
}

fn service() -> (Arc<MemoryAdapter>, Arc<MemoryAdapter>, ArchivalService) {
    let active = Arc::new(MemoryAdapter::new());
    let history = Arc::new(MemoryAdapter::new());
    let svc = ArchivalService::new(active.clone(), history.clone(), "active", "history");
    (active, history, svc)
}

#[tokio::test]
async fn archive_copies_to_history_and_deletes_from_active() {
    let (active, history, svc) = service();
    let machine_id = MachineId::from_string("mch-1");
    active.upsert("active", "calls", json!({"id": machine_id.to_string()}).as_object().unwrap().clone()).await.unwrap();

    svc.archive(&graph_for(machine_id, 1_000)).await.unwrap();

    assert!(active.scan_all("active", "calls").await.unwrap().is_empty());
    assert_eq!(history.scan_all("history", "calls").await.unwrap().len(), 1);
}

#[tokio::test]
async fn re_archiving_the_same_machine_does_not_duplicate() {
    let (_active, history, svc) = service();
    let machine_id = MachineId::from_string("mch-1");

    svc.archive(&graph_for(machine_id, 1_000)).await.unwrap();
    svc.archive(&graph_for(machine_id, 1_000)).await.unwrap();

    assert_eq!(history.scan_all("history", "calls").await.unwrap().len(), 1);
}

#[tokio::test]
async fn enforce_retention_deletes_rows_older_than_cutoff() {
    let (_active, history, svc) = service();
    svc.archive(&graph_for(MachineId::from_string("mch-old"), 1_000)).await.unwrap();
    svc.archive(&graph_for(MachineId::from_string("mch-new"), 1_000_000_000)).await.unwrap();

    let now_ms = 1_000_000_000;
    let deleted = svc.enforce_retention("calls", now_ms, 1).await.unwrap();

    assert_eq!(deleted, 1);
    let remaining = history.scan_all("history", "calls").await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn scan_and_archive_finals_only_archives_matching_states() {
    let (active, _history, svc) = service();
    active
        .upsert("active", "calls", json!({"id": "mch-1", "state": "COMPLETED"}).as_object().unwrap().clone())
        .await
        .unwrap();
    active
        .upsert("active", "calls", json!({"id": "mch-2", "state": "RINGING"}).as_object().unwrap().clone())
        .await
        .unwrap();

    let archived = svc
        .scan_and_archive_finals("calls", &["COMPLETED".to_string()], |row| {
            let id = row.get("id")?.as_str()?;
            Some(graph_for(MachineId::from_string(id), 1_000))
        })
        .await
        .unwrap();

    assert_eq!(archived, 1);
}
