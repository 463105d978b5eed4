// SPDX-License-Identifier: MIT

use super::*;
use crate::memory::MemoryAdapter;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
struct TestRow {
    id: String,
    value: String,
}

impl From<TestRow> for serde_json::Map<String, serde_json::Value> {
    fn from(row: TestRow) -> Self {
        serde_json::to_value(row).unwrap().as_object().unwrap().clone()
    }
}

#[tokio::test]
async fn flushes_on_timer_without_reaching_size_threshold() {
    let adapter: Arc<dyn PersistenceAdapter> = Arc::new(MemoryAdapter::new());
    let mut config = BatchLoggerConfig::new("active", "history");
    config.flush_interval = Duration::from_millis(10);
    config.flush_size = 1000;
    let logger = BatchLogger::spawn(config, adapter.clone());

    logger.enqueue(TestRow { id: "mch-1".into(), value: "a".into() });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let rows = adapter.scan_all("active", "history").await.unwrap();
    assert_eq!(rows.len(), 1);
    logger.shutdown().await;
}

#[tokio::test]
async fn flushes_immediately_once_size_threshold_is_reached() {
    let adapter: Arc<dyn PersistenceAdapter> = Arc::new(MemoryAdapter::new());
    let mut config = BatchLoggerConfig::new("active", "history");
    config.flush_interval = Duration::from_secs(3600);
    config.flush_size = 3;
    let logger = BatchLogger::spawn(config, adapter.clone());

    for i in 0..3 {
        logger.enqueue(TestRow { id: format!("mch-{i}"), value: "a".into() });
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let rows = adapter.scan_all("active", "history").await.unwrap();
    assert_eq!(rows.len(), 3);
    logger.shutdown().await;
}

#[tokio::test]
async fn shutdown_flushes_the_remaining_buffer() {
    let adapter: Arc<dyn PersistenceAdapter> = Arc::new(MemoryAdapter::new());
    let mut config = BatchLoggerConfig::new("active", "history");
    config.flush_interval = Duration::from_secs(3600);
    config.flush_size = 1000;
    let logger = BatchLogger::spawn(config, adapter.clone());

    logger.enqueue(TestRow { id: "mch-1".into(), value: "a".into() });
    logger.shutdown().await;

    let rows = adapter.scan_all("active", "history").await.unwrap();
    assert_eq!(rows.len(), 1);
}
