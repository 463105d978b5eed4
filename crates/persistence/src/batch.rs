// SPDX-License-Identifier: MIT

//! Coalesced batch writer (spec §4.4, C4).
//!
//! Generalizes the teacher's `JobLogger`/`AgentLogger`
//! (`crates/engine/src/job_logger.rs`) "open, write, warn-log-don't-
//! propagate" idiom from an immediate per-call write to a queue flushed
//! either on a timer or once it grows past a size threshold.

use crate::adapter::PersistenceAdapter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEFAULT_QUEUE_CAPACITY: usize = 4096;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 75;
const DEFAULT_FLUSH_SIZE: usize = 750;

/// Configuration for one [`BatchLogger`] instance.
#[derive(Debug, Clone)]
pub struct BatchLoggerConfig {
    pub queue_capacity: usize,
    pub flush_interval: Duration,
    pub flush_size: usize,
    pub database: String,
    pub table: String,
}

impl BatchLoggerConfig {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            flush_size: DEFAULT_FLUSH_SIZE,
            database: database.into(),
            table: table.into(),
        }
    }
}

/// Queues rows and flushes them to a [`PersistenceAdapter`] in batches.
///
/// `enqueue` never blocks on storage: it pushes onto an in-memory channel
/// drained by a background task. A full queue drops the row and logs a
/// warning rather than applying backpressure to the caller (spec §4.4:
/// batch loggers must never stall the FSM engine).
pub struct BatchLogger<Row: Serialize + Send + 'static> {
    sender: mpsc::Sender<Row>,
    task: JoinHandle<()>,
}

impl<Row: Serialize + Send + 'static> BatchLogger<Row>
where
    Row: Into<serde_json::Map<String, serde_json::Value>>,
{
    pub fn spawn(config: BatchLoggerConfig, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Row>(config.queue_capacity);
        let task = tokio::spawn(async move {
            let mut buffer = Vec::with_capacity(config.flush_size);
            let mut ticker = tokio::time::interval(config.flush_interval);
            loop {
                tokio::select! {
                    row = receiver.recv() => {
                        match row {
                            Some(row) => {
                                buffer.push(row);
                                if buffer.len() >= config.flush_size {
                                    flush(&adapter, &config, &mut buffer).await;
                                }
                            }
                            None => {
                                flush(&adapter, &config, &mut buffer).await;
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        if !buffer.is_empty() {
                            flush(&adapter, &config, &mut buffer).await;
                        }
                    }
                }
            }
        });
        Self { sender, task }
    }

    /// Enqueue a row for the next flush. Drops silently (with a warning) if
    /// the queue is full rather than blocking the caller.
    pub fn enqueue(&self, row: Row) {
        if self.sender.try_send(row).is_err() {
            tracing::warn!("batch logger queue full, dropping row");
        }
    }

    /// Stops accepting new rows and waits for the final flush to complete.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.task.await;
    }
}

async fn flush<Row>(
    adapter: &Arc<dyn PersistenceAdapter>,
    config: &BatchLoggerConfig,
    buffer: &mut Vec<Row>,
) where
    Row: Into<serde_json::Map<String, serde_json::Value>>,
{
    if buffer.is_empty() {
        return;
    }
    let rows: Vec<_> = buffer.drain(..).map(Into::into).collect();
    if let Err(error) = adapter.upsert_many(&config.database, &config.table, rows).await {
        tracing::warn!(%error, database = %config.database, table = %config.table, "batch flush failed");
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
