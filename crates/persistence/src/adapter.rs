// SPDX-License-Identifier: MIT

//! The storage-agnostic boundary between the engine and a concrete backing
//! store (spec §4.3, C3).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no such table: {0}")]
    NoSuchTable(String),
    #[error("no such database: {0}")]
    NoSuchDatabase(String),
    #[error("row is missing an \"id\" field")]
    MissingIdField,
}

/// One stored row: an opaque JSON object plus the column the adapter
/// indexes on for point lookups (`id`).
pub type Row = serde_json::Map<String, Value>;

/// Storage-agnostic persistence boundary. Every machine-graph row, history
/// record, and registry event flows through one of these methods — nothing
/// in `tfsm-engine` ever touches a concrete store directly.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Insert or replace a row keyed by its `id` column.
    async fn upsert(&self, database: &str, table: &str, row: Row) -> Result<(), AdapterError>;

    /// Insert or replace many rows in one call (used by batch loggers,
    /// spec §4.4, to commit a coalesced flush as a single operation).
    async fn upsert_many(
        &self,
        database: &str,
        table: &str,
        rows: Vec<Row>,
    ) -> Result<(), AdapterError> {
        for row in rows {
            self.upsert(database, table, row).await?;
        }
        Ok(())
    }

    async fn delete_by_id(&self, database: &str, table: &str, id: &str) -> Result<(), AdapterError>;

    /// Scan rows whose `column` value is one of `values`. Used for both
    /// point lookups (`column = "id"`) and the archival pass's
    /// `(id, version)` membership checks.
    async fn scan_by_column_in(
        &self,
        database: &str,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Row>, AdapterError>;

    /// Scan every row in a table (used by cold-start rehydration and
    /// retention sweeps).
    async fn scan_all(&self, database: &str, table: &str) -> Result<Vec<Row>, AdapterError>;

    /// Copy every table definition known in `source_db` into `target_db`,
    /// creating empty tables (and `target_db` itself, if needed) for any
    /// that don't already exist there. Idempotent; never touches row data.
    async fn replicate_schema(&self, source_db: &str, target_db: &str) -> Result<(), AdapterError>;

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, AdapterError>;

    async fn create_database_if_absent(&self, database: &str) -> Result<(), AdapterError>;
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
