// SPDX-License-Identifier: MIT

//! In-memory `PersistenceAdapter` for tests and embedding.

use crate::adapter::{AdapterError, PersistenceAdapter, Row};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;

type Table = IndexMap<String, Row>;

/// A `HashMap`-backed store. Rows are keyed by their `"id"` field; a row
/// without one is rejected.
#[derive(Default)]
pub struct MemoryAdapter {
    databases: RwLock<HashMap<String, HashMap<String, Table>>>,
}

fn row_id(row: &Row) -> Result<String, AdapterError> {
    row.get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(AdapterError::MissingIdField)
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    async fn upsert(&self, database: &str, table: &str, row: Row) -> Result<(), AdapterError> {
        let id = row_id(&row)?;
        let mut dbs = self.databases.write();
        let db = dbs.entry(database.to_string()).or_default();
        let tbl = db.entry(table.to_string()).or_default();
        tbl.insert(id, row);
        Ok(())
    }

    async fn delete_by_id(&self, database: &str, table: &str, id: &str) -> Result<(), AdapterError> {
        let mut dbs = self.databases.write();
        if let Some(db) = dbs.get_mut(database) {
            if let Some(tbl) = db.get_mut(table) {
                tbl.shift_remove(id);
            }
        }
        Ok(())
    }

    async fn scan_by_column_in(
        &self,
        database: &str,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Row>, AdapterError> {
        let dbs = self.databases.read();
        let Some(tbl) = dbs.get(database).and_then(|db| db.get(table)) else {
            return Ok(Vec::new());
        };
        Ok(tbl
            .values()
            .filter(|row| {
                row.get(column)
                    .and_then(|v| v.as_str())
                    .map(|s| values.iter().any(|v| v == s))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn scan_all(&self, database: &str, table: &str) -> Result<Vec<Row>, AdapterError> {
        let dbs = self.databases.read();
        Ok(dbs
            .get(database)
            .and_then(|db| db.get(table))
            .map(|tbl| tbl.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn replicate_schema(&self, source_db: &str, target_db: &str) -> Result<(), AdapterError> {
        let mut dbs = self.databases.write();
        let tables: Vec<String> = dbs.get(source_db).map(|db| db.keys().cloned().collect()).unwrap_or_default();
        let target = dbs.entry(target_db.to_string()).or_default();
        for table in tables {
            target.entry(table).or_default();
        }
        Ok(())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, AdapterError> {
        let dbs = self.databases.read();
        Ok(dbs.get(database).map(|db| db.keys().cloned().collect()).unwrap_or_default())
    }

    async fn create_database_if_absent(&self, database: &str) -> Result<(), AdapterError> {
        let mut dbs = self.databases.write();
        dbs.entry(database.to_string()).or_default();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
