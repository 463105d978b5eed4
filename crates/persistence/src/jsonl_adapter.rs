// SPDX-License-Identifier: MIT

//! Append-only JSON-lines adapter (spec §4.3, C3).
//!
//! One file per `(database, table)` at `<root>/<database>/<table>.jsonl`.
//! Writes are append-only records (`Upsert`/`Delete`); an in-memory index is
//! rebuilt by replaying the file on open, mirroring the teacher's WAL/
//! snapshot recovery model (`crates/storage/src/wal_tests.rs`): corrupt or
//! non-UTF-8 trailing lines are rotated to a `.bak` file rather than failing
//! the open, and replay stops at the first bad line.

use crate::adapter::{AdapterError, PersistenceAdapter, Row};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Picks the next `.bak`/`.bak.N` path, rotating older backups out. Keeps at
/// most [`MAX_BAK_FILES`] generations (mirrors the teacher's
/// `rotate_bak_path`, `crates/daemon/src/storage/snapshot.rs`).
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("jsonl.bak")
        } else {
            path.with_extension(format!("jsonl.bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
enum Record {
    Upsert { id: String, row: Row },
    Delete { id: String },
}

struct TableFile {
    path: PathBuf,
    index: IndexMap<String, Row>,
}

impl TableFile {
    fn open(path: PathBuf) -> Result<Self, AdapterError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            File::create(&path)?;
            return Ok(Self { path, index: IndexMap::new() });
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut index = IndexMap::new();
        let mut valid_records = Vec::new();
        let mut corrupted = false;

        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => {
                    corrupted = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(record) => {
                    apply(&mut index, &record);
                    valid_records.push(record);
                }
                Err(_) => {
                    corrupted = true;
                    break;
                }
            }
        }

        if corrupted {
            let bak = rotate_bak_path(&path);
            fs::rename(&path, &bak)?;
            let mut file = File::create(&path)?;
            for record in &valid_records {
                writeln!(file, "{}", serde_json::to_string(record)?)?;
            }
        }

        Ok(Self { path, index })
    }

    fn append(&mut self, record: Record) -> Result<(), AdapterError> {
        apply(&mut self.index, &record);
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        Ok(())
    }
}

fn apply(index: &mut IndexMap<String, Row>, record: &Record) {
    match record {
        Record::Upsert { id, row } => {
            index.insert(id.clone(), row.clone());
        }
        Record::Delete { id } => {
            index.shift_remove(id);
        }
    }
}

/// Append-only JSON-lines store rooted at a directory. Every `(database,
/// table)` gets its own file, opened lazily on first access and cached.
pub struct JsonlAdapter {
    root: PathBuf,
    tables: Mutex<HashMap<(String, String), TableFile>>,
}

impl JsonlAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), tables: Mutex::new(HashMap::new()) }
    }

    fn table_path(&self, database: &str, table: &str) -> PathBuf {
        self.root.join(database).join(format!("{table}.jsonl"))
    }

    fn with_table<F, T>(&self, database: &str, table: &str, f: F) -> Result<T, AdapterError>
    where
        F: FnOnce(&mut TableFile) -> Result<T, AdapterError>,
    {
        let mut tables = self.tables.lock();
        let key = (database.to_string(), table.to_string());
        if !tables.contains_key(&key) {
            let path = self.table_path(database, table);
            tables.insert(key.clone(), TableFile::open(path)?);
        }
        f(tables.get_mut(&key).expect("just inserted"))
    }
}

#[async_trait]
impl PersistenceAdapter for JsonlAdapter {
    async fn upsert(&self, database: &str, table: &str, row: Row) -> Result<(), AdapterError> {
        let id = row
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or(AdapterError::MissingIdField)?
            .to_string();
        self.with_table(database, table, |t| t.append(Record::Upsert { id, row }))
    }

    async fn delete_by_id(&self, database: &str, table: &str, id: &str) -> Result<(), AdapterError> {
        self.with_table(database, table, |t| t.append(Record::Delete { id: id.to_string() }))
    }

    async fn scan_by_column_in(
        &self,
        database: &str,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<Row>, AdapterError> {
        self.with_table(database, table, |t| {
            Ok(t.index
                .values()
                .filter(|row| {
                    row.get(column)
                        .and_then(|v| v.as_str())
                        .map(|s| values.iter().any(|v| v == s))
                        .unwrap_or(false)
                })
                .cloned()
                .collect())
        })
    }

    async fn scan_all(&self, database: &str, table: &str) -> Result<Vec<Row>, AdapterError> {
        self.with_table(database, table, |t| Ok(t.index.values().cloned().collect()))
    }

    async fn replicate_schema(&self, source_db: &str, target_db: &str) -> Result<(), AdapterError> {
        for table in self.list_tables(source_db).await? {
            self.with_table(target_db, &table, |_| Ok(()))?;
        }
        Ok(())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, AdapterError> {
        let dir = self.root.join(database);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("jsonl") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn create_database_if_absent(&self, database: &str) -> Result<(), AdapterError> {
        fs::create_dir_all(self.root.join(database))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "jsonl_adapter_tests.rs"]
mod tests;
