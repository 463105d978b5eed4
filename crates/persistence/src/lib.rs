// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage: the persistence adapter boundary, entity-graph mapper, batch
//! loggers, history archival, and the playback ring.

pub mod adapter;
pub mod archival;
pub mod batch;
pub mod history;
pub mod jsonl_adapter;
pub mod mapper;
pub mod memory;
pub mod playback;

pub use adapter::{AdapterError, PersistenceAdapter, Row};
pub use archival::{ArchivalService, RETENTION_SWEEP_INTERVAL};
pub use batch::{BatchLogger, BatchLoggerConfig};
pub use history::{HistoryRow, RegistryEventRow};
pub use jsonl_adapter::JsonlAdapter;
pub use mapper::{GraphMapper, GraphSchema};
pub use memory::MemoryAdapter;
pub use playback::{PlaybackRing, PlaybackStatistics};
