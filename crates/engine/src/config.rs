// SPDX-License-Identifier: MIT

//! Runtime-wide tunables (spec §7 "Configuration"), loaded from TOML the
//! way the teacher's `JobConfig`/daemon config types are (`serde` + `toml`,
//! never a hand-rolled parser).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The named configuration surface (spec §6): every key an operator can set
/// in the runtime's TOML config file. Constructed once at startup and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Target sustained events/sec the runtime is provisioned for; used to
    /// size mailbox and batch-logger capacities at startup, not enforced as
    /// a hard rate limit.
    pub target_tps: u32,
    /// Soft cap on machines held in memory at once; the registry's eviction
    /// sweep uses this to decide how aggressively to evict idle machines.
    pub max_concurrent_machines: u32,
    /// Worker threads dedicated to the timeout scheduler's fire-delivery path.
    pub timeout_worker_threads: u32,
    pub enable_performance_metrics: bool,
    /// `None` disables the debug/monitoring WebSocket endpoint entirely.
    pub debug_websocket_port: Option<u16>,
    /// Batch size threshold for the transition-history batch logger (C4).
    pub history_batch_size: usize,
    pub history_flush_interval_ms: u64,
    /// Batch size threshold for the registry-event batch logger (C4).
    pub registry_batch_size: usize,
    /// History retention window enforced by `ArchivalService::enforce_retention`.
    pub retention_days: u32,
    pub playback_max_size: usize,
    pub playback_enabled: bool,
    /// Idle time before the registry evicts a live-but-quiescent machine.
    pub auto_evict_ttl_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            target_tps: 5_000,
            max_concurrent_machines: 100_000,
            timeout_worker_threads: 2,
            enable_performance_metrics: true,
            debug_websocket_port: None,
            history_batch_size: 750,
            history_flush_interval_ms: 75,
            registry_batch_size: 200,
            retention_days: 90,
            playback_max_size: 10_000,
            playback_enabled: true,
            auto_evict_ttl_ms: 3_600_000,
        }
    }
}

impl RuntimeConfig {
    tfsm_core::setters! {
        set {
            target_tps: u32,
            max_concurrent_machines: u32,
            timeout_worker_threads: u32,
            enable_performance_metrics: bool,
            history_batch_size: usize,
            history_flush_interval_ms: u64,
            registry_batch_size: usize,
            retention_days: u32,
            playback_max_size: usize,
            playback_enabled: bool,
            auto_evict_ttl_ms: u64,
        }
    }

    pub fn idle_eviction_after(&self) -> Duration {
        Duration::from_millis(self.auto_evict_ttl_ms)
    }

    pub fn history_flush_interval(&self) -> Duration {
        Duration::from_millis(self.history_flush_interval_ms)
    }

    /// Mailbox capacity per machine (spec §5 default 1024). Not itself a
    /// named configuration key; derived from `target_tps` so a
    /// higher-throughput deployment gets deeper per-machine queues.
    pub fn mailbox_capacity(&self) -> usize {
        (self.target_tps as usize / 4).clamp(256, 8192)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
