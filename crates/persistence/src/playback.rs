// SPDX-License-Identifier: MIT

//! Bounded in-memory transition history with cursor-based replay (spec
//! §4.6, C6).

use std::collections::HashMap;
use std::collections::VecDeque;
use tfsm_core::{MachineId, TransitionRecord};

const DEFAULT_MAX_SIZE: usize = 1000;

/// Summary over the currently-retained window (spec §4.6 `statistics()`).
/// `machine_id` names the most recently recorded machine — rings are
/// typically scoped to a single machine's lineage, so this is almost
/// always the ring's own owner; it is `None` only for an empty ring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStatistics {
    pub machine_id: Option<MachineId>,
    pub total: usize,
    pub cursor: usize,
    pub per_state_count: HashMap<String, usize>,
    pub first_ts: Option<i64>,
    pub last_ts: Option<i64>,
}

/// A bounded ring of recent [`TransitionRecord`]s with a movable cursor for
/// step-through replay. Evicts the oldest record once `max_size` is
/// exceeded (spec §4.6 "bounded at `playback_max_size`, default 1000").
pub struct PlaybackRing {
    records: VecDeque<TransitionRecord>,
    max_size: usize,
    cursor: usize,
    enabled: bool,
}

impl PlaybackRing {
    pub fn new(max_size: usize) -> Self {
        Self { records: VecDeque::with_capacity(max_size.min(4096)), max_size, cursor: 0, enabled: true }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a record, evicting the oldest if at capacity. A no-op when
    /// recording is disabled (spec §4.6: "disables recording for production
    /// throughput").
    pub fn record(&mut self, record: TransitionRecord) {
        if !self.enabled {
            return;
        }
        if self.records.len() >= self.max_size {
            self.records.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
        self.records.push_back(record);
        self.cursor = self.records.len();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record the cursor currently points at, if any.
    pub fn current(&self) -> Option<&TransitionRecord> {
        self.records.get(self.cursor.checked_sub(1)?)
    }

    /// Moves the cursor one record later; returns the record at the new
    /// position, or `None` if already at the end.
    pub fn step_forward(&mut self) -> Option<&TransitionRecord> {
        if self.cursor >= self.records.len() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    /// Moves the cursor one record earlier; returns the record at the new
    /// position, or `None` if already at the start.
    pub fn step_backward(&mut self) -> Option<&TransitionRecord> {
        if self.cursor <= 1 {
            self.cursor = 0;
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    /// Jumps the cursor to an absolute position (1-indexed, matching
    /// `current()`'s semantics). Clamped to the valid range.
    pub fn jump_to(&mut self, position: usize) -> Option<&TransitionRecord> {
        self.cursor = position.min(self.records.len());
        self.current()
    }

    pub fn export(&self) -> Vec<TransitionRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn import(&mut self, records: Vec<TransitionRecord>) {
        self.records = records.into_iter().collect();
        if self.records.len() > self.max_size {
            let overflow = self.records.len() - self.max_size;
            for _ in 0..overflow {
                self.records.pop_front();
            }
        }
        self.cursor = self.records.len();
    }

    pub fn statistics(&self) -> PlaybackStatistics {
        let mut per_state_count = HashMap::new();
        for record in &self.records {
            *per_state_count.entry(record.state_after.clone()).or_insert(0usize) += 1;
        }
        PlaybackStatistics {
            machine_id: self.records.back().map(|r| r.machine_id),
            total: self.records.len(),
            cursor: self.cursor,
            per_state_count,
            first_ts: self.records.front().map(|r| r.wall_time_ms),
            last_ts: self.records.back().map(|r| r.wall_time_ms),
        }
    }
}

impl Default for PlaybackRing {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

#[cfg(test)]
#[path = "playback_tests.rs"]
mod tests;
