// SPDX-License-Identifier: MIT

//! Timeout scheduling (spec §5 `TimeoutScheduler`).
//!
//! Timers are kept in a binary heap keyed by fire instant so arm/cancel are
//! O(log N); a single background task sleeps to the next deadline and wakes
//! the rest of the scheduler rather than spawning one task per timer.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;
use tfsm_core::TimerId;

/// One armed timer, ordered earliest-deadline-first in the heap (reverse of
/// the natural `Instant` order, since `BinaryHeap` is a max-heap).
struct ArmedTimer {
    fire_at: Instant,
    timer_id: TimerId,
    /// Bumped on re-arm; a popped entry whose generation no longer matches
    /// the live table entry is a stale duplicate and is dropped silently.
    generation: u64,
}

impl PartialEq for ArmedTimer {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}
impl Eq for ArmedTimer {}
impl PartialOrd for ArmedTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ArmedTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        other.fire_at.cmp(&self.fire_at)
    }
}

/// A timer that has reached its deadline and should be redelivered as an
/// event (spec §4.1 "timeout fires re-enter through the normal event path").
pub struct FiredTimer {
    pub timer_id: TimerId,
}

/// Min-heap of armed timers plus a liveness table keyed by [`TimerId`] so a
/// re-arm or cancel can invalidate a stale heap entry without rebuilding the
/// heap (spec §5 "O(log N) arm and cancel").
#[derive(Default)]
pub struct TimeoutScheduler {
    heap: BinaryHeap<ArmedTimer>,
    live: HashMap<TimerId, u64>,
    next_generation: u64,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new(), live: HashMap::new(), next_generation: 0 }
    }

    /// Arms (or re-arms) a timer to fire at `fire_at`. Re-arming the same
    /// `timer_id` invalidates any previously scheduled fire for it.
    pub fn arm(&mut self, timer_id: TimerId, fire_at: Instant) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(timer_id.clone(), generation);
        self.heap.push(ArmedTimer { fire_at, timer_id, generation });
    }

    /// Cancels a timer if armed. Safe to call on an unknown or already-fired
    /// id (spec invariant 6: cancellation races with in-flight fires).
    pub fn cancel(&mut self, timer_id: &TimerId) {
        self.live.remove(timer_id);
    }

    pub fn is_armed(&self, timer_id: &TimerId) -> bool {
        self.live.contains_key(timer_id)
    }

    pub fn has_timers(&self) -> bool {
        !self.live.is_empty()
    }

    /// Earliest instant at which a still-live timer could fire, if any.
    /// Used by the background task to compute its next sleep duration.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap
            .iter()
            .filter(|t| self.live.get(&t.timer_id) == Some(&t.generation))
            .map(|t| t.fire_at)
            .min()
    }

    /// Pops every timer whose deadline is at or before `now` and is still
    /// live, discarding stale (cancelled or superseded) heap entries along
    /// the way.
    pub fn fired(&mut self, now: Instant) -> Vec<FiredTimer> {
        let mut fired = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.fire_at > now {
                break;
            }
            let top = self.heap.pop().expect("peeked Some");
            if self.live.get(&top.timer_id) == Some(&top.generation) {
                self.live.remove(&top.timer_id);
                fired.push(FiredTimer { timer_id: top.timer_id });
            }
        }
        fired
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
