// SPDX-License-Identifier: MIT

//! Fan-out channel for the monitoring layer (spec §6, C10).
//!
//! Backed directly by [`tokio::sync::broadcast`]: a lagged subscriber gets
//! [`tokio::sync::broadcast::error::RecvError::Lagged`] and simply misses the
//! messages it fell behind on, which is exactly the "slow subscribers drop
//! messages rather than back-pressuring the engine" behavior spec §6 asks
//! for — no custom coalescing is needed on top.

use crate::monitoring::ObserverMessage;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

/// Publishes [`ObserverMessage`]s to zero or more subscribers.
pub struct ObserverBus {
    sender: broadcast::Sender<ObserverMessage>,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the stream. Each subscriber has its own lag window;
    /// dropping the handle unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverMessage> {
        self.sender.subscribe()
    }

    /// Publish a message. Returns the number of live subscribers it reached;
    /// zero subscribers is not an error (publishing is fire-and-forget).
    pub fn publish(&self, message: ObserverMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ObserverBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
