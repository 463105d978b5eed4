// SPDX-License-Identifier: MIT

//! Event envelope and canonical event-type identity (spec §6, REDESIGN FLAGS
//! "class-as-event-type identity").
//!
//! Dispatch never compares Rust type identity: every event carries a
//! canonical [`EventType`] string, and two payloads are equal for dispatch
//! purposes iff their `event_type` strings match.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical event-type identity used for transition lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical event type for the synthetic timeout event the scheduler
    /// injects on fire (spec §4.1).
    pub fn timeout() -> Self {
        Self::new("__timeout__")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for EventType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An event arriving at `Registry::send_event` (spec §6 "Event ingress").
///
/// `payload` is treated as opaque by the engine: it is handed to entry/exit/
/// stay handlers verbatim and stored as an opaque blob on the transition
/// record (spec §3.1 `TransitionRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub timestamp_ms: i64,
    pub description: String,
}

impl Event {
    pub fn new(event_type: impl Into<EventType>, payload: serde_json::Value) -> Self {
        Self { event_type: event_type.into(), payload, timestamp_ms: 0, description: String::new() }
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Synthetic timeout event re-delivered by the scheduler. Carries the
    /// `(state, version)` it was armed for so the engine can guard staleness
    /// (spec invariant 6).
    pub fn timeout(state_at_schedule: &str, version: u64) -> Self {
        Self::new(
            EventType::timeout(),
            serde_json::json!({ "source_state": state_at_schedule, "version": version }),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.event_type == EventType::timeout()
    }
}

/// Result of submitting an event to the registry (REDESIGN FLAGS: replaces
/// exception-for-control-flow in admission/overload paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Accepted,
    Overloaded,
    Rejected(String),
}

impl SendResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendResult::Accepted)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
