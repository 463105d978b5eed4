// SPDX-License-Identifier: MIT

//! Timer identifier type for tracking scheduled timeouts (C1, spec §4.1).
//!
//! Unlike [`crate::id::MachineId`], timer ids are composite and
//! variable-length (`timeout:<machine_id>:<state>:<version>`), so they are
//! backed by a plain `String` rather than the fixed-size [`crate::id::IdBuf`].

use crate::id::MachineId;
use serde::{Deserialize, Serialize};

/// Unique identifier for an armed timer.
///
/// Timers are used to schedule a synthetic `TimeoutEvent` into a machine's
/// mailbox after a state's configured delay elapses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    /// Canonical id for the timeout armed when entering `state` at `version`.
    pub fn for_state(machine_id: &MachineId, state: &str, version: u64) -> Self {
        TimerKind { machine_id: *machine_id, state: state.to_string(), version }.to_timer_id()
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse this timer id back into its typed components, if it matches
    /// the canonical `timeout:` scheme.
    pub fn kind(&self) -> Option<TimerKind> {
        TimerKind::parse(&self.0)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for TimerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Parsed representation of a timer id for type-safe routing back to the
/// machine/state/version it was armed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerKind {
    pub machine_id: MachineId,
    pub state: String,
    pub version: u64,
}

impl TimerKind {
    /// Format: `timeout:<machine_id>:<state>:<version>`.
    pub fn parse(id: &str) -> Option<TimerKind> {
        let rest = id.strip_prefix("timeout:")?;
        let mut parts = rest.rsplitn(3, ':');
        let version_str = parts.next()?;
        let state = parts.next()?;
        let machine_id = parts.next()?;
        let version = version_str.parse().ok()?;
        Some(TimerKind {
            machine_id: MachineId::from_string(machine_id),
            state: state.to_string(),
            version,
        })
    }

    pub fn to_timer_id(&self) -> TimerId {
        TimerId::from_string(format!("timeout:{}:{}:{}", self.machine_id, self.state, self.version))
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
