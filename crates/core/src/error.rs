// SPDX-License-Identifier: MIT

//! Error taxonomy (spec §7 "Error handling design").

use thiserror::Error;

/// The runtime's error taxonomy. Each variant's propagation policy is fixed
/// by spec §7 and enforced by the engine/registry, not by callers:
///
/// - [`RuntimeError::TransitionUnhandled`] is benign; only observed.
/// - [`RuntimeError::HandlerFailure`] is recorded on the transition record;
///   the machine continues.
/// - [`RuntimeError::PersistenceTransient`] is retried with bounded backoff.
/// - [`RuntimeError::PersistenceFatal`] marks the machine degraded.
/// - [`RuntimeError::ArchivalFailure`] never reaches the FSM engine.
/// - [`RuntimeError::SchedulerMiss`] is observed; rehydration injects the
///   overdue timeout eagerly.
/// - [`RuntimeError::ConfigurationError`] is raised eagerly at construction
///   time and prevents the registry from starting.
/// - [`RuntimeError::Overload`] is returned to the caller of `send_event`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("event {event_type:?} unhandled in state {state:?} for machine {machine_id}")]
    TransitionUnhandled { machine_id: String, state: String, event_type: String },

    #[error("handler failed for machine {machine_id} in state {state}: {message}")]
    HandlerFailure { machine_id: String, state: String, message: String },

    #[error("transient persistence error for machine {machine_id} (attempt {attempt}): {message}")]
    PersistenceTransient { machine_id: String, attempt: u32, message: String },

    #[error("persistence exhausted retries for machine {machine_id}, marking degraded: {message}")]
    PersistenceFatal { machine_id: String, message: String },

    #[error("archival failed for machine {machine_id}: {message}")]
    ArchivalFailure { machine_id: String, message: String },

    #[error("scheduler missed fire for timer {timer_id}: {message}")]
    SchedulerMiss { timer_id: String, message: String },

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("machine {machine_id} mailbox overloaded")]
    Overload { machine_id: String },

    #[error("no such machine: {machine_id}")]
    NoSuchMachine { machine_id: String },

    #[error("machine {machine_id} is degraded and refuses further events")]
    Degraded { machine_id: String },
}

/// Error returned by an entry/exit/stay handler closure. Deliberately plain
/// (no source chain): handlers run inside user-supplied closures and the
/// engine only needs the message to populate `TransitionRecord::handler_error`.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
