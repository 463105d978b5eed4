// SPDX-License-Identifier: MIT

//! Static, immutable machine definitions (spec §2 `MachineDefinition`,
//! §4.7 construction-time validation).

use crate::error::{HandlerError, RuntimeError};
use crate::event::{Event, EventType};
use crate::id::MachineId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Runs on entry into, or exit from, a state. Mutates the machine's context
/// in place; a returned error is recorded on the transition but does not
/// unwind the transition itself (spec §7: handler failures are recorded,
/// not propagated).
pub type EntryExitHandler<Ctx> = Arc<dyn Fn(&mut Ctx) -> Result<(), HandlerError> + Send + Sync>;

/// Runs when an event is handled by a stay action (same state before/after).
/// Returns whether the context was mutated, so the engine knows whether to
/// persist a new snapshot.
pub type StayHandler<Ctx> =
    Arc<dyn Fn(&mut Ctx, &Event) -> Result<bool, HandlerError> + Send + Sync>;

/// Builds a fresh context for a machine auto-created by an unmatched event.
pub type ContextFactory<Ctx> = Arc<dyn Fn(&Event) -> Ctx + Send + Sync>;

/// Extracts the entity id a not-yet-registered event should be routed to.
pub type IdExtractor = Arc<dyn Fn(&Event) -> Option<MachineId> + Send + Sync>;

/// A state's timeout: how long after entry it fires, and which state it
/// drives the machine to. The target is fixed at schedule time, not looked
/// up through the state's transition table — firing a timeout is not the
/// same as an external event matching a declared transition.
#[derive(Clone)]
pub struct TimeoutSpec {
    pub duration: Duration,
    pub target_state: String,
}

impl TimeoutSpec {
    pub fn new(duration: Duration, target_state: impl Into<String>) -> Self {
        Self { duration, target_state: target_state.into() }
    }
}

/// One state in a [`MachineDefinition`].
#[derive(Clone)]
pub struct StateConfig<Ctx> {
    pub name: String,
    pub entry: Option<EntryExitHandler<Ctx>>,
    pub exit: Option<EntryExitHandler<Ctx>>,
    pub is_final: bool,
    pub is_offline: bool,
    pub timeout: Option<TimeoutSpec>,
    pub transitions: HashMap<EventType, String>,
    pub stay_actions: HashMap<EventType, StayHandler<Ctx>>,
}

impl<Ctx> StateConfig<Ctx> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            exit: None,
            is_final: false,
            is_offline: false,
            timeout: None,
            transitions: HashMap::new(),
            stay_actions: HashMap::new(),
        }
    }

    pub fn on_entry(mut self, handler: EntryExitHandler<Ctx>) -> Self {
        self.entry = Some(handler);
        self
    }

    pub fn on_exit(mut self, handler: EntryExitHandler<Ctx>) -> Self {
        self.exit = Some(handler);
        self
    }

    pub fn final_state(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn offline(mut self) -> Self {
        self.is_offline = true;
        self
    }

    pub fn timeout(mut self, spec: TimeoutSpec) -> Self {
        self.timeout = Some(spec);
        self
    }

    pub fn on(mut self, event_type: impl Into<EventType>, target_state: impl Into<String>) -> Self {
        self.transitions.insert(event_type.into(), target_state.into());
        self
    }

    pub fn stay_on(mut self, event_type: impl Into<EventType>, handler: StayHandler<Ctx>) -> Self {
        self.stay_actions.insert(event_type.into(), handler);
        self
    }
}

/// Rule for auto-creating a machine when an event arrives addressed to an
/// id not currently held by the registry (spec §4.8 "auto-create").
#[derive(Clone)]
pub struct AutoCreateRule<Ctx> {
    pub event_type: EventType,
    pub id_extractor: IdExtractor,
    pub context_factory: ContextFactory<Ctx>,
}

/// A complete, validated description of one machine type. Immutable once
/// built; shared by reference across every [`MachineInstance`](crate::instance::MachineInstance)
/// of that type (spec §2: "one definition, many instances").
pub struct MachineDefinition<Ctx> {
    pub machine_type: String,
    pub initial_state: String,
    pub states: HashMap<String, StateConfig<Ctx>>,
    pub auto_create: HashMap<EventType, AutoCreateRule<Ctx>>,
}

impl<Ctx> MachineDefinition<Ctx> {
    pub fn state(&self, name: &str) -> Option<&StateConfig<Ctx>> {
        self.states.get(name)
    }

    pub fn initial(&self) -> &StateConfig<Ctx> {
        self.states
            .get(&self.initial_state)
            .expect("construction-time validation guarantees initial_state exists")
    }
}

/// Accumulates states and auto-create rules, then validates them as one
/// atomic step (spec §4.7: "construction-time validation, never a runtime
/// error"). Collisions within a single `(state, event)` pair — two
/// transition targets, or a transition and a stay action both claiming the
/// same event — fail construction.
pub struct MachineDefinitionBuilder<Ctx> {
    machine_type: String,
    initial_state: Option<String>,
    states: HashMap<String, StateConfig<Ctx>>,
    auto_create: HashMap<EventType, AutoCreateRule<Ctx>>,
}

impl<Ctx> MachineDefinitionBuilder<Ctx> {
    pub fn new(machine_type: impl Into<String>) -> Self {
        Self {
            machine_type: machine_type.into(),
            initial_state: None,
            states: HashMap::new(),
            auto_create: HashMap::new(),
        }
    }

    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.initial_state = Some(name.into());
        self
    }

    pub fn state(mut self, config: StateConfig<Ctx>) -> Self {
        self.states.insert(config.name.clone(), config);
        self
    }

    pub fn auto_create(mut self, rule: AutoCreateRule<Ctx>) -> Self {
        self.auto_create.insert(rule.event_type.clone(), rule);
        self
    }

    /// Runs the §4.7 validation pass and produces the immutable definition.
    pub fn build(self) -> Result<MachineDefinition<Ctx>, RuntimeError> {
        let initial_state = self.initial_state.ok_or_else(|| {
            RuntimeError::ConfigurationError(format!(
                "machine type {:?} declares no initial_state",
                self.machine_type
            ))
        })?;

        if !self.states.contains_key(&initial_state) {
            return Err(RuntimeError::ConfigurationError(format!(
                "machine type {:?} initial_state {:?} is not a declared state",
                self.machine_type, initial_state
            )));
        }

        for state in self.states.values() {
            for event_type in state.transitions.keys() {
                if state.stay_actions.contains_key(event_type) {
                    return Err(RuntimeError::ConfigurationError(format!(
                        "machine type {:?} state {:?} declares both a transition and a stay action for event {:?}",
                        self.machine_type, state.name, event_type
                    )));
                }
            }
            for target in state.transitions.values() {
                if !self.states.contains_key(target) {
                    return Err(RuntimeError::ConfigurationError(format!(
                        "machine type {:?} state {:?} transitions to undeclared state {:?}",
                        self.machine_type, state.name, target
                    )));
                }
            }
            if let Some(timeout) = &state.timeout {
                if !self.states.contains_key(&timeout.target_state) {
                    return Err(RuntimeError::ConfigurationError(format!(
                        "machine type {:?} state {:?} timeout targets undeclared state {:?}",
                        self.machine_type, state.name, timeout.target_state
                    )));
                }
            }
        }

        Ok(MachineDefinition {
            machine_type: self.machine_type,
            initial_state,
            states: self.states,
            auto_create: self.auto_create,
        })
    }
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
