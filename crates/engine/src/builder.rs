// SPDX-License-Identifier: MIT

//! Fluent construction DSL over [`tfsm_core::MachineDefinitionBuilder`]
//! (spec §4.9, C9).
//!
//! Grounded on the fluent-builder-then-`build()`-validates shape of the
//! teacher's `JobConfigBuilder` (`crates/core/src/job.rs:171-232`): every
//! setter takes and returns `self`, and nothing is validated until `build()`.

use tfsm_core::{
    AutoCreateRule, ContextFactory, EntryExitHandler, IdExtractor, MachineDefinition,
    MachineDefinitionBuilder, RuntimeError, StateConfig, StayHandler, TimeoutSpec,
};
use std::time::Duration;

/// Entry point: `MachineBuilder::new("call").initial_state("IDLE").state(...)`.
pub struct MachineBuilder<Ctx> {
    inner: MachineDefinitionBuilder<Ctx>,
}

impl<Ctx> MachineBuilder<Ctx> {
    pub fn new(machine_type: impl Into<String>) -> Self {
        Self { inner: MachineDefinitionBuilder::new(machine_type) }
    }

    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.initial_state(name);
        self
    }

    pub fn state(mut self, builder: StateBuilder<Ctx>) -> Self {
        self.inner = self.inner.state(builder.inner);
        self
    }

    /// Declares an auto-create rule: when an event whose canonical type is
    /// `event_type` arrives for an id the registry doesn't hold,
    /// `id_extractor` pulls the target id out of the event and
    /// `context_factory` builds the new machine's initial context
    /// (spec §4.8 "auto-create").
    pub fn on_new_machine_create(
        mut self,
        event_type: impl Into<tfsm_core::EventType>,
        id_extractor: IdExtractor,
        context_factory: ContextFactory<Ctx>,
    ) -> Self {
        self.inner = self.inner.auto_create(AutoCreateRule {
            event_type: event_type.into(),
            id_extractor,
            context_factory,
        });
        self
    }

    pub fn build(self) -> Result<MachineDefinition<Ctx>, RuntimeError> {
        self.inner.build()
    }
}

/// Builds one [`StateConfig`]. `.on(event)` returns an [`OnBuilder`] whose
/// `.to(target)` finalizes the transition and hands the [`StateBuilder`]
/// back, so callers can write `state.on("DIAL").to("RINGING")`.
pub struct StateBuilder<Ctx> {
    inner: StateConfig<Ctx>,
}

impl<Ctx> StateBuilder<Ctx> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { inner: StateConfig::new(name) }
    }

    pub fn on(self, event_type: impl Into<tfsm_core::EventType>) -> OnBuilder<Ctx> {
        OnBuilder { state: self, event_type: event_type.into() }
    }

    pub fn stay(mut self, event_type: impl Into<tfsm_core::EventType>, handler: StayHandler<Ctx>) -> Self {
        self.inner = self.inner.stay_on(event_type, handler);
        self
    }

    pub fn timeout(mut self, duration: Duration, target_state: impl Into<String>) -> Self {
        self.inner = self.inner.timeout(TimeoutSpec::new(duration, target_state));
        self
    }

    pub fn offline(mut self) -> Self {
        self.inner = self.inner.offline();
        self
    }

    pub fn final_state(mut self) -> Self {
        self.inner = self.inner.final_state();
        self
    }

    pub fn on_entry(mut self, handler: EntryExitHandler<Ctx>) -> Self {
        self.inner = self.inner.on_entry(handler);
        self
    }

    pub fn on_exit(mut self, handler: EntryExitHandler<Ctx>) -> Self {
        self.inner = self.inner.on_exit(handler);
        self
    }
}

/// Intermediate builder returned by [`StateBuilder::on`]; exists only to
/// make `.to(target)` read naturally.
pub struct OnBuilder<Ctx> {
    state: StateBuilder<Ctx>,
    event_type: tfsm_core::EventType,
}

impl<Ctx> OnBuilder<Ctx> {
    pub fn to(mut self, target_state: impl Into<String>) -> StateBuilder<Ctx> {
        self.state.inner = self.state.inner.on(self.event_type, target_state);
        self.state
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
