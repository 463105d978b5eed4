// SPDX-License-Identifier: MIT

//! Minimal two-state machine definition used to prove the runtime wiring
//! end to end. Not a telecom Call/SMS definition — those are out of scope
//! for this binary.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tfsm_core::{MachineDefinition, MachineDefinitionBuilder, RuntimeError, StateConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingContext {
    pub pings: u32,
}

pub fn definition() -> Result<Arc<MachineDefinition<PingContext>>, RuntimeError> {
    let def = MachineDefinitionBuilder::new("ping")
        .initial_state("IDLE")
        .state(StateConfig::new("IDLE").stay_on(
            "PING",
            Arc::new(|ctx: &mut PingContext, _evt: &tfsm_core::Event| {
                ctx.pings += 1;
                tracing::info!(pings = ctx.pings, "pong");
                Ok(true)
            }),
        ))
        .build()?;
    Ok(Arc::new(def))
}
