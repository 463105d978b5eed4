// SPDX-License-Identifier: MIT

use super::*;

struct Ctx;

#[test]
fn fluent_dsl_builds_a_valid_definition() {
    let def = MachineBuilder::<Ctx>::new("call")
        .initial_state("IDLE")
        .state(StateBuilder::new("IDLE").on("DIAL").to("RINGING"))
        .state(
            StateBuilder::new("RINGING")
                .timeout(Duration::from_secs(30), "IDLE")
                .on("ANSWER")
                .to("CONNECTED"),
        )
        .state(StateBuilder::new("CONNECTED").final_state())
        .build()
        .unwrap();

    assert_eq!(def.initial().name, "IDLE");
    assert!(def.state("CONNECTED").unwrap().is_final);
    assert!(def.state("RINGING").unwrap().timeout.is_some());
}

#[test]
fn conflicting_transition_and_stay_action_fails_at_build() {
    let handler: StayHandler<Ctx> = std::sync::Arc::new(|_ctx, _evt| Ok(false));
    let err = MachineBuilder::<Ctx>::new("call")
        .initial_state("IDLE")
        .state(StateBuilder::new("IDLE").on("PING").to("IDLE").stay("PING", handler))
        .build()
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ConfigurationError(_)));
}
