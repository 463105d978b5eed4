// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn transition_unhandled_message_names_state_and_event() {
    let err = RuntimeError::TransitionUnhandled {
        machine_id: "mch-1".into(),
        state: "RINGING".into(),
        event_type: "HANGUP".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("RINGING"));
    assert!(msg.contains("HANGUP"));
    assert!(msg.contains("mch-1"));
}

#[test]
fn configuration_error_wraps_plain_string() {
    let err = RuntimeError::ConfigurationError("duplicate transition target".into());
    assert_eq!(err.to_string(), "configuration error: duplicate transition target");
}

#[test]
fn overload_and_degraded_name_machine_id() {
    let overload = RuntimeError::Overload { machine_id: "mch-1".into() };
    let degraded = RuntimeError::Degraded { machine_id: "mch-1".into() };
    assert!(overload.to_string().contains("mch-1"));
    assert!(degraded.to_string().contains("degraded"));
}
