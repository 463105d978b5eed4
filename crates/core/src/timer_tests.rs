// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn timer_id_round_trips_through_kind() {
    let machine_id = MachineId::from_string("mch-abc");
    let id = TimerId::for_state(&machine_id, "RINGING", 3);
    assert_eq!(id.as_str(), "timeout:mch-abc:RINGING:3");

    let kind = id.kind().unwrap();
    assert_eq!(kind.machine_id, machine_id);
    assert_eq!(kind.state, "RINGING");
    assert_eq!(kind.version, 3);
}

#[test]
fn timer_id_parse_rejects_malformed() {
    assert!(TimerKind::parse("not-a-timer").is_none());
    assert!(TimerKind::parse("timeout:only-one-part").is_none());
}

#[test]
fn timer_id_serde() {
    let id = TimerId::from_string("timeout:mch-1:IDLE:1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"timeout:mch-1:IDLE:1\"");
    let parsed: TimerId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn timer_id_equality() {
    let a = TimerId::from_string("timeout:mch-1:IDLE:1");
    let b = TimerId::from_string("timeout:mch-1:IDLE:1");
    let c = TimerId::from_string("timeout:mch-1:IDLE:2");
    assert_eq!(a, b);
    assert_ne!(a, c);
}
