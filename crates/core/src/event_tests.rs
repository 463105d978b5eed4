// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn timeout_event_carries_source_state_and_version() {
    let evt = Event::timeout("RINGING", 3);
    assert!(evt.is_timeout());
    assert_eq!(evt.payload["source_state"], "RINGING");
    assert_eq!(evt.payload["version"], 3);
}

#[test]
fn event_type_identity_is_string_not_rust_type() {
    let a = Event::new(EventType::new("call:answer"), serde_json::json!({}));
    let b = Event::new("call:answer", serde_json::json!({"unused": true}));
    assert_eq!(a.event_type, b.event_type);
}

#[test]
fn send_result_accepted_helper() {
    assert!(SendResult::Accepted.is_accepted());
    assert!(!SendResult::Overloaded.is_accepted());
    assert!(!SendResult::Rejected("no such machine".into()).is_accepted());
}

#[test]
fn event_serde_round_trip() {
    let evt = Event::new("call:hangup", serde_json::json!({"reason": "done"}))
        .with_timestamp_ms(1000)
        .with_description("user hung up");
    let json = serde_json::to_string(&evt).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.event_type, evt.event_type);
    assert_eq!(parsed.timestamp_ms, 1000);
    assert_eq!(parsed.description, "user hung up");
}
