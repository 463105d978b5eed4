// SPDX-License-Identifier: MIT

use super::*;

#[yare::parameterized(
    create = { RegistryEventKind::Create, "CREATE" },
    remove = { RegistryEventKind::Remove, "REMOVE" },
    rehydrate = { RegistryEventKind::Rehydrate, "REHYDRATE" },
    evict = { RegistryEventKind::Evict, "EVICT" },
    error = { RegistryEventKind::Error, "ERROR" },
)]
fn kind_display(kind: RegistryEventKind, expected: &str) {
    assert_eq!(kind.to_string(), expected);
}

#[test]
fn with_reason_sets_optional_field() {
    let evt = RegistryEvent::new(MachineId::from_string("mch-1"), RegistryEventKind::Evict, 123)
        .with_reason("idle ttl exceeded");
    assert_eq!(evt.reason.as_deref(), Some("idle ttl exceeded"));
}

#[test]
fn default_reason_is_none() {
    let evt = RegistryEvent::new(MachineId::from_string("mch-1"), RegistryEventKind::Create, 0);
    assert!(evt.reason.is_none());
}
