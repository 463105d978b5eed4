// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn named_constructors_carry_the_spec_exit_codes() {
    assert_eq!(ExitError::config("bad toml").code, 2);
    assert_eq!(ExitError::storage("unreachable").code, 3);
    assert_eq!(ExitError::schema("mismatch").code, 4);
}

#[test]
fn display_shows_only_the_message() {
    let err = ExitError::new(2, "missing field `target_tps`");
    assert_eq!(err.to_string(), "missing field `target_tps`");
}
