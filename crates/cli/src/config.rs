// SPDX-License-Identifier: MIT

//! Loads a [`RuntimeConfig`] from a TOML file on disk.

use crate::exit_error::ExitError;
use std::path::Path;
use tfsm_engine::RuntimeConfig;

pub fn load(path: &Path) -> Result<RuntimeConfig, ExitError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ExitError::config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map_err(|e| ExitError::config(format!("invalid config at {}: {e}", path.display())))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
