// SPDX-License-Identifier: MIT

//! Re-exports the shared error taxonomy so engine modules can `use
//! crate::error::RuntimeError` the way they would any locally-owned type.

pub use tfsm_core::{HandlerError, RuntimeError};
