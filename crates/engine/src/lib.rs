// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The state-machine runtime: machine tasks, the registry that routes
//! events to them, the timeout scheduler, the observer fan-out, and the
//! `RuntimeContext` that wires them together for one machine type.

pub mod builder;
pub mod config;
pub mod error;
pub mod machine;
pub mod monitoring;
pub mod observer;
pub mod registry;
pub mod runtime;
pub mod scheduler;

pub use builder::{MachineBuilder, OnBuilder, StateBuilder};
pub use config::RuntimeConfig;
pub use error::{HandlerError, RuntimeError};
pub use machine::{graph_from_row, Lifecycle, MachineDeps, MachineHandle};
pub use monitoring::{EventCommand, ObserverMessage, StateChange, TimeoutCountdown, TreeviewStoreUpdate};
pub use observer::ObserverBus;
pub use registry::{Registry, RegistryDeps};
pub use runtime::{BackgroundLoops, RuntimeContext};
pub use scheduler::{FiredTimer, TimeoutScheduler};
