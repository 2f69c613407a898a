//! Module lifecycle and management for netspoof
//!
//! - [`Lifecycle`]: the `Idle -> Configuring -> Running -> Stopping` state
//!   machine each module embeds, owning the worker task and its shutdown
//! - [`Module`]: the async trait spoofers implement
//! - [`ModuleManager`]: command routing and session-wide shutdown

pub mod lifecycle;
pub mod manager;
pub mod module;

pub use lifecycle::{Lifecycle, Phase, WorkerContext};
pub use manager::{ModuleInfo, ModuleManager};
pub use module::{Handler, Module};
