//! Core types for the exthost extension-data bridge.
//!
//! This crate owns the state the bridge operates on:
//! - Per-extension service registries with dotted-name resolution
//! - The registry set keyed by registry id (`initialize` target)
//! - Descriptor parsing and stub wiring
//! - Callback handle tracking for outbound calls
//!
//! The bridge itself (domain registration, routing, module loading) lives in
//! `exthost-bridge`.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod registry_set;
pub mod services;

// Re-exports
pub use context::CallContext;
pub use descriptor::{FunctionNode, FunctionOptions, PendingCall, StubFactory};
pub use error::{RegistryError, Result};
pub use registry_set::RegistrySet;
pub use services::{
    CallbackHandle, ServiceCallback, ServiceFn, ServiceNode, ServiceRegistry,
};
