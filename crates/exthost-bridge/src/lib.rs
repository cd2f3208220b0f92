//! Extension-data bridge.
//!
//! The bridge registers an `extensionData` domain with a host command router
//! and relays calls between the UI-side extension registry and host-side
//! extension code:
//!
//! - `initialize` — parse a JSON registry description and wire up stubs
//! - `callFunction` — invoke a dotted-name function in an extension's
//!   service registry
//! - `loadExtension` — load an extension's companion host module if one
//!   exists on disk
//!
//! Outbound calls made through stubs are packaged as `callFunction` events
//! and handed to the router for delivery to the opposite side of the process
//! boundary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use exthost_bridge::{ExtensionDataDomain, InProcessRouter, StaticModuleLoader};
//! use std::sync::Arc;
//!
//! let router = Arc::new(InProcessRouter::new());
//! let loader = Arc::new(StaticModuleLoader::new());
//! let domain = Arc::new(ExtensionDataDomain::new(router.clone(), loader));
//! domain.register();
//!
//! router.dispatch("extensionData", "initialize", vec![0.into(), data.into()]).await?;
//! ```

pub mod domain;
pub mod error;
pub mod loader;
pub mod router;
pub mod stub;

// Re-exports
pub use domain::{ExtensionDataDomain, DOMAIN_NAME};
pub use error::{BridgeError, Result};
pub use loader::{find_companion, ExtensionModule, ModuleLoader, StaticModuleLoader};
pub use router::{
    CommandHandler, CommandSpec, DomainRouter, EmittedEvent, EventSpec, InProcessRouter,
    ParameterSpec,
};
pub use stub::{LocalFunctionTable, RemoteStub, RouterStubFactory, StubKind};
