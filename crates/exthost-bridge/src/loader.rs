//! Companion-module loading.
//!
//! An extension may ship a host-side companion module next to its UI code.
//! The companion is discovered by probing `<base_dir>/host-main.<suffix>`;
//! absence is not an error, the extension simply has no host side.
//!
//! Modules are registered up front by extension name through
//! `StaticModuleLoader` rather than loaded as code from disk; the on-disk
//! companion file only gates whether loading is attempted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use exthost_core::ServiceRegistry;

use crate::error::{BridgeError, Result};

/// File stem of a companion module.
pub const COMPANION_STEM: &str = "host-main";

/// Suffixes probed for a companion module, in order.
pub const COMPANION_SUFFIXES: &[&str] = &["so", "dylib", "dll", "wasm"];

/// Find an extension's companion module file, if present.
pub fn find_companion(base_dir: &Path) -> Option<PathBuf> {
    COMPANION_SUFFIXES
        .iter()
        .map(|suffix| base_dir.join(format!("{COMPANION_STEM}.{suffix}")))
        .find(|path| path.is_file())
}

/// A host-side companion module for an extension.
#[async_trait]
pub trait ExtensionModule: Send + Sync {
    /// Initialization entry point, invoked with the extension's service
    /// registry. Always awaited; a module without real init work keeps the
    /// default no-op.
    async fn init(&self, services: Arc<ServiceRegistry>) -> Result<()> {
        let _ = services;
        Ok(())
    }
}

/// Locates the module for a named extension once its companion file exists.
pub trait ModuleLoader: Send + Sync {
    /// Load the module registered for `name`. `path` is the companion file
    /// that gated the load.
    fn load(&self, name: &str, path: &Path) -> Result<Arc<dyn ExtensionModule>>;
}

/// Loader over a table of statically registered modules.
pub struct StaticModuleLoader {
    modules: RwLock<HashMap<String, Arc<dyn ExtensionModule>>>,
}

impl StaticModuleLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
        }
    }

    /// Register a module for an extension name.
    pub fn register(&self, name: impl Into<String>, module: Arc<dyn ExtensionModule>) {
        self.modules.write().insert(name.into(), module);
    }

    /// Whether a module is registered for the name.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, name: &str, path: &Path) -> Result<Arc<dyn ExtensionModule>> {
        debug!(name, path = %path.display(), "loading companion module");
        self.modules
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::ModuleNotRegistered(name.to_string()))
    }
}

impl Default for StaticModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}
