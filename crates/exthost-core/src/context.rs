//! Explicit call context.
//!
//! Every service invocation receives a `CallContext` instead of consulting
//! process-global "current registry" state. The context carries the extension
//! id, the full dotted name being invoked, and a handle to the extension's
//! service registry.

use std::sync::Arc;

use crate::services::ServiceRegistry;

/// Context passed to every resolved service function.
#[derive(Clone)]
pub struct CallContext {
    /// Extension the call is addressed to.
    pub extension_id: String,
    /// Full dotted name of the function being invoked.
    pub function_name: String,
    /// Service registry for the extension.
    pub services: Arc<ServiceRegistry>,
}

impl CallContext {
    /// Create a new call context.
    pub fn new(
        extension_id: impl Into<String>,
        function_name: impl Into<String>,
        services: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            extension_id: extension_id.into(),
            function_name: function_name.into(),
            services,
        }
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("extension_id", &self.extension_id)
            .field("function_name", &self.function_name)
            .finish_non_exhaustive()
    }
}
