//! Process-wide registry state keyed by registry id.
//!
//! `initialize` stores the parsed descriptor under its registry id and wires
//! the stubs it describes into per-extension service registries. The set is
//! the single owner of this shared state; callers reach it through `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::descriptor::{collect_function_nodes, StubFactory};
use crate::error::{RegistryError, Result};
use crate::services::ServiceRegistry;

/// Registry set holding descriptors and per-extension service registries.
pub struct RegistrySet {
    /// Parsed descriptors keyed by registry id.
    descriptors: RwLock<HashMap<u32, Value>>,
    /// Service registries keyed by extension id.
    services: RwLock<HashMap<String, Arc<ServiceRegistry>>>,
}

impl RegistrySet {
    /// Create an empty registry set.
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Initialize a registry from a parsed descriptor.
    ///
    /// Top-level keys of the descriptor name extensions; every function node
    /// in a subtree is built through `factory` and registered into that
    /// extension's service registry at its dotted name. The descriptor is
    /// stored only after wiring succeeds, so a failed initialize leaves prior
    /// state for `registry_id` unchanged.
    pub fn initialize(
        &self,
        registry_id: u32,
        descriptor: Value,
        factory: &dyn StubFactory,
    ) -> Result<()> {
        let mut wired = 0usize;

        if let Some(extensions) = descriptor.as_object() {
            // Build everything before touching live registries.
            let mut pending = Vec::new();
            for (extension_id, subtree) in extensions {
                let services = self.services_or_create(extension_id);
                for node in collect_function_nodes(subtree) {
                    let function = factory.create_function(&services, &node)?;
                    pending.push((services.clone(), node.function, function));
                }
            }

            wired = pending.len();
            for (services, name, function) in pending {
                services.register(&name, function)?;
            }
        }

        debug!(registry_id, functions = wired, "registry initialized");
        self.descriptors.write().insert(registry_id, descriptor);
        Ok(())
    }

    /// Get the stored descriptor for a registry id.
    pub fn descriptor(&self, registry_id: u32) -> Result<Value> {
        self.descriptors
            .read()
            .get(&registry_id)
            .cloned()
            .ok_or(RegistryError::UnknownRegistry(registry_id))
    }

    /// Get the service registry for an extension.
    pub fn services(&self, extension_id: &str) -> Result<Arc<ServiceRegistry>> {
        self.services
            .read()
            .get(extension_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownExtension(extension_id.to_string()))
    }

    /// Get or create the service registry for an extension.
    pub fn services_or_create(&self, extension_id: &str) -> Arc<ServiceRegistry> {
        if let Some(existing) = self.services.read().get(extension_id) {
            return existing.clone();
        }
        self.services
            .write()
            .entry(extension_id.to_string())
            .or_insert_with(|| Arc::new(ServiceRegistry::new(extension_id)))
            .clone()
    }

    /// Whether an extension is known.
    pub fn contains_extension(&self, extension_id: &str) -> bool {
        self.services.read().contains_key(extension_id)
    }

    /// Number of initialized registries.
    pub fn registry_count(&self) -> usize {
        self.descriptors.read().len()
    }
}

impl Default for RegistrySet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FunctionNode;
    use crate::services::ServiceFn;
    use serde_json::json;

    /// Factory wiring every node to a no-op function.
    struct NoopFactory;

    impl StubFactory for NoopFactory {
        fn create_function(
            &self,
            _services: &Arc<ServiceRegistry>,
            _node: &FunctionNode,
        ) -> Result<ServiceFn> {
            Ok(Arc::new(|_ctx, _args| Ok(Value::Null)))
        }

        fn create_wrapper(&self, _services: &Arc<ServiceRegistry>, _name: &str) -> ServiceFn {
            Arc::new(|_ctx, _args| Ok(Value::Null))
        }
    }

    #[test]
    fn test_initialize_stores_descriptor_and_wires_functions() {
        let set = RegistrySet::new();
        let descriptor = json!({
            "myExt": {
                "ui": { "log": { "__function": "ui.log" } }
            }
        });

        set.initialize(7, descriptor.clone(), &NoopFactory).unwrap();

        assert_eq!(set.descriptor(7).unwrap(), descriptor);
        assert!(set.contains_extension("myExt"));
        assert!(set.services("myExt").unwrap().contains("ui.log"));
    }

    #[test]
    fn test_unknown_lookups() {
        let set = RegistrySet::new();
        assert!(matches!(
            set.descriptor(1),
            Err(RegistryError::UnknownRegistry(1))
        ));
        assert!(matches!(
            set.services("nope"),
            Err(RegistryError::UnknownExtension(_))
        ));
    }

    #[test]
    fn test_services_or_create_is_stable() {
        let set = RegistrySet::new();
        let a = set.services_or_create("ext");
        let b = set.services_or_create("ext");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_failed_wiring_preserves_prior_descriptor() {
        /// Factory that refuses every node.
        struct FailFactory;
        impl StubFactory for FailFactory {
            fn create_function(
                &self,
                _services: &Arc<ServiceRegistry>,
                node: &FunctionNode,
            ) -> Result<ServiceFn> {
                Err(RegistryError::MissingLocalFunction {
                    extension_id: "myExt".to_string(),
                    name: node.function.clone(),
                })
            }

            fn create_wrapper(&self, _services: &Arc<ServiceRegistry>, _name: &str) -> ServiceFn {
                Arc::new(|_ctx, _args| Ok(Value::Null))
            }
        }

        let set = RegistrySet::new();
        let first = json!({ "myExt": { "a": { "__function": "a" } } });
        set.initialize(1, first.clone(), &NoopFactory).unwrap();

        let second = json!({ "myExt": { "b": { "__function": "b" } } });
        assert!(set.initialize(1, second, &FailFactory).is_err());

        // Prior descriptor for the id survives the failed initialize.
        assert_eq!(set.descriptor(1).unwrap(), first);
    }
}
