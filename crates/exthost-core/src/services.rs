//! Per-extension service registries.
//!
//! A service registry maps dotted function names (`"a.b.c"`) to invokables
//! through a nested namespace tree. Resolution is an explicit segment-by-
//! segment walk with defined miss behavior; a miss is a `Resolution` error,
//! never a panic.
//!
//! The registry also tracks callback handles: when an outbound call carries a
//! trailing callback, the callback is registered here and replaced on the
//! wire with a handle the remote side can invoke later.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::context::CallContext;
use crate::error::{RegistryError, Result};

/// An invokable service function.
///
/// Service functions are synchronous: a call either returns a value or an
/// error the caller sees unchanged.
pub type ServiceFn = Arc<dyn Fn(&CallContext, &[Value]) -> Result<Value> + Send + Sync>;

/// A callback registered for a remote side to invoke by handle.
pub type ServiceCallback = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Wire key marking a converted callback argument.
pub const CALLBACK_KEY: &str = "__callback";

/// Handle identifying a registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackHandle(String);

impl CallbackHandle {
    /// Create a fresh handle.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the handle id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire form of the handle: `{"__callback": "<id>"}`.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ CALLBACK_KEY: self.0 })
    }

    /// Parse a handle back out of its wire form.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .get(CALLBACK_KEY)
            .and_then(Value::as_str)
            .map(|id| Self(id.to_string()))
    }
}

impl Default for CallbackHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A node in the service tree.
#[derive(Clone)]
pub enum ServiceNode {
    /// Nested namespace.
    Namespace(HashMap<String, ServiceNode>),
    /// Invokable leaf.
    Function(ServiceFn),
}

impl std::fmt::Debug for ServiceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceNode::Namespace(children) => {
                f.debug_map().entries(children.iter().map(|(k, v)| (k, v))).finish()
            }
            ServiceNode::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Service registry for a single extension.
pub struct ServiceRegistry {
    /// Extension this registry belongs to.
    extension_id: String,
    /// Root namespace.
    root: RwLock<HashMap<String, ServiceNode>>,
    /// Registered callbacks awaiting remote invocation.
    callbacks: RwLock<HashMap<CallbackHandle, ServiceCallback>>,
}

impl ServiceRegistry {
    /// Create an empty registry for an extension.
    pub fn new(extension_id: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            root: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    /// Extension id this registry serves.
    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    /// Register a function at a dotted path, creating namespaces as needed.
    ///
    /// Re-registering a name replaces the previous function. Registering
    /// through an existing function node is an `InvalidPath` error.
    pub fn register(&self, name: &str, function: ServiceFn) -> Result<()> {
        let mut segments: Vec<&str> = name.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(RegistryError::InvalidPath(name.to_string()));
        }
        let Some(leaf) = segments.pop() else {
            return Err(RegistryError::InvalidPath(name.to_string()));
        };

        let mut root = self.root.write();
        let mut current = &mut *root;
        for segment in segments {
            let node = current
                .entry(segment.to_string())
                .or_insert_with(|| ServiceNode::Namespace(HashMap::new()));
            match node {
                ServiceNode::Namespace(children) => current = children,
                ServiceNode::Function(_) => {
                    return Err(RegistryError::InvalidPath(name.to_string()));
                }
            }
        }
        current.insert(leaf.to_string(), ServiceNode::Function(function));
        Ok(())
    }

    /// Resolve a dotted name to a function.
    pub fn resolve(&self, name: &str) -> Result<ServiceFn> {
        let root = self.root.read();
        let mut segments = name.split('.');
        let first = segments.next().unwrap_or("");

        let miss = |segment: &str| RegistryError::Resolution {
            name: name.to_string(),
            segment: segment.to_string(),
        };

        let mut node = root.get(first).ok_or_else(|| miss(first))?;
        let mut last = first;
        for segment in segments {
            match node {
                ServiceNode::Namespace(children) => {
                    node = children.get(segment).ok_or_else(|| miss(segment))?;
                    last = segment;
                }
                // Hit a leaf with segments left over.
                ServiceNode::Function(_) => return Err(miss(segment)),
            }
        }

        match node {
            ServiceNode::Function(f) => Ok(f.clone()),
            // Resolved to a namespace, not an invokable.
            ServiceNode::Namespace(_) => Err(miss(last)),
        }
    }

    /// Resolve and invoke a dotted name.
    ///
    /// The function runs with a context whose `function_name` is the full
    /// dotted name. Errors from the function propagate unchanged.
    pub fn call(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value> {
        let function = self.resolve(name)?;
        let ctx = CallContext::new(self.extension_id.clone(), name, Arc::clone(self));
        function(&ctx, args)
    }

    /// Whether a dotted name resolves to a function.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Register a callback and return its handle.
    pub fn add_callback(&self, callback: ServiceCallback) -> CallbackHandle {
        let handle = CallbackHandle::new();
        self.callbacks.write().insert(handle.clone(), callback);
        handle
    }

    /// Remove and return a registered callback.
    pub fn take_callback(&self, handle: &CallbackHandle) -> Option<ServiceCallback> {
        self.callbacks.write().remove(handle)
    }

    /// Number of callbacks awaiting invocation.
    pub fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Convert an outbound argument list for the wire.
    ///
    /// When a trailing callback is supplied it is registered and appended as
    /// a `{"__callback": handle}` value; the remote side invokes it later by
    /// handle. Plain values pass through untouched.
    pub fn convert_args(
        &self,
        mut args: Vec<Value>,
        callback: Option<ServiceCallback>,
    ) -> (Vec<Value>, Option<CallbackHandle>) {
        match callback {
            Some(cb) => {
                let handle = self.add_callback(cb);
                args.push(handle.to_value());
                (args, Some(handle))
            }
            None => (args, None),
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("extension_id", &self.extension_id)
            .field("callbacks", &self.callbacks.read().len())
            .finish_non_exhaustive()
    }
}
