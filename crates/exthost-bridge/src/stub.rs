//! Outbound stubs and the local function table.
//!
//! A stub is a locally callable proxy for a function that lives on the other
//! side of the process boundary. Invoking one packages the call as a
//! `PendingCall` and emits it as a `callFunction` event; no code runs in the
//! calling process.
//!
//! Descriptor nodes marked `runLocal` resolve against `LocalFunctionTable`
//! instead: a statically registered table keyed by extension and dotted name.
//! Nothing is ever synthesized from descriptor-supplied source text.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use exthost_core::{
    CallbackHandle, FunctionNode, PendingCall, RegistryError, ServiceCallback, ServiceFn,
    ServiceRegistry, StubFactory,
};

use crate::router::DomainRouter;

/// Statically registered local functions, keyed by extension and dotted name.
///
/// Replaces runtime code synthesis for `runLocal` descriptor nodes: a node
/// only runs locally if a function was registered here up front.
pub struct LocalFunctionTable {
    functions: RwLock<HashMap<(String, String), ServiceFn>>,
}

impl LocalFunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a local function for an extension's dotted name.
    pub fn register(
        &self,
        extension_id: impl Into<String>,
        name: impl Into<String>,
        function: ServiceFn,
    ) {
        self.functions
            .write()
            .insert((extension_id.into(), name.into()), function);
    }

    /// Look up a registered local function.
    pub fn get(&self, extension_id: &str, name: &str) -> Option<ServiceFn> {
        self.functions
            .read()
            .get(&(extension_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

impl Default for LocalFunctionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Stub flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubKind {
    /// Descriptor function stub; trailing callbacks are converted to handles.
    Function,
    /// Plain named wrapper; callbacks are not converted.
    Wrapper,
}

/// A callable proxy that forwards invocations across the process boundary.
pub struct RemoteStub {
    router: Arc<dyn DomainRouter>,
    domain: String,
    services: Arc<ServiceRegistry>,
    function_name: String,
    kind: StubKind,
}

impl RemoteStub {
    /// Create a stub forwarding through `router` under `domain`.
    pub fn new(
        router: Arc<dyn DomainRouter>,
        domain: impl Into<String>,
        services: Arc<ServiceRegistry>,
        function_name: impl Into<String>,
        kind: StubKind,
    ) -> Self {
        Self {
            router,
            domain: domain.into(),
            services,
            function_name: function_name.into(),
            kind,
        }
    }

    /// Dotted name this stub forwards to.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Stub flavor.
    pub fn kind(&self) -> StubKind {
        self.kind
    }

    fn emit(&self, arguments: Vec<Value>) {
        let call = PendingCall::new(
            self.services.extension_id(),
            self.function_name.clone(),
            arguments,
        );
        self.router
            .emit_event(&self.domain, "callFunction", call.into_payload());
    }

    /// Forward a call with plain arguments.
    pub fn call(&self, arguments: Vec<Value>) {
        self.emit(arguments);
    }

    /// Forward a call with a trailing callback.
    ///
    /// The callback is registered with the extension's service registry and
    /// travels as a handle the remote side invokes later. Wrapper stubs do
    /// not convert callbacks; the callback is dropped and the call forwarded
    /// as-is.
    pub fn call_with_callback(
        &self,
        arguments: Vec<Value>,
        callback: ServiceCallback,
    ) -> Option<CallbackHandle> {
        if self.kind == StubKind::Wrapper {
            debug!(
                function = %self.function_name,
                "wrapper stub invoked with a callback; dropping it"
            );
            self.emit(arguments);
            return None;
        }
        let (arguments, handle) = self.services.convert_args(arguments, Some(callback));
        self.emit(arguments);
        handle
    }

    /// Wrap the stub as a service function.
    ///
    /// Invocations through the registry forward their arguments unchanged
    /// and complete with null; the real result arrives, if at all, through a
    /// callback handle already present in the arguments.
    pub fn into_service_fn(self) -> ServiceFn {
        let stub = Arc::new(self);
        Arc::new(move |_ctx, args| {
            stub.emit(args.to_vec());
            Ok(Value::Null)
        })
    }
}

/// Stub factory backed by a router and a local function table.
pub struct RouterStubFactory {
    router: Arc<dyn DomainRouter>,
    domain: String,
    locals: Arc<LocalFunctionTable>,
}

impl RouterStubFactory {
    /// Create a factory emitting under `domain`.
    pub fn new(
        router: Arc<dyn DomainRouter>,
        domain: impl Into<String>,
        locals: Arc<LocalFunctionTable>,
    ) -> Self {
        Self {
            router,
            domain: domain.into(),
            locals,
        }
    }

    fn remote(&self, services: &Arc<ServiceRegistry>, name: &str, kind: StubKind) -> ServiceFn {
        RemoteStub::new(
            self.router.clone(),
            self.domain.clone(),
            services.clone(),
            name,
            kind,
        )
        .into_service_fn()
    }
}

impl StubFactory for RouterStubFactory {
    fn create_function(
        &self,
        services: &Arc<ServiceRegistry>,
        node: &FunctionNode,
    ) -> Result<ServiceFn, RegistryError> {
        if node.options.run_local {
            return self
                .locals
                .get(services.extension_id(), &node.function)
                .ok_or_else(|| RegistryError::MissingLocalFunction {
                    extension_id: services.extension_id().to_string(),
                    name: node.function.clone(),
                });
        }
        Ok(self.remote(services, &node.function, StubKind::Function))
    }

    fn create_wrapper(&self, services: &Arc<ServiceRegistry>, name: &str) -> ServiceFn {
        self.remote(services, name, StubKind::Wrapper)
    }
}
