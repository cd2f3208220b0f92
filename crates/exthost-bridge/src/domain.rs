//! The `extensionData` domain.
//!
//! Registers the domain, its commands and its event with a `DomainRouter`
//! and implements the three dispatch operations:
//!
//! | Command         | Parameters                            | Result  |
//! |-----------------|---------------------------------------|---------|
//! | `initialize`    | registry id, JSON descriptor string   | null    |
//! | `loadExtension` | extension name, base directory        | boolean |
//! | `callFunction`  | extension id, dotted name, arguments  | any     |
//!
//! Outbound calls travel as `callFunction` events with payload
//! `[extension_id, name, args]`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use exthost_core::{RegistryError, RegistrySet, ServiceFn, ServiceRegistry};

use crate::error::{BridgeError, Result};
use crate::loader::{find_companion, ModuleLoader};
use crate::router::{CommandHandler, CommandSpec, DomainRouter, EventSpec, ParameterSpec};
use crate::stub::{LocalFunctionTable, RemoteStub, RouterStubFactory, StubKind};

/// Domain name registered with the router.
pub const DOMAIN_NAME: &str = "extensionData";

/// Domain version reported at registration.
const DOMAIN_VERSION: semver::Version = semver::Version::new(0, 1, 0);

/// Bridge between a host command router and extension service registries.
pub struct ExtensionDataDomain {
    router: Arc<dyn DomainRouter>,
    loader: Arc<dyn ModuleLoader>,
    registries: Arc<RegistrySet>,
    locals: Arc<LocalFunctionTable>,
    /// Optional cap on companion-module init, off by default.
    init_timeout: Option<Duration>,
}

impl ExtensionDataDomain {
    /// Create a bridge over a router and module loader.
    pub fn new(router: Arc<dyn DomainRouter>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            router,
            loader,
            registries: Arc::new(RegistrySet::new()),
            locals: Arc::new(LocalFunctionTable::new()),
            init_timeout: None,
        }
    }

    /// Cap how long a companion module's init may run.
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    /// The registry set the bridge operates on.
    pub fn registries(&self) -> &Arc<RegistrySet> {
        &self.registries
    }

    /// Local function table for `runLocal` descriptor nodes.
    pub fn locals(&self) -> &Arc<LocalFunctionTable> {
        &self.locals
    }

    /// Register the domain, commands and event with the router.
    pub fn register(self: &Arc<Self>) {
        if !self.router.has_domain(DOMAIN_NAME) {
            self.router.register_domain(DOMAIN_NAME, DOMAIN_VERSION);
        }

        self.router.register_command(
            DOMAIN_NAME,
            CommandSpec::new("initialize", "Initializes the extension data")
                .with_parameter(ParameterSpec::new("registryId", "int", "ID for this registry"))
                .with_parameter(ParameterSpec::new(
                    "data",
                    "string",
                    "JSON registry description",
                )),
            self.initialize_handler(),
        );

        self.router.register_event(
            DOMAIN_NAME,
            EventSpec::new("callFunction")
                .with_parameter(ParameterSpec::new(
                    "extension",
                    "string",
                    "name of the extension making the call",
                ))
                .with_parameter(ParameterSpec::new(
                    "name",
                    "string",
                    "dotted name of function to call",
                ))
                .with_parameter(ParameterSpec::new("args", "array", "function arguments")),
        );

        self.router.register_command(
            DOMAIN_NAME,
            CommandSpec::new("loadExtension", "Loads an extension's host side")
                .asynchronous()
                .with_parameter(ParameterSpec::new("name", "string", "name of the extension"))
                .with_parameter(ParameterSpec::new(
                    "baseDirectory",
                    "string",
                    "path of the extension",
                ))
                .with_return(ParameterSpec::new("ready", "boolean", "true when ready")),
            self.load_extension_handler(),
        );

        self.router.register_command(
            DOMAIN_NAME,
            CommandSpec::new("callFunction", "Remote function call")
                .with_parameter(ParameterSpec::new(
                    "extension",
                    "string",
                    "name of the extension the call is addressed to",
                ))
                .with_parameter(ParameterSpec::new(
                    "name",
                    "string",
                    "dotted name of the function to call",
                ))
                .with_parameter(ParameterSpec::new("args", "array", "array of arguments"))
                .with_return(ParameterSpec::new("result", "any", "function return value")),
            self.call_function_handler(),
        );
    }

    /// Parse a registry description and wire its stubs.
    ///
    /// A parse failure is fatal to this call only; prior registry state is
    /// untouched.
    pub fn initialize(&self, registry_id: u32, data: &str) -> Result<()> {
        let descriptor: Value = serde_json::from_str(data)
            .map_err(|e| RegistryError::MalformedPayload(e.to_string()))?;
        let factory =
            RouterStubFactory::new(self.router.clone(), DOMAIN_NAME, self.locals.clone());
        self.registries.initialize(registry_id, descriptor, &factory)?;
        Ok(())
    }

    /// Load an extension's companion module, if one exists.
    ///
    /// No companion file means the extension has no host side; that is not
    /// an error and nothing is loaded. When a companion exists, the module's
    /// init entry point is awaited before completion. Resolves `true` when
    /// the extension is ready.
    pub async fn load_extension(&self, name: &str, base_dir: &Path) -> Result<bool> {
        let Some(path) = find_companion(base_dir) else {
            debug!(name, base_dir = %base_dir.display(), "no companion module");
            return Ok(true);
        };

        let module = self.loader.load(name, &path)?;
        let services = self.registries.services_or_create(name);

        match self.init_timeout {
            Some(timeout) => tokio::time::timeout(timeout, module.init(services))
                .await
                .map_err(|_| {
                    warn!(name, ?timeout, "companion module init timed out");
                    BridgeError::ModuleInitTimeout(name.to_string())
                })??,
            None => module.init(services).await?,
        }

        debug!(name, path = %path.display(), "companion module initialized");
        Ok(true)
    }

    /// Invoke a dotted-name function in an extension's service registry.
    pub fn call_function(&self, extension_id: &str, name: &str, args: &[Value]) -> Result<Value> {
        let services = self.registries.services(extension_id)?;
        Ok(services.call(name, args)?)
    }

    /// Build an outbound stub addressed to a dotted name of an extension.
    pub fn remote_stub(&self, extension_id: &str, name: &str) -> RemoteStub {
        RemoteStub::new(
            self.router.clone(),
            DOMAIN_NAME,
            self.registries.services_or_create(extension_id),
            name,
            StubKind::Function,
        )
    }

    /// Build a plain forwarding wrapper as a service function.
    pub fn wrapper(&self, extension_id: &str, name: &str) -> ServiceFn {
        let factory =
            RouterStubFactory::new(self.router.clone(), DOMAIN_NAME, self.locals.clone());
        let services = self.registries.services_or_create(extension_id);
        exthost_core::StubFactory::create_wrapper(&factory, &services, name)
    }

    /// Service registry for an extension, creating it if needed.
    pub fn services(&self, extension_id: &str) -> Arc<ServiceRegistry> {
        self.registries.services_or_create(extension_id)
    }

    fn initialize_handler(self: &Arc<Self>) -> CommandHandler {
        let domain = Arc::clone(self);
        Arc::new(move |args: Vec<Value>| {
            let domain = domain.clone();
            Box::pin(async move {
                let registry_id = arg_u32(&args, 0, "registryId")?;
                let data = arg_str(&args, 1, "data")?;
                domain.initialize(registry_id, &data)?;
                Ok(Value::Null)
            })
        })
    }

    fn load_extension_handler(self: &Arc<Self>) -> CommandHandler {
        let domain = Arc::clone(self);
        Arc::new(move |args: Vec<Value>| {
            let domain = domain.clone();
            Box::pin(async move {
                let name = arg_str(&args, 0, "name")?;
                let base_dir = arg_str(&args, 1, "baseDirectory")?;
                let ready = domain.load_extension(&name, Path::new(&base_dir)).await?;
                Ok(Value::Bool(ready))
            })
        })
    }

    fn call_function_handler(self: &Arc<Self>) -> CommandHandler {
        let domain = Arc::clone(self);
        Arc::new(move |args: Vec<Value>| {
            let domain = domain.clone();
            Box::pin(async move {
                let extension_id = arg_str(&args, 0, "extension")?;
                let name = arg_str(&args, 1, "name")?;
                let call_args = arg_array(&args, 2, "args")?;
                domain.call_function(&extension_id, &name, &call_args)
            })
        })
    }
}

fn arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a Value> {
    args.get(index)
        .ok_or_else(|| BridgeError::InvalidArguments(format!("missing argument '{name}'")))
}

fn arg_u32(args: &[Value], index: usize, name: &str) -> Result<u32> {
    arg(args, index, name)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| BridgeError::InvalidArguments(format!("'{name}' must be an int")))
}

fn arg_str(args: &[Value], index: usize, name: &str) -> Result<String> {
    arg(args, index, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BridgeError::InvalidArguments(format!("'{name}' must be a string")))
}

fn arg_array(args: &[Value], index: usize, name: &str) -> Result<Vec<Value>> {
    arg(args, index, name)?
        .as_array()
        .cloned()
        .ok_or_else(|| BridgeError::InvalidArguments(format!("'{name}' must be an array")))
}
