//! Domain router abstraction and in-process implementation.
//!
//! The router is the host's generic dispatch mechanism: domains register
//! commands and events with it, commands are dispatched by name, and emitted
//! events fan out to subscribers. The real host router lives outside this
//! crate; `InProcessRouter` is a complete in-memory implementation for
//! embedding and tests.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

/// Default event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Async handler for a registered command.
pub type CommandHandler =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A described command or event parameter.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// Wire type ("int", "string", "array", ...).
    pub type_name: String,
    /// Human-readable description.
    pub description: String,
}

impl ParameterSpec {
    /// Create a parameter spec.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: description.into(),
        }
    }
}

/// Registration metadata for a command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Command name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the command completes asynchronously.
    pub is_async: bool,
    /// Declared parameters.
    pub parameters: Vec<ParameterSpec>,
    /// Declared return value, if any.
    pub returns: Option<ParameterSpec>,
}

impl CommandSpec {
    /// Create a command spec.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            is_async: false,
            parameters: Vec::new(),
            returns: None,
        }
    }

    /// Mark the command asynchronous.
    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Add a declared parameter.
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare the return value.
    pub fn with_return(mut self, returns: ParameterSpec) -> Self {
        self.returns = Some(returns);
        self
    }
}

/// Registration metadata for an event.
#[derive(Debug, Clone)]
pub struct EventSpec {
    /// Event name.
    pub name: String,
    /// Declared payload parameters.
    pub parameters: Vec<ParameterSpec>,
}

impl EventSpec {
    /// Create an event spec.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a declared payload parameter.
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// The host's command/event dispatch mechanism.
pub trait DomainRouter: Send + Sync {
    /// Register a domain with a version.
    fn register_domain(&self, name: &str, version: semver::Version);

    /// Whether a domain is registered.
    fn has_domain(&self, name: &str) -> bool;

    /// Register a command under a domain.
    fn register_command(&self, domain: &str, spec: CommandSpec, handler: CommandHandler);

    /// Register an event under a domain.
    fn register_event(&self, domain: &str, spec: EventSpec);

    /// Emit an event addressed to the opposite side of the process boundary.
    fn emit_event(&self, domain: &str, event: &str, payload: Vec<Value>);
}

/// An event emitted through the router.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    /// Owning domain.
    pub domain: String,
    /// Event name.
    pub event: String,
    /// Event payload.
    pub payload: Vec<Value>,
}

/// In-memory router for embedding and tests.
///
/// Commands are dispatched against a handler table; emitted events fan out
/// over a broadcast channel. If an event has no subscribers it is discarded.
pub struct InProcessRouter {
    /// Registered domains and their versions.
    domains: RwLock<HashMap<String, semver::Version>>,
    /// Command table keyed by (domain, command).
    commands: RwLock<HashMap<(String, String), (CommandSpec, CommandHandler)>>,
    /// Event specs keyed by (domain, event).
    events: RwLock<HashMap<(String, String), EventSpec>>,
    /// Broadcast sender for emitted events.
    tx: broadcast::Sender<EmittedEvent>,
}

impl InProcessRouter {
    /// Create a router with default event capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a router with the given event channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            domains: RwLock::new(HashMap::new()),
            commands: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            tx,
        }
    }

    /// Subscribe to all emitted events.
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.tx.subscribe()
    }

    /// Dispatch a command by name.
    pub async fn dispatch(&self, domain: &str, command: &str, args: Vec<Value>) -> Result<Value> {
        if !self.has_domain(domain) {
            return Err(BridgeError::UnknownDomain(domain.to_string()));
        }

        let handler = {
            let commands = self.commands.read();
            commands
                .get(&(domain.to_string(), command.to_string()))
                .map(|(_, handler)| handler.clone())
        };
        let handler = handler.ok_or_else(|| BridgeError::UnknownCommand {
            domain: domain.to_string(),
            command: command.to_string(),
        })?;

        debug!(domain, command, "dispatching command");
        handler(args).await
    }

    /// Whether a command is registered.
    pub fn has_command(&self, domain: &str, command: &str) -> bool {
        self.commands
            .read()
            .contains_key(&(domain.to_string(), command.to_string()))
    }

    /// Get a registered command's spec.
    pub fn command_spec(&self, domain: &str, command: &str) -> Option<CommandSpec> {
        self.commands
            .read()
            .get(&(domain.to_string(), command.to_string()))
            .map(|(spec, _)| spec.clone())
    }

    /// Get a registered event's spec.
    pub fn event_spec(&self, domain: &str, event: &str) -> Option<EventSpec> {
        self.events
            .read()
            .get(&(domain.to_string(), event.to_string()))
            .cloned()
    }
}

impl DomainRouter for InProcessRouter {
    fn register_domain(&self, name: &str, version: semver::Version) {
        self.domains.write().insert(name.to_string(), version);
    }

    fn has_domain(&self, name: &str) -> bool {
        self.domains.read().contains_key(name)
    }

    fn register_command(&self, domain: &str, spec: CommandSpec, handler: CommandHandler) {
        if !self.has_domain(domain) {
            warn!(domain, command = %spec.name, "command registered before its domain");
        }
        self.commands
            .write()
            .insert((domain.to_string(), spec.name.clone()), (spec, handler));
    }

    fn register_event(&self, domain: &str, spec: EventSpec) {
        self.events
            .write()
            .insert((domain.to_string(), spec.name.clone()), spec);
    }

    fn emit_event(&self, domain: &str, event: &str, payload: Vec<Value>) {
        let _ = self.tx.send(EmittedEvent {
            domain: domain.to_string(),
            event: event.to_string(),
            payload,
        });
    }
}

impl Default for InProcessRouter {
    fn default() -> Self {
        Self::new()
    }
}
