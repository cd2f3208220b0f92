//! Bridge error types.

use exthost_core::RegistryError;

/// Bridge error types.
///
/// `MalformedPayload` and `Resolution` registry errors are returned to the
/// dispatching caller as structured errors; `Invocation` errors pass through
/// unchanged. Nothing here is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Registry-level failure (payload, resolution, invocation).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A companion file exists but no module was registered for the name.
    #[error("no module registered for extension '{0}'")]
    ModuleNotRegistered(String),

    /// Companion module init failed.
    #[error("module init for '{extension_id}' failed: {message}")]
    ModuleInit {
        extension_id: String,
        message: String,
    },

    /// Companion module init exceeded the configured timeout.
    #[error("module init for '{0}' timed out")]
    ModuleInitTimeout(String),

    /// Command dispatched to a domain the router does not know.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// Command not registered under the domain.
    #[error("unknown command: {domain}.{command}")]
    UnknownCommand { domain: String, command: String },

    /// Command arguments did not match the command's parameter list.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Build a `ModuleInit` error for an extension.
    pub fn module_init(extension_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleInit {
            extension_id: extension_id.into(),
            message: message.into(),
        }
    }
}

/// Bridge result type.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
