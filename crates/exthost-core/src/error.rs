//! Error types for registry operations.

/// Registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The payload handed to `initialize` was not valid JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A dotted-name segment did not resolve to anything invokable.
    #[error("cannot resolve '{segment}' while looking up '{name}'")]
    Resolution { name: String, segment: String },

    /// The resolved function itself failed.
    #[error("'{name}' failed: {message}")]
    Invocation { name: String, message: String },

    /// A registration path crossed an existing function node.
    #[error("invalid registration path: {0}")]
    InvalidPath(String),

    /// A `runLocal` descriptor node has no registered local function.
    #[error("no local function registered for '{extension_id}': '{name}'")]
    MissingLocalFunction { extension_id: String, name: String },

    /// Registry id is not known.
    #[error("unknown registry: {0}")]
    UnknownRegistry(u32),

    /// Extension id is not known.
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Build an `Invocation` error for a named function.
    pub fn invocation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Registry result type.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
