//! Session store error types

use std::fmt;

/// Store operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Building a connection from a client handed to a store constructor
    Connect,
    Has,
    Load,
    Revoke,
    /// Save or renew
    Save,
    /// Background expiration sweep
    Sweep,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Has => "has",
            Operation::Load => "load",
            Operation::Revoke => "revoke",
            Operation::Save => "save",
            Operation::Sweep => "sweep",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during session store operations
///
/// A missing session is never an error: stores report it as `Ok(None)` or `Ok(false)`.
#[derive(Debug)]
pub enum SessionError {
    /// The storage medium failed (connectivity, query execution)
    Store {
        backend: &'static str,
        operation: Operation,
        message: String,
    },
    /// A payload could not be serialized for, or deserialized from, the storage medium
    Serialization {
        backend: &'static str,
        operation: Operation,
        message: String,
    },
    /// Store configuration was rejected at construction
    InvalidConfig(String),
    /// A store was constructed outside of a Tokio runtime
    NoRuntime,
    /// The background sweeper task did not terminate cleanly
    Sweeper(String),
}

impl SessionError {
    pub(crate) fn store(backend: &'static str, operation: Operation, err: impl fmt::Display) -> Self {
        let message = err.to_string();
        tracing::error!(backend, %operation, error = %message, "session store operation failed");
        SessionError::Store {
            backend,
            operation,
            message,
        }
    }

    pub(crate) fn serialization(
        backend: &'static str,
        operation: Operation,
        err: impl fmt::Display,
    ) -> Self {
        let message = err.to_string();
        tracing::error!(backend, %operation, error = %message, "session payload (de)serialization failed");
        SessionError::Serialization {
            backend,
            operation,
            message,
        }
    }

    /// Whether this error signals corrupt or unserializable payload data
    pub fn is_serialization(&self) -> bool {
        matches!(self, SessionError::Serialization { .. })
    }

    /// Whether this error signals a storage medium failure
    pub fn is_store(&self) -> bool {
        matches!(self, SessionError::Store { .. })
    }

    /// Name of the backend that produced the error, if any
    pub fn backend(&self) -> Option<&'static str> {
        match self {
            SessionError::Store { backend, .. } | SessionError::Serialization { backend, .. } => {
                Some(backend)
            }
            _ => None,
        }
    }

    /// Operation that produced the error, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            SessionError::Store { operation, .. }
            | SessionError::Serialization { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Store {
                backend,
                operation,
                message,
            } => write!(f, "[{}] {} failed: {}", backend, operation, message),
            SessionError::Serialization {
                backend,
                operation,
                message,
            } => write!(f, "[{}] {} serialization error: {}", backend, operation, message),
            SessionError::InvalidConfig(msg) => write!(f, "Invalid store configuration: {}", msg),
            SessionError::NoRuntime => {
                write!(f, "Session stores must be created inside a Tokio runtime")
            }
            SessionError::Sweeper(msg) => write!(f, "Expiration sweeper failed: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
