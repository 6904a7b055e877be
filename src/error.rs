//! # Registry Error Types
//!
//! Structured error handling for the registry using thiserror
//! for typed error values instead of `Box<dyn Error>` patterns.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid argument: {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Conflict: stored value for {id} no longer matches the expected prior value")]
    Conflict { id: Uuid },

    #[error("Subscriber '{subscriber}' failed while handling {event}: {message}")]
    Subscriber {
        subscriber: String,
        event: String,
        message: String,
    },
}

impl RegistryError {
    /// Shorthand for validation failures on a named field.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        RegistryError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a cancelled long-running operation.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        RegistryError::Cancelled {
            operation: operation.into(),
        }
    }

    /// True when the error is the cancellation outcome, as opposed to
    /// exhaustion or a validation failure. Callers use this to tell an
    /// aborted stream apart from a finished one.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistryError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
