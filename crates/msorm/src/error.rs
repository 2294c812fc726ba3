//! Error types for msorm

use thiserror::Error;

/// Result type alias for msorm operations
pub type DbResult<T> = Result<T, Error>;

/// Error types for statement building, metadata access, and execution.
#[derive(Debug, Error)]
pub enum Error {
    /// A recognized business-rule violation. Always carries a human-readable
    /// message and is always returned, never thrown.
    #[error("Handled failure: {0}")]
    Handled(String),

    /// An unexpected failure at the execution boundary. Carries the
    /// best-effort parameter-substituted statement text for diagnosis.
    /// Substitution happens purely for error reporting, never for execution.
    #[error("Unhandled failure: {message} (statement: {statement})")]
    Unhandled { message: String, statement: String },

    /// Metadata lookup failure (missing surrogate-id flag, row absent).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Result-set shape mismatch when reading catalog or row data.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Create a handled failure.
    pub fn handled(message: impl Into<String>) -> Self {
        Self::Handled(message.into())
    }

    /// Create an unhandled failure carrying the offending statement text.
    pub fn unhandled(message: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::Unhandled {
            message: message.into(),
            statement: statement.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Check if this is a handled (business-rule) failure.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    /// Check if this is an unhandled (execution-boundary) failure.
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled { .. })
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
