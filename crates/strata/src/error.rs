//! Error taxonomy for the data-access layer.

/// Boxed error type produced by executor implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the data-access layer.
///
/// Configuration and unsupported-operation errors are programming-time
/// defects and are never retried. Execution errors are propagated unchanged
/// from the executor; this layer performs no retry or partial-commit
/// recovery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity's metadata does not support the requested operation, e.g.
    /// a single-key lookup against an entity with zero or composite keys.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation requires a SQL pattern the active dialect does not
    /// support. No fallback is substituted.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A failure reported by the executor: connection loss, constraint
    /// violation, timeout.
    #[error("execution failed: {0}")]
    Execution(#[source] BoxError),

    /// A value could not be converted to the requested Rust type.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// A column expected by the entity mapping was absent from the row.
    #[error("missing column '{0}'")]
    MissingColumn(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wraps an executor failure.
    pub fn execution(err: impl Into<BoxError>) -> Self {
        Self::Execution(err.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub(crate) fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }
}
