//! Error types and result aliases for Lakeward.
//!
//! Errors are structured for programmatic handling and are always
//! table-scoped: one table's failure must never abort another table's
//! cleaning cycle.

use std::fmt;

/// The result type used throughout Lakeward.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Lakeward operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A table-level configuration problem (missing table, unparsable
    /// property value). Short-circuits that table's cycle only.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A precondition for a conditional write was not met.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition.
        message: String,
    },

    /// Metadata and storage disagree: a file referenced by a live snapshot
    /// is missing from storage. This signals possible prior incorrect
    /// deletion and must be surfaced distinctly from normal outcomes.
    #[error("metadata/storage divergence: {message}")]
    Divergence {
        /// Description of the divergence.
        message: String,
    },

    /// A scan or listing exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new configuration error with the given message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new divergence error for a missing referenced file.
    #[must_use]
    pub fn divergence(message: impl fmt::Display) -> Self {
        Self::Divergence {
            message: message.to_string(),
        }
    }

    /// Returns true when the error is a plain not-found outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
