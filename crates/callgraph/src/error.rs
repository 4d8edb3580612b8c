//! Error types for callgraph operations.
//!
//! All fallible operations return [`Result<T>`] with context-rich error messages.
//! Validation problems are not errors by themselves: they are collected into a
//! [`ValidationReport`] and only become [`GraphError::ValidationFailed`] when the
//! loader refuses a payload.

use crate::loader::LoadProgress;
use crate::validate::ValidationReport;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for callgraph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Comprehensive error type for all call graph operations.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Storage backend error (RocksDB, lock poisoning, etc.)
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Function not found in the store
    #[error("Function not found: {function_id}")]
    FunctionNotFound {
        /// ID of the missing function
        function_id: String,
    },

    /// Call edge not found in the store
    #[error("Call edge not found: {edge_id}")]
    EdgeNotFound {
        /// ID of the missing edge
        edge_id: String,
    },

    /// A function with this id is already stored
    #[error("Function already exists: {function_id}")]
    DuplicateFunction {
        /// The conflicting function id
        function_id: String,
    },

    /// A call edge with this callsite id is already stored
    #[error("Callsite already exists: {callsite_id}")]
    DuplicateCallsite {
        /// The conflicting callsite id
        callsite_id: String,
    },

    /// Payload file not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Invalid operation (e.g., exporting an oversized subgraph)
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of what went wrong
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The loader refused a payload because validation found errors
    #[error("Validation failed with {} error(s)", .report.errors().len())]
    ValidationFailed {
        /// Full validation report, including warnings
        report: Box<ValidationReport>,
    },

    /// The store rejected an entity mid-load; no further writes were issued
    #[error(
        "Load aborted after committing {} function(s) and {} call(s): {source}",
        .progress.committed_functions.len(),
        .progress.committed_calls.len()
    )]
    LoadAborted {
        /// What was committed before the failure and what was rejected
        progress: Box<LoadProgress>,
        /// The store error that stopped the load
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Create a storage error from a message and optional source.
    pub fn storage<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Create a serialization error from a message and optional source.
    pub fn serialization<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Shorthand for [`GraphError::FunctionNotFound`].
    pub fn function_not_found(function_id: impl std::fmt::Display) -> Self {
        Self::FunctionNotFound {
            function_id: function_id.to_string(),
        }
    }

    /// True for the query-time "not found" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::FunctionNotFound { .. } | GraphError::EdgeNotFound { .. }
        )
    }
}
