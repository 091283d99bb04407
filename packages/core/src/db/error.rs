//! Database Error Types
//!
//! This module defines error types for structural store operations, covering
//! connection and schema failures as well as misuse of a store's layout.

use crate::db::Layout;
use std::path::PathBuf;
use thiserror::Error;

/// Structural store errors
///
/// Covers connection, initialization and query failures of every backend,
/// plus the precondition violations a store detects itself (wrong layout,
/// unencoded input, repeated bulk insert).
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A stored row could not be decoded
    #[error("Corrupt row: {context}")]
    CorruptRow { context: String },

    /// The operation needs a different physical layout
    #[error("Operation '{operation}' requires the {expected} layout, store uses the {actual} layout")]
    LayoutMismatch {
        operation: String,
        expected: Layout,
        actual: Layout,
    },

    /// An ordered layout was handed a tree without order numbers
    #[error("Tree is not encoded: node {node} has no pre/post-order ranks")]
    EncodingNotPerformed { node: String },

    /// Bulk insert into a store that already holds a tree
    #[error("Store already holds {existing} nodes; build into a fresh store instead")]
    StoreNotEmpty { existing: i64 },

    /// No layout recorded in an existing database
    #[error("Database at {path} has no recorded layout")]
    LayoutUnknown { path: PathBuf },

    /// In-memory table lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a corrupt row error
    pub fn corrupt_row(context: impl Into<String>) -> Self {
        Self::CorruptRow {
            context: context.into(),
        }
    }

    /// Create a layout mismatch error
    pub fn layout_mismatch(operation: impl Into<String>, expected: Layout, actual: Layout) -> Self {
        Self::LayoutMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    /// Create an encoding-not-performed error
    pub fn encoding_not_performed(node: impl Into<String>) -> Self {
        Self::EncodingNotPerformed { node: node.into() }
    }
}
