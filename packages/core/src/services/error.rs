//! Service Layer Error Types
//!
//! Error taxonomy of axis evaluation. `NodeNotFound`, `NoParent` and
//! `IncompleteResult` normally travel as an [`AxisStatus`](crate::models::AxisStatus)
//! on the result; they become errors only through
//! [`AxisResult::into_rows_strict`](crate::models::AxisResult::into_rows_strict).

use crate::db::{DatabaseError, Layout};
use crate::models::{Axis, NodeId};
use thiserror::Error;

/// Axis evaluation errors
#[derive(Error, Debug)]
pub enum AxisError {
    /// Context id is absent from the store
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Root node queried for an axis that needs a parent
    #[error("Node {id} has no parent, so it has no {axis} nodes")]
    NoParent { id: NodeId, axis: Axis },

    /// Range evaluation on a node or store without order numbers
    #[error("Encoding not performed: {context}")]
    EncodingNotPerformed { context: String },

    /// Strategy requires a layout the store does not have
    #[error("Operation '{operation}' requires the {expected} layout, store uses the {actual} layout")]
    LayoutMismatch {
        operation: String,
        expected: Layout,
        actual: Layout,
    },

    /// A depth cap omitted part of the answer
    #[error("Result for node {context} is incomplete: {omitted} nodes beyond depth {max_depth} omitted")]
    IncompleteResult {
        context: NodeId,
        max_depth: i64,
        omitted: i64,
    },

    /// Axis name could not be parsed
    #[error("Unknown axis: {0}")]
    UnknownAxis(String),

    /// Store operation failed
    #[error("Database operation failed: {0}")]
    Database(DatabaseError),
}

impl AxisError {
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    pub fn no_parent(id: NodeId, axis: Axis) -> Self {
        Self::NoParent { id, axis }
    }

    pub fn encoding_not_performed(context: impl Into<String>) -> Self {
        Self::EncodingNotPerformed {
            context: context.into(),
        }
    }

    pub fn layout_mismatch(operation: impl Into<String>, expected: Layout, actual: Layout) -> Self {
        Self::LayoutMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    pub fn unknown_axis(name: impl Into<String>) -> Self {
        Self::UnknownAxis(name.into())
    }
}

/// Store-level precondition failures surface as their axis counterparts
impl From<DatabaseError> for AxisError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::LayoutMismatch {
                operation,
                expected,
                actual,
            } => Self::LayoutMismatch {
                operation,
                expected,
                actual,
            },
            DatabaseError::EncodingNotPerformed { node } => Self::EncodingNotPerformed {
                context: format!("node {}", node),
            },
            other => Self::Database(other),
        }
    }
}
