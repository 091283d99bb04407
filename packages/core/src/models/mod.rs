//! Data Models
//!
//! This module contains the core data structures used throughout xaccel:
//!
//! - `Tree` / `TreeNode` - arena-backed document tree with integer indices
//! - `NodeData`, `OrderPair`, `SubtreeBounds` - per-node payload and encoding
//! - `NodeRow` - a node as persisted in a structural store
//! - `Axis`, `AxisOptions`, `AxisResult` - the axis query vocabulary

pub mod axis;
mod node;
mod tree;

pub use axis::{
    AncestorScope, Axis, AxisNode, AxisOptions, AxisResult, AxisStatus, SiblingDirection,
    SiblingFilter, StrategyChoice,
};
pub use node::{NodeData, NodeId, NodeRow, OrderPair, SubtreeBounds};
pub use tree::{NodeIndex, Tree, TreeError, TreeNode};
