//! Node Data Structures
//!
//! This module defines the records that make up a document tree before and
//! after it is persisted:
//!
//! - [`NodeData`] - payload supplied by a document producer (type, text, attributes, label)
//! - [`OrderPair`] - pre/post-order ranks assigned by the encoder
//! - [`SubtreeBounds`] - level and subtree size used by the bounded evaluator
//! - [`NodeRow`] - a node as returned by a structural store
//!
//! # Examples
//!
//! ```rust
//! use xaccel_core::models::NodeData;
//!
//! let article = NodeData::new("article")
//!     .with_label("SchmittKAMM23")
//!     .with_attribute("mdate", "2023-06-01");
//!
//! let author = NodeData::new("author").with_content("Daniel Ulrich Schmitt");
//! assert_eq!(author.content.as_deref(), Some("Daniel Ulrich Schmitt"));
//! assert_eq!(article.label.as_deref(), Some("SchmittKAMM23"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-assigned node identifier
///
/// Edge layouts hand out surrogate ids in insertion order; ordered layouts use
/// the node's post-order rank.
pub type NodeId = i64;

/// Pre-order and post-order rank of a node, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderPair {
    pub pre: i64,
    pub post: i64,
}

impl OrderPair {
    pub fn new(pre: i64, post: i64) -> Self {
        Self { pre, post }
    }

    /// `self` is a proper ancestor of `other`
    pub fn contains(&self, other: &OrderPair) -> bool {
        self.pre < other.pre && self.post > other.post
    }

    /// `self` is a proper descendant of `other`
    pub fn is_within(&self, other: &OrderPair) -> bool {
        other.contains(self)
    }

    /// Neither interval contains the other
    pub fn is_disjoint(&self, other: &OrderPair) -> bool {
        !self.contains(other) && !other.contains(self) && self != other
    }
}

/// Depth and subtree size of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeBounds {
    /// Distance from the root (root = 0)
    pub level: i64,

    /// Number of nodes in the subtree rooted here, self included
    pub subtree_size: i64,
}

impl SubtreeBounds {
    pub fn is_leaf(&self) -> bool {
        self.subtree_size <= 1
    }
}

/// Payload of a document node, independent of where it sits in the tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// Tag or category (e.g. "article", "author")
    pub node_type: String,

    /// Optional text payload
    pub content: Option<String>,

    /// Element attributes, sorted by key
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Optional symbolic name used for lookup
    pub label: Option<String>,
}

impl NodeData {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Content worth persisting: present and not whitespace-only
    pub fn persisted_content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Attributes flattened into the `key=value` text stored in the attribute relation
    pub fn attribute_texts(&self) -> impl Iterator<Item = String> + '_ {
        self.attributes
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
    }
}

/// A node as persisted in a structural store
///
/// `order` and `bounds` are `None` for rows of an edge layout, which carries
/// adjacency only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub node_type: String,
    pub label: Option<String>,
    pub content: Option<String>,

    /// Rank among the parent's children (0-based, document order)
    pub position: i64,

    pub order: Option<OrderPair>,
    pub bounds: Option<SubtreeBounds>,
}

impl NodeRow {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
