//! StructuralStore Trait - Persistence Abstraction for Encoded Trees
//!
//! This module defines the `StructuralStore` trait the axis evaluators are
//! written against. A store persists a document tree once and then answers
//! four kinds of lookups:
//!
//! 1. exact id lookup ([`StructuralStore::get`])
//! 2. lookup by symbolic label ([`StructuralStore::find_by_label`])
//! 3. lookup by node type ([`StructuralStore::find_by_type`])
//! 4. range scan on the order columns ([`StructuralStore::range_scan`])
//!
//! plus the parent/child adjacency the closure strategy walks.
//!
//! # Layouts
//!
//! - **Edge**: surrogate ids in insertion order, parent and position columns
//!   only. Range scans are rejected with `LayoutMismatch`.
//! - **Ordered**: id = post-order rank, order and bounds columns populated.
//!   Bulk insert rejects unencoded trees with `EncodingNotPerformed`.
//!
//! The layout is fixed when a store is constructed; evaluators ask for it via
//! [`StructuralStore::layout`] rather than sniffing the schema.

use crate::db::DatabaseError;
use crate::models::{NodeId, NodeIndex, NodeRow, OrderPair, SubtreeBounds, Tree};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical layout of a structural store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Parent/child adjacency only
    Edge,

    /// Adjacency plus pre/post-order ranks and subtree bounds
    #[default]
    Ordered,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Edge => "edge",
            Layout::Ordered => "ordered",
        }
    }

    pub fn supports_range(&self) -> bool {
        matches!(self, Layout::Ordered)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edge" => Ok(Layout::Edge),
            "ordered" => Ok(Layout::Ordered),
            other => Err(format!("unknown layout '{}'", other)),
        }
    }
}

/// Predicates of an order-column range scan
///
/// All bounds are strict. Results come back ordered by pre-order rank.
///
/// # Examples
///
/// ```rust
/// use xaccel_core::db::RangeScan;
/// use xaccel_core::models::OrderPair;
///
/// let context = OrderPair::new(3, 10);
/// let scan = RangeScan::descendants_of(context).with_max_level(4);
/// assert_eq!(scan.pre_above, Some(3));
/// assert_eq!(scan.post_below, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeScan {
    /// `pre > value`
    pub pre_above: Option<i64>,
    /// `pre < value`
    pub pre_below: Option<i64>,
    /// `post > value`
    pub post_above: Option<i64>,
    /// `post < value`
    pub post_below: Option<i64>,
    /// `parent = value`
    pub parent: Option<NodeId>,
    /// `type = value`
    pub node_type: Option<String>,
    /// `level <= value`
    pub max_level: Option<i64>,
}

impl RangeScan {
    /// Proper descendants of a node with the given ranks
    pub fn descendants_of(order: OrderPair) -> Self {
        Self {
            pre_above: Some(order.pre),
            post_below: Some(order.post),
            ..Default::default()
        }
    }

    /// Proper ancestors of a node with the given ranks
    pub fn ancestors_of(order: OrderPair) -> Self {
        Self {
            pre_below: Some(order.pre),
            post_above: Some(order.post),
            ..Default::default()
        }
    }

    /// Children of `parent` after (or before) the given pre-order rank
    pub fn siblings_after(parent: NodeId, pre: i64) -> Self {
        Self {
            pre_above: Some(pre),
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn siblings_before(parent: NodeId, pre: i64) -> Self {
        Self {
            pre_below: Some(pre),
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_max_level(mut self, max_level: i64) -> Self {
        self.max_level = Some(max_level);
        self
    }

    /// Whether `row` satisfies every predicate
    pub fn matches(&self, row: &NodeRow) -> bool {
        let Some(order) = row.order else {
            return false;
        };

        let level_ok = match (self.max_level, row.bounds) {
            (None, _) => true,
            (Some(max), Some(bounds)) => bounds.level <= max,
            (Some(_), None) => false,
        };

        self.pre_above.map_or(true, |v| order.pre > v)
            && self.pre_below.map_or(true, |v| order.pre < v)
            && self.post_above.map_or(true, |v| order.post > v)
            && self.post_below.map_or(true, |v| order.post < v)
            && self.parent.map_or(true, |p| row.parent == Some(p))
            && self
                .node_type
                .as_deref()
                .map_or(true, |t| row.node_type == t)
            && level_ok
    }
}

/// Store id assigned to each arena node by a bulk insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    ids: Vec<NodeId>,
}

impl IdMap {
    pub(crate) fn with_len(len: usize) -> Self {
        Self { ids: vec![0; len] }
    }

    pub(crate) fn set(&mut self, index: NodeIndex, id: NodeId) {
        self.ids[index.get()] = id;
    }

    pub fn get(&self, index: NodeIndex) -> Option<NodeId> {
        self.ids.get(index.get()).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Arena index of a store id
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }
}

/// Abstraction over a persisted, encoded document tree
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; after the single bulk insert a store
/// is read-only and can be shared freely behind an `Arc`.
#[async_trait]
pub trait StructuralStore: Send + Sync {
    /// Layout chosen when the store was constructed
    fn layout(&self) -> Layout;

    /// Persist `tree` in one shot
    ///
    /// # Errors
    ///
    /// - `StoreNotEmpty` if a tree was already inserted
    /// - `EncodingNotPerformed` if the layout is ordered and `tree` is not encoded
    async fn insert_tree(&self, tree: &Tree) -> Result<IdMap, DatabaseError>;

    /// Exact id lookup; `Ok(None)` if absent
    async fn get(&self, id: NodeId) -> Result<Option<NodeRow>, DatabaseError>;

    /// All rows carrying `label`, in id order
    async fn find_by_label(&self, label: &str) -> Result<Vec<NodeRow>, DatabaseError>;

    /// All rows of `node_type`, in id order
    async fn find_by_type(&self, node_type: &str) -> Result<Vec<NodeRow>, DatabaseError>;

    /// Rows matching `scan`, ordered by pre-order rank
    ///
    /// # Errors
    ///
    /// `LayoutMismatch` on an edge layout.
    async fn range_scan(&self, scan: &RangeScan) -> Result<Vec<NodeRow>, DatabaseError>;

    /// Direct children of `parent` in document order
    async fn children(&self, parent: NodeId) -> Result<Vec<NodeRow>, DatabaseError>;

    /// `key=value` attribute texts of a node
    async fn attributes(&self, id: NodeId) -> Result<Vec<String>, DatabaseError>;

    /// Number of persisted nodes
    async fn node_count(&self) -> Result<i64, DatabaseError>;
}

/// A row ready for insertion, produced from an arena node
#[derive(Debug, Clone)]
pub(crate) struct PendingRow {
    pub index: NodeIndex,
    pub parent: Option<NodeIndex>,
    /// Caller-supplied id (ordered layout); `None` lets the store assign one
    pub id: Option<NodeId>,
    pub node_type: String,
    pub label: Option<String>,
    pub content: Option<String>,
    pub attributes: Vec<String>,
    pub position: i64,
    pub order: Option<OrderPair>,
    pub bounds: Option<SubtreeBounds>,
}

/// Flatten `tree` into insert order (parents before children) for `layout`
pub(crate) fn plan_insert(tree: &Tree, layout: Layout) -> Result<Vec<PendingRow>, DatabaseError> {
    let mut rows = Vec::with_capacity(tree.len());

    for index in tree.preorder() {
        let node = tree
            .node(index)
            .map_err(|e| DatabaseError::corrupt_row(e.to_string()))?;

        let (id, order, bounds) = match layout {
            Layout::Edge => (None, None, None),
            Layout::Ordered => {
                let (Some(order), Some(bounds)) = (node.order, node.bounds) else {
                    return Err(DatabaseError::encoding_not_performed(format!(
                        "{} ({})",
                        index, node.data.node_type
                    )));
                };
                (Some(order.post), Some(order), Some(bounds))
            }
        };

        let position = tree
            .position(index)
            .map_err(|e| DatabaseError::corrupt_row(e.to_string()))?;

        rows.push(PendingRow {
            index,
            parent: node.parent,
            id,
            node_type: node.data.node_type.clone(),
            label: node.data.label.clone(),
            content: node.data.persisted_content().map(str::to_string),
            attributes: node.data.attribute_texts().collect(),
            position: position as i64,
            order,
            bounds,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode;
    use crate::models::NodeData;

    fn row(pre: i64, post: i64, parent: Option<NodeId>, node_type: &str, level: i64) -> NodeRow {
        NodeRow {
            id: post,
            parent,
            node_type: node_type.to_string(),
            label: None,
            content: None,
            position: 0,
            order: Some(OrderPair::new(pre, post)),
            bounds: Some(SubtreeBounds {
                level,
                subtree_size: 1,
            }),
        }
    }

    #[test]
    fn test_descendant_scan_predicates() {
        let scan = RangeScan::descendants_of(OrderPair::new(2, 5));
        assert!(scan.matches(&row(3, 4, Some(5), "x", 2)));
        assert!(scan.matches(&row(4, 3, Some(5), "x", 2)));
        assert!(!scan.matches(&row(1, 4, Some(5), "x", 2)));
        assert!(!scan.matches(&row(2, 4, Some(5), "x", 2)));
        assert!(!scan.matches(&row(6, 6, Some(5), "x", 2)));
        assert!(!scan.matches(&row(3, 5, Some(5), "x", 2)));

        let bounded = scan.with_max_level(1);
        assert!(!bounded.matches(&row(3, 4, Some(5), "x", 2)));
    }

    #[test]
    fn test_sibling_scan_predicates() {
        let scan = RangeScan::siblings_after(9, 3).with_type("article");
        assert!(scan.matches(&row(5, 2, Some(9), "article", 1)));
        assert!(!scan.matches(&row(5, 2, Some(9), "title", 1)));
        assert!(!scan.matches(&row(5, 2, Some(8), "article", 1)));
        assert!(!scan.matches(&row(2, 2, Some(9), "article", 1)));
    }

    #[test]
    fn test_rows_without_order_never_match() {
        let mut unordered = row(1, 1, None, "x", 0);
        unordered.order = None;
        assert!(!RangeScan::default().matches(&unordered));
    }

    #[test]
    fn test_plan_insert_requires_encoding_for_ordered_layout() {
        let mut tree = Tree::new(NodeData::new("root"));
        tree.add_child(tree.root(), NodeData::new("leaf")).unwrap();

        assert!(plan_insert(&tree, Layout::Edge).is_ok());
        assert!(matches!(
            plan_insert(&tree, Layout::Ordered),
            Err(DatabaseError::EncodingNotPerformed { .. })
        ));

        encode(&mut tree);
        let rows = plan_insert(&tree, Layout::Ordered).unwrap();
        assert_eq!(rows[0].id, Some(2));
        assert_eq!(rows[1].id, Some(1));
        assert_eq!(rows[1].parent, Some(tree.root()));
    }

    #[test]
    fn test_plan_insert_drops_blank_content() {
        let tree = Tree::new(NodeData::new("p").with_content("   \n"));
        let rows = plan_insert(&tree, Layout::Edge).unwrap();
        assert_eq!(rows[0].content, None);
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("Edge".parse::<Layout>().unwrap(), Layout::Edge);
        assert_eq!("ordered".parse::<Layout>().unwrap(), Layout::Ordered);
        assert!("accel".parse::<Layout>().is_err());
    }
}
