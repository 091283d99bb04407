//! Axis Evaluation Strategies
//!
//! Two interchangeable ways to answer the structural axes:
//!
//! - [`ClosureStrategy`] walks parent/child links. Works on any layout; cost
//!   grows with the number of hops.
//! - [`RangeStrategy`] compares order pairs with a single range scan per axis.
//!   Needs the ordered layout.
//!
//! For every node and axis both return the same id set. Ordering differs only
//! for ancestors: closure yields nearest first, range yields root first.

use crate::db::{DatabaseError, Layout, RangeScan, StructuralStore};
use crate::models::{NodeId, NodeRow, OrderPair, SiblingDirection};
use crate::services::error::AxisError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Capability set every strategy provides
///
/// The context row is already resolved by the caller; strategies never see an
/// unknown id. Sibling calls on a parentless row return no rows.
#[async_trait]
pub trait AxisStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Layout the strategy needs, `None` if any layout works
    fn required_layout(&self) -> Option<Layout> {
        None
    }

    async fn ancestors(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<Vec<NodeRow>, AxisError>;

    async fn descendants(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<Vec<NodeRow>, AxisError>;

    /// Siblings in `direction`, optionally restricted to `node_type`, in
    /// document order
    async fn siblings(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
        direction: SiblingDirection,
        node_type: Option<&str>,
    ) -> Result<Vec<NodeRow>, AxisError>;
}

/// Transitive traversal of the parent/child relation
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosureStrategy;

#[async_trait]
impl AxisStrategy for ClosureStrategy {
    fn name(&self) -> &'static str {
        "closure"
    }

    async fn ancestors(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let mut ancestors = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::from([context.id]);
        let mut next = context.parent;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                return Err(AxisError::Database(DatabaseError::corrupt_row(
                    format!("parent cycle through node {}", parent_id),
                )));
            }

            let parent = store.get(parent_id).await?.ok_or_else(|| {
                AxisError::Database(DatabaseError::corrupt_row(format!(
                    "node {} references missing parent {}",
                    context.id, parent_id
                )))
            })?;
            next = parent.parent;
            ancestors.push(parent);
        }

        Ok(ancestors)
    }

    async fn descendants(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let mut descendants = Vec::new();
        let mut stack: Vec<NodeRow> = store.children(context.id).await?;
        stack.reverse();

        while let Some(row) = stack.pop() {
            let mut children = store.children(row.id).await?;
            children.reverse();
            stack.extend(children);
            descendants.push(row);
        }

        Ok(descendants)
    }

    async fn siblings(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
        direction: SiblingDirection,
        node_type: Option<&str>,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let Some(parent) = context.parent else {
            return Ok(Vec::new());
        };

        let siblings = store
            .children(parent)
            .await?
            .into_iter()
            .filter(|row| match direction {
                SiblingDirection::Following => row.position > context.position,
                SiblingDirection::Preceding => row.position < context.position,
            })
            .filter(|row| node_type.map_or(true, |t| row.node_type == t))
            .collect();

        Ok(siblings)
    }
}

/// Numeric comparison of pre/post-order ranks
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeStrategy;

impl RangeStrategy {
    fn require_order(
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<OrderPair, AxisError> {
        if store.layout() != Layout::Ordered {
            return Err(AxisError::layout_mismatch(
                "range strategy",
                Layout::Ordered,
                store.layout(),
            ));
        }

        context.order.ok_or_else(|| {
            AxisError::encoding_not_performed(format!("node {} has no order pair", context.id))
        })
    }
}

#[async_trait]
impl AxisStrategy for RangeStrategy {
    fn name(&self) -> &'static str {
        "range"
    }

    fn required_layout(&self) -> Option<Layout> {
        Some(Layout::Ordered)
    }

    async fn ancestors(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let order = Self::require_order(store, context)?;
        Ok(store.range_scan(&RangeScan::ancestors_of(order)).await?)
    }

    async fn descendants(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let order = Self::require_order(store, context)?;
        Ok(store.range_scan(&RangeScan::descendants_of(order)).await?)
    }

    async fn siblings(
        &self,
        store: &dyn StructuralStore,
        context: &NodeRow,
        direction: SiblingDirection,
        node_type: Option<&str>,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let order = Self::require_order(store, context)?;
        let Some(parent) = context.parent else {
            return Ok(Vec::new());
        };

        let mut scan = match direction {
            SiblingDirection::Following => RangeScan::siblings_after(parent, order.pre),
            SiblingDirection::Preceding => RangeScan::siblings_before(parent, order.pre),
        };
        if let Some(node_type) = node_type {
            scan = scan.with_type(node_type);
        }

        Ok(store.range_scan(&scan).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::encoding::encode;
    use crate::models::{NodeData, Tree};

    /// `p(x, y(y1, y2), z)`
    fn family() -> Tree {
        let mut tree = Tree::new(NodeData::new("p").with_label("p"));
        let root = tree.root();
        tree.add_child(root, NodeData::new("x").with_label("x"))
            .unwrap();
        let y = tree
            .add_child(root, NodeData::new("y").with_label("y"))
            .unwrap();
        tree.add_child(y, NodeData::new("y1").with_label("y1"))
            .unwrap();
        tree.add_child(y, NodeData::new("y2").with_label("y2"))
            .unwrap();
        tree.add_child(root, NodeData::new("z").with_label("z"))
            .unwrap();
        tree
    }

    async fn ordered_store() -> MemoryStore {
        let store = MemoryStore::new(Layout::Ordered);
        let mut tree = family();
        encode(&mut tree);
        store.insert_tree(&tree).await.unwrap();
        store
    }

    async fn row(store: &MemoryStore, label: &str) -> NodeRow {
        store.find_by_label(label).await.unwrap().remove(0)
    }

    fn labels(rows: &[NodeRow]) -> Vec<&str> {
        rows.iter().filter_map(|r| r.label.as_deref()).collect()
    }

    #[tokio::test]
    async fn test_ancestor_orderings() {
        let store = ordered_store().await;
        let y2 = row(&store, "y2").await;

        let closure = ClosureStrategy.ancestors(&store, &y2).await.unwrap();
        let range = RangeStrategy.ancestors(&store, &y2).await.unwrap();

        assert_eq!(labels(&closure), vec!["y", "p"]);
        assert_eq!(labels(&range), vec!["p", "y"]);
    }

    #[tokio::test]
    async fn test_descendants_in_document_order() {
        let store = ordered_store().await;
        let p = row(&store, "p").await;

        let closure = ClosureStrategy.descendants(&store, &p).await.unwrap();
        let range = RangeStrategy.descendants(&store, &p).await.unwrap();

        assert_eq!(labels(&closure), vec!["x", "y", "y1", "y2", "z"]);
        assert_eq!(labels(&closure), labels(&range));
    }

    #[tokio::test]
    async fn test_siblings_both_directions() {
        let store = ordered_store().await;
        let y = row(&store, "y").await;

        for strategy in [&ClosureStrategy as &dyn AxisStrategy, &RangeStrategy] {
            let following = strategy
                .siblings(&store, &y, SiblingDirection::Following, None)
                .await
                .unwrap();
            let preceding = strategy
                .siblings(&store, &y, SiblingDirection::Preceding, None)
                .await
                .unwrap();
            assert_eq!(labels(&following), vec!["z"], "{}", strategy.name());
            assert_eq!(labels(&preceding), vec!["x"], "{}", strategy.name());

            let typed = strategy
                .siblings(&store, &y, SiblingDirection::Following, Some("x"))
                .await
                .unwrap();
            assert!(typed.is_empty(), "{}", strategy.name());
        }
    }

    #[tokio::test]
    async fn test_range_needs_ordered_layout() {
        let store = MemoryStore::new(Layout::Edge);
        store.insert_tree(&family()).await.unwrap();
        let y = row(&store, "y").await;

        let result = RangeStrategy.descendants(&store, &y).await;
        assert!(matches!(result, Err(AxisError::LayoutMismatch { .. })));

        let closure = ClosureStrategy.descendants(&store, &y).await.unwrap();
        assert_eq!(labels(&closure), vec!["y1", "y2"]);
    }

    #[tokio::test]
    async fn test_range_needs_order_pair() {
        let store = ordered_store().await;
        let mut y = row(&store, "y").await;
        y.order = None;

        let result = RangeStrategy.ancestors(&store, &y).await;
        assert!(matches!(result, Err(AxisError::EncodingNotPerformed { .. })));
    }
}
