//! Bounded Evaluator
//!
//! A range-based evaluator that uses the level and subtree-size columns of an
//! ordered store to skip or shrink scans:
//!
//! - **Leaf pruning**: a context with `subtree_size <= 1` has no descendants,
//!   so no scan is issued.
//! - **Depth bound** (off by default): contexts with more than
//!   `subtree_threshold` nodes only scan `max_depth` levels down. A result cut
//!   short this way is flagged `Incomplete`; it is never passed off as exact.
//! - **Typed sibling scan**: the sibling axis returns siblings of the context's
//!   type. The flag decides whether the type goes into the scan or is filtered
//!   afterwards; the rows are the same.
//!
//! Ancestor scans are limited to levels above the context and honour the same
//! [`AncestorScope`] as [`AxisEvaluator`](crate::services::AxisEvaluator).

use crate::db::{Layout, RangeScan, StructuralStore};
use crate::models::{
    AncestorScope, Axis, AxisResult, AxisStatus, NodeId, NodeRow, OrderPair, SiblingDirection,
    SubtreeBounds,
};
use crate::services::axis_evaluator::dedup_rows;
use crate::services::error::AxisError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_SUBTREE_THRESHOLD: i64 = 100;
pub const DEFAULT_MAX_DEPTH: i64 = 10;

/// Depth cap applied to large subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthBound {
    /// Subtrees with more nodes than this are capped
    pub subtree_threshold: i64,

    /// Levels scanned below the context
    pub max_depth: i64,
}

impl Default for DepthBound {
    fn default() -> Self {
        Self {
            subtree_threshold: DEFAULT_SUBTREE_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DepthBound {
    pub fn applies_to(&self, bounds: &SubtreeBounds) -> bool {
        bounds.subtree_size > self.subtree_threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedOptions {
    #[serde(default = "default_true")]
    pub leaf_pruning: bool,

    #[serde(default)]
    pub depth_bound: Option<DepthBound>,

    #[serde(default = "default_true")]
    pub typed_sibling_scan: bool,

    #[serde(default)]
    pub ancestor_scope: AncestorScope,
}

fn default_true() -> bool {
    true
}

impl Default for BoundedOptions {
    fn default() -> Self {
        Self {
            leaf_pruning: true,
            depth_bound: None,
            typed_sibling_scan: true,
            ancestor_scope: AncestorScope::Node,
        }
    }
}

impl BoundedOptions {
    pub fn with_depth_bound(mut self, bound: DepthBound) -> Self {
        self.depth_bound = Some(bound);
        self
    }

    pub fn with_leaf_pruning(mut self, enabled: bool) -> Self {
        self.leaf_pruning = enabled;
        self
    }

    pub fn with_typed_sibling_scan(mut self, enabled: bool) -> Self {
        self.typed_sibling_scan = enabled;
        self
    }

    pub fn with_ancestor_scope(mut self, scope: AncestorScope) -> Self {
        self.ancestor_scope = scope;
        self
    }
}

pub struct BoundedEvaluator {
    store: Arc<dyn StructuralStore>,
    options: BoundedOptions,
}

impl BoundedEvaluator {
    pub fn new(store: Arc<dyn StructuralStore>, options: BoundedOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &BoundedOptions {
        &self.options
    }

    pub async fn evaluate(&self, context: NodeId, axis: Axis) -> Result<AxisResult, AxisError> {
        if self.store.layout() != Layout::Ordered {
            return Err(AxisError::layout_mismatch(
                "bounded evaluation",
                Layout::Ordered,
                self.store.layout(),
            ));
        }

        let Some(row) = self.store.get(context).await? else {
            return Ok(AxisResult::not_found(axis, context));
        };
        let (order, bounds) = encoded(&row)?;

        match axis {
            Axis::Descendant => self.descendants(&row, order, bounds).await,
            Axis::Ancestor => {
                if row.is_root() {
                    return Ok(AxisResult::no_parent(axis, context));
                }
                let rows = self.ancestor_rows(&row).await?;
                Ok(AxisResult::matched(axis, context, dedup_rows(rows)))
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = row.parent else {
                    return Ok(AxisResult::no_parent(axis, context));
                };
                let direction = axis
                    .sibling_direction()
                    .unwrap_or(SiblingDirection::Following);
                let rows = self
                    .typed_siblings(&row, parent, order, direction)
                    .await?;
                Ok(AxisResult::matched(axis, context, dedup_rows(rows)))
            }
        }
    }

    pub async fn descendant(&self, context: NodeId) -> Result<AxisResult, AxisError> {
        self.evaluate(context, Axis::Descendant).await
    }

    pub async fn ancestor(&self, context: NodeId) -> Result<AxisResult, AxisError> {
        self.evaluate(context, Axis::Ancestor).await
    }

    async fn descendants(
        &self,
        row: &NodeRow,
        order: OrderPair,
        bounds: SubtreeBounds,
    ) -> Result<AxisResult, AxisError> {
        if self.options.leaf_pruning && bounds.is_leaf() {
            tracing::debug!(context = row.id, "Pruned descendant scan of leaf");
            return Ok(AxisResult::matched(Axis::Descendant, row.id, Vec::new()));
        }

        let mut scan = RangeScan::descendants_of(order);
        let cap = self
            .options
            .depth_bound
            .filter(|bound| bound.applies_to(&bounds));
        if let Some(bound) = cap {
            scan = scan.with_max_level(bounds.level + bound.max_depth);
        }

        let rows = self.store.range_scan(&scan).await?;
        let expected = bounds.subtree_size - 1;
        let returned = rows.len() as i64;
        let mut result = AxisResult::matched(Axis::Descendant, row.id, dedup_rows(rows));

        if let Some(bound) = cap {
            if returned < expected {
                let omitted = expected - returned;
                tracing::warn!(
                    context = row.id,
                    max_depth = bound.max_depth,
                    omitted,
                    "Depth bound truncated descendant scan"
                );
                result.status = AxisStatus::Incomplete {
                    max_depth: bound.max_depth,
                    omitted,
                };
            }
        }

        Ok(result)
    }

    async fn ancestor_rows(&self, row: &NodeRow) -> Result<Vec<NodeRow>, AxisError> {
        let peers = match self.options.ancestor_scope.shared_value_of(row) {
            Some(value) => self
                .store
                .find_by_type(&row.node_type)
                .await?
                .into_iter()
                .filter(|peer| peer.content.as_deref() == Some(value))
                .collect(),
            None => vec![row.clone()],
        };

        let mut rows = Vec::new();
        for peer in &peers {
            let (order, bounds) = encoded(peer)?;
            let scan = RangeScan::ancestors_of(order).with_max_level(bounds.level - 1);
            rows.extend(self.store.range_scan(&scan).await?);
        }
        Ok(rows)
    }

    async fn typed_siblings(
        &self,
        row: &NodeRow,
        parent: NodeId,
        order: OrderPair,
        direction: SiblingDirection,
    ) -> Result<Vec<NodeRow>, AxisError> {
        let scan = match direction {
            SiblingDirection::Following => RangeScan::siblings_after(parent, order.pre),
            SiblingDirection::Preceding => RangeScan::siblings_before(parent, order.pre),
        };

        if self.options.typed_sibling_scan {
            Ok(self
                .store
                .range_scan(&scan.with_type(row.node_type.clone()))
                .await?)
        } else {
            Ok(self
                .store
                .range_scan(&scan)
                .await?
                .into_iter()
                .filter(|sibling| sibling.node_type == row.node_type)
                .collect())
        }
    }
}

fn encoded(row: &NodeRow) -> Result<(OrderPair, SubtreeBounds), AxisError> {
    match (row.order, row.bounds) {
        (Some(order), Some(bounds)) => Ok((order, bounds)),
        _ => Err(AxisError::encoding_not_performed(format!(
            "node {} has no order pair or subtree bounds",
            row.id
        ))),
    }
}

#[cfg(test)]
#[path = "bounded_evaluator_test.rs"]
mod bounded_evaluator_test;
