//! Axis Evaluator
//!
//! Answers `(context id, axis)` queries against a [`StructuralStore`] using the
//! strategy picked once at construction.
//!
//! # Result semantics
//!
//! - Unknown context id: empty rows, status `NodeNotFound`
//! - Root asked for ancestors or siblings: empty rows, status `NoParent`
//! - Anything else: status `Matched`, possibly with zero rows
//!
//! Wrong layout or missing order numbers are errors, not statuses. A strategy
//! that needs the ordered layout fails on every call against another layout,
//! before the context id is looked up.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use xaccel_core::db::{Layout, MemoryStore, StructuralStore};
//! use xaccel_core::encoding::encode;
//! use xaccel_core::models::{AxisOptions, NodeData, Tree};
//! use xaccel_core::services::AxisEvaluator;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = Tree::new(NodeData::new("bib"));
//! let venue = tree.add_child(tree.root(), NodeData::new("venue").with_content("vldb"))?;
//! let year = tree.add_child(venue, NodeData::new("year").with_label("vldb_2023"))?;
//! encode(&mut tree);
//!
//! let store = Arc::new(MemoryStore::new(Layout::Ordered));
//! let ids = store.insert_tree(&tree).await?;
//!
//! let evaluator = AxisEvaluator::new(store, AxisOptions::default());
//! let result = evaluator.ancestor(ids.get(year).unwrap()).await?;
//! assert_eq!(result.rows.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::db::{Layout, StructuralStore};
use crate::models::{
    Axis, AxisNode, AxisOptions, AxisResult, NodeId, NodeRow, SiblingDirection, StrategyChoice,
};
use crate::services::error::AxisError;
use crate::services::strategy::{AxisStrategy, ClosureStrategy, RangeStrategy};
use std::collections::HashSet;
use std::sync::Arc;

pub struct AxisEvaluator {
    store: Arc<dyn StructuralStore>,
    strategy: Box<dyn AxisStrategy>,
    options: AxisOptions,
}

impl AxisEvaluator {
    /// Build an evaluator; `StrategyChoice::Auto` resolves against the store's layout
    pub fn new(store: Arc<dyn StructuralStore>, options: AxisOptions) -> Self {
        let strategy: Box<dyn AxisStrategy> = match (options.strategy, store.layout()) {
            (StrategyChoice::Closure, _) | (StrategyChoice::Auto, Layout::Edge) => {
                Box::new(ClosureStrategy)
            }
            (StrategyChoice::Range, _) | (StrategyChoice::Auto, Layout::Ordered) => {
                Box::new(RangeStrategy)
            }
        };

        tracing::debug!(
            strategy = strategy.name(),
            layout = %store.layout(),
            "Created axis evaluator"
        );

        Self {
            store,
            strategy,
            options,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn options(&self) -> &AxisOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn StructuralStore> {
        &self.store
    }

    pub async fn evaluate(&self, context: NodeId, axis: Axis) -> Result<AxisResult, AxisError> {
        if let Some(required) = self.strategy.required_layout() {
            if self.store.layout() != required {
                return Err(AxisError::layout_mismatch(
                    format!("{} strategy", self.strategy.name()),
                    required,
                    self.store.layout(),
                ));
            }
        }

        let Some(row) = self.store.get(context).await? else {
            tracing::debug!(context, axis = %axis, "Context node not found");
            return Ok(AxisResult::not_found(axis, context));
        };

        let rows = match axis {
            Axis::Ancestor => {
                if row.is_root() {
                    return Ok(AxisResult::no_parent(axis, context));
                }
                self.ancestor_rows(&row).await?
            }
            Axis::Descendant => {
                self.strategy
                    .descendants(self.store.as_ref(), &row)
                    .await?
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                if row.is_root() {
                    return Ok(AxisResult::no_parent(axis, context));
                }
                let direction = axis
                    .sibling_direction()
                    .unwrap_or(SiblingDirection::Following);
                let node_type = self.options.sibling_filter.resolve(&row.node_type);
                self.strategy
                    .siblings(self.store.as_ref(), &row, direction, node_type)
                    .await?
            }
        };

        let rows = dedup_rows(rows);
        tracing::debug!(
            context,
            axis = %axis,
            strategy = self.strategy.name(),
            rows = rows.len(),
            "Evaluated axis"
        );

        Ok(AxisResult::matched(axis, context, rows))
    }

    pub async fn ancestor(&self, context: NodeId) -> Result<AxisResult, AxisError> {
        self.evaluate(context, Axis::Ancestor).await
    }

    pub async fn descendant(&self, context: NodeId) -> Result<AxisResult, AxisError> {
        self.evaluate(context, Axis::Descendant).await
    }

    pub async fn following_sibling(&self, context: NodeId) -> Result<AxisResult, AxisError> {
        self.evaluate(context, Axis::FollowingSibling).await
    }

    pub async fn preceding_sibling(&self, context: NodeId) -> Result<AxisResult, AxisError> {
        self.evaluate(context, Axis::PrecedingSibling).await
    }

    /// Ancestors of the context, or of every node sharing its value when the
    /// ancestor scope asks for that
    async fn ancestor_rows(&self, row: &NodeRow) -> Result<Vec<NodeRow>, AxisError> {
        let Some(value) = self.options.ancestor_scope.shared_value_of(row) else {
            return self.strategy.ancestors(self.store.as_ref(), row).await;
        };

        let peers: Vec<NodeRow> = self
            .store
            .find_by_type(&row.node_type)
            .await?
            .into_iter()
            .filter(|peer| peer.content.as_deref() == Some(value))
            .collect();

        tracing::debug!(
            context = row.id,
            peers = peers.len(),
            "Expanding ancestors over nodes with equal value"
        );

        let mut rows = Vec::new();
        for peer in &peers {
            rows.extend(self.strategy.ancestors(self.store.as_ref(), peer).await?);
        }
        Ok(rows)
    }
}

/// Project rows to `AxisNode`s, keeping the first occurrence of each id
pub(crate) fn dedup_rows(rows: Vec<NodeRow>) -> Vec<AxisNode> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.id))
        .map(AxisNode::from)
        .collect()
}

#[cfg(test)]
#[path = "axis_evaluator_test.rs"]
mod axis_evaluator_test;
