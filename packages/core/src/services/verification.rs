//! Encoding and Strategy Verification
//!
//! Checks used by tests, benchmarks and the `accel-check` tool:
//!
//! - [`verify_encoding`]: linear-time sanity check of an encoded tree
//! - [`check_pairwise_nesting`]: quadratic check that every pair of nodes is
//!   either nested or disjoint, and nested exactly when one is an ancestor
//! - [`StrategyComparison`]: closure vs range on one store
//! - [`compare_bounded`]: bounded evaluator vs range strategy

use crate::db::StructuralStore;
use crate::models::{Axis, AxisOptions, AxisStatus, NodeId, NodeIndex, OrderPair, Tree};
use crate::services::bounded_evaluator::{BoundedEvaluator, BoundedOptions};
use crate::services::error::AxisError;
use crate::services::AxisEvaluator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// First broken property found in an encoded tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingViolation {
    #[error("Node {index} has no order pair or bounds")]
    NotEncoded { index: NodeIndex },

    #[error("{column} ranks are not a permutation of 1..={len}: rank {rank} is out of range or repeated")]
    NotPermutation {
        column: &'static str,
        len: usize,
        rank: i64,
    },

    #[error("Child {child} is not nested inside its parent {parent}")]
    ParentNotContaining { parent: NodeIndex, child: NodeIndex },

    #[error("Node {index} has level {actual}, expected {expected}")]
    LevelMismatch {
        index: NodeIndex,
        expected: i64,
        actual: i64,
    },

    #[error("Node {index} has subtree size {actual}, expected {expected}")]
    SubtreeSizeMismatch {
        index: NodeIndex,
        expected: i64,
        actual: i64,
    },

    #[error("Nodes {first} and {second} have overlapping intervals")]
    Overlap { first: NodeIndex, second: NodeIndex },

    #[error("Order pairs of {ancestor} and {node} disagree with the tree on ancestry")]
    AncestryMismatch { ancestor: NodeIndex, node: NodeIndex },
}

/// Outcome of a successful [`verify_encoding`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingReport {
    pub node_count: usize,
    pub max_level: i64,
}

/// Verify rank permutations, parent/child nesting, levels and subtree sizes
///
/// Subtree sizes are checked both against a bottom-up count and against the
/// identity `subtree_size = post - pre + level + 1`.
pub fn verify_encoding(tree: &Tree) -> Result<EncodingReport, EncodingViolation> {
    let len = tree.len();
    let mut seen_pre = vec![false; len + 1];
    let mut seen_post = vec![false; len + 1];
    let mut max_level = 0;

    for (index, node) in tree.iter() {
        let (Some(order), Some(bounds)) = (node.order, node.bounds) else {
            return Err(EncodingViolation::NotEncoded { index });
        };

        mark_rank(&mut seen_pre, "pre", order.pre, len)?;
        mark_rank(&mut seen_post, "post", order.post, len)?;
        max_level = max_level.max(bounds.level);

        let expected_level = match node.parent {
            Some(parent) => {
                let parent_node = tree
                    .node(parent)
                    .map_err(|_| EncodingViolation::NotEncoded { index: parent })?;
                let (Some(parent_order), Some(parent_bounds)) =
                    (parent_node.order, parent_node.bounds)
                else {
                    return Err(EncodingViolation::NotEncoded { index: parent });
                };
                if !parent_order.contains(&order) {
                    return Err(EncodingViolation::ParentNotContaining {
                        parent,
                        child: index,
                    });
                }
                parent_bounds.level + 1
            }
            None => 0,
        };
        if bounds.level != expected_level {
            return Err(EncodingViolation::LevelMismatch {
                index,
                expected: expected_level,
                actual: bounds.level,
            });
        }

        let identity = order.post - order.pre + bounds.level + 1;
        if bounds.subtree_size != identity {
            return Err(EncodingViolation::SubtreeSizeMismatch {
                index,
                expected: identity,
                actual: bounds.subtree_size,
            });
        }
    }

    let mut counted = vec![1_i64; len];
    for index in tree.preorder().into_iter().rev() {
        if let Ok(Some(parent)) = tree.parent(index) {
            counted[parent.get()] += counted[index.get()];
        }
    }
    for (index, node) in tree.iter() {
        let actual = node.bounds.map_or(0, |b| b.subtree_size);
        if actual != counted[index.get()] {
            return Err(EncodingViolation::SubtreeSizeMismatch {
                index,
                expected: counted[index.get()],
                actual,
            });
        }
    }

    Ok(EncodingReport {
        node_count: len,
        max_level,
    })
}

fn mark_rank(
    seen: &mut [bool],
    column: &'static str,
    rank: i64,
    len: usize,
) -> Result<(), EncodingViolation> {
    let slot = usize::try_from(rank)
        .ok()
        .filter(|slot| (1..=len).contains(slot))
        .ok_or(EncodingViolation::NotPermutation { column, len, rank })?;

    if std::mem::replace(&mut seen[slot], true) {
        return Err(EncodingViolation::NotPermutation { column, len, rank });
    }
    Ok(())
}

/// Check every node pair: pre-order intervals `[pre, pre + size - 1]` are
/// nested or disjoint, and the order pairs call a node an ancestor exactly when
/// the tree does
pub fn check_pairwise_nesting(tree: &Tree) -> Result<(), EncodingViolation> {
    let mut encoded: Vec<(NodeIndex, OrderPair, (i64, i64))> = Vec::with_capacity(tree.len());
    for (index, node) in tree.iter() {
        let (Some(order), Some(bounds)) = (node.order, node.bounds) else {
            return Err(EncodingViolation::NotEncoded { index });
        };
        encoded.push((index, order, (order.pre, order.pre + bounds.subtree_size - 1)));
    }

    for (i, (first, first_order, first_span)) in encoded.iter().enumerate() {
        for (second, second_order, second_span) in &encoded[i + 1..] {
            let disjoint = first_span.1 < second_span.0 || second_span.1 < first_span.0;
            let first_holds = first_span.0 <= second_span.0 && second_span.1 <= first_span.1;
            let second_holds = second_span.0 <= first_span.0 && first_span.1 <= second_span.1;
            if !(disjoint || first_holds || second_holds) {
                return Err(EncodingViolation::Overlap {
                    first: *first,
                    second: *second,
                });
            }

            if first_order.contains(second_order) != is_ancestor(tree, *first, *second) {
                return Err(EncodingViolation::AncestryMismatch {
                    ancestor: *first,
                    node: *second,
                });
            }
            if second_order.contains(first_order) != is_ancestor(tree, *second, *first) {
                return Err(EncodingViolation::AncestryMismatch {
                    ancestor: *second,
                    node: *first,
                });
            }
        }
    }

    Ok(())
}

fn is_ancestor(tree: &Tree, ancestor: NodeIndex, node: NodeIndex) -> bool {
    let mut current = tree.parent(node).ok().flatten();
    while let Some(index) = current {
        if index == ancestor {
            return true;
        }
        current = tree.parent(index).ok().flatten();
    }
    false
}

/// A `(context, axis)` pair whose two answers differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMismatch {
    pub context: NodeId,
    pub axis: Axis,
    pub expected: Vec<NodeId>,
    pub actual: Vec<NodeId>,
    pub status: AxisStatus,
}

/// Closure vs range comparison over a set of contexts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub checked: usize,
    pub mismatches: Vec<AxisMismatch>,
}

impl StrategyComparison {
    /// Evaluate every `(context, axis)` with both strategies on `store`
    ///
    /// `expected` holds the closure answer, `actual` the range answer.
    pub async fn run(
        store: Arc<dyn StructuralStore>,
        contexts: &[NodeId],
        axes: &[Axis],
    ) -> Result<Self, AxisError> {
        let closure = AxisEvaluator::new(store.clone(), AxisOptions::closure());
        let range = AxisEvaluator::new(store, AxisOptions::range());

        let mut comparison = Self::default();
        for &context in contexts {
            for &axis in axes {
                let expected = closure.evaluate(context, axis).await?;
                let actual = range.evaluate(context, axis).await?;
                comparison.checked += 1;

                if expected.sorted_ids() != actual.sorted_ids() || expected.status != actual.status
                {
                    comparison.mismatches.push(AxisMismatch {
                        context,
                        axis,
                        expected: expected.sorted_ids(),
                        actual: actual.sorted_ids(),
                        status: actual.status,
                    });
                }
            }
        }

        if !comparison.mismatches.is_empty() {
            tracing::warn!(
                mismatches = comparison.mismatches.len(),
                checked = comparison.checked,
                "Closure and range strategies disagree"
            );
        }

        Ok(comparison)
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Descendant results of the bounded evaluator checked against the range strategy
///
/// A complete bounded answer must equal the exact one. An `Incomplete` answer
/// must be a subset whose size plus `omitted` is the exact size. Anything else
/// is reported.
pub async fn compare_bounded(
    store: Arc<dyn StructuralStore>,
    options: BoundedOptions,
    contexts: &[NodeId],
) -> Result<StrategyComparison, AxisError> {
    let bounded = BoundedEvaluator::new(store.clone(), options);
    let range = AxisEvaluator::new(store, AxisOptions::range());

    let mut comparison = StrategyComparison::default();
    for &context in contexts {
        let expected = range.descendant(context).await?.sorted_ids();
        let result = bounded.descendant(context).await?;
        let actual = result.sorted_ids();
        comparison.checked += 1;

        let consistent = match result.status {
            AxisStatus::Incomplete { omitted, .. } => {
                actual.iter().all(|id| expected.binary_search(id).is_ok())
                    && actual.len() as i64 + omitted == expected.len() as i64
            }
            _ => actual == expected,
        };

        if !consistent {
            comparison.mismatches.push(AxisMismatch {
                context,
                axis: Axis::Descendant,
                expected,
                actual,
                status: result.status,
            });
        }
    }

    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Layout, MemoryStore};
    use crate::encoding::encode;
    use crate::models::{NodeData, SubtreeBounds};
    use crate::services::bounded_evaluator::DepthBound;

    fn sample() -> Tree {
        let mut tree = Tree::new(NodeData::new("bib"));
        let root = tree.root();
        for _ in 0..3 {
            let venue = tree.add_child(root, NodeData::new("venue")).unwrap();
            let year = tree.add_child(venue, NodeData::new("year")).unwrap();
            tree.add_child(year, NodeData::new("article")).unwrap();
            tree.add_child(year, NodeData::new("article")).unwrap();
        }
        tree
    }

    #[test]
    fn test_encoded_tree_verifies() {
        let mut tree = sample();
        encode(&mut tree);

        let report = verify_encoding(&tree).unwrap();
        assert_eq!(report.node_count, 13);
        assert_eq!(report.max_level, 3);
        assert!(check_pairwise_nesting(&tree).is_ok());
    }

    #[test]
    fn test_unencoded_tree_is_rejected() {
        let tree = sample();
        assert!(matches!(
            verify_encoding(&tree),
            Err(EncodingViolation::NotEncoded { .. })
        ));
    }

    #[test]
    fn test_tampered_ranks_are_detected() {
        let mut tree = sample();
        encode(&mut tree);
        let leaf = tree.preorder()[3];
        tree.node_mut(leaf).unwrap().order = Some(OrderPair::new(1, 1));

        assert!(matches!(
            verify_encoding(&tree),
            Err(EncodingViolation::NotPermutation { column: "pre", .. })
        ));
    }

    #[test]
    fn test_tampered_sizes_are_detected() {
        let mut tree = sample();
        encode(&mut tree);
        let venue = tree.preorder()[1];
        tree.node_mut(venue).unwrap().bounds = Some(SubtreeBounds {
            level: 1,
            subtree_size: 2,
        });

        assert!(matches!(
            verify_encoding(&tree),
            Err(EncodingViolation::SubtreeSizeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_strategy_comparison_is_clean() {
        let mut tree = sample();
        encode(&mut tree);
        let store = Arc::new(MemoryStore::new(Layout::Ordered));
        store.insert_tree(&tree).await.unwrap();

        let contexts: Vec<NodeId> = (1..=13).collect();
        let comparison = StrategyComparison::run(store.clone(), &contexts, &Axis::ALL)
            .await
            .unwrap();
        assert_eq!(comparison.checked, 52);
        assert!(comparison.is_consistent());

        let bounded = compare_bounded(
            store,
            BoundedOptions::default().with_depth_bound(DepthBound {
                subtree_threshold: 2,
                max_depth: 1,
            }),
            &contexts,
        )
        .await
        .unwrap();
        assert!(bounded.is_consistent());
    }
}
