//! Pre/Post-Order Encoder
//!
//! A single depth-first pass assigns every node:
//!
//! - a pre-order rank, taken on entry (parents rank below their children)
//! - a post-order rank, taken on exit (children rank below their parents)
//! - its level (root = 0) and subtree size (self included)
//!
//! With these numbers the structural axes reduce to interval comparisons:
//! `a` is an ancestor of `v` exactly when `pre(a) < pre(v)` and
//! `post(a) > post(v)`.
//!
//! The traversal keeps an explicit stack, so chains deeper than the thread's
//! call stack encode fine. Counters are threaded through by `&mut`, which keeps
//! the encoder reentrant.
//!
//! # Examples
//!
//! ```rust
//! use xaccel_core::encoding::encode;
//! use xaccel_core::models::{NodeData, OrderPair, Tree};
//!
//! let mut tree = Tree::new(NodeData::new("root"));
//! let a = tree.add_child(tree.root(), NodeData::new("a")).unwrap();
//! let b = tree.add_child(a, NodeData::new("b")).unwrap();
//!
//! let summary = encode(&mut tree);
//! assert_eq!(summary.node_count, 3);
//! assert_eq!(tree.order(b).unwrap(), Some(OrderPair::new(3, 1)));
//! ```

use crate::models::{NodeIndex, OrderPair, SubtreeBounds, Tree};
use serde::{Deserialize, Serialize};

/// Next pre-order and post-order rank to hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCounters {
    pub pre: i64,
    pub post: i64,
}

impl Default for OrderCounters {
    fn default() -> Self {
        Self { pre: 1, post: 1 }
    }
}

impl OrderCounters {
    fn take_pre(&mut self) -> i64 {
        let value = self.pre;
        self.pre += 1;
        value
    }

    fn take_post(&mut self) -> i64 {
        let value = self.post;
        self.post += 1;
        value
    }
}

/// Shape statistics of an encoded tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSummary {
    pub node_count: i64,
    pub max_level: i64,
    pub max_subtree_size: i64,
}

/// Encode the whole tree, starting both counters at 1
///
/// Calling this again on the same tree overwrites the previous numbering with
/// an identical one.
pub fn encode(tree: &mut Tree) -> EncodingSummary {
    if tree.iter().any(|(_, node)| node.order.is_some()) {
        tracing::warn!(
            "Re-encoding a tree with {} nodes; previous order numbers are overwritten",
            tree.len()
        );
    }

    let mut counters = OrderCounters::default();
    let root = tree.root();
    let summary = encode_subtree(tree, root, 0, &mut counters);

    tracing::info!(
        nodes = summary.node_count,
        max_level = summary.max_level,
        "Annotated tree with pre/post-order ranks"
    );

    summary
}

/// Encode the subtree rooted at `start`, which sits at `level`, drawing ranks
/// from `counters`
///
/// Used directly when a caller numbers several trees from one counter pair.
pub fn encode_subtree(
    tree: &mut Tree,
    start: NodeIndex,
    level: i64,
    counters: &mut OrderCounters,
) -> EncodingSummary {
    struct Frame {
        index: NodeIndex,
        level: i64,
        pre: i64,
        next_child: usize,
    }

    let first_pre = counters.pre;
    let mut summary = EncodingSummary {
        node_count: 0,
        max_level: level,
        max_subtree_size: 0,
    };

    let mut stack = vec![Frame {
        index: start,
        level,
        pre: counters.take_pre(),
        next_child: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let child = tree
            .children(frame.index)
            .ok()
            .and_then(|children| children.get(frame.next_child).copied());

        match child {
            Some(child) => {
                frame.next_child += 1;
                let child_level = frame.level + 1;
                summary.max_level = summary.max_level.max(child_level);
                stack.push(Frame {
                    index: child,
                    level: child_level,
                    pre: counters.take_pre(),
                    next_child: 0,
                });
            }
            None => {
                let Some(done) = stack.pop() else { break };
                let post = counters.take_post();
                let subtree_size = counters.pre - done.pre;
                summary.max_subtree_size = summary.max_subtree_size.max(subtree_size);

                if let Ok(node) = tree.node_mut(done.index) {
                    node.order = Some(OrderPair::new(done.pre, post));
                    node.bounds = Some(SubtreeBounds {
                        level: done.level,
                        subtree_size,
                    });
                }
            }
        }
    }

    summary.node_count = counters.pre - first_pre;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeData;

    fn chain() -> (Tree, Vec<NodeIndex>) {
        let mut tree = Tree::new(NodeData::new("root"));
        let a = tree.add_child(tree.root(), NodeData::new("A")).unwrap();
        let b = tree.add_child(a, NodeData::new("B")).unwrap();
        let c = tree.add_child(b, NodeData::new("C")).unwrap();
        let root = tree.root();
        (tree, vec![root, a, b, c])
    }

    #[test]
    fn test_chain_ranks() {
        let (mut tree, nodes) = chain();
        encode(&mut tree);

        let pres: Vec<i64> = nodes
            .iter()
            .map(|n| tree.order(*n).unwrap().unwrap().pre)
            .collect();
        let posts: Vec<i64> = nodes
            .iter()
            .map(|n| tree.order(*n).unwrap().unwrap().post)
            .collect();

        assert_eq!(pres, vec![1, 2, 3, 4]);
        assert_eq!(posts, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_single_node_tree() {
        let mut tree = Tree::new(NodeData::new("only"));
        let summary = encode(&mut tree);

        assert_eq!(tree.order(tree.root()).unwrap(), Some(OrderPair::new(1, 1)));
        assert_eq!(
            tree.bounds(tree.root()).unwrap(),
            Some(SubtreeBounds {
                level: 0,
                subtree_size: 1
            })
        );
        assert_eq!(summary.node_count, 1);
        assert_eq!(summary.max_level, 0);
    }

    #[test]
    fn test_bounds_and_summary() {
        let mut tree = Tree::new(NodeData::new("p"));
        let x = tree.add_child(tree.root(), NodeData::new("x")).unwrap();
        let y = tree.add_child(tree.root(), NodeData::new("y")).unwrap();
        let y1 = tree.add_child(y, NodeData::new("y1")).unwrap();

        let summary = encode(&mut tree);
        assert_eq!(summary.node_count, 4);
        assert_eq!(summary.max_level, 2);
        assert_eq!(summary.max_subtree_size, 4);

        assert_eq!(tree.bounds(x).unwrap().unwrap().subtree_size, 1);
        assert_eq!(tree.bounds(y).unwrap().unwrap().subtree_size, 2);
        assert_eq!(tree.bounds(y1).unwrap().unwrap().level, 2);
    }

    #[test]
    fn test_reencoding_reproduces_numbering() {
        let (mut tree, _) = chain();
        encode(&mut tree);
        let first: Vec<_> = tree.iter().map(|(_, n)| n.order).collect();

        encode(&mut tree);
        let second: Vec<_> = tree.iter().map(|(_, n)| n.order).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut tree = Tree::new(NodeData::new("n"));
        let mut tip = tree.root();
        for _ in 0..50_000 {
            tip = tree.add_child(tip, NodeData::new("n")).unwrap();
        }

        let summary = encode(&mut tree);
        assert_eq!(summary.node_count, 50_001);
        assert_eq!(tree.order(tip).unwrap(), Some(OrderPair::new(50_001, 1)));
    }

    #[test]
    fn test_shared_counters_span_subtrees() {
        let mut first = Tree::new(NodeData::new("a"));
        first.add_child(first.root(), NodeData::new("a1")).unwrap();
        let mut second = Tree::new(NodeData::new("b"));

        let mut counters = OrderCounters::default();
        let root = first.root();
        encode_subtree(&mut first, root, 0, &mut counters);
        let root = second.root();
        encode_subtree(&mut second, root, 0, &mut counters);

        assert_eq!(second.order(second.root()).unwrap(), Some(OrderPair::new(3, 3)));
    }
}
