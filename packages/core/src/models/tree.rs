//! Arena-backed document tree
//!
//! Nodes live in a flat `Vec` and refer to each other through [`NodeIndex`]
//! values, so parent back-references never form ownership cycles. Children are
//! kept in insertion order, which is document order.

use crate::models::node::{NodeData, OrderPair, SubtreeBounds};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Position of a node inside its [`Tree`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while building or navigating a tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node index {0} is out of bounds")]
    IndexOutOfBounds(NodeIndex),

    #[error("Node index {index} belongs to a tree with {len} nodes")]
    ForeignIndex { index: NodeIndex, len: usize },
}

/// One record in the arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub data: NodeData,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,

    /// Set by the encoder
    pub order: Option<OrderPair>,

    /// Set by the encoder alongside `order`
    pub bounds: Option<SubtreeBounds>,
}

impl TreeNode {
    fn new(data: NodeData, parent: Option<NodeIndex>) -> Self {
        Self {
            data,
            parent,
            children: Vec::new(),
            order: None,
            bounds: None,
        }
    }
}

/// Rooted, ordered tree of document nodes
///
/// # Examples
///
/// ```rust
/// use xaccel_core::models::{NodeData, Tree};
///
/// let mut tree = Tree::new(NodeData::new("bib"));
/// let venue = tree.add_child(tree.root(), NodeData::new("venue").with_content("vldb")).unwrap();
/// tree.add_child(venue, NodeData::new("year").with_content("2023")).unwrap();
///
/// assert_eq!(tree.len(), 3);
/// assert_eq!(tree.children(tree.root()).unwrap(), &[venue]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// Create a tree holding only its root
    pub fn new(root: NodeData) -> Self {
        Self {
            nodes: vec![TreeNode::new(root, None)],
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `data` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeIndex, data: NodeData) -> Result<NodeIndex, TreeError> {
        self.check(parent)?;
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(TreeNode::new(data, Some(parent)));
        self.nodes[parent.0].children.push(index);
        Ok(index)
    }

    /// Graft `subtree` under `parent`, preserving its shape and any annotations
    pub fn append_tree(&mut self, parent: NodeIndex, subtree: Tree) -> Result<NodeIndex, TreeError> {
        self.check(parent)?;
        let offset = self.nodes.len();
        let shift = |index: NodeIndex| NodeIndex(index.0 + offset);

        for mut node in subtree.nodes {
            node.parent = Some(node.parent.map(shift).unwrap_or(parent));
            node.children = node.children.into_iter().map(shift).collect();
            self.nodes.push(node);
        }

        let grafted = NodeIndex(offset);
        self.nodes[parent.0].children.push(grafted);
        Ok(grafted)
    }

    pub fn node(&self, index: NodeIndex) -> Result<&TreeNode, TreeError> {
        self.nodes
            .get(index.0)
            .ok_or(TreeError::IndexOutOfBounds(index))
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> Result<&mut TreeNode, TreeError> {
        self.nodes
            .get_mut(index.0)
            .ok_or(TreeError::IndexOutOfBounds(index))
    }

    pub fn data(&self, index: NodeIndex) -> Result<&NodeData, TreeError> {
        Ok(&self.node(index)?.data)
    }

    pub fn parent(&self, index: NodeIndex) -> Result<Option<NodeIndex>, TreeError> {
        Ok(self.node(index)?.parent)
    }

    pub fn children(&self, index: NodeIndex) -> Result<&[NodeIndex], TreeError> {
        Ok(&self.node(index)?.children)
    }

    pub fn order(&self, index: NodeIndex) -> Result<Option<OrderPair>, TreeError> {
        Ok(self.node(index)?.order)
    }

    pub fn bounds(&self, index: NodeIndex) -> Result<Option<SubtreeBounds>, TreeError> {
        Ok(self.node(index)?.bounds)
    }

    /// True once every node carries an order pair
    pub fn is_encoded(&self) -> bool {
        self.nodes.iter().all(|node| node.order.is_some())
    }

    /// Rank of `index` among its siblings (0 for the root)
    pub fn position(&self, index: NodeIndex) -> Result<usize, TreeError> {
        match self.parent(index)? {
            None => Ok(0),
            Some(parent) => Ok(self
                .children(parent)?
                .iter()
                .position(|child| *child == index)
                .unwrap_or(0)),
        }
    }

    /// All indices in arena order
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    /// All nodes with their indices, in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &TreeNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i), node))
    }

    /// Indices in document (pre-order) order
    pub fn preorder(&self) -> Vec<NodeIndex> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(self.nodes[index.0].children.iter().rev().copied());
        }
        out
    }

    /// First node (document order) whose label equals `label`
    pub fn find_by_label(&self, label: &str) -> Option<NodeIndex> {
        self.preorder()
            .into_iter()
            .find(|index| self.nodes[index.0].data.label.as_deref() == Some(label))
    }

    fn check(&self, index: NodeIndex) -> Result<(), TreeError> {
        if index.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::ForeignIndex {
                index,
                len: self.nodes.len(),
            })
        }
    }
}
