//! Axis query vocabulary
//!
//! Types shared by every evaluator: which axis is asked for, how the caller
//! wants it answered ([`AxisOptions`]), and what comes back ([`AxisResult`]).

use crate::models::node::{NodeId, NodeRow};
use crate::services::error::AxisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four structural axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    Ancestor,
    Descendant,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    pub const ALL: [Axis; 4] = [
        Axis::Ancestor,
        Axis::Descendant,
        Axis::FollowingSibling,
        Axis::PrecedingSibling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Ancestor => "ancestor",
            Axis::Descendant => "descendant",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
        }
    }

    /// Sibling direction, `None` for the vertical axes
    pub fn sibling_direction(&self) -> Option<SiblingDirection> {
        match self {
            Axis::FollowingSibling => Some(SiblingDirection::Following),
            Axis::PrecedingSibling => Some(SiblingDirection::Preceding),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = AxisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ancestor" => Ok(Axis::Ancestor),
            "descendant" => Ok(Axis::Descendant),
            "following-sibling" => Ok(Axis::FollowingSibling),
            "preceding-sibling" => Ok(Axis::PrecedingSibling),
            _ => Err(AxisError::unknown_axis(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingDirection {
    Following,
    Preceding,
}

/// One row of an axis result: `(id, type, content)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisNode {
    pub id: NodeId,
    pub node_type: String,
    pub content: Option<String>,
}

impl From<&NodeRow> for AxisNode {
    fn from(row: &NodeRow) -> Self {
        Self {
            id: row.id,
            node_type: row.node_type.clone(),
            content: row.content.clone(),
        }
    }
}

impl From<NodeRow> for AxisNode {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.id,
            node_type: row.node_type,
            content: row.content,
        }
    }
}

/// How an axis query was answered
///
/// `Matched` with zero rows means "no matches"; the other variants mean the
/// query could not be answered in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AxisStatus {
    /// Exact answer (possibly empty)
    Matched,

    /// The context id is absent from the store
    NodeNotFound { id: NodeId },

    /// The context node is the root, so it has no ancestors or siblings
    NoParent { id: NodeId },

    /// A depth cap cut the scan short; rows are a strict subset of the answer
    Incomplete { max_depth: i64, omitted: i64 },
}

/// Rows of an axis query plus how they were obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisResult {
    pub axis: Axis,
    pub context: NodeId,
    pub rows: Vec<AxisNode>,
    pub status: AxisStatus,
}

impl AxisResult {
    pub fn matched(axis: Axis, context: NodeId, rows: Vec<AxisNode>) -> Self {
        Self {
            axis,
            context,
            rows,
            status: AxisStatus::Matched,
        }
    }

    pub fn not_found(axis: Axis, context: NodeId) -> Self {
        Self {
            axis,
            context,
            rows: Vec::new(),
            status: AxisStatus::NodeNotFound { id: context },
        }
    }

    pub fn no_parent(axis: Axis, context: NodeId) -> Self {
        Self {
            axis,
            context,
            rows: Vec::new(),
            status: AxisStatus::NoParent { id: context },
        }
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self.status, AxisStatus::Incomplete { .. })
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.rows.iter().map(|row| row.id).collect()
    }

    /// Ids sorted ascending, for order-insensitive comparison
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids = self.ids();
        ids.sort_unstable();
        ids
    }

    /// Rows of an exact, answerable query; every other status becomes an error
    pub fn into_rows_strict(self) -> Result<Vec<AxisNode>, AxisError> {
        match self.status {
            AxisStatus::Matched => Ok(self.rows),
            AxisStatus::NodeNotFound { id } => Err(AxisError::node_not_found(id)),
            AxisStatus::NoParent { id } => Err(AxisError::no_parent(id, self.axis)),
            AxisStatus::Incomplete { max_depth, omitted } => Err(AxisError::IncompleteResult {
                context: self.context,
                max_depth,
                omitted,
            }),
        }
    }
}

/// Which evaluation strategy an evaluator is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Transitive traversal of parent/child edges
    Closure,

    /// Numeric comparison of order pairs
    Range,

    /// Range on an ordered layout, closure on an edge layout
    #[default]
    Auto,
}

impl FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closure" => Ok(StrategyChoice::Closure),
            "range" => Ok(StrategyChoice::Range),
            "auto" => Ok(StrategyChoice::Auto),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Restriction applied to sibling results
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "node_type", rename_all = "snake_case")]
pub enum SiblingFilter {
    #[default]
    All,

    /// Only siblings whose type equals the context node's type
    SameTypeAsContext,

    /// Only siblings of the given type
    OfType(String),
}

impl SiblingFilter {
    /// The concrete type to match, given the context node's type
    pub fn resolve<'a>(&'a self, context_type: &'a str) -> Option<&'a str> {
        match self {
            SiblingFilter::All => None,
            SiblingFilter::SameTypeAsContext => Some(context_type),
            SiblingFilter::OfType(node_type) => Some(node_type.as_str()),
        }
    }
}

/// Whether ancestor queries follow node identity or shared values
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AncestorScope {
    /// Ancestors of the queried node only
    #[default]
    Node,

    /// Ancestors of every node with the same type and content as the context,
    /// applied when the context's type is listed (empty list: any type)
    SharedValue {
        #[serde(default)]
        node_types: Vec<String>,
    },
}

impl AncestorScope {
    /// Value-equality scope for the given repeatable types, e.g. `["author"]`
    pub fn shared_value<I, S>(node_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AncestorScope::SharedValue {
            node_types: node_types.into_iter().map(Into::into).collect(),
        }
    }

    /// The value to expand on, if this scope applies to `row`
    pub fn shared_value_of<'a>(&self, row: &'a NodeRow) -> Option<&'a str> {
        match self {
            AncestorScope::Node => None,
            AncestorScope::SharedValue { node_types } => {
                let type_matches =
                    node_types.is_empty() || node_types.iter().any(|t| *t == row.node_type);
                if type_matches {
                    row.content.as_deref()
                } else {
                    None
                }
            }
        }
    }
}

/// Caller-facing options of an axis evaluator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisOptions {
    #[serde(default)]
    pub strategy: StrategyChoice,

    #[serde(default)]
    pub sibling_filter: SiblingFilter,

    #[serde(default)]
    pub ancestor_scope: AncestorScope,
}

impl AxisOptions {
    pub fn closure() -> Self {
        Self {
            strategy: StrategyChoice::Closure,
            ..Default::default()
        }
    }

    pub fn range() -> Self {
        Self {
            strategy: StrategyChoice::Range,
            ..Default::default()
        }
    }

    pub fn with_sibling_filter(mut self, filter: SiblingFilter) -> Self {
        self.sibling_filter = filter;
        self
    }

    pub fn with_ancestor_scope(mut self, scope: AncestorScope) -> Self {
        self.ancestor_scope = scope;
        self
    }
}
