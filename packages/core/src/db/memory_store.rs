//! In-process StructuralStore
//!
//! Keeps the node and attribute tables in memory behind a lock. Useful for
//! tests, benchmarks and documents small enough that persistence is pointless.
//! Answers are identical to `TursoStore` for the same tree and layout.

use crate::db::structural_store::{plan_insert, IdMap, Layout, RangeScan, StructuralStore};
use crate::db::DatabaseError;
use crate::models::{NodeId, NodeRow, Tree};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Tables {
    nodes: BTreeMap<NodeId, NodeRow>,
    attributes: HashMap<NodeId, Vec<String>>,
    /// pre-order rank -> id, ordered layout only
    by_pre: BTreeMap<i64, NodeId>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    layout: Layout,
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    fn select<F>(&self, mut predicate: F) -> Result<Vec<NodeRow>, DatabaseError>
    where
        F: FnMut(&NodeRow) -> bool,
    {
        let tables = self.tables.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(tables
            .nodes
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StructuralStore for MemoryStore {
    fn layout(&self) -> Layout {
        self.layout
    }

    async fn insert_tree(&self, tree: &Tree) -> Result<IdMap, DatabaseError> {
        let rows = plan_insert(tree, self.layout)?;

        let mut tables = self.tables.write().map_err(|_| DatabaseError::LockPoisoned)?;
        if !tables.nodes.is_empty() {
            return Err(DatabaseError::StoreNotEmpty {
                existing: tables.nodes.len() as i64,
            });
        }

        let mut ids = IdMap::with_len(tree.len());
        let mut next_surrogate: NodeId = 1;

        for row in rows {
            let id = row.id.unwrap_or_else(|| {
                let id = next_surrogate;
                next_surrogate += 1;
                id
            });
            ids.set(row.index, id);

            let parent = match row.parent {
                Some(parent) => Some(ids.get(parent).ok_or_else(|| {
                    DatabaseError::corrupt_row(format!("parent {} of {} not inserted", parent, row.index))
                })?),
                None => None,
            };

            if let Some(order) = row.order {
                tables.by_pre.insert(order.pre, id);
            }
            if !row.attributes.is_empty() {
                tables.attributes.insert(id, row.attributes);
            }

            tables.nodes.insert(
                id,
                NodeRow {
                    id,
                    parent,
                    node_type: row.node_type,
                    label: row.label,
                    content: row.content,
                    position: row.position,
                    order: row.order,
                    bounds: row.bounds,
                },
            );
        }

        tracing::debug!(
            nodes = tables.nodes.len(),
            layout = %self.layout,
            "Loaded tree into memory store"
        );

        Ok(ids)
    }

    async fn get(&self, id: NodeId) -> Result<Option<NodeRow>, DatabaseError> {
        let tables = self.tables.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(tables.nodes.get(&id).cloned())
    }

    async fn find_by_label(&self, label: &str) -> Result<Vec<NodeRow>, DatabaseError> {
        self.select(|row| row.label.as_deref() == Some(label))
    }

    async fn find_by_type(&self, node_type: &str) -> Result<Vec<NodeRow>, DatabaseError> {
        self.select(|row| row.node_type == node_type)
    }

    async fn range_scan(&self, scan: &RangeScan) -> Result<Vec<NodeRow>, DatabaseError> {
        if !self.layout.supports_range() {
            return Err(DatabaseError::layout_mismatch(
                "range scan",
                Layout::Ordered,
                self.layout,
            ));
        }

        let lower = scan.pre_above.map_or(Bound::Unbounded, Bound::Excluded);
        let upper = scan.pre_below.map_or(Bound::Unbounded, Bound::Excluded);
        if let (Bound::Excluded(lo), Bound::Excluded(hi)) = (lower, upper) {
            if lo >= hi {
                return Ok(Vec::new());
            }
        }

        let tables = self.tables.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(tables
            .by_pre
            .range((lower, upper))
            .filter_map(|(_, id)| tables.nodes.get(id))
            .filter(|row| scan.matches(row))
            .cloned()
            .collect())
    }

    async fn children(&self, parent: NodeId) -> Result<Vec<NodeRow>, DatabaseError> {
        let mut rows = self.select(|row| row.parent == Some(parent))?;
        rows.sort_by_key(|row| row.position);
        Ok(rows)
    }

    async fn attributes(&self, id: NodeId) -> Result<Vec<String>, DatabaseError> {
        let tables = self.tables.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(tables.attributes.get(&id).cloned().unwrap_or_default())
    }

    async fn node_count(&self) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(tables.nodes.len() as i64)
    }
}
