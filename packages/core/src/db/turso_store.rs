//! TursoStore - StructuralStore Implementation for Turso/libsql Backend
//!
//! TursoStore wraps a [`DatabaseService`] and delegates the SQL to its `db_*`
//! methods. It owns the layout decision and the conversion from `libsql::Row`
//! to [`NodeRow`].
//!
//! # Layout bookkeeping
//!
//! The layout is recorded in `store_meta` when a store is created, so a later
//! process can reopen the database with [`TursoStore::open`] without being
//! told which layout it holds.
//!
//! # Examples
//!
//! ```rust,no_run
//! use xaccel_core::db::{DatabaseService, Layout, StructuralStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/dblp.db")).await?);
//!     let store: Arc<dyn StructuralStore> = Arc::new(TursoStore::create(db, Layout::Ordered).await?);
//!
//!     let node = store.get(42).await?;
//!     Ok(())
//! }
//! ```

use crate::db::structural_store::{plan_insert, IdMap, Layout, RangeScan, StructuralStore};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{NodeId, NodeRow, OrderPair, SubtreeBounds, Tree};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const META_LAYOUT: &str = "layout";
const META_CREATED_AT: &str = "created_at";

/// Facts recorded about a persisted store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub layout: Layout,
    pub created_at: Option<DateTime<Utc>>,
    pub node_count: i64,
}

/// StructuralStore over a libsql database
pub struct TursoStore {
    db: Arc<DatabaseService>,
    layout: Layout,
}

impl TursoStore {
    /// Bind a database to `layout`, recording the choice
    ///
    /// # Errors
    ///
    /// `LayoutMismatch` if the database already records a different layout.
    pub async fn create(db: Arc<DatabaseService>, layout: Layout) -> Result<Self, DatabaseError> {
        match Self::recorded_layout(&db).await? {
            Some(existing) if existing != layout => {
                return Err(DatabaseError::layout_mismatch("create store", layout, existing));
            }
            Some(_) => {}
            None => {
                db.db_set_meta(META_LAYOUT, layout.as_str()).await?;
                db.db_set_meta(META_CREATED_AT, &Utc::now().to_rfc3339())
                    .await?;
            }
        }

        tracing::debug!(layout = %layout, path = %db.db_path.display(), "Bound structural store");
        Ok(Self { db, layout })
    }

    /// Reopen a database with whatever layout it records
    ///
    /// # Errors
    ///
    /// `LayoutUnknown` if no layout was ever recorded.
    pub async fn open(db: Arc<DatabaseService>) -> Result<Self, DatabaseError> {
        let layout = Self::recorded_layout(&db)
            .await?
            .ok_or_else(|| DatabaseError::LayoutUnknown {
                path: db.db_path.clone(),
            })?;

        tracing::debug!(layout = %layout, path = %db.db_path.display(), "Reopened structural store");
        Ok(Self { db, layout })
    }

    async fn recorded_layout(db: &DatabaseService) -> Result<Option<Layout>, DatabaseError> {
        match db.db_get_meta(META_LAYOUT).await? {
            Some(text) => text
                .parse::<Layout>()
                .map(Some)
                .map_err(DatabaseError::corrupt_row),
            None => Ok(None),
        }
    }

    /// Layout, creation time and size of this store
    pub async fn info(&self) -> Result<StoreInfo, DatabaseError> {
        let created_at = match self.db.db_get_meta(META_CREATED_AT).await? {
            Some(text) => Some(Self::parse_timestamp(&text)?),
            None => None,
        };

        Ok(StoreInfo {
            layout: self.layout,
            created_at,
            node_count: self.db.db_count_nodes().await?,
        })
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Parse timestamp from store_meta - handles both SQLite and RFC3339 formats
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::corrupt_row(format!("timestamp '{}': {}", s, e)))
    }

    /// Convert libsql::Row to NodeRow
    ///
    /// # Row Format
    ///
    /// Columns as selected by `NODE_SELECT`:
    /// id, parent, type, label, content text, position,
    /// pre_order, post_order, level, subtree_size
    fn row_to_node(row: &Row) -> Result<NodeRow, DatabaseError> {
        let column = |name: &str, e: libsql::Error| {
            DatabaseError::corrupt_row(format!("Failed to get {}: {}", name, e))
        };

        let id: i64 = row.get(0).map_err(|e| column("id", e))?;
        let parent: Option<i64> = row.get(1).map_err(|e| column("parent", e))?;
        let node_type: String = row.get(2).map_err(|e| column("type", e))?;
        let label: Option<String> = row.get(3).map_err(|e| column("label", e))?;
        let content: Option<String> = row.get(4).map_err(|e| column("content", e))?;
        let position: i64 = row.get(5).map_err(|e| column("position", e))?;
        let pre: Option<i64> = row.get(6).map_err(|e| column("pre_order", e))?;
        let post: Option<i64> = row.get(7).map_err(|e| column("post_order", e))?;
        let level: Option<i64> = row.get(8).map_err(|e| column("level", e))?;
        let subtree_size: Option<i64> = row.get(9).map_err(|e| column("subtree_size", e))?;

        let order = match (pre, post) {
            (Some(pre), Some(post)) => Some(OrderPair::new(pre, post)),
            _ => None,
        };
        let bounds = match (level, subtree_size) {
            (Some(level), Some(subtree_size)) => Some(SubtreeBounds {
                level,
                subtree_size,
            }),
            _ => None,
        };

        Ok(NodeRow {
            id,
            parent,
            node_type,
            label,
            content,
            position,
            order,
            bounds,
        })
    }

    async fn collect_rows(
        &self,
        filter: &str,
        order_by: &str,
        params: Vec<Value>,
    ) -> Result<Vec<NodeRow>, DatabaseError> {
        let mut rows = self.db.db_select_nodes(filter, order_by, params).await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    /// WHERE clause and parameters for a range scan
    fn scan_clause(scan: &RangeScan) -> (String, Vec<Value>) {
        let mut clauses = vec!["n.pre_order IS NOT NULL".to_string()];
        let mut params = Vec::new();

        let mut push = |clause: &str, value: Value| {
            clauses.push(clause.to_string());
            params.push(value);
        };

        if let Some(v) = scan.pre_above {
            push("n.pre_order > ?", Value::Integer(v));
        }
        if let Some(v) = scan.pre_below {
            push("n.pre_order < ?", Value::Integer(v));
        }
        if let Some(v) = scan.post_above {
            push("n.post_order > ?", Value::Integer(v));
        }
        if let Some(v) = scan.post_below {
            push("n.post_order < ?", Value::Integer(v));
        }
        if let Some(parent) = scan.parent {
            push("n.parent = ?", Value::Integer(parent));
        }
        if let Some(node_type) = &scan.node_type {
            push("n.type = ?", Value::Text(node_type.clone()));
        }
        if let Some(max_level) = scan.max_level {
            push("n.level <= ?", Value::Integer(max_level));
        }

        (clauses.join(" AND "), params)
    }
}

#[async_trait]
impl StructuralStore for TursoStore {
    fn layout(&self) -> Layout {
        self.layout
    }

    async fn insert_tree(&self, tree: &Tree) -> Result<IdMap, DatabaseError> {
        let existing = self.db.db_count_nodes().await?;
        if existing > 0 {
            return Err(DatabaseError::StoreNotEmpty { existing });
        }

        let rows = plan_insert(tree, self.layout)?;
        let ids = self.db.db_insert_rows(&rows, tree.len()).await?;

        tracing::info!(
            nodes = rows.len(),
            layout = %self.layout,
            "Persisted tree into libsql store"
        );

        Ok(ids)
    }

    async fn get(&self, id: NodeId) -> Result<Option<NodeRow>, DatabaseError> {
        let mut rows = self
            .collect_rows("n.id = ?", "n.id", vec![Value::Integer(id)])
            .await?;
        Ok(rows.pop())
    }

    async fn find_by_label(&self, label: &str) -> Result<Vec<NodeRow>, DatabaseError> {
        self.collect_rows("n.label = ?", "n.id", vec![Value::Text(label.to_string())])
            .await
    }

    async fn find_by_type(&self, node_type: &str) -> Result<Vec<NodeRow>, DatabaseError> {
        self.collect_rows("n.type = ?", "n.id", vec![Value::Text(node_type.to_string())])
            .await
    }

    async fn range_scan(&self, scan: &RangeScan) -> Result<Vec<NodeRow>, DatabaseError> {
        if !self.layout.supports_range() {
            return Err(DatabaseError::layout_mismatch(
                "range scan",
                Layout::Ordered,
                self.layout,
            ));
        }

        let (filter, params) = Self::scan_clause(scan);
        self.collect_rows(&filter, "n.pre_order", params).await
    }

    async fn children(&self, parent: NodeId) -> Result<Vec<NodeRow>, DatabaseError> {
        self.collect_rows("n.parent = ?", "n.position", vec![Value::Integer(parent)])
            .await
    }

    async fn attributes(&self, id: NodeId) -> Result<Vec<String>, DatabaseError> {
        self.db.db_get_attributes(id).await
    }

    async fn node_count(&self) -> Result<i64, DatabaseError> {
        self.db.db_count_nodes().await
    }
}

#[cfg(test)]
#[path = "turso_store_test.rs"]
mod turso_store_test;
