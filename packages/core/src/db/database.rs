//! Database Connection Management
//!
//! This module provides the database connection and schema setup for the
//! libsql-backed structural store.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf, or `:memory:`
//! - **WAL mode**: Write-Ahead Logging for concurrent readers
//! - **Foreign keys**: Enabled so parent references must exist
//!
//! # Schema
//!
//! - `node`: one row per element (id, parent, type, label, position) plus the
//!   nullable order columns (`pre_order`, `post_order`, `level`, `subtree_size`)
//!   that only the ordered layout fills
//! - `content`: text content, only for nodes with non-blank text
//! - `attribute`: `key=value` texts in document order
//! - `store_meta`: key/value facts about the store (layout, creation time)
//!
//! # Database Connection Patterns
//!
//! **Use `connect_with_timeout()` in async functions.** The 5-second busy
//! timeout lets concurrent operations wait instead of failing with
//! `SQLITE_BUSY`.
//!
//! In-memory databases exist per connection, so an in-memory service keeps a
//! single primary connection and hands out clones of it via `connection()`.

use crate::db::error::DatabaseError;
use crate::db::{IdMap, PendingRow};
use libsql::{Builder, Database, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Column list shared by every node query; joins in the content text
pub(crate) const NODE_SELECT: &str =
    "SELECT n.id, n.parent, n.type, n.label, c.text, n.position,
            n.pre_order, n.post_order, n.level, n.subtree_size
     FROM node n LEFT JOIN content c ON c.node_id = n.id";

const IN_MEMORY_PATH: &str = ":memory:";

/// Database service for managing libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use xaccel_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/dblp.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    /// Connection every operation reuses; only set for in-memory databases
    primary: Option<libsql::Connection>,
}

impl fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseService")
            .field("db_path", &self.db_path)
            .field("in_memory", &self.primary.is_some())
            .finish()
    }
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if db_path.as_os_str() == IN_MEMORY_PATH {
            return Self::new_in_memory().await;
        }

        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            primary: None,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Create a DatabaseService on a private in-memory database
    pub async fn new_in_memory() -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(IN_MEMORY_PATH);
        let db = Builder::new_local(IN_MEMORY_PATH)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;
        let primary = db.connect().map_err(DatabaseError::LibsqlError)?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            primary: Some(primary),
        };

        service.initialize_schema(false).await?;

        Ok(service)
    }

    pub fn is_in_memory(&self) -> bool {
        self.primary.is_some()
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates tables and indexes using CREATE TABLE IF NOT EXISTS, so
    /// reopening an existing database is safe.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connection().await?;

        if !self.is_in_memory() {
            self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
                .await?;
        }

        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        let tables = [
            (
                "node",
                "CREATE TABLE IF NOT EXISTS node (
                    id INTEGER PRIMARY KEY,
                    parent INTEGER,
                    type TEXT NOT NULL,
                    label TEXT,
                    position INTEGER NOT NULL DEFAULT 0,
                    pre_order INTEGER,
                    post_order INTEGER,
                    level INTEGER,
                    subtree_size INTEGER,
                    FOREIGN KEY (parent) REFERENCES node(id)
                )",
            ),
            (
                "content",
                "CREATE TABLE IF NOT EXISTS content (
                    node_id INTEGER PRIMARY KEY,
                    text TEXT NOT NULL,
                    FOREIGN KEY (node_id) REFERENCES node(id)
                )",
            ),
            (
                "attribute",
                "CREATE TABLE IF NOT EXISTS attribute (
                    node_id INTEGER NOT NULL,
                    position INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    PRIMARY KEY (node_id, position),
                    FOREIGN KEY (node_id) REFERENCES node(id)
                )",
            ),
            (
                "store_meta",
                "CREATE TABLE IF NOT EXISTS store_meta (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )",
            ),
        ];

        for (name, sql) in tables {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create {} table: {}", name, e))
            })?;
        }

        self.create_core_indexes(&conn).await?;

        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create the indexes behind each lookup
    ///
    /// - `idx_node_parent`: children in document order
    /// - `idx_node_parent_pre`: sibling scans
    /// - `idx_node_parent_type`: typed sibling scans
    /// - `idx_node_order`: region scans on `(pre_order, post_order)`
    /// - `idx_node_type` / `idx_node_label`: entry-point lookups
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_node_parent",
                "CREATE INDEX IF NOT EXISTS idx_node_parent ON node(parent, position)",
            ),
            (
                "idx_node_parent_type",
                "CREATE INDEX IF NOT EXISTS idx_node_parent_type ON node(parent, type, pre_order)",
            ),
            (
                "idx_node_parent_pre",
                "CREATE INDEX IF NOT EXISTS idx_node_parent_pre ON node(parent, pre_order)",
            ),
            (
                "idx_node_order",
                "CREATE INDEX IF NOT EXISTS idx_node_order ON node(pre_order, post_order)",
            ),
            (
                "idx_node_type",
                "CREATE INDEX IF NOT EXISTS idx_node_type ON node(type)",
            ),
            (
                "idx_node_label",
                "CREATE INDEX IF NOT EXISTS idx_node_label ON node(label)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create index '{}': {}", name, e))
            })?;
        }

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Only use this in synchronous, single-threaded contexts. On an in-memory
    /// service this opens a *different*, empty database; use `connection()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }

    /// Connection for store operations: the primary connection of an
    /// in-memory database, a fresh timed-out connection otherwise
    pub async fn connection(&self) -> Result<libsql::Connection, DatabaseError> {
        match &self.primary {
            Some(conn) => Ok(conn.clone()),
            None => self.connect_with_timeout().await,
        }
    }

    //
    // STRUCTURAL STORE OPERATIONS
    // Raw SQL used by TursoStore; rows are decoded there.
    //

    /// Insert flattened rows in one transaction
    ///
    /// Rows must arrive parents first. Rows without an id get the rowid SQLite
    /// assigns; each parent reference is resolved through the ids assigned so
    /// far.
    pub(crate) async fn db_insert_rows(
        &self,
        rows: &[PendingRow],
        node_total: usize,
    ) -> Result<IdMap, DatabaseError> {
        let conn = self.connection().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let mut ids = IdMap::with_len(node_total);

        for row in rows {
            if let Err(e) = Self::insert_row(&conn, row, &mut ids).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(e);
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }

        Ok(ids)
    }

    async fn insert_row(
        conn: &libsql::Connection,
        row: &PendingRow,
        ids: &mut IdMap,
    ) -> Result<(), DatabaseError> {
        let parent = match row.parent {
            Some(parent) => Some(ids.get(parent).ok_or_else(|| {
                DatabaseError::corrupt_row(format!("parent {} of {} not inserted", parent, row.index))
            })?),
            None => None,
        };

        let values = vec![
            optional_integer(row.id),
            optional_integer(parent),
            Value::Text(row.node_type.clone()),
            optional_text(row.label.as_deref()),
            Value::Integer(row.position),
            optional_integer(row.order.map(|o| o.pre)),
            optional_integer(row.order.map(|o| o.post)),
            optional_integer(row.bounds.map(|b| b.level)),
            optional_integer(row.bounds.map(|b| b.subtree_size)),
        ];

        conn.execute(
            "INSERT INTO node (id, parent, type, label, position, pre_order, post_order, level, subtree_size)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            values,
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to insert node {} ({}): {}",
                row.index, row.node_type, e
            ))
        })?;

        let id = row.id.unwrap_or_else(|| conn.last_insert_rowid());
        ids.set(row.index, id);

        if let Some(text) = &row.content {
            conn.execute(
                "INSERT INTO content (node_id, text) VALUES (?, ?)",
                (id, text.as_str()),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to insert content of {}: {}", id, e))
            })?;
        }

        for (position, text) in row.attributes.iter().enumerate() {
            conn.execute(
                "INSERT INTO attribute (node_id, position, text) VALUES (?, ?, ?)",
                (id, position as i64, text.as_str()),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to insert attribute of {}: {}",
                    id, e
                ))
            })?;
        }

        Ok(())
    }

    /// Select nodes matching `filter` (a WHERE clause body over `n`/`c`)
    pub(crate) async fn db_select_nodes(
        &self,
        filter: &str,
        order_by: &str,
        params: Vec<Value>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connection().await?;
        let sql = format!("{} WHERE {} ORDER BY {}", NODE_SELECT, filter, order_by);

        let mut stmt = conn.prepare(&sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare node query '{}': {}", filter, e))
        })?;

        stmt.query(params).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute node query '{}': {}", filter, e))
        })
    }

    /// Attribute texts of a node in document order
    pub async fn db_get_attributes(&self, node_id: i64) -> Result<Vec<String>, DatabaseError> {
        let conn = self.connection().await?;

        let mut stmt = conn
            .prepare("SELECT text FROM attribute WHERE node_id = ? ORDER BY position")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare attribute query: {}", e))
            })?;

        let mut rows = stmt.query([node_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute attribute query: {}", e))
        })?;

        let mut texts = Vec::new();
        while let Some(row) = rows.next().await? {
            texts.push(row.get::<String>(0)?);
        }
        Ok(texts)
    }

    pub async fn db_count_nodes(&self) -> Result<i64, DatabaseError> {
        let conn = self.connection().await?;

        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM node")
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to count nodes: {}", e)))?;
        let mut rows = stmt
            .query(())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to count nodes: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    pub async fn db_get_meta(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.connection().await?;

        let mut stmt = conn
            .prepare("SELECT value FROM store_meta WHERE key = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare meta query: {}", e))
            })?;
        let mut rows = stmt.query([key]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read meta '{}': {}", key, e))
        })?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    pub async fn db_set_meta(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let conn = self.connection().await?;

        conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, value),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to write meta '{}': {}", key, e))
        })?;

        Ok(())
    }

    /// Flush the WAL to the main database file
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        if self.is_in_memory() {
            return Ok(());
        }

        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;

        Ok(())
    }
}

fn optional_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}
