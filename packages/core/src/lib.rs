//! XAccel Core - Structural Index for Document Trees
//!
//! This crate encodes every node of an XML-like tree with its pre-order and
//! post-order rank, persists the result, and answers the ancestor, descendant
//! and sibling axes either by walking parent/child edges or by comparing
//! order ranks.
//!
//! # Architecture
//!
//! - **Arena Tree**: nodes live in one `Vec`, linked by integer indices
//! - **Single-pass Encoding**: one DFS assigns pre/post ranks, level and subtree size
//! - **libsql/Turso**: embedded SQLite-compatible store with edge and ordered layouts
//! - **Pluggable Strategies**: closure and range evaluation behind one trait
//!
//! # Modules
//!
//! - [`models`] - Tree arena, node records and axis vocabulary
//! - [`encoding`] - Pre/post-order encoder
//! - [`db`] - Structural stores (in-memory and libsql)
//! - [`services`] - Axis and bounded evaluators, verification
//! - [`loader`] - XML reader and DBLP grouping
//! - [`config`] - Configuration with environment overrides
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xaccel_core::{encode, parse_document, AxisEvaluator, AxisOptions, Layout, MemoryStore, StructuralStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut tree = parse_document("<bib><article><year>2023</year></article></bib>")?;
//! encode(&mut tree);
//!
//! let store = Arc::new(MemoryStore::new(Layout::Ordered));
//! let ids = store.insert_tree(&tree).await?;
//!
//! let evaluator = AxisEvaluator::new(store, AxisOptions::default());
//! let root = ids.get(tree.root()).unwrap_or_default();
//! let result = evaluator.descendant(root).await?;
//! assert_eq!(result.rows.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod encoding;
pub mod loader;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{AcceleratorConfig, ConfigError};
pub use db::{DatabaseError, DatabaseService, IdMap, Layout, MemoryStore, StructuralStore, TursoStore};
pub use encoding::{encode, EncodingSummary};
pub use loader::{group_publications, parse_document, parse_file, LoadError};
pub use models::*;
pub use services::*;
