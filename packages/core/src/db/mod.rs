//! Database Layer
//!
//! This module persists encoded document trees and answers the lookups the
//! axis evaluators need:
//!
//! - `StructuralStore` trait with the `Layout` it was built for
//! - `TursoStore` backed by libsql (file or in-memory database)
//! - `MemoryStore` backed by in-process tables, for tests and small documents
//! - `DatabaseService` for connection management and schema setup
//!
//! # Architecture
//!
//! A store receives exactly one bulk insert. Afterwards it is read-only, so
//! evaluators share it behind an `Arc<dyn StructuralStore>`.

mod database;
mod error;
mod memory_store;
mod structural_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use memory_store::MemoryStore;
pub use structural_store::{IdMap, Layout, RangeScan, StructuralStore};
pub use turso_store::{StoreInfo, TursoStore};

pub(crate) use structural_store::PendingRow;
