//! tablegraph core
//!
//! A client-side data-access layer over a partitioned key-value table
//! storage service. Callers declare typed entities with explicit schema
//! descriptors, persist object graphs spanning multiple tables, and query
//! them with typed predicates compiled into the service's filter grammar.
//!
//! # Overview
//!
//! - [`entity`] — the declaration surface: [`Entity`], [`AnyEntity`], and
//!   [`NavigationDef`] descriptors (no runtime reflection).
//! - [`registry`] — maps entity types to tables and navigation metadata.
//! - [`graph`] — flattens trees into per-table write sets and hydrates
//!   them back from fetched rows.
//! - [`executor`] — bounded-concurrency, partition-scoped batch fan-out
//!   with partial-failure reporting.
//! - [`store`] — the storage service seam, plus an in-memory
//!   implementation for tests and local development.
//! - [`context`] — the [`TableContext`] façade tying it all together.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tablegraph_core::{field, MemoryStore, TableContext};
//!
//! let ctx = TableContext::new(Arc::new(MemoryStore::new()));
//! ctx.register_table::<Root>()?.register_table::<Branch>()?;
//!
//! ctx.save(&mut [root]).await?;
//! let tree = ctx.get::<Root>("one", Some("a")).await?;
//! let matches = ctx
//!     .query::<Root>(field("Hello").gt(0), None)
//!     .await?;
//! ctx.delete(&matches, 5).await?;
//! ```

pub mod context;
pub mod entity;
pub mod error;
pub mod executor;
pub mod graph;
pub mod registry;
pub mod row;
pub mod store;
pub mod value;

pub use context::TableContext;
pub use entity::{AnyEntity, Cardinality, Entity, NavigationDef};
pub use error::Error;
pub use executor::{BatchExecutor, BatchGroup, BatchReport, FailedRow, DEFAULT_PARALLELISM};
pub use graph::{partition_ref_field, GraphMapper, MAX_HYDRATION_DEPTH};
pub use registry::{EntityMeta, TableRegistry};
pub use row::{RowId, TableRow, CREATED_AT_FIELD};
pub use store::memory::MemoryStore;
pub use store::{BatchOp, OpOutcome, Page, StoreError, TableStore, MAX_BATCH_SIZE};
pub use value::Value;

// Filter surface, re-exported so callers need only one crate.
pub use tablegraph_filter::{compile, field, CompareOp, Filter, Literal, Predicate};
