//! The orchestrating surface callers work with.
//!
//! [`TableContext`] composes the registry, graph mapper, and batch executor
//! around a shared store handle. It performs no domain logic of its own
//! beyond enforcing that a type is registered (and its navigation targets
//! known) before use.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::error::Error;
use crate::executor::{BatchExecutor, BatchReport, DEFAULT_PARALLELISM};
use crate::graph::{group_deletes, group_writes, query_rows, GraphMapper};
use crate::registry::{EntityMeta, TableRegistry};
use crate::store::TableStore;
use tablegraph_filter::Filter;

/// Client-side context over a partitioned table storage service.
///
/// The store handle is shared with the batch executor and safe for
/// concurrent use; the context itself holds no other mutable state.
pub struct TableContext {
    registry: Arc<TableRegistry>,
    store: Arc<dyn TableStore>,
    mapper: GraphMapper,
    executor: BatchExecutor,
}

impl TableContext {
    /// Create a context over the given storage service.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        let registry = Arc::new(TableRegistry::new());
        Self {
            mapper: GraphMapper::new(registry.clone()),
            executor: BatchExecutor::new(store.clone()),
            registry,
            store,
        }
    }

    /// Register an entity type. Idempotent; chainable.
    pub fn register_table<T: Entity>(&self) -> Result<&Self, Error> {
        self.registry.register::<T>()?;
        Ok(self)
    }

    /// The underlying registry, for introspection.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Check registration and navigation completeness before an operation.
    fn prepare<T: Entity>(&self) -> Result<Arc<EntityMeta>, Error> {
        let meta = self.registry.require(T::type_name())?;
        self.registry.verify_navigations(T::type_name())?;
        Ok(meta)
    }

    /// Save (upsert) entity trees with the default degree of parallelism.
    ///
    /// Blank row keys are assigned in place, so the caller's trees hold
    /// their stored identities afterwards.
    pub async fn save<T: Entity>(&self, roots: &mut [T]) -> Result<(), Error> {
        self.save_with(roots, DEFAULT_PARALLELISM, &CancellationToken::new())
            .await
    }

    /// Save with an explicit concurrency bound and cancellation signal.
    pub async fn save_with<T: Entity>(
        &self,
        roots: &mut [T],
        parallelism: usize,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.prepare::<T>()?;
        let mut ops = Vec::new();
        for root in roots.iter_mut() {
            ops.extend(self.mapper.flatten(root)?);
        }
        let report = self
            .executor
            .execute(group_writes(ops), parallelism, cancel)
            .await;
        finish(report)
    }

    /// Fetch one entity tree by row key, optionally scoped to a partition.
    ///
    /// Returns `None` when no row matches. When the partition key is
    /// omitted and several partitions hold the row key, the first row
    /// encountered wins; callers needing a specific one must pass the
    /// partition key, since row keys are only unique per partition.
    pub async fn get<T: Entity>(
        &self,
        row_key: &str,
        partition_key: Option<&str>,
    ) -> Result<Option<T>, Error> {
        let meta = self.prepare::<T>()?;
        let filter = format!("RowKey eq '{}'", row_key.replace('\'', "''"));
        let rows = query_rows(self.store.as_ref(), meta.table, &filter, partition_key).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let mut entity = T::from_row(&row);
        self.mapper
            .hydrate(self.store.as_ref(), &mut entity, 0)
            .await?;
        Ok(Some(entity))
    }

    /// Query root entities with a raw or typed filter, hydrating each match.
    ///
    /// No matches is an empty vector, never an error.
    pub async fn query<T: Entity>(
        &self,
        filter: impl Into<Filter>,
        partition_key: Option<&str>,
    ) -> Result<Vec<T>, Error> {
        self.query_with(filter, partition_key, 1).await
    }

    /// Query with up to `parallelism` matches hydrating concurrently.
    /// Result order always follows the store's match order.
    pub async fn query_with<T: Entity>(
        &self,
        filter: impl Into<Filter>,
        partition_key: Option<&str>,
        parallelism: usize,
    ) -> Result<Vec<T>, Error> {
        let meta = self.prepare::<T>()?;
        let text = filter.into().text()?;
        let rows = query_rows(self.store.as_ref(), meta.table, &text, partition_key).await?;
        stream::iter(rows.into_iter().map(|row| async move {
            let mut entity = T::from_row(&row);
            self.mapper
                .hydrate(self.store.as_ref(), &mut entity, 0)
                .await?;
            Ok(entity)
        }))
        .buffered(parallelism.max(1))
        .try_collect()
        .await
    }

    /// Blocking adapter over [`TableContext::query`]: same compilation,
    /// same matched set, same order. Drives a private current-thread
    /// runtime; must not be called from inside an async runtime.
    pub fn query_blocking<T: Entity>(
        &self,
        filter: impl Into<Filter>,
        partition_key: Option<&str>,
    ) -> Result<Vec<T>, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.query(filter, partition_key))
    }

    /// Delete entity trees (roots plus reachable descendants) with the
    /// given degree of parallelism. Identities are re-derived from the
    /// entities' already-known keys.
    pub async fn delete<T: Entity>(
        &self,
        entities: &[T],
        max_parallelism: usize,
    ) -> Result<(), Error> {
        self.delete_with(entities, max_parallelism, &CancellationToken::new())
            .await
    }

    /// Delete with a cancellation signal.
    pub async fn delete_with<T: Entity>(
        &self,
        entities: &[T],
        max_parallelism: usize,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.prepare::<T>()?;
        let mut rows = Vec::new();
        for entity in entities {
            rows.extend(self.mapper.collect_rows(entity)?);
        }
        let report = self
            .executor
            .execute(group_deletes(rows), max_parallelism, cancel)
            .await;
        finish(report)
    }
}

fn finish(report: BatchReport) -> Result<(), Error> {
    if report.cancelled {
        return Err(Error::Cancelled { report });
    }
    if !report.failed.is_empty() {
        return Err(Error::Persistence { report });
    }
    Ok(())
}
