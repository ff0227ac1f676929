//! Graph mapper: flattens entity trees into per-table write sets and
//! reconstitutes trees from fetched rows.
//!
//! Save walks each tree depth-first in pre-order, so a parent's identity is
//! resolved (row key generated if blank) before any child row is emitted.
//! Each child row carries the parent's full identity: the row key in the
//! declared foreign-key field and the partition key in a sibling
//! `<fk>Partition` field, since row keys are only unique per partition.
//! Hydration runs the walk in reverse: child tables are queried by both
//! reference fields and attached per declared cardinality, bounded by
//! [`MAX_HYDRATION_DEPTH`] since the navigation graph is assumed acyclic
//! but not structurally enforced.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{AnyEntity, Cardinality};
use crate::error::Error;
use crate::executor::BatchGroup;
use crate::registry::{EntityMeta, TableRegistry};
use crate::row::{RowId, TableRow, CREATED_AT_FIELD};
use crate::store::{BatchOp, TableStore};
use crate::value::Value;

/// Fixed bound on recursive traversal depth.
pub const MAX_HYDRATION_DEPTH: usize = 16;

/// One pending row write, in emission order.
#[derive(Debug)]
pub struct WriteOp {
    /// Target table.
    pub table: &'static str,
    /// The row to upsert.
    pub row: TableRow,
}

/// Field carrying the parent's partition key alongside a foreign key.
pub fn partition_ref_field(foreign_key: &str) -> String {
    format!("{foreign_key}Partition")
}

/// The resolved identity a child row stores for its parent.
struct ParentLink {
    foreign_key: &'static str,
    partition_key: String,
    row_key: String,
}

/// Walks registered navigation graphs over type-erased entities.
pub struct GraphMapper {
    registry: Arc<TableRegistry>,
}

impl GraphMapper {
    /// Create a mapper over the given registry.
    pub fn new(registry: Arc<TableRegistry>) -> Self {
        Self { registry }
    }

    /// Flatten one tree into ordered write operations, assigning row keys
    /// and creation timestamps where blank and injecting parent references.
    pub fn flatten(&self, root: &mut dyn AnyEntity) -> Result<Vec<WriteOp>, Error> {
        let meta = self.registry.require(root.entity_type())?;
        let mut ops = Vec::new();
        self.flatten_node(&meta, root, None, 0, &mut ops)?;
        Ok(ops)
    }

    fn flatten_node(
        &self,
        meta: &EntityMeta,
        node: &mut dyn AnyEntity,
        parent: Option<&ParentLink>,
        depth: usize,
        out: &mut Vec<WriteOp>,
    ) -> Result<(), Error> {
        if depth >= MAX_HYDRATION_DEPTH {
            return Err(Error::MaxDepth(MAX_HYDRATION_DEPTH));
        }
        if node.row_key().is_empty() {
            node.set_row_key(Uuid::new_v4().to_string());
        }
        if node.created_at().is_none() {
            node.set_created_at(Utc::now());
        }

        let mut row = TableRow::new(node.partition_key(), node.row_key());
        if let Some(at) = node.created_at() {
            row.set(CREATED_AT_FIELD, at);
        }
        for (name, value) in node.fields() {
            row.fields.insert(name, value);
        }
        if let Some(link) = parent {
            // The stored parent reference is the engine's, regardless of
            // what the entity declares in its own fields.
            row.set(link.foreign_key, link.row_key.clone());
            row.set(
                partition_ref_field(link.foreign_key),
                link.partition_key.clone(),
            );
        }
        out.push(WriteOp {
            table: meta.table,
            row,
        });

        let parent_partition = node.partition_key().to_string();
        let parent_key = node.row_key().to_string();
        for nav in &meta.navigations {
            let target = self.require_target(meta, nav.name, nav.target)?;
            let link = ParentLink {
                foreign_key: nav.foreign_key,
                partition_key: parent_partition.clone(),
                row_key: parent_key.clone(),
            };
            for child in (nav.children_mut)(node) {
                child.set_field(nav.foreign_key, &Value::Str(parent_key.clone()));
                self.flatten_node(&target, child, Some(&link), depth + 1, out)?;
            }
        }
        Ok(())
    }

    /// Collect the identities of a tree's already-keyed rows, for deletion.
    /// Nodes without an assigned row key were never persisted and are skipped.
    pub fn collect_rows(&self, root: &dyn AnyEntity) -> Result<Vec<RowId>, Error> {
        let meta = self.registry.require(root.entity_type())?;
        let mut rows = Vec::new();
        self.collect_node(&meta, root, 0, &mut rows)?;
        Ok(rows)
    }

    fn collect_node(
        &self,
        meta: &EntityMeta,
        node: &dyn AnyEntity,
        depth: usize,
        out: &mut Vec<RowId>,
    ) -> Result<(), Error> {
        if depth >= MAX_HYDRATION_DEPTH {
            return Err(Error::MaxDepth(MAX_HYDRATION_DEPTH));
        }
        if !node.row_key().is_empty() {
            out.push(RowId::new(
                meta.table,
                node.partition_key(),
                node.row_key(),
            ));
        }
        for nav in &meta.navigations {
            let target = self.require_target(meta, nav.name, nav.target)?;
            for child in (nav.children)(node) {
                self.collect_node(&target, child, depth + 1, out)?;
            }
        }
        Ok(())
    }

    /// Recursively attach navigation children fetched by foreign key.
    pub fn hydrate<'a>(
        &'a self,
        store: &'a dyn TableStore,
        node: &'a mut dyn AnyEntity,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            if depth >= MAX_HYDRATION_DEPTH {
                return Err(Error::MaxDepth(MAX_HYDRATION_DEPTH));
            }
            let meta = self.registry.require(node.entity_type())?;
            let parent_key = escape_quotes(node.row_key());
            let parent_partition = escape_quotes(node.partition_key());
            for nav in &meta.navigations {
                let target = self.require_target(&meta, nav.name, nav.target)?;
                // Both halves of the parent identity: row keys alone can
                // collide across partitions.
                let filter = format!(
                    "{} eq '{}' and {} eq '{}'",
                    nav.foreign_key,
                    parent_key,
                    partition_ref_field(nav.foreign_key),
                    parent_partition
                );
                let rows = query_rows(store, target.table, &filter, None).await?;
                debug!(
                    parent = %meta.type_name,
                    navigation = nav.name,
                    children = rows.len(),
                    "hydrating navigation"
                );
                let mut children: Vec<Box<dyn AnyEntity>> =
                    rows.iter().map(|row| (target.from_row)(row)).collect();
                if nav.cardinality == Cardinality::Single {
                    children.truncate(1);
                }
                for child in children.iter_mut() {
                    self.hydrate(store, child.as_mut(), depth + 1).await?;
                }
                (nav.attach)(node, children);
            }
            Ok(())
        }
        .boxed()
    }

    fn require_target(
        &self,
        parent: &EntityMeta,
        nav_name: &str,
        target: &str,
    ) -> Result<Arc<EntityMeta>, Error> {
        self.registry.meta(target).ok_or_else(|| {
            Error::Registration(format!(
                "navigation '{}' on '{}' targets unregistered type '{}'",
                nav_name, parent.type_name, target
            ))
        })
    }
}

/// Group ordered writes by (table, partition key), preserving both the
/// first-seen group order and the emission order within each group.
pub fn group_writes(ops: Vec<WriteOp>) -> Vec<BatchGroup> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<BatchGroup> = Vec::new();
    for op in ops {
        let key = (op.table.to_string(), op.row.partition_key.clone());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(BatchGroup {
                table: key.0,
                partition_key: key.1,
                ops: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].ops.push(BatchOp::Upsert(op.row));
    }
    groups
}

/// Group row identities into partition-scoped delete batches, dropping
/// duplicates while keeping first-seen order.
pub fn group_deletes(rows: Vec<RowId>) -> Vec<BatchGroup> {
    let mut seen = HashSet::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<BatchGroup> = Vec::new();
    for id in rows {
        if !seen.insert(id.clone()) {
            continue;
        }
        let key = (id.table.clone(), id.partition_key.clone());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(BatchGroup {
                table: key.0,
                partition_key: key.1,
                ops: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].ops.push(BatchOp::Delete {
            row_key: id.row_key,
        });
    }
    groups
}

/// Fetch every row matching the filter, following continuation tokens so
/// callers see one logical sequence.
pub async fn query_rows(
    store: &dyn TableStore,
    table: &str,
    filter: &str,
    partition_key: Option<&str>,
) -> Result<Vec<TableRow>, Error> {
    let mut rows = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let page = store
            .query(table, filter, partition_key, continuation.as_deref())
            .await?;
        rows.extend(page.rows);
        match page.continuation {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }
    Ok(rows)
}

fn escape_quotes(text: &str) -> String {
    text.replace('\'', "''")
}
