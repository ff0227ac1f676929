//! Table registry: entity metadata lookup after explicit registration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::{AnyEntity, Entity, NavigationDef};
use crate::error::Error;
use crate::row::TableRow;

/// Registered metadata for one entity type.
#[derive(Debug)]
pub struct EntityMeta {
    /// Registered type name.
    pub type_name: &'static str,
    /// Table the type's rows live in.
    pub table: &'static str,
    /// Declared navigation properties.
    pub navigations: Vec<NavigationDef>,
    /// Type-erased row constructor.
    pub from_row: fn(&TableRow) -> Box<dyn AnyEntity>,
}

fn boxed_from_row<T: Entity>(row: &TableRow) -> Box<dyn AnyEntity> {
    Box::new(T::from_row(row))
}

/// Maps entity types to their table names and navigation metadata.
///
/// Read-mostly after registration; all lookups are pure. Registration is
/// idempotent per type. Navigation targets may be registered in any order
/// relative to their parents, but must all be known before first use —
/// [`TableRegistry::verify_navigations`] runs at operation entry.
#[derive(Default)]
pub struct TableRegistry {
    entities: RwLock<HashMap<&'static str, Arc<EntityMeta>>>,
}

impl TableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type. Re-registering is a no-op.
    ///
    /// Fails when the type declares no table name, or when its navigation
    /// descriptors are malformed (blank names, duplicate navigation names,
    /// blank foreign-key fields). Unregistered navigation targets are not
    /// an error here; they are checked before first use.
    pub fn register<T: Entity>(&self) -> Result<(), Error> {
        let type_name = T::type_name();
        if self.entities.read().contains_key(type_name) {
            return Ok(());
        }

        let table = T::table();
        if table.is_empty() {
            return Err(Error::Registration(format!(
                "type '{type_name}' declares no table name"
            )));
        }

        let navigations = T::navigations();
        let mut seen = HashSet::new();
        for nav in &navigations {
            if nav.name.is_empty() {
                return Err(Error::Registration(format!(
                    "type '{type_name}' declares a navigation with an empty name"
                )));
            }
            if nav.foreign_key.is_empty() {
                return Err(Error::Registration(format!(
                    "navigation '{}' on '{type_name}' declares no foreign-key field",
                    nav.name
                )));
            }
            if !seen.insert(nav.name) {
                return Err(Error::Registration(format!(
                    "type '{type_name}' declares duplicate navigation '{}'",
                    nav.name
                )));
            }
        }

        let meta = Arc::new(EntityMeta {
            type_name,
            table,
            navigations,
            from_row: boxed_from_row::<T>,
        });
        self.entities.write().insert(type_name, meta);
        Ok(())
    }

    /// Whether a type name is registered.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.entities.read().contains_key(type_name)
    }

    /// Metadata for a registered type name.
    pub fn meta(&self, type_name: &str) -> Option<Arc<EntityMeta>> {
        self.entities.read().get(type_name).cloned()
    }

    /// Metadata for a registered type name, or `NotRegistered`.
    pub fn require(&self, type_name: &str) -> Result<Arc<EntityMeta>, Error> {
        self.meta(type_name)
            .ok_or_else(|| Error::NotRegistered(type_name.to_string()))
    }

    /// Table name for a registered type.
    pub fn table_for(&self, type_name: &str) -> Result<&'static str, Error> {
        Ok(self.require(type_name)?.table)
    }

    /// All registered table names.
    pub fn tables(&self) -> Vec<&'static str> {
        self.entities.read().values().map(|m| m.table).collect()
    }

    /// Verify that every navigation target reachable from `root` is
    /// registered. Missing targets are a registration error naming the
    /// unregistered type.
    pub fn verify_navigations(&self, root: &str) -> Result<(), Error> {
        let mut pending = vec![self.require(root)?];
        let mut visited = HashSet::from([root.to_string()]);
        while let Some(meta) = pending.pop() {
            for nav in &meta.navigations {
                if !visited.insert(nav.target.to_string()) {
                    continue;
                }
                match self.meta(nav.target) {
                    Some(target) => pending.push(target),
                    None => {
                        return Err(Error::Registration(format!(
                            "navigation '{}' on '{}' targets unregistered type '{}'",
                            nav.name, meta.type_name, nav.target
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}
