//! Entity declaration surface: schema descriptors instead of reflection.
//!
//! An entity type implements [`Entity`] by hand (or via caller-side
//! generation): it names its table, exposes its keys and scalar fields, and
//! lists its navigation properties as [`NavigationDef`] descriptors. The
//! engine walks object graphs through the object-safe [`AnyEntity`] view,
//! so nothing here is introspected at runtime beyond what the descriptors
//! declare.

use std::any::Any;

use chrono::{DateTime, Utc};

use crate::row::TableRow;
use crate::value::Value;

/// Cardinality of a navigation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// One nested entity (`Option<Child>` on the parent).
    Single,
    /// An ordered sequence of nested entities (`Vec<Child>`).
    Many,
}

/// A declared parent-to-child relationship persisted in a separate table.
///
/// The fn-pointer accessors give the engine type-erased access to the
/// parent's navigation field. `attach` must respect the declared
/// cardinality: a `Single` navigation receives at most one child.
pub struct NavigationDef {
    /// Navigation field name on the parent (unique per entity).
    pub name: &'static str,
    /// Registered type name of the child entity.
    pub target: &'static str,
    /// Field on the child row that carries the parent's row key. The
    /// engine stores the parent's partition key alongside it, in a
    /// sibling field named `<foreign_key>Partition`.
    pub foreign_key: &'static str,
    /// Single vs sequence.
    pub cardinality: Cardinality,
    /// Borrow the currently attached children.
    pub children: fn(&dyn AnyEntity) -> Vec<&dyn AnyEntity>,
    /// Mutably borrow the currently attached children.
    pub children_mut: fn(&mut dyn AnyEntity) -> Vec<&mut dyn AnyEntity>,
    /// Replace the navigation field with freshly hydrated children.
    pub attach: fn(&mut dyn AnyEntity, Vec<Box<dyn AnyEntity>>),
}

impl std::fmt::Debug for NavigationDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationDef")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("foreign_key", &self.foreign_key)
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

/// A typed entity persisted as rows in one table.
///
/// `from_row` reconstitutes keys, creation time, and scalar fields from a
/// fetched row; navigation children are attached afterwards by the engine.
/// Keys, creation time, and parent reference fields are written into the
/// row by the engine itself; `fields` may still declare a foreign-key
/// field when the caller wants it visible on the entity.
pub trait Entity: Any + Send + 'static {
    /// Registered type name, unique within a registry.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Table this entity's rows live in.
    fn table() -> &'static str
    where
        Self: Sized;

    /// Declared navigation properties, in persistence order.
    fn navigations() -> Vec<NavigationDef>
    where
        Self: Sized;

    /// Reconstitute an entity (keys + scalar fields) from a stored row.
    fn from_row(row: &TableRow) -> Self
    where
        Self: Sized;

    /// Row key; empty means "not yet assigned".
    fn row_key(&self) -> &str;

    /// Assign the row key (at save time, when blank).
    fn set_row_key(&mut self, key: String);

    /// Partition key (may be empty).
    fn partition_key(&self) -> &str;

    /// Creation timestamp, if already stamped.
    fn created_at(&self) -> Option<DateTime<Utc>>;

    /// Stamp the creation timestamp.
    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// Scalar field values to persist, including foreign-key fields.
    fn fields(&self) -> Vec<(String, Value)>;

    /// Write one scalar field. Used for foreign-key injection; unknown
    /// names are ignored.
    fn set_field(&mut self, name: &str, value: &Value);
}

/// Object-safe view of an [`Entity`], used by the graph walk.
pub trait AnyEntity: Any + Send {
    /// The entity's registered type name.
    fn entity_type(&self) -> &'static str;
    /// See [`Entity::row_key`].
    fn row_key(&self) -> &str;
    /// See [`Entity::set_row_key`].
    fn set_row_key(&mut self, key: String);
    /// See [`Entity::partition_key`].
    fn partition_key(&self) -> &str;
    /// See [`Entity::created_at`].
    fn created_at(&self) -> Option<DateTime<Utc>>;
    /// See [`Entity::set_created_at`].
    fn set_created_at(&mut self, at: DateTime<Utc>);
    /// See [`Entity::fields`].
    fn fields(&self) -> Vec<(String, Value)>;
    /// See [`Entity::set_field`].
    fn set_field(&mut self, name: &str, value: &Value);
    /// Downcast support for navigation accessors.
    fn as_any(&self) -> &dyn Any;
    /// Downcast support for navigation accessors.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Downcast support for [`NavigationDef::attach`].
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Entity> AnyEntity for T {
    fn entity_type(&self) -> &'static str {
        T::type_name()
    }

    fn row_key(&self) -> &str {
        Entity::row_key(self)
    }

    fn set_row_key(&mut self, key: String) {
        Entity::set_row_key(self, key)
    }

    fn partition_key(&self) -> &str {
        Entity::partition_key(self)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Entity::created_at(self)
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        Entity::set_created_at(self, at)
    }

    fn fields(&self) -> Vec<(String, Value)> {
        Entity::fields(self)
    }

    fn set_field(&mut self, name: &str, value: &Value) {
        Entity::set_field(self, name, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
