//! Table row and row identity types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Property name under which the engine stores an entity's creation time.
pub const CREATED_AT_FIELD: &str = "CreatedAt";

/// A single stored row: keys plus a scalar property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Coarse-grained grouping key; batches are scoped to one partition.
    pub partition_key: String,
    /// Identity of the row within its partition.
    pub row_key: String,
    /// Scalar properties, keyed by field name.
    pub fields: BTreeMap<String, Value>,
}

impl TableRow {
    /// Create an empty row with the given keys.
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a property, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get a property by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The creation timestamp, when present.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get(CREATED_AT_FIELD).and_then(Value::as_timestamp)
    }

    /// The identity triple of this row within the given table.
    pub fn id(&self, table: impl Into<String>) -> RowId {
        RowId {
            table: table.into(),
            partition_key: self.partition_key.clone(),
            row_key: self.row_key.clone(),
        }
    }
}

/// Uniquely identifies a stored row: (table, partition key, row key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId {
    /// Table name.
    pub table: String,
    /// Partition key (may be empty).
    pub partition_key: String,
    /// Row key.
    pub row_key: String,
}

impl RowId {
    /// Create a row identity.
    pub fn new(
        table: impl Into<String>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.table, self.partition_key, self.row_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_properties() {
        let mut row = TableRow::new("p1", "r1");
        row.set("Hello", 5);
        row.set("Name", "x");

        assert_eq!(row.get("Hello"), Some(&Value::Int(5)));
        assert_eq!(row.get("Missing"), None);
        assert!(row.created_at().is_none());
    }

    #[test]
    fn test_created_at_round_trip() {
        let mut row = TableRow::new("", "r1");
        let at = Utc::now();
        row.set(CREATED_AT_FIELD, at);
        assert_eq!(row.created_at(), Some(at));
    }

    #[test]
    fn test_row_id_identity() {
        let row = TableRow::new("a", "one");
        let id = row.id("Roots");
        assert_eq!(id, RowId::new("Roots", "a", "one"));
        assert_eq!(id.to_string(), "Roots/a/one");

        // Same row key, different partition: distinct identities
        let other = TableRow::new("b", "one").id("Roots");
        assert_ne!(id, other);
    }
}
