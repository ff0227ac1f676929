//! tablegraph query filters
//!
//! This crate provides the typed predicate builder and the compiler that
//! turns a predicate tree into the table service's textual filter grammar.
//!
//! # Filter grammar
//!
//! ```text
//! RowKey ge ''
//! PartitionKey eq 'tree2' and Hello gt 0
//! PartitionKey eq 'tree2' and (Hello gt 0 or Id eq 'a')
//! CreatedAt lt datetime'2024-07-10T00:00:00.000000Z'
//! ```
//!
//! # Usage
//!
//! ```rust
//! use tablegraph_filter::{compile, field};
//!
//! let predicate = field("PartitionKey")
//!     .eq("tree2")
//!     .and(field("Hello").gt(0).or(field("Id").eq("a")));
//! let text = compile(&predicate).unwrap();
//! assert_eq!(text, "PartitionKey eq 'tree2' and (Hello gt 0 or Id eq 'a')");
//! ```
//!
//! Values captured from surrounding code become literals when the tree is
//! built, so a predicate like `field("PartitionKey").eq(pk.clone())` matches
//! on the captured value, never on a field named after the variable.

pub mod ast;
pub mod compiler;
pub mod error;

pub use ast::{field, CompareOp, FieldRef, Literal, Predicate};
pub use compiler::compile;
pub use error::{CompileError, CompileErrorKind};

/// A query filter: either raw filter text used verbatim, or a typed
/// predicate compiled on demand.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Match every row (empty filter text).
    All,
    /// Raw filter text, passed to the storage query unvalidated.
    Raw(String),
    /// A typed predicate, compiled by [`compile`].
    Predicate(Predicate),
}

impl Filter {
    /// Resolve to filter text. Raw text bypasses compilation entirely.
    pub fn text(&self) -> Result<String, CompileError> {
        match self {
            Filter::All => Ok(String::new()),
            Filter::Raw(text) => Ok(text.clone()),
            Filter::Predicate(predicate) => compile(predicate),
        }
    }
}

impl From<&str> for Filter {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            Filter::All
        } else {
            Filter::Raw(text.to_string())
        }
    }
}

impl From<String> for Filter {
    fn from(text: String) -> Self {
        if text.is_empty() {
            Filter::All
        } else {
            Filter::Raw(text)
        }
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Filter::Predicate(predicate)
    }
}
