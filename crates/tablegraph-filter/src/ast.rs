//! Predicate expression tree and the typed builder API.
//!
//! Callers build a [`Predicate`] with [`field`] and the [`Predicate::and`] /
//! [`Predicate::or`] combinators. Values captured from the surrounding code
//! are converted to [`Literal`]s at construction time, so the compiler only
//! ever sees fully resolved trees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Case-exact string.
    Str(String),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
}

impl Literal {
    /// Get a description of the literal type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::DateTime(_) => "datetime",
        }
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v as i64)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Str(v)
    }
}

impl From<&String> for Literal {
    fn from(v: &String) -> Self {
        Literal::Str(v.clone())
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(v: DateTime<Utc>) -> Self {
        Literal::DateTime(v)
    }
}

/// Comparison operators supported by the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal (`eq`).
    Eq,
    /// Not equal (`ne`).
    Ne,
    /// Greater than (`gt`).
    Gt,
    /// Greater or equal (`ge`).
    Ge,
    /// Less than (`lt`).
    Lt,
    /// Less or equal (`le`).
    Le,
}

impl CompareOp {
    /// The grammar keyword for this operator.
    pub fn keyword(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }
}

/// A boolean predicate over entity fields.
///
/// `And` binds tighter than `Or` in the output grammar; the tree shape the
/// caller builds is exactly the precedence that gets compiled, with
/// parentheses inserted where the textual grammar would otherwise lose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// A single field comparison.
    Compare {
        /// Entity field name as stored in the row.
        field: String,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand literal, resolved at construction time.
        value: Literal,
    },
    /// Both operands must hold.
    And(Box<Predicate>, Box<Predicate>),
    /// Either operand must hold.
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Combine with another predicate under AND.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Combine with another predicate under OR.
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }
}

/// Start building a comparison on the named entity field.
pub fn field(name: impl Into<String>) -> FieldRef {
    FieldRef { name: name.into() }
}

/// A field reference awaiting a comparison operator.
#[derive(Debug, Clone)]
pub struct FieldRef {
    name: String,
}

impl FieldRef {
    fn compare(self, op: CompareOp, value: impl Into<Literal>) -> Predicate {
        Predicate::Compare {
            field: self.name,
            op,
            value: value.into(),
        }
    }

    /// `field eq value`
    pub fn eq(self, value: impl Into<Literal>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    /// `field ne value`
    pub fn ne(self, value: impl Into<Literal>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    /// `field gt value`
    pub fn gt(self, value: impl Into<Literal>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    /// `field ge value`
    pub fn ge(self, value: impl Into<Literal>) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    /// `field lt value`
    pub fn lt(self, value: impl Into<Literal>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    /// `field le value`
    pub fn le(self, value: impl Into<Literal>) -> Predicate {
        self.compare(CompareOp::Le, value)
    }
}
