//! Compiles a [`Predicate`] tree into the provider's textual filter grammar.
//!
//! Comparisons become `Field op literal`, AND/OR become the `and`/`or`
//! connectives. The grammar gives `and` higher precedence than `or`, so an
//! `Or` subtree sitting directly under an `And` is parenthesized; everywhere
//! else the bare text already reads back with the caller's precedence.

use chrono::SecondsFormat;

use crate::ast::{Literal, Predicate};
use crate::error::CompileError;

/// Compile a predicate tree to filter text.
pub fn compile(predicate: &Predicate) -> Result<String, CompileError> {
    let mut out = String::new();
    emit(predicate, false, &mut out)?;
    Ok(out)
}

/// Emit one node. `under_and` is true when the node is a direct operand of
/// an `And`, which is the only position where an `Or` needs parentheses.
fn emit(node: &Predicate, under_and: bool, out: &mut String) -> Result<(), CompileError> {
    match node {
        Predicate::Compare { field, op, value } => {
            if field.is_empty() {
                return Err(CompileError::empty_field(op.keyword()));
            }
            out.push_str(field);
            out.push(' ');
            out.push_str(op.keyword());
            out.push(' ');
            emit_literal(field, value, out)
        }
        Predicate::And(lhs, rhs) => {
            emit(lhs, true, out)?;
            out.push_str(" and ");
            emit(rhs, true, out)
        }
        Predicate::Or(lhs, rhs) => {
            if under_and {
                out.push('(');
            }
            emit(lhs, false, out)?;
            out.push_str(" or ");
            emit(rhs, false, out)?;
            if under_and {
                out.push(')');
            }
            Ok(())
        }
    }
}

fn emit_literal(field: &str, literal: &Literal, out: &mut String) -> Result<(), CompileError> {
    match literal {
        Literal::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Literal::Int(i) => out.push_str(&i.to_string()),
        Literal::Float(f) => {
            if !f.is_finite() {
                return Err(CompileError::non_finite(field));
            }
            let text = f.to_string();
            out.push_str(&text);
            // Keep doubles recognizable as doubles in the grammar.
            if !text.contains('.') && !text.contains('e') {
                out.push_str(".0");
            }
        }
        Literal::Str(s) => {
            out.push('\'');
            // Embedded quotes are doubled per the grammar's escape rule.
            out.push_str(&s.replace('\'', "''"));
            out.push('\'');
        }
        Literal::DateTime(dt) => {
            out.push_str("datetime'");
            out.push_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true));
            out.push('\'');
        }
    }
    Ok(())
}
