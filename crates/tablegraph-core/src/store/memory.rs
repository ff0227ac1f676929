//! In-memory [`TableStore`] for tests and local development.
//!
//! Implements the collaborator contract faithfully enough to exercise the
//! engine end to end: rows live in per-table ordered maps, queries evaluate
//! real filter text (the same grammar the predicate compiler emits), scans
//! page with continuation tokens, and batches are scoped to one partition.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::row::TableRow;
use crate::store::{BatchOp, OpOutcome, Page, StoreError, TableStore, MAX_BATCH_SIZE};
use crate::value::Value;

/// Rows returned per query page.
const PAGE_SIZE: usize = 50;

type PartitionedRows = BTreeMap<(String, String), TableRow>;

/// A hermetic in-memory table service.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, PartitionedRows>>,
    // (table, partition) pairs whose batches fail; test hook for
    // partial-failure reporting.
    poisoned: RwLock<HashSet<(String, String)>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future batch against (table, partition) fail.
    pub fn poison(&self, table: &str, partition_key: &str) {
        self.poisoned
            .write()
            .insert((table.to_string(), partition_key.to_string()));
    }

    /// Total row count in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn upsert(&self, table: &str, row: TableRow) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        rows.insert((row.partition_key.clone(), row.row_key.clone()), row);
        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        filter: &str,
        partition_key: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<Page, StoreError> {
        let expr = parse_filter(filter)?;
        let offset = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidContinuation(token.to_string()))?,
            None => 0,
        };

        let tables = self.tables.read();
        let matched: Vec<TableRow> = tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|row| {
                        partition_key.map_or(true, |pk| row.partition_key == pk)
                            && expr.as_ref().map_or(true, |e| e.matches(row))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let page: Vec<TableRow> = matched.iter().skip(offset).take(PAGE_SIZE).cloned().collect();
        let next = offset + page.len();
        let continuation = (next < matched.len()).then(|| next.to_string());
        Ok(Page {
            rows: page,
            continuation,
        })
    }

    async fn submit_batch(
        &self,
        table: &str,
        partition_key: &str,
        ops: Vec<BatchOp>,
    ) -> Result<Vec<OpOutcome>, StoreError> {
        if ops.len() > MAX_BATCH_SIZE {
            return Err(StoreError::BatchTooLarge(ops.len()));
        }
        if self
            .poisoned
            .read()
            .contains(&(table.to_string(), partition_key.to_string()))
        {
            return Err(StoreError::Unavailable(format!(
                "partition '{partition_key}' of '{table}' is unavailable"
            )));
        }

        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        let mut outcomes = Vec::with_capacity(ops.len());
        for op in ops {
            let row_key = op.row_key().to_string();
            match op {
                BatchOp::Upsert(row) => {
                    rows.insert((partition_key.to_string(), row.row_key.clone()), row);
                }
                BatchOp::Delete { row_key: rk } => {
                    rows.remove(&(partition_key.to_string(), rk));
                }
            }
            outcomes.push(OpOutcome {
                row_key,
                committed: true,
                reason: None,
            });
        }
        Ok(outcomes)
    }

    async fn delete(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if let Some(rows) = tables.get_mut(table) {
            rows.remove(&(partition_key.to_string(), row_key.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter text evaluation
// ---------------------------------------------------------------------------

/// A parsed filter literal.
#[derive(Debug, Clone, PartialEq)]
enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A parsed filter expression over one row.
#[derive(Debug)]
enum FilterExpr {
    Compare { field: String, op: Op, value: Lit },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    fn matches(&self, row: &TableRow) -> bool {
        match self {
            FilterExpr::Compare { field, op, value } => {
                let actual = match field.as_str() {
                    "PartitionKey" => Some(Value::Str(row.partition_key.clone())),
                    "RowKey" => Some(Value::Str(row.row_key.clone())),
                    _ => row.get(field).cloned(),
                };
                // A missing field never matches; a type-incomparable pair
                // only matches `ne`.
                let Some(actual) = actual else { return false };
                match op {
                    Op::Eq => lit_equal(&actual, value),
                    Op::Ne => !lit_equal(&actual, value),
                    Op::Gt => lit_compare(&actual, value).is_some_and(|o| o.is_gt()),
                    Op::Ge => lit_compare(&actual, value).is_some_and(|o| o.is_ge()),
                    Op::Lt => lit_compare(&actual, value).is_some_and(|o| o.is_lt()),
                    Op::Le => lit_compare(&actual, value).is_some_and(|o| o.is_le()),
                }
            }
            FilterExpr::And(lhs, rhs) => lhs.matches(row) && rhs.matches(row),
            FilterExpr::Or(lhs, rhs) => lhs.matches(row) || rhs.matches(row),
        }
    }
}

fn lit_equal(actual: &Value, lit: &Lit) -> bool {
    lit_compare(actual, lit).is_some_and(|o| o.is_eq())
}

fn lit_compare(actual: &Value, lit: &Lit) -> Option<std::cmp::Ordering> {
    match (actual, lit) {
        (Value::Str(a), Lit::Str(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), Lit::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Lit::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Lit::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Lit::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Lit::Float(b)) => a.partial_cmp(b),
        (Value::Timestamp(a), Lit::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Lit),
    Op(Op),
    And,
    Or,
    LParen,
    RParen,
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidFilter(message.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>, StoreError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' => {
                tokens.push(Token::Literal(Lit::Str(read_quoted(&mut chars)?)));
            }
            '-' | '0'..='9' => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '-' || c == '.' || c.is_ascii_digit() || c == 'e' || c == 'E' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let lit = if text.contains('.') || text.contains('e') || text.contains('E') {
                    Lit::Float(
                        text.parse()
                            .map_err(|_| invalid(format!("bad number '{text}'")))?,
                    )
                } else {
                    Lit::Int(
                        text.parse()
                            .map_err(|_| invalid(format!("bad number '{text}'")))?,
                    )
                };
                tokens.push(Token::Literal(lit));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "eq" => tokens.push(Token::Op(Op::Eq)),
                    "ne" => tokens.push(Token::Op(Op::Ne)),
                    "gt" => tokens.push(Token::Op(Op::Gt)),
                    "ge" => tokens.push(Token::Op(Op::Ge)),
                    "lt" => tokens.push(Token::Op(Op::Lt)),
                    "le" => tokens.push(Token::Op(Op::Le)),
                    "true" => tokens.push(Token::Literal(Lit::Bool(true))),
                    "false" => tokens.push(Token::Literal(Lit::Bool(false))),
                    "datetime" => {
                        // datetime'<rfc3339>'
                        if chars.peek() != Some(&'\'') {
                            return Err(invalid("datetime literal missing quote"));
                        }
                        let text = read_quoted(&mut chars)?;
                        let parsed = DateTime::parse_from_rfc3339(&text)
                            .map_err(|e| invalid(format!("bad datetime '{text}': {e}")))?;
                        tokens.push(Token::Literal(Lit::DateTime(parsed.with_timezone(&Utc))));
                    }
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => return Err(invalid(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<String, StoreError> {
    chars.next(); // opening quote
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('\'') => {
                // '' is an escaped quote
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    return Ok(out);
                }
            }
            Some(c) => out.push(c),
            None => return Err(invalid("unterminated string literal")),
        }
    }
}

/// Parse filter text into an expression; empty text matches everything.
fn parse_filter(text: &str) -> Result<Option<FilterExpr>, StoreError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(invalid("trailing input after filter expression"));
    }
    Ok(Some(expr))
}

/// Recursive-descent parser: `or := and ('or' and)*`,
/// `and := primary ('and' primary)*`, `primary := '(' or ')' | comparison`.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<FilterExpr, StoreError> {
        let mut expr = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.and_expr()?;
            expr = FilterExpr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<FilterExpr, StoreError> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.primary()?;
            expr = FilterExpr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<FilterExpr, StoreError> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(invalid("expected ')'")),
                }
            }
            Some(Token::Ident(field)) => {
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    other => {
                        return Err(invalid(format!(
                            "expected comparison operator after '{field}', got {other:?}"
                        )))
                    }
                };
                let value = match self.next() {
                    Some(Token::Literal(lit)) => lit,
                    other => return Err(invalid(format!("expected literal, got {other:?}"))),
                };
                Ok(FilterExpr::Compare { field, op, value })
            }
            other => Err(invalid(format!("expected comparison, got {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pk: &str, rk: &str, hello: i64) -> TableRow {
        let mut row = TableRow::new(pk, rk);
        row.set("Hello", hello);
        row
    }

    fn matches(filter: &str, row: &TableRow) -> bool {
        parse_filter(filter).unwrap().unwrap().matches(row)
    }

    #[test]
    fn test_comparison_operators() {
        let r = row("tree1", "a", 5);
        assert!(matches("Hello eq 5", &r));
        assert!(matches("Hello ne 4", &r));
        assert!(matches("Hello gt 4", &r));
        assert!(matches("Hello ge 5", &r));
        assert!(matches("Hello lt 6", &r));
        assert!(matches("Hello le 5", &r));
        assert!(!matches("Hello gt 5", &r));
    }

    #[test]
    fn test_key_pseudo_fields() {
        let r = row("tree1", "a", 0);
        assert!(matches("PartitionKey eq 'tree1'", &r));
        assert!(matches("RowKey ge ''", &r));
        assert!(!matches("PartitionKey eq 'tree2'", &r));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // a && b || c groups as (a && b) || c
        let filter = "PartitionKey eq 'tree2' and Hello gt 0 or RowKey eq 'a'";
        assert!(matches(filter, &row("tree1", "a", -1)));
        assert!(matches(filter, &row("tree2", "b", 1)));
        assert!(!matches(filter, &row("tree2", "b", -1)));
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let filter = "PartitionKey eq 'tree2' and (Hello gt 0 or RowKey eq 'a')";
        assert!(!matches(filter, &row("tree1", "a", 1)));
        assert!(matches(filter, &row("tree2", "a", -1)));
        assert!(matches(filter, &row("tree2", "b", 1)));
        assert!(!matches(filter, &row("tree2", "b", -1)));
    }

    #[test]
    fn test_quoted_string_escape() {
        let mut r = TableRow::new("", "x");
        r.set("Name", "O'Brien");
        assert!(matches("Name eq 'O''Brien'", &r));
    }

    #[test]
    fn test_datetime_literal() {
        let mut r = TableRow::new("", "x");
        r.set("CreatedAt", Utc::now());
        assert!(matches(
            "CreatedAt gt datetime'2000-01-01T00:00:00Z'",
            &r
        ));
        assert!(!matches(
            "CreatedAt lt datetime'2000-01-01T00:00:00Z'",
            &r
        ));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let r = row("", "x", 1);
        assert!(!matches("Nope eq 1", &r));
        assert!(!matches("Nope ne 1", &r));
    }

    #[test]
    fn test_bad_filter_is_an_error() {
        assert!(parse_filter("Hello eq").is_err());
        assert!(parse_filter("Hello banana 3").is_err());
        assert!(parse_filter("(Hello eq 1").is_err());
        assert!(parse_filter("Hello eq 'unterminated").is_err());
    }

    #[tokio::test]
    async fn test_upsert_query_delete() {
        let store = MemoryStore::new();
        store.upsert("Roots", row("a", "one", 1)).await.unwrap();
        store.upsert("Roots", row("b", "one", 2)).await.unwrap();

        let page = store.query("Roots", "", None, None).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert!(page.continuation.is_none());

        // Partition scope disambiguates identical row keys.
        let page = store.query("Roots", "", Some("b"), None).await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].get("Hello"), Some(&Value::Int(2)));

        store.delete("Roots", "a", "one").await.unwrap();
        assert_eq!(store.row_count("Roots"), 1);
        // Deleting an absent row is fine.
        store.delete("Roots", "a", "one").await.unwrap();
    }

    #[tokio::test]
    async fn test_query_pagination() {
        let store = MemoryStore::new();
        for i in 0..(PAGE_SIZE + 10) {
            store
                .upsert("Roots", row("", &format!("r{i:03}"), i as i64))
                .await
                .unwrap();
        }

        let first = store.query("Roots", "", None, None).await.unwrap();
        assert_eq!(first.rows.len(), PAGE_SIZE);
        let token = first.continuation.expect("expected a continuation");

        let rest = store
            .query("Roots", "", None, Some(&token))
            .await
            .unwrap();
        assert_eq!(rest.rows.len(), 10);
        assert!(rest.continuation.is_none());
    }

    #[tokio::test]
    async fn test_batch_scoped_to_partition() {
        let store = MemoryStore::new();
        let outcomes = store
            .submit_batch(
                "Roots",
                "p",
                vec![
                    BatchOp::Upsert(row("p", "one", 1)),
                    BatchOp::Upsert(row("p", "two", 2)),
                    BatchOp::Delete {
                        row_key: "one".into(),
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.committed));
        assert_eq!(store.row_count("Roots"), 1);
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let store = MemoryStore::new();
        let ops = (0..MAX_BATCH_SIZE + 1)
            .map(|i| BatchOp::Upsert(row("", &format!("r{i}"), 0)))
            .collect();
        let err = store.submit_batch("Roots", "", ops).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge(_)));
    }

    #[tokio::test]
    async fn test_poisoned_partition_fails() {
        let store = MemoryStore::new();
        store.poison("Roots", "bad");
        let err = store
            .submit_batch(
                "Roots",
                "bad",
                vec![BatchOp::Upsert(row("bad", "one", 1))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        // Other partitions are unaffected.
        store
            .submit_batch("Roots", "ok", vec![BatchOp::Upsert(row("ok", "one", 1))])
            .await
            .unwrap();
    }
}
