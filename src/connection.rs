//! Capability interfaces the resolver consumes.
//!
//! Concrete database drivers are adapted to these traits (see
//! [`crate::duckdb::DuckDbConnection`]); the core never talks to a driver
//! directly.

use crate::schema::ForeignKey;
use anyhow::Result;
use serde::Serialize;
use std::fmt;

/// Lists tables and their foreign-key constraints.
pub trait SchemaIntrospector {
    /// All base tables in `schema` (driver default schema when `None`).
    fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>>;

    /// Outbound foreign-key constraints declared on `table`.
    fn list_foreign_keys(&self, table: &str, schema: Option<&str>) -> Result<Vec<ForeignKey>>;

    /// Primary key columns of `table`, in key order. Empty when unknown.
    fn primary_key(&self, _table: &str, _schema: Option<&str>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Runs read queries (counts, sample fetches).
pub trait QueryExecutor {
    fn execute(&self, sql: &str) -> Result<RowSet>;
}

/// Empties tables. `truncate` is tried first and `delete` is the fallback.
pub trait Mutator {
    fn truncate(&self, table: &str, schema: Option<&str>, cascade: bool) -> Result<()>;

    fn delete(&self, table: &str, schema: Option<&str>) -> Result<()>;

    /// Best-effort commit. Callers ignore failures.
    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

/// A single scalar value returned by a query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value, parsing text when needed (some drivers
    /// return `COUNT(*)` as a decimal or string).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(n) => Some(*n),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Int(n)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

/// Rows returned by [`QueryExecutor::execute`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First column of the first row, if any
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }

    /// First column of every row
    pub fn first_column(&self) -> Vec<SqlValue> {
        self.rows
            .iter()
            .filter_map(|row| row.first().cloned())
            .collect()
    }
}
