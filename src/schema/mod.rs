//! Schema model for FK-aware operations.
//!
//! This module provides:
//! - Data models for foreign-key constraints and the edges derived from them
//! - Snapshot capture from a [`SchemaIntrospector`]
//! - Dependency graph construction with topological sorting
//! - Cycle detection for handling circular FK relationships
//! - Identifier validation and quoting for generated SQL

mod analysis;
mod graph;

pub use analysis::*;
pub use graph::*;

use crate::connection::SchemaIntrospector;
use crate::error::ValidationError;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Foreign key constraint as reported by the introspector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name (optional)
    pub name: Option<String>,
    /// Constrained columns in the owning table
    pub columns: Vec<String>,
    /// Referenced table name
    pub referenced_table: String,
    /// Referenced column names, paired positionally with `columns`
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(columns: &[&str], referenced_table: &str, referenced_columns: &[&str]) -> Self {
        Self {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_table: referenced_table.to_string(),
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// A constraint is usable when it names at least one column on each side
    pub fn is_complete(&self) -> bool {
        !self.columns.is_empty()
            && !self.referenced_columns.is_empty()
            && !self.referenced_table.is_empty()
    }

    /// Column pairs of this constraint as edges leaving `table`
    pub fn edges(&self, table: &str) -> Vec<ForeignKeyEdge> {
        self.columns
            .iter()
            .zip(&self.referenced_columns)
            .map(|(from, to)| ForeignKeyEdge::new(table, from, &self.referenced_table, to))
            .collect()
    }

    /// Edge for the first column pair, which is what the integrity audit checks
    pub fn leading_edge(&self, table: &str) -> Option<ForeignKeyEdge> {
        if !self.is_complete() {
            return None;
        }
        Some(ForeignKeyEdge::new(
            table,
            &self.columns[0],
            &self.referenced_table,
            &self.referenced_columns[0],
        ))
    }
}

/// Directed FK edge: `from_table` depends on `to_table`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ForeignKeyEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl ForeignKeyEdge {
    pub fn new(from_table: &str, from_column: &str, to_table: &str, to_column: &str) -> Self {
        Self {
            from_table: from_table.to_string(),
            from_column: from_column.to_string(),
            to_table: to_table.to_string(),
            to_column: to_column.to_string(),
        }
    }

    pub fn is_self_reference(&self) -> bool {
        self.from_table == self.to_table
    }
}

impl fmt::Display for ForeignKeyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
    }
}

/// Tables and FK constraints read from the live database for one call.
///
/// Built fresh by every exposed operation and dropped on return.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    pub schema: Option<String>,
    /// Table names, sorted and unique
    pub tables: Vec<String>,
    /// Declared constraints per table (every table has an entry)
    pub foreign_keys: BTreeMap<String, Vec<ForeignKey>>,
}

impl SchemaSnapshot {
    /// Read tables and their FK constraints through `introspector`
    pub fn capture<I>(introspector: &I, schema: Option<&str>) -> Result<Self>
    where
        I: SchemaIntrospector + ?Sized,
    {
        let mut tables = introspector
            .list_tables(schema)
            .context("Failed to list tables")?;
        tables.sort();
        tables.dedup();

        let mut foreign_keys = BTreeMap::new();
        for table in &tables {
            let fks = introspector
                .list_foreign_keys(table, schema)
                .with_context(|| format!("Failed to list foreign keys of '{}'", table))?;
            foreign_keys.insert(table.clone(), fks);
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            tables,
            foreign_keys,
        })
    }

    /// Outbound edges per table, one per constrained column pair
    pub fn edges_per_table(&self) -> BTreeMap<String, Vec<ForeignKeyEdge>> {
        self.foreign_keys
            .iter()
            .map(|(table, fks)| {
                let edges = fks
                    .iter()
                    .filter(|fk| fk.is_complete())
                    .flat_map(|fk| fk.edges(table))
                    .collect();
                (table.clone(), edges)
            })
            .collect()
    }

    /// One edge per constraint (its leading column pair), in table order
    pub fn audit_edges(&self) -> Vec<ForeignKeyEdge> {
        self.foreign_keys
            .iter()
            .flat_map(|(table, fks)| fks.iter().filter_map(move |fk| fk.leading_edge(table)))
            .collect()
    }

    /// Build the dependency graph for this snapshot
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::build(&self.tables, &self.edges_per_table())
    }
}

static SCHEMA_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,62}$").expect("valid regex"));

const MAX_TABLE_NAME_LEN: usize = 128;

/// Check a schema name before it is used in any statement
pub fn validate_schema_name(schema: &str) -> std::result::Result<(), ValidationError> {
    if schema.is_empty() {
        return Err(ValidationError::EmptySchema);
    }
    if !SCHEMA_NAME_RE.is_match(schema) {
        return Err(ValidationError::MalformedSchema(schema.to_string()));
    }
    Ok(())
}

/// Check caller-supplied table names. Names are quoted when used, so only
/// empty, oversized or NUL-containing names are rejected.
pub fn validate_table_names(tables: &[String]) -> std::result::Result<(), ValidationError> {
    for (i, table) in tables.iter().enumerate() {
        if table.is_empty() {
            return Err(ValidationError::EmptyTableName(i));
        }
        if table.len() > MAX_TABLE_NAME_LEN || table.contains('\0') {
            return Err(ValidationError::MalformedTableName(table.clone()));
        }
    }
    Ok(())
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quoted, optionally schema-qualified table reference
pub fn qualified_table(table: &str, schema: Option<&str>) -> String {
    match schema {
        Some(s) => format!("{}.{}", quote_ident(s), quote_ident(table)),
        None => quote_ident(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified_table("t", Some("s")), "\"s\".\"t\"");
    }

    #[test]
    fn test_schema_name_validation() {
        assert!(validate_schema_name("main").is_ok());
        assert!(validate_schema_name("_private$1").is_ok());
        assert_eq!(validate_schema_name(""), Err(ValidationError::EmptySchema));
        assert!(matches!(
            validate_schema_name("public; DROP TABLE x"),
            Err(ValidationError::MalformedSchema(_))
        ));
        assert!(validate_schema_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_leading_edge_of_composite_key() {
        let fk = ForeignKey::new(&["a", "b"], "parent", &["x", "y"]);
        assert_eq!(fk.edges("child").len(), 2);
        assert_eq!(
            fk.leading_edge("child"),
            Some(ForeignKeyEdge::new("child", "a", "parent", "x"))
        );
        assert_eq!(ForeignKey::new(&[], "parent", &[]).leading_edge("child"), None);
    }
}
