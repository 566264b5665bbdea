//! Referential integrity audit: finds orphaned FK values in live data.
//!
//! For every FK edge an anti-join counts child rows whose non-NULL FK value
//! has no match in the parent column. Edges with orphans get a second query
//! fetching a small sample of offending rows. A failing query skips that
//! edge only.

use crate::connection::{QueryExecutor, SqlValue};
use crate::error::OperationError;
use crate::schema::{qualified_table, quote_ident, DependencyGraph, ForeignKeyEdge};
use ahash::AHashMap;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;

/// Maximum number of sample values reported per violation
pub const MAX_SAMPLE_IDS: usize = 10;

/// Orphaned rows found on one FK edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityViolation {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub orphaned_count: u64,
    /// Column the samples were taken from (child PK when resolvable, else the FK column)
    pub sample_column: String,
    pub sample_ids: Vec<SqlValue>,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}: {} orphaned row(s)",
            self.table,
            self.column,
            self.referenced_table,
            self.referenced_column,
            self.orphaned_count
        )
    }
}

/// Full audit outcome, including edges that could not be checked
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityAudit {
    pub violations: Vec<IntegrityViolation>,
    /// Edges whose queries failed, keyed by child table
    pub skipped: Vec<OperationError>,
    /// Number of edges whose queries ran to completion
    pub edges_checked: usize,
}

impl IntegrityAudit {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn total_orphaned(&self) -> u64 {
        self.violations.iter().map(|v| v.orphaned_count).sum()
    }
}

/// Audits FK edges against the live data of one schema
pub struct IntegrityAuditor<'a> {
    graph: &'a DependencyGraph,
    schema: Option<String>,
    primary_keys: AHashMap<String, Vec<String>>,
}

impl<'a> IntegrityAuditor<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self {
            graph,
            schema: None,
            primary_keys: AHashMap::new(),
        }
    }

    /// Qualify generated table references with `schema`
    pub fn with_schema(mut self, schema: Option<&str>) -> Self {
        self.schema = schema.map(str::to_string);
        self
    }

    /// Primary key columns per table, used to sample offending rows by key
    pub fn with_primary_keys(mut self, primary_keys: AHashMap<String, Vec<String>>) -> Self {
        self.primary_keys = primary_keys;
        self
    }

    /// Check every edge, collecting violations and per-edge failures
    pub fn audit<E>(&self, edges: &[ForeignKeyEdge], executor: &E) -> IntegrityAudit
    where
        E: QueryExecutor + ?Sized,
    {
        let mut audit = IntegrityAudit::default();

        for edge in edges {
            if !self.graph.contains(&edge.from_table) || !self.graph.contains(&edge.to_table) {
                tracing::debug!(edge = %edge, "skipping edge: table not in schema");
                continue;
            }

            match self.check_edge(edge, executor) {
                Ok(violation) => {
                    audit.edges_checked += 1;
                    if let Some(v) = violation {
                        audit.violations.push(v);
                    }
                }
                Err(e) => {
                    tracing::warn!(edge = %edge, error = %e, "could not check foreign key");
                    audit.skipped.push(OperationError::new(
                        edge.from_table.clone(),
                        format!("could not check {}: {:#}", edge, e),
                    ));
                }
            }
        }

        audit
    }

    fn check_edge<E>(&self, edge: &ForeignKeyEdge, executor: &E) -> Result<Option<IntegrityViolation>>
    where
        E: QueryExecutor + ?Sized,
    {
        let orphan_filter = self.orphan_filter(edge);
        let child = qualified_table(&edge.from_table, self.schema.as_deref());

        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", child, orphan_filter);
        let count = executor
            .execute(&count_sql)?
            .scalar()
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| anyhow!("count query returned no integer"))?;

        if count <= 0 {
            return Ok(None);
        }

        let sample_column = self.sample_column(edge);
        let sample_sql = if sample_column == edge.from_column {
            let fk = quote_ident(&edge.from_column);
            format!(
                "SELECT {fk} FROM {child} WHERE {orphan_filter} GROUP BY {fk} ORDER BY {fk} LIMIT {MAX_SAMPLE_IDS}"
            )
        } else {
            let pk = quote_ident(&sample_column);
            format!(
                "SELECT {pk} FROM {child} WHERE {orphan_filter} ORDER BY {pk} LIMIT {MAX_SAMPLE_IDS}"
            )
        };
        let mut sample_ids = executor.execute(&sample_sql)?.first_column();
        sample_ids.truncate(MAX_SAMPLE_IDS);

        Ok(Some(IntegrityViolation {
            table: edge.from_table.clone(),
            column: edge.from_column.clone(),
            referenced_table: edge.to_table.clone(),
            referenced_column: edge.to_column.clone(),
            orphaned_count: count as u64,
            sample_column,
            sample_ids,
        }))
    }

    /// Non-NULL FK values with no match in the parent column. NULL parent
    /// values are excluded so `NOT IN` never evaluates to UNKNOWN.
    fn orphan_filter(&self, edge: &ForeignKeyEdge) -> String {
        let fk = quote_ident(&edge.from_column);
        let pk = quote_ident(&edge.to_column);
        let parent = qualified_table(&edge.to_table, self.schema.as_deref());
        format!(
            "{fk} IS NOT NULL AND {fk} NOT IN (SELECT {pk} FROM {parent} WHERE {pk} IS NOT NULL)"
        )
    }

    /// Single-column child PK if known, otherwise the FK column itself
    fn sample_column(&self, edge: &ForeignKeyEdge) -> String {
        match self.primary_keys.get(&edge.from_table).map(Vec::as_slice) {
            Some([pk]) => pk.clone(),
            _ => edge.from_column.clone(),
        }
    }
}

/// Audit `edges` with default settings, returning only the violations
pub fn audit<E>(
    graph: &DependencyGraph,
    edges: &[ForeignKeyEdge],
    executor: &E,
) -> Vec<IntegrityViolation>
where
    E: QueryExecutor + ?Sized,
{
    IntegrityAuditor::new(graph).audit(edges, executor).violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RowSet;
    use std::cell::RefCell;

    /// Answers count queries with a fixed number and records every statement
    struct ScriptedExecutor {
        count: i64,
        samples: Vec<SqlValue>,
        statements: RefCell<Vec<String>>,
    }

    impl QueryExecutor for ScriptedExecutor {
        fn execute(&self, sql: &str) -> Result<RowSet> {
            self.statements.borrow_mut().push(sql.to_string());
            let rows = if sql.starts_with("SELECT COUNT(*)") {
                vec![vec![SqlValue::Int(self.count)]]
            } else {
                self.samples.iter().map(|v| vec![v.clone()]).collect()
            };
            Ok(RowSet {
                columns: vec!["c".to_string()],
                rows,
            })
        }
    }

    fn orders_graph() -> (DependencyGraph, Vec<ForeignKeyEdge>) {
        let edges = vec![ForeignKeyEdge::new("orders", "user_id", "users", "id")];
        (DependencyGraph::from_edges(&["orders", "users"], &edges), edges)
    }

    #[test]
    fn test_clean_edge_issues_only_count_query() {
        let (graph, edges) = orders_graph();
        let executor = ScriptedExecutor {
            count: 0,
            samples: vec![],
            statements: RefCell::new(vec![]),
        };
        let violations = audit(&graph, &edges, &executor);
        assert!(violations.is_empty());
        let statements = executor.statements.borrow();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "SELECT COUNT(*) FROM \"orders\" WHERE \"user_id\" IS NOT NULL AND \"user_id\" NOT IN \
             (SELECT \"id\" FROM \"users\" WHERE \"id\" IS NOT NULL)"
        );
    }

    #[test]
    fn test_samples_by_primary_key_when_known() {
        let (graph, edges) = orders_graph();
        let executor = ScriptedExecutor {
            count: 3,
            samples: vec![SqlValue::Int(2), SqlValue::Int(5), SqlValue::Int(9)],
            statements: RefCell::new(vec![]),
        };
        let mut pks = AHashMap::new();
        pks.insert("orders".to_string(), vec!["id".to_string()]);
        let result = IntegrityAuditor::new(&graph)
            .with_schema(Some("shop"))
            .with_primary_keys(pks)
            .audit(&edges, &executor);

        assert_eq!(result.violations.len(), 1);
        let v = &result.violations[0];
        assert_eq!(v.orphaned_count, 3);
        assert_eq!(v.sample_column, "id");
        assert_eq!(v.sample_ids.len(), 3);
        let statements = executor.statements.borrow();
        assert!(statements[1].starts_with("SELECT \"id\" FROM \"shop\".\"orders\""));
        assert!(statements[1].ends_with("ORDER BY \"id\" LIMIT 10"));
    }

    #[test]
    fn test_samples_capped() {
        let (graph, edges) = orders_graph();
        let executor = ScriptedExecutor {
            count: 15,
            samples: (0..15).map(SqlValue::Int).collect(),
            statements: RefCell::new(vec![]),
        };
        let violations = audit(&graph, &edges, &executor);
        assert_eq!(violations[0].orphaned_count, 15);
        assert_eq!(violations[0].sample_ids.len(), MAX_SAMPLE_IDS);
        assert_eq!(violations[0].sample_column, "user_id");
    }

    #[test]
    fn test_edge_outside_graph_is_skipped() {
        let (graph, _) = orders_graph();
        let edges = vec![ForeignKeyEdge::new("orders", "coupon_id", "coupons", "id")];
        let executor = ScriptedExecutor {
            count: 1,
            samples: vec![],
            statements: RefCell::new(vec![]),
        };
        let result = IntegrityAuditor::new(&graph).audit(&edges, &executor);
        assert!(result.is_clean());
        assert_eq!(result.edges_checked, 0);
        assert!(executor.statements.borrow().is_empty());
    }
}
