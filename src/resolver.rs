//! Exposed operations: dependency resolution, safe truncation and
//! referential integrity verification.
//!
//! Every call validates its arguments before any database access, captures
//! a fresh [`SchemaSnapshot`] and discards it on return. Nothing is cached
//! between calls.

use crate::connection::{Mutator, QueryExecutor, SchemaIntrospector};
use crate::error::{Error, Result};
use crate::integrity::{IntegrityAudit, IntegrityAuditor, IntegrityViolation};
use crate::schema::{
    order, validate_schema_name, validate_table_names, Cycle, SchemaSnapshot, TopoSortResult,
};
use crate::truncate::{truncate_in_order, TruncationResult};
use ahash::AHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Dependency view of a schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDependencies {
    /// Every table once, dependencies before dependents
    pub ordered_tables: Vec<String>,
    /// Direct dependencies per table
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Direct dependents per table
    pub dependents: BTreeMap<String, BTreeSet<String>>,
    /// Cycle groups; tables in these have no dependency-safe position
    pub circular: Vec<Cycle>,
}

impl ForeignKeyDependencies {
    /// Deletion-safe order (dependents first)
    pub fn reversed(&self) -> Vec<String> {
        self.ordered_tables.iter().rev().cloned().collect()
    }
}

fn validate_schema(schema: Option<&str>) -> Result<()> {
    if let Some(s) = schema {
        validate_schema_name(s)?;
    }
    Ok(())
}

fn capture<I>(conn: &I, schema: Option<&str>) -> Result<SchemaSnapshot>
where
    I: SchemaIntrospector + ?Sized,
{
    SchemaSnapshot::capture(conn, schema).map_err(Error::Introspection)
}

fn resolve(snapshot: &SchemaSnapshot) -> (ForeignKeyDependencies, TopoSortResult) {
    let graph = snapshot.graph();
    let sorted = order(&graph);
    let deps = ForeignKeyDependencies {
        ordered_tables: sorted.ordered_tables.clone(),
        dependencies: graph.dependencies,
        dependents: graph.dependents,
        circular: sorted.cycles.clone(),
    };
    (deps, sorted)
}

/// Build the FK dependency graph of `schema` and order its tables
pub fn get_foreign_key_dependencies<C>(
    conn: &C,
    schema: Option<&str>,
) -> Result<ForeignKeyDependencies>
where
    C: SchemaIntrospector + ?Sized,
{
    validate_schema(schema)?;

    let snapshot = capture(conn, schema)?;
    let (deps, sorted) = resolve(&snapshot);

    tracing::debug!(
        tables = deps.ordered_tables.len(),
        cycles = deps.circular.len(),
        acyclic = sorted.is_acyclic(),
        "resolved foreign key dependencies"
    );

    Ok(deps)
}

/// Empty `tables` (all tables when `None`) in FK-safe order.
///
/// Per-table failures are collected in the result; only validation and
/// introspection failures are returned as errors.
pub fn safe_truncate_tables<C>(
    conn: &C,
    tables: Option<&[String]>,
    cascade: bool,
    schema: Option<&str>,
) -> Result<TruncationResult>
where
    C: SchemaIntrospector + Mutator + ?Sized,
{
    validate_schema(schema)?;
    if let Some(tables) = tables {
        validate_table_names(tables)?;
    }

    let snapshot = capture(conn, schema)?;
    let (deps, sorted) = resolve(&snapshot);

    if !sorted.is_acyclic() {
        tracing::warn!(
            tables = ?sorted.unordered_tables(),
            "circular foreign keys: truncation order for these tables is best-effort"
        );
    }

    Ok(truncate_in_order(
        &deps.ordered_tables,
        tables,
        schema,
        cascade,
        conn,
    ))
}

/// Find orphaned FK values across `schema`, returning only the violations
pub fn verify_referential_integrity<C>(
    conn: &C,
    schema: Option<&str>,
) -> Result<Vec<IntegrityViolation>>
where
    C: SchemaIntrospector + QueryExecutor + ?Sized,
{
    Ok(audit_referential_integrity(conn, schema)?.violations)
}

/// Find orphaned FK values across `schema`, including edges that were skipped
pub fn audit_referential_integrity<C>(conn: &C, schema: Option<&str>) -> Result<IntegrityAudit>
where
    C: SchemaIntrospector + QueryExecutor + ?Sized,
{
    validate_schema(schema)?;

    let snapshot = capture(conn, schema)?;
    let graph = snapshot.graph();
    let edges = snapshot.audit_edges();

    // PK lookup only decides how samples are taken; a failure just falls
    // back to sampling FK values
    let mut primary_keys = AHashMap::new();
    for (table, fks) in &snapshot.foreign_keys {
        if fks.is_empty() {
            continue;
        }
        match conn.primary_key(table, schema) {
            Ok(pk) => {
                primary_keys.insert(table.clone(), pk);
            }
            Err(e) => tracing::debug!(table = %table, error = %e, "primary key not resolvable"),
        }
    }

    let audit = IntegrityAuditor::new(&graph)
        .with_schema(schema)
        .with_primary_keys(primary_keys)
        .audit(&edges, conn);

    tracing::debug!(
        edges = edges.len(),
        checked = audit.edges_checked,
        violations = audit.violations.len(),
        skipped = audit.skipped.len(),
        "referential integrity audit finished"
    );

    Ok(audit)
}
