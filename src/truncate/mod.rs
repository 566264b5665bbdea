//! FK-safe truncation.
//!
//! Tables are emptied dependents-first: the reverse of the dependency-first
//! order, so no table is emptied while another table may still reference it.
//! Each table gets a TRUNCATE, falling back to DELETE; a table where both
//! fail is recorded and the batch moves on.

use crate::connection::Mutator;
use crate::error::OperationError;
use ahash::AHashSet;
use serde::Serialize;

/// Outcome of a truncation batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TruncationResult {
    /// Tables emptied successfully, in the order they were emptied
    pub truncated: Vec<String>,
    /// Deletion order that was attempted
    pub order_used: Vec<String>,
    /// Tables that could not be emptied
    pub errors: Vec<OperationError>,
    /// True when `errors` is empty
    pub success: bool,
}

/// Truncation plan: deletion order plus requested tables the schema lacks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TruncationPlan {
    pub order: Vec<String>,
    pub unknown: Vec<String>,
}

/// Compute the dependents-first deletion order without touching the database.
///
/// `ordered_tables` is dependency-first. When `requested` is given, only
/// those tables are kept; requested names absent from `ordered_tables` are
/// returned in `unknown`, in request order and without duplicates.
pub fn plan_truncation(ordered_tables: &[String], requested: Option<&[String]>) -> TruncationPlan {
    let Some(requested) = requested else {
        return TruncationPlan {
            order: ordered_tables.iter().rev().cloned().collect(),
            unknown: Vec::new(),
        };
    };

    let wanted: AHashSet<&str> = requested.iter().map(String::as_str).collect();
    let known: AHashSet<&str> = ordered_tables.iter().map(String::as_str).collect();

    let order = ordered_tables
        .iter()
        .rev()
        .filter(|t| wanted.contains(t.as_str()))
        .cloned()
        .collect();

    let mut seen = AHashSet::new();
    let unknown = requested
        .iter()
        .filter(|t| !known.contains(t.as_str()) && seen.insert(t.as_str()))
        .cloned()
        .collect();

    TruncationPlan { order, unknown }
}

/// Empty tables in dependents-first order through `mutator`.
///
/// Never aborts on a single table: failures are collected in
/// [`TruncationResult::errors`]. A final commit is attempted and its
/// failure ignored, since the connection may be in autocommit mode.
pub fn truncate_in_order<M>(
    ordered_tables: &[String],
    requested: Option<&[String]>,
    schema: Option<&str>,
    cascade: bool,
    mutator: &M,
) -> TruncationResult
where
    M: Mutator + ?Sized,
{
    let plan = plan_truncation(ordered_tables, requested);
    let mut result = TruncationResult {
        order_used: plan.order.clone(),
        ..Default::default()
    };

    for table in plan.unknown {
        tracing::warn!(table = %table, "requested table not found in schema");
        result
            .errors
            .push(OperationError::new(table, "table not found in schema"));
    }

    for table in &plan.order {
        match empty_table(table, schema, cascade, mutator) {
            Ok(()) => {
                tracing::info!(table = %table, "table emptied");
                result.truncated.push(table.clone());
            }
            Err(message) => {
                tracing::warn!(table = %table, error = %message, "could not empty table");
                result.errors.push(OperationError::new(table.clone(), message));
            }
        }
    }

    if let Err(e) = mutator.commit() {
        tracing::debug!(error = %e, "commit skipped");
    }

    result.success = result.errors.is_empty();
    result
}

/// TRUNCATE, then DELETE. Returns both failure messages when neither works.
fn empty_table<M>(table: &str, schema: Option<&str>, cascade: bool, mutator: &M) -> Result<(), String>
where
    M: Mutator + ?Sized,
{
    let truncate_err = match mutator.truncate(table, schema, cascade) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    tracing::debug!(table = %table, error = %truncate_err, "truncate failed, falling back to delete");

    mutator.delete(table, schema).map_err(|delete_err| {
        format!(
            "truncate failed: {:#}; delete failed: {:#}",
            truncate_err, delete_err
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_reverses_full_order() {
        let plan = plan_truncation(&names(&["departments", "employees", "projects"]), None);
        assert_eq!(plan.order, vec!["projects", "employees", "departments"]);
        assert!(plan.unknown.is_empty());
    }

    #[test]
    fn test_plan_filters_requested_subset() {
        let ordered = names(&["departments", "employees", "projects"]);
        let requested = names(&["departments", "projects", "ghost", "ghost"]);
        let plan = plan_truncation(&ordered, Some(&requested));
        assert_eq!(plan.order, vec!["projects", "departments"]);
        assert_eq!(plan.unknown, vec!["ghost"]);
    }

    #[test]
    fn test_plan_with_empty_request() {
        let plan = plan_truncation(&names(&["a", "b"]), Some(&[]));
        assert!(plan.order.is_empty());
        assert!(plan.unknown.is_empty());
    }
}
