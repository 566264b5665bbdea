//! Table dependency graph built from foreign key edges.
//!
//! Provides:
//! - Dependency graph construction from per-table FK edges
//! - Direct and transitive dependency / dependent lookups
//! - Root and leaf table queries

use super::ForeignKeyEdge;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Directed graph of table dependencies.
///
/// An edge A → B means A's rows may reference B's rows (A depends on B).
/// `dependents` is the exact inverse of `dependencies`, and every known
/// table is a key in both maps even when its set is empty. Self-references
/// are kept as ordinary edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    /// For each table, the tables it references via FK
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// For each table, the tables that reference it via FK
    pub dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build a graph from every known table and each table's outbound edges.
    ///
    /// Edges pointing at tables outside `tables` are dropped, as are edges
    /// listed under a table that is itself unknown.
    pub fn build<S: AsRef<str>>(
        tables: &[S],
        edges_per_table: &BTreeMap<String, Vec<ForeignKeyEdge>>,
    ) -> Self {
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = tables
            .iter()
            .map(|t| (t.as_ref().to_string(), BTreeSet::new()))
            .collect();
        let mut dependents = dependencies.clone();

        for (table, edges) in edges_per_table {
            if !dependencies.contains_key(table) {
                tracing::debug!(table = %table, "ignoring edges of unknown table");
                continue;
            }
            for edge in edges {
                if !dependents.contains_key(&edge.to_table) {
                    tracing::debug!(edge = %edge, "dropping edge to table outside the schema");
                    continue;
                }
                if let Some(deps) = dependencies.get_mut(table) {
                    deps.insert(edge.to_table.clone());
                }
                if let Some(deps) = dependents.get_mut(&edge.to_table) {
                    deps.insert(table.clone());
                }
            }
        }

        Self {
            dependencies,
            dependents,
        }
    }

    /// Build a graph from a flat edge list, grouping edges by `from_table`
    pub fn from_edges<S: AsRef<str>>(tables: &[S], edges: &[ForeignKeyEdge]) -> Self {
        let mut per_table: BTreeMap<String, Vec<ForeignKeyEdge>> = BTreeMap::new();
        for edge in edges {
            per_table
                .entry(edge.from_table.clone())
                .or_default()
                .push(edge.clone());
        }
        Self::build(tables, &per_table)
    }

    /// Get the number of tables in the graph
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.dependencies.contains_key(table)
    }

    /// All table names in lexicographic order
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Number of distinct table-to-table edges (self-references included)
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(BTreeSet::len).sum()
    }

    /// Direct dependencies of a table (empty for unknown tables)
    pub fn dependencies_of(&self, table: &str) -> impl Iterator<Item = &str> {
        self.dependencies
            .get(table)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Direct dependents of a table (empty for unknown tables)
    pub fn dependents_of(&self, table: &str) -> impl Iterator<Item = &str> {
        self.dependents
            .get(table)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Check if a table has a self-referential FK
    pub fn has_self_reference(&self, table: &str) -> bool {
        self.dependencies
            .get(table)
            .is_some_and(|deps| deps.contains(table))
    }

    /// Get tables that have self-referential FKs
    pub fn self_referential_tables(&self) -> Vec<&str> {
        self.tables()
            .filter(|t| self.has_self_reference(t))
            .collect()
    }

    /// Get root tables (no dependencies other than themselves)
    pub fn root_tables(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(table, deps)| deps.iter().all(|d| d == *table))
            .map(|(table, _)| table.as_str())
            .collect()
    }

    /// Get leaf tables (nothing else depends on them)
    pub fn leaf_tables(&self) -> Vec<&str> {
        self.dependents
            .iter()
            .filter(|(table, deps)| deps.iter().all(|d| d == *table))
            .map(|(table, _)| table.as_str())
            .collect()
    }

    /// All tables a table depends on, directly or transitively, sorted
    pub fn ancestors(&self, table: &str) -> Vec<String> {
        reachable(&self.dependencies, table)
    }

    /// All tables that depend on a table, directly or transitively, sorted
    pub fn descendants(&self, table: &str) -> Vec<String> {
        reachable(&self.dependents, table)
    }
}

/// Breadth-first closure over `adjacency`, excluding `start` unless it lies on a cycle
fn reachable(adjacency: &BTreeMap<String, BTreeSet<String>>, start: &str) -> Vec<String> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for next in adjacency.get(current).into_iter().flatten() {
            if visited.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }

    visited.into_iter().collect()
}
