//! Graph analysis algorithms: cycle detection and topological sort.

use super::DependencyGraph;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A cycle in the graph (tables that reach each other, sorted by name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Cycle {
    pub tables: Vec<String>,
}

impl Cycle {
    /// Check if this is a self-referencing cycle (single table)
    pub fn is_self_reference(&self) -> bool {
        self.tables.len() == 1
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Format the cycle for display. Members are a set, not a traversal.
    pub fn display(&self) -> String {
        if self.is_self_reference() {
            format!("{} -> {} (self-reference)", self.tables[0], self.tables[0])
        } else {
            format!("{{{}}}", self.tables.join(", "))
        }
    }
}

/// Result of ordering a dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopoSortResult {
    /// Every table exactly once: the dependency-first prefix, then any
    /// tables that could not be ordered, lexicographically
    pub ordered_tables: Vec<String>,
    /// Length of the dependency-safe prefix of `ordered_tables`
    pub ordered_prefix: usize,
    /// Cycle groups, including self-referencing tables
    pub cycles: Vec<Cycle>,
}

impl TopoSortResult {
    /// True when every table received a dependency-safe position
    pub fn is_acyclic(&self) -> bool {
        self.ordered_prefix == self.ordered_tables.len()
    }

    /// Tables appended after the safe prefix (cyclic or blocked by a cycle)
    pub fn unordered_tables(&self) -> &[String] {
        &self.ordered_tables[self.ordered_prefix..]
    }

    /// Get all tables that are part of any cycle
    pub fn cyclic_tables(&self) -> BTreeSet<&str> {
        self.cycles
            .iter()
            .flat_map(|c| c.tables.iter().map(String::as_str))
            .collect()
    }
}

/// Order tables dependency-first using Kahn's algorithm.
///
/// Among ready tables the lexicographically smallest is always taken next,
/// so the result is stable for an unchanged schema. Self-references do not
/// hold a table back. Tables left over once no table is ready are grouped
/// by strongly connected component and appended in name order.
pub fn order(graph: &DependencyGraph) -> TopoSortResult {
    // In-degree: number of other tables each table waits on
    let mut in_degree: BTreeMap<&str, usize> = graph
        .dependencies
        .iter()
        .map(|(table, deps)| (table.as_str(), deps.iter().filter(|d| *d != table).count()))
        .collect();

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&table, _)| table)
        .collect();

    let mut ordered_tables = Vec::with_capacity(graph.len());

    while let Some(table) = ready.pop_first() {
        ordered_tables.push(table.to_string());

        for dependent in graph.dependents_of(table) {
            if dependent == table {
                continue;
            }
            if let Some(deg) = in_degree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    let ordered_prefix = ordered_tables.len();

    // Tables with remaining in-degree > 0 sit on or behind a cycle
    let remaining: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg > 0)
        .map(|(&table, _)| table)
        .collect();

    let mut cycles = find_cycles(graph, &remaining);

    // Groups stay disjoint: a self-reference is its own group only when the
    // table belongs to no larger cycle
    let in_cycle: BTreeSet<String> = cycles
        .iter()
        .flat_map(|c| c.tables.iter().cloned())
        .collect();
    for table in graph.self_referential_tables() {
        if !in_cycle.contains(table) {
            cycles.push(Cycle {
                tables: vec![table.to_string()],
            });
        }
    }
    cycles.sort();
    cycles.dedup();

    ordered_tables.extend(remaining.iter().map(|t| t.to_string()));

    TopoSortResult {
        ordered_tables,
        ordered_prefix,
        cycles,
    }
}

/// Find multi-table cycles among `nodes` using Tarjan's SCC algorithm.
///
/// Only edges between members of `nodes` are considered. Self-references
/// are left to the caller.
pub fn find_cycles(graph: &DependencyGraph, nodes: &BTreeSet<&str>) -> Vec<Cycle> {
    let mut finder = TarjanScc::new(graph, nodes);
    finder.find_sccs();

    let mut cycles: Vec<Cycle> = finder
        .sccs
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|mut tables| {
            tables.sort();
            Cycle { tables }
        })
        .collect();
    cycles.sort();
    cycles
}

/// Tarjan's Strongly Connected Components algorithm
struct TarjanScc<'a> {
    nodes: Vec<&'a str>,
    adjacency: AHashMap<&'a str, Vec<&'a str>>,
    index_counter: usize,
    stack: Vec<&'a str>,
    on_stack: AHashSet<&'a str>,
    indices: AHashMap<&'a str, usize>,
    lowlinks: AHashMap<&'a str, usize>,
    sccs: Vec<Vec<String>>,
}

impl<'a> TarjanScc<'a> {
    fn new(graph: &'a DependencyGraph, nodes: &BTreeSet<&'a str>) -> Self {
        // Adjacency restricted to the requested subgraph
        let mut adjacency: AHashMap<&'a str, Vec<&'a str>> = AHashMap::new();
        for &node in nodes {
            let targets = graph
                .dependencies_of(node)
                .filter(|dep| *dep != node && nodes.contains(dep))
                .collect();
            adjacency.insert(node, targets);
        }

        Self {
            nodes: nodes.iter().copied().collect(),
            adjacency,
            index_counter: 0,
            stack: Vec::new(),
            on_stack: AHashSet::new(),
            indices: AHashMap::new(),
            lowlinks: AHashMap::new(),
            sccs: Vec::new(),
        }
    }

    fn find_sccs(&mut self) {
        let nodes = self.nodes.clone();
        for node in nodes {
            if !self.indices.contains_key(node) {
                self.strongconnect(node);
            }
        }
    }

    /// Iterative DFS from `root`, so long dependency chains cannot exhaust the stack
    fn strongconnect(&mut self, root: &'a str) {
        // (node, index of the next neighbor to visit)
        let mut work: Vec<(&'a str, usize)> = vec![(root, 0)];
        self.visit(root);

        while let Some(&(v, next)) = work.last() {
            let neighbor = self.adjacency.get(v).and_then(|n| n.get(next)).copied();
            match neighbor {
                Some(w) => {
                    if let Some(top) = work.last_mut() {
                        top.1 += 1;
                    }
                    if !self.indices.contains_key(w) {
                        self.visit(w);
                        work.push((w, 0));
                    } else if self.on_stack.contains(w) {
                        let low = self.lowlinks[v].min(self.indices[w]);
                        self.lowlinks.insert(v, low);
                    }
                }
                None => {
                    work.pop();
                    if let Some(&(parent, _)) = work.last() {
                        let low = self.lowlinks[parent].min(self.lowlinks[v]);
                        self.lowlinks.insert(parent, low);
                    }

                    // v is the root of an SCC: pop it off the stack
                    if self.lowlinks[v] == self.indices[v] {
                        let mut scc = Vec::new();
                        while let Some(w) = self.stack.pop() {
                            self.on_stack.remove(w);
                            scc.push(w.to_string());
                            if w == v {
                                break;
                            }
                        }
                        self.sccs.push(scc);
                    }
                }
            }
        }
    }

    fn visit(&mut self, v: &'a str) {
        self.indices.insert(v, self.index_counter);
        self.lowlinks.insert(v, self.index_counter);
        self.index_counter += 1;
        self.stack.push(v);
        self.on_stack.insert(v);
    }
}
