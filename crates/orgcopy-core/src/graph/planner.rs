//! Cycle breaking and insertion planning.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use tracing::{debug, info};

use super::relationship::{Relationship, RelationshipGraph};
use crate::migration::MigrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Find a directed cycle, returned as its edges in traversal order.
///
/// Depth-first from each node in insertion order, following outgoing edges
/// oldest first, so the result is deterministic for a given graph.
pub fn find_cycle(graph: &RelationshipGraph) -> Option<Vec<EdgeIndex>> {
    let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();
    let mut path: Vec<EdgeIndex> = Vec::new();

    for node in graph.inner().node_indices() {
        if marks.contains_key(&node) {
            continue;
        }
        if let Some(cycle) = visit(graph, node, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn visit(
    graph: &RelationshipGraph,
    node: NodeIndex,
    marks: &mut HashMap<NodeIndex, Mark>,
    path: &mut Vec<EdgeIndex>,
) -> Option<Vec<EdgeIndex>> {
    marks.insert(node, Mark::InProgress);

    for edge in graph.outgoing_edges(node) {
        let Some((_, next)) = graph.inner().edge_endpoints(edge) else {
            continue;
        };
        match marks.get(&next) {
            Some(Mark::InProgress) => {
                // The cycle starts at the path edge leaving `next`; a self-loop
                // has no such edge and consists of `edge` alone.
                let start = path
                    .iter()
                    .position(|e| {
                        graph.inner().edge_endpoints(*e).map(|(from, _)| from) == Some(next)
                    })
                    .unwrap_or(path.len());
                let mut cycle = path[start..].to_vec();
                cycle.push(edge);
                return Some(cycle);
            }
            Some(Mark::Done) => {}
            None => {
                path.push(edge);
                if let Some(cycle) = visit(graph, next, marks, path) {
                    return Some(cycle);
                }
                path.pop();
            }
        }
    }

    marks.insert(node, Mark::Done);
    None
}

/// Remove edges until the graph is acyclic.
///
/// Each round deletes the first edge of the first cycle found. Returns the
/// removed relationships in removal order.
pub fn remove_cycles(graph: &mut RelationshipGraph) -> Vec<Relationship> {
    let mut removed = Vec::new();
    while let Some(cycle) = find_cycle(graph) {
        let Some(relationship) = cycle.first().and_then(|&edge| graph.remove_edge(edge)) else {
            break;
        };
        info!(
            relationship = %relationship,
            cycle_length = cycle.len(),
            "removed relationship to break dependency cycle"
        );
        removed.push(relationship);
    }
    removed
}

/// Objects ordered so every object follows the objects it references.
pub fn topological_order(graph: &RelationshipGraph) -> Result<Vec<String>, MigrationError> {
    let sorted = toposort(graph.inner(), None).map_err(|cycle| {
        MigrationError::CyclicDependency {
            object: graph.node_name(cycle.node_id()).to_string(),
        }
    })?;

    // Edges point from referencing to referenced objects, so the sort puts
    // dependents first.
    let order: Vec<String> = sorted
        .into_iter()
        .rev()
        .map(|node| graph.node_name(node).to_string())
        .collect();
    debug!(order = ?order, "computed insertion order");
    Ok(order)
}

/// A reference field and the object type it must be resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    /// Reference field on the dependent object.
    pub field: String,
    /// Object type the field points to.
    pub object: String,
}

/// Direct dependencies of each object reachable from a root.
///
/// Objects without outgoing references have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectDependencyMap {
    entries: BTreeMap<String, Vec<Dependency>>,
}

impl DirectDependencyMap {
    /// Dependencies of an object in field discovery order.
    pub fn dependencies(&self, object: &str) -> &[Dependency] {
        self.entries
            .get(object)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check if an object has an entry.
    pub fn contains(&self, object: &str) -> bool {
        self.entries.contains_key(object)
    }

    /// Number of objects with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no object has dependencies.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries by object name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Dependency])> {
        self.entries
            .iter()
            .map(|(object, deps)| (object.as_str(), deps.as_slice()))
    }

    fn push(&mut self, object: &str, dependency: Dependency) {
        self.entries
            .entry(object.to_string())
            .or_default()
            .push(dependency);
    }
}

/// Collect the direct dependencies of every object reachable from `root`.
///
/// Each (object, field) edge is followed once, so cycles in the graph do not
/// cause unbounded recursion.
pub fn direct_dependencies(graph: &RelationshipGraph, root: &str) -> DirectDependencyMap {
    let mut map = DirectDependencyMap::default();
    let mut visited: HashSet<(String, String)> = HashSet::new();
    collect(graph, root, &mut visited, &mut map);
    map
}

fn collect(
    graph: &RelationshipGraph,
    object: &str,
    visited: &mut HashSet<(String, String)>,
    map: &mut DirectDependencyMap,
) {
    for relationship in graph.dependencies_of(object) {
        if !visited.insert((relationship.from.clone(), relationship.field.clone())) {
            continue;
        }
        map.push(
            object,
            Dependency {
                field: relationship.field.clone(),
                object: relationship.to.clone(),
            },
        );
        collect(graph, &relationship.to, visited, map);
    }
}
