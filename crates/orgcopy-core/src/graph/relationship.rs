//! Relationship graph construction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::{debug, warn};

use crate::catalog::{ReferenceMap, SchemaIntrospector};
use crate::migration::MigrationError;
use crate::store::Store;

/// A labeled dependency edge: `from.field` references a record of `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relationship {
    /// Referencing object type.
    pub from: String,
    /// Reference field on `from`.
    pub field: String,
    /// Referenced object type.
    pub to: String,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} -> {}", self.from, self.field, self.to)
    }
}

/// Directed multigraph of object-to-object dependencies.
///
/// Several edges may join the same pair of objects when they are linked by
/// more than one reference field. Node and edge iteration follow insertion
/// order.
#[derive(Debug, Clone)]
pub struct RelationshipGraph {
    graph: StableDiGraph<String, String>,
    nodes: HashMap<String, NodeIndex>,
    root: String,
}

impl RelationshipGraph {
    /// Create a graph holding only the root object.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let mut graph = Self {
            graph: StableDiGraph::new(),
            nodes: HashMap::new(),
            root: root.clone(),
        };
        graph.add_object(&root);
        graph
    }

    /// The object the graph was built from.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Add an object node if it is not present yet.
    pub fn add_object(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Add a labeled edge from `from` to `to`.
    pub fn add_relationship(&mut self, from: &str, field: &str, to: &str) -> EdgeIndex {
        let a = self.add_object(from);
        let b = self.add_object(to);
        self.graph.add_edge(a, b, field.to_string())
    }

    /// Check if an object is in the graph.
    pub fn contains_object(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Object names in insertion order.
    pub fn objects(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Number of objects.
    pub fn object_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of relationship edges.
    pub fn relationship_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All relationships in insertion order.
    pub fn relationships(&self) -> Vec<Relationship> {
        self.graph
            .edge_indices()
            .filter_map(|idx| self.relationship(idx))
            .collect()
    }

    /// Outgoing relationships of an object in insertion order.
    pub fn dependencies_of(&self, object: &str) -> Vec<Relationship> {
        let Some(&node) = self.nodes.get(object) else {
            return Vec::new();
        };
        self.outgoing_edges(node)
            .into_iter()
            .filter_map(|idx| self.relationship(idx))
            .collect()
    }

    pub(crate) fn inner(&self) -> &StableDiGraph<String, String> {
        &self.graph
    }

    pub(crate) fn node_name(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }

    /// Outgoing edge ids of a node, oldest first.
    pub(crate) fn outgoing_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }

    pub(crate) fn relationship(&self, idx: EdgeIndex) -> Option<Relationship> {
        let (a, b) = self.graph.edge_endpoints(idx)?;
        Some(Relationship {
            from: self.graph[a].clone(),
            field: self.graph.edge_weight(idx)?.clone(),
            to: self.graph[b].clone(),
        })
    }

    pub(crate) fn remove_edge(&mut self, idx: EdgeIndex) -> Option<Relationship> {
        let relationship = self.relationship(idx)?;
        self.graph.remove_edge(idx);
        Some(relationship)
    }
}

/// One pending object on the traversal stack and the next field to follow.
struct Frame {
    object: String,
    references: Arc<ReferenceMap>,
    next: usize,
}

/// Build the relationship graph reachable from `root` through reference fields.
///
/// Depth-first over reference fields in name order. An (object, field) pair is
/// followed at most once, so the traversal ends on any schema, including
/// self-referencing and mutually referencing ones. Objects other than the root
/// that cannot be described are kept as leaves.
pub async fn build_graph(
    introspector: &SchemaIntrospector,
    store: &dyn Store,
    root: &str,
) -> Result<RelationshipGraph, MigrationError> {
    let mut graph = RelationshipGraph::new(root);
    let mut visited: HashSet<(String, String)> = HashSet::new();

    let references = introspector.reference_fields(store, root).await?;
    let mut stack = vec![Frame {
        object: root.to_string(),
        references,
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let object = frame.object.clone();
        let next = frame
            .references
            .iter()
            .nth(frame.next)
            .map(|(field, target)| (field.clone(), target.clone()));
        frame.next += 1;

        let Some((field, target)) = next else {
            stack.pop();
            continue;
        };
        if !visited.insert((object.clone(), field.clone())) {
            continue;
        }

        debug!(object = %object, field = %field, target = %target, "found relationship");
        graph.add_relationship(&object, &field, &target);

        match introspector.reference_fields(store, &target).await {
            Ok(references) => stack.push(Frame {
                object: target,
                references,
                next: 0,
            }),
            Err(e) => {
                warn!(object = %target, error = %e, "cannot describe referenced object; treating it as a leaf");
            }
        }
    }

    Ok(graph)
}
