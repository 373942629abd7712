//! Object dependency graph and insertion planning.
//!
//! The relationship graph has one node per object type and one edge per
//! reference field, pointing from the referencing object to the referenced
//! one. The planner turns it into either a global insertion order (after
//! breaking cycles) or a per-object map of direct dependencies.

mod planner;
mod relationship;

pub use planner::{
    direct_dependencies, find_cycle, remove_cycles, topological_order, Dependency,
    DirectDependencyMap,
};
pub use relationship::{build_graph, Relationship, RelationshipGraph};
