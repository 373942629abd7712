//! Dependency-aware record migration between two schema-driven stores.
//!
//! The engine describes objects through a [`Store`], builds the graph of
//! reference fields reachable from a root object, orders object types so
//! referenced records are created first, and copies records with inserts that
//! adapt to field-level rejections.

pub mod catalog;
pub mod error;
pub mod graph;
pub mod migration;
pub mod record;
pub mod store;

pub use catalog::{Exclusions, FieldDescriptor, FieldType, ObjectDescribe, SchemaIntrospector};
pub use error::StoreError;
pub use graph::{DirectDependencyMap, Relationship, RelationshipGraph};
pub use migration::{
    MigrationConfig, MigrationError, MigrationMode, MigrationOrchestrator, MigrationPlan,
    MigrationReport, ObjectReport, RecordMigrator, RecordOutcome,
};
pub use record::Record;
pub use store::{CreateResult, MemoryStore, RemoteError, ResourceLimits, SelectQuery, Store};
