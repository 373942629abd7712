//! Schema introspection for store objects.
//!
//! Describe results are fetched once per object per store and cached for the
//! lifetime of the [`SchemaIntrospector`] that owns them.

mod exclusions;
mod field;
mod introspector;
mod schema;
mod types;

pub use exclusions::{Exclusions, DEFAULT_SYSTEM_FIELDS, DEFAULT_SYSTEM_OBJECTS};
pub use field::FieldDescriptor;
pub use introspector::{ReferenceMap, SchemaIntrospector};
pub use schema::ObjectDescribe;
pub use types::FieldType;
