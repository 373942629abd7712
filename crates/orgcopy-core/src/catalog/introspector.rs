//! Cached describe access and the field sets derived from it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::{Exclusions, FieldDescriptor, ObjectDescribe};
use crate::migration::MigrationError;
use crate::store::Store;

/// Reference field name to referenced object type.
pub type ReferenceMap = BTreeMap<String, String>;

/// Per-store cache. Entries are written once and never invalidated.
#[derive(Default)]
struct SchemaCache {
    describes: DashMap<String, Arc<ObjectDescribe>>,
    references: DashMap<String, Arc<ReferenceMap>>,
}

/// Describes objects through a [`Store`] and derives migration field sets.
///
/// One introspector serves every store of a run; caches are keyed by
/// [`Store::name`], so the two stores of a run must carry distinct names.
pub struct SchemaIntrospector {
    exclusions: Exclusions,
    caches: DashMap<String, Arc<SchemaCache>>,
}

impl SchemaIntrospector {
    /// Create an introspector with empty caches.
    pub fn new(exclusions: Exclusions) -> Self {
        Self {
            exclusions,
            caches: DashMap::new(),
        }
    }

    /// The exclusion lists in effect.
    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    fn cache(&self, store: &dyn Store) -> Arc<SchemaCache> {
        self.caches
            .entry(store.name().to_string())
            .or_default()
            .clone()
    }

    /// Describe an object, serving repeat calls from the cache.
    pub async fn describe(
        &self,
        store: &dyn Store,
        object: &str,
    ) -> Result<Arc<ObjectDescribe>, MigrationError> {
        let cache = self.cache(store);
        if let Some(hit) = cache.describes.get(object) {
            return Ok(Arc::clone(hit.value()));
        }

        debug!(store = store.name(), object, "describing object");
        let schema = store
            .describe(object)
            .await
            .map_err(|source| MigrationError::Schema {
                object: object.to_string(),
                source,
            })?;
        let schema = Arc::new(schema);
        cache
            .describes
            .insert(object.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Field descriptors of an object keyed by name.
    pub async fn describe_fields(
        &self,
        store: &dyn Store,
        object: &str,
    ) -> Result<BTreeMap<String, FieldDescriptor>, MigrationError> {
        Ok(self.describe(store, object).await?.field_map())
    }

    /// Fields present in both stores, minus system fields.
    pub async fn common_fields(
        &self,
        a: &dyn Store,
        b: &dyn Store,
        object: &str,
    ) -> Result<BTreeSet<String>, MigrationError> {
        let in_a = self.describe(a, object).await?.field_names();
        let in_b = self.describe(b, object).await?.field_names();
        Ok(in_a
            .intersection(&in_b)
            .filter(|name| !self.exclusions.is_system_field(name))
            .cloned()
            .collect())
    }

    /// Reference fields of an object and the object type each one points to.
    ///
    /// Fields in the system-field list and fields whose primary target is a
    /// system object are left out.
    pub async fn reference_fields(
        &self,
        store: &dyn Store,
        object: &str,
    ) -> Result<Arc<ReferenceMap>, MigrationError> {
        let cache = self.cache(store);
        if let Some(hit) = cache.references.get(object) {
            return Ok(Arc::clone(hit.value()));
        }

        let schema = self.describe(store, object).await?;
        let references: ReferenceMap = schema
            .reference_fields()
            .filter(|field| !self.exclusions.is_system_field(&field.name))
            .filter_map(|field| {
                let target = field.primary_target()?;
                (!self.exclusions.is_system_object(target))
                    .then(|| (field.name.clone(), target.to_string()))
            })
            .collect();

        let references = Arc::new(references);
        cache
            .references
            .insert(object.to_string(), Arc::clone(&references));
        Ok(references)
    }

    /// Number of objects described so far for a store.
    pub fn cached_objects(&self, store: &dyn Store) -> usize {
        self.caches
            .get(store.name())
            .map(|cache| cache.describes.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;
    use crate::store::MemoryStore;

    fn contact(extra: Option<&str>) -> ObjectDescribe {
        let mut schema = ObjectDescribe::new("Contact")
            .with_field(FieldDescriptor::new("Id", FieldType::Id).read_only())
            .with_field(FieldDescriptor::new("CreatedDate", FieldType::Other("datetime".into())))
            .with_field(FieldDescriptor::new("LastName", FieldType::String))
            .with_field(FieldDescriptor::reference("AccountId", ["Account"]))
            .with_field(FieldDescriptor::reference("OwnerId", ["User"]))
            .with_field(FieldDescriptor::reference("CreatedById", ["User"]));
        if let Some(name) = extra {
            schema = schema.with_field(FieldDescriptor::new(name, FieldType::String));
        }
        schema
    }

    #[tokio::test]
    async fn test_describe_is_cached() {
        let store = MemoryStore::new("source").with_object(contact(None));
        let introspector = SchemaIntrospector::new(Exclusions::default());

        introspector.describe(&store, "Contact").await.unwrap();
        introspector.describe(&store, "Contact").await.unwrap();
        introspector.reference_fields(&store, "Contact").await.unwrap();

        assert_eq!(store.describe_calls("Contact"), 1);
        assert_eq!(introspector.cached_objects(&store), 1);
    }

    #[tokio::test]
    async fn test_describe_failure_is_schema_error() {
        let store = MemoryStore::new("source");
        let introspector = SchemaIntrospector::new(Exclusions::default());

        let err = introspector.describe(&store, "Contact").await.unwrap_err();
        assert!(matches!(err, MigrationError::Schema { ref object, .. } if object == "Contact"));
    }

    #[tokio::test]
    async fn test_common_fields_is_symmetric_and_excludes_system_fields() {
        let a = MemoryStore::new("a").with_object(contact(Some("OnlyInA__c")));
        let b = MemoryStore::new("b").with_object(contact(Some("OnlyInB__c")));
        let introspector = SchemaIntrospector::new(Exclusions::default());

        let ab = introspector.common_fields(&a, &b, "Contact").await.unwrap();
        let ba = introspector.common_fields(&b, &a, "Contact").await.unwrap();

        assert_eq!(ab, ba);
        assert!(ab.contains("LastName"));
        assert!(!ab.contains("OnlyInA__c"));
        assert!(!ab.contains("Id"));
        assert!(!ab.contains("CreatedDate"));
        assert!(!ab.contains("CreatedById"));
    }

    #[tokio::test]
    async fn test_reference_fields_skip_system_objects() {
        let store = MemoryStore::new("source").with_object(contact(None));
        let introspector = SchemaIntrospector::new(Exclusions::default());

        let references = introspector.reference_fields(&store, "Contact").await.unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references.get("AccountId").map(String::as_str), Some("Account"));
    }

    #[tokio::test]
    async fn test_caches_are_per_store() {
        let a = MemoryStore::new("a").with_object(contact(None));
        let b = MemoryStore::new("b").with_object(contact(None));
        let introspector = SchemaIntrospector::new(Exclusions::default());

        introspector.describe(&a, "Contact").await.unwrap();
        introspector.describe(&b, "Contact").await.unwrap();

        assert_eq!(a.describe_calls("Contact"), 1);
        assert_eq!(b.describe_calls("Contact"), 1);
    }
}
