//! Source-to-target identifier mapping.

use dashmap::{DashMap, DashSet};

/// Maps (object type, source id) to the id of the corresponding target record.
///
/// Filled by every insert and every reuse of an existing target record, so a
/// reference to a record migrated earlier in the run can be rewritten without
/// another round trip. Records inserted by this run are tracked separately
/// from reused ones.
#[derive(Debug, Default)]
pub struct IdMap {
    entries: DashMap<(String, String), String>,
    created: DashSet<(String, String)>,
}

impl IdMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the target id of a source record.
    pub fn insert(&self, object: &str, source_id: &str, target_id: impl Into<String>) {
        self.entries.insert(
            (object.to_string(), source_id.to_string()),
            target_id.into(),
        );
    }

    /// Note that the target record of a source record was inserted by this run.
    pub fn mark_created(&self, object: &str, source_id: &str) {
        self.created
            .insert((object.to_string(), source_id.to_string()));
    }

    /// Whether the target record was inserted by this run rather than reused.
    pub fn was_created(&self, object: &str, source_id: &str) -> bool {
        self.created
            .contains(&(object.to_string(), source_id.to_string()))
    }

    /// Target id of a source record, if it was migrated.
    pub fn get(&self, object: &str, source_id: &str) -> Option<String> {
        self.entries
            .get(&(object.to_string(), source_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Whether the source record was migrated.
    pub fn contains(&self, object: &str, source_id: &str) -> bool {
        self.entries
            .contains_key(&(object.to_string(), source_id.to_string()))
    }

    /// Number of mapped records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was mapped yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_scoped_by_object() {
        let map = IdMap::new();
        map.insert("Account", "001A", "001X");

        assert_eq!(map.get("Account", "001A").as_deref(), Some("001X"));
        assert_eq!(map.get("Contact", "001A"), None);
        assert!(map.contains("Account", "001A"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let map = IdMap::new();
        map.insert("Account", "001A", "001X");
        map.insert("Account", "001A", "001Y");

        assert_eq!(map.get("Account", "001A").as_deref(), Some("001Y"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_reused_records_are_not_created() {
        let map = IdMap::new();
        map.insert("Account", "001A", "001X");
        map.insert("Account", "001B", "001Y");
        map.mark_created("Account", "001B");

        assert!(!map.was_created("Account", "001A"));
        assert!(map.was_created("Account", "001B"));
        assert!(!map.was_created("Contact", "001B"));
    }
}
