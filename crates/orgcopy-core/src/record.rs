//! Field-name to value mapping exchanged with a store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the store-generated identifier of a record.
pub const ID_FIELD: &str = "Id";

/// Metadata envelope some stores attach to every returned row.
pub const ENVELOPE_FIELD: &str = "attributes";

/// A record as returned by a query or submitted to a create call.
///
/// A `null` value is kept distinct from an absent field: both mean the field is
/// not migrated, but only an explicit `null` was selected by the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a non-empty string field value.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get a field value rendered as text, as used in equality filters.
    pub fn get_text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether the field is present with a non-null value.
    pub fn is_populated(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(v) if !v.is_null())
    }

    /// Whether the field is present at all.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// The store identifier, if the record carries one.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over fields in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the fields for which the predicate holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.fields.retain(|k, v| keep(k, v));
    }

    /// Keep only the listed fields.
    pub fn project<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Record {
        names
            .into_iter()
            .filter_map(|name| {
                self.fields
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Remove the store metadata envelope.
    pub fn without_envelope(mut self) -> Self {
        self.fields.remove(ENVELOPE_FIELD);
        self
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_builder() {
        let record = Record::new()
            .with_field("Id", "001A")
            .with_field("Name", "Acme")
            .with_field("NumberOfEmployees", 12);

        assert_eq!(record.id(), Some("001A"));
        assert_eq!(record.get_str("Name"), Some("Acme"));
        assert_eq!(record.get_text("NumberOfEmployees"), Some("12".to_string()));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_null_is_not_populated() {
        let record = Record::new().with_field("Phone", Value::Null);

        assert!(record.contains("Phone"));
        assert!(!record.is_populated("Phone"));
        assert_eq!(record.get_text("Phone"), None);
    }

    #[test]
    fn test_empty_string_is_not_an_id() {
        let record = Record::new().with_field("Id", "");
        assert_eq!(record.id(), None);
    }

    #[test]
    fn test_envelope_is_stripped() {
        let value = json!({
            "attributes": {"type": "Account", "url": "/services/data/v59.0/sobjects/Account/001A"},
            "Id": "001A",
            "Name": "Acme"
        });
        let map = value.as_object().cloned().unwrap();
        let record = Record::from(map).without_envelope();

        assert!(!record.contains("attributes"));
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["Id", "Name"]);
    }

    #[test]
    fn test_project() {
        let record = Record::new()
            .with_field("Id", "001A")
            .with_field("Name", "Acme")
            .with_field("Phone", "555");

        let projected = record.project(["Name", "Missing"]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get_str("Name"), Some("Acme"));
    }
}
