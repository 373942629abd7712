//! Describe results for a whole object type.

use std::collections::{BTreeMap, BTreeSet};

use super::field::FieldDescriptor;
use serde::{Deserialize, Serialize};

/// Schema of one object type in one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescribe {
    /// Object type name.
    pub name: String,
    /// Field descriptors in store order.
    pub fields: Vec<FieldDescriptor>,
}

impl ObjectDescribe {
    /// Create an object schema with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field (builder style).
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields keyed by name.
    pub fn field_map(&self) -> BTreeMap<String, FieldDescriptor> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.clone()))
            .collect()
    }

    /// All field names.
    pub fn field_names(&self) -> BTreeSet<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Reference fields in store order.
    pub fn reference_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_reference())
    }

    /// Names of external-id fields in store order.
    pub fn external_id_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.external_id)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Names of fields a create call must supply.
    pub fn required_fields(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.name.clone())
            .collect()
    }
}
