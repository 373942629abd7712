//! Field descriptors for object types.

use super::types::FieldType;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Metadata for one field of an object type, as returned by a describe call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Object types a reference field may point to, in store order.
    #[serde(default)]
    pub reference_to: Vec<String>,
    /// Whether the field accepts null.
    #[serde(default = "default_true")]
    pub nillable: bool,
    /// Whether the field may be set on create.
    #[serde(default = "default_true")]
    pub createable: bool,
    /// Whether the field is an external identifier (natural key).
    #[serde(default)]
    pub external_id: bool,
    /// Whether the store fills the field when it is omitted on create.
    #[serde(default)]
    pub defaulted_on_create: bool,
}

impl FieldDescriptor {
    /// Create a nillable, createable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            reference_to: Vec::new(),
            nillable: true,
            createable: true,
            external_id: false,
            defaulted_on_create: false,
        }
    }

    /// Create a reference field pointing at the given object types.
    pub fn reference<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(name, FieldType::Reference);
        field.reference_to = targets.into_iter().map(Into::into).collect();
        field
    }

    /// Mark as an external identifier.
    pub fn with_external_id(mut self) -> Self {
        self.external_id = true;
        self
    }

    /// Mark as required (non-nillable with no store default).
    pub fn required(mut self) -> Self {
        self.nillable = false;
        self
    }

    /// Mark as not settable on create.
    pub fn read_only(mut self) -> Self {
        self.createable = false;
        self
    }

    /// Check if this is a reference field.
    pub fn is_reference(&self) -> bool {
        self.field_type.is_reference()
    }

    /// Check if a create call must supply this field.
    pub fn is_required(&self) -> bool {
        !self.nillable && self.createable && !self.defaulted_on_create
    }

    /// The primary object type this field references.
    pub fn primary_target(&self) -> Option<&str> {
        self.reference_to.first().map(String::as_str)
    }
}
