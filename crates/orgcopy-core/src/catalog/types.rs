//! Field data types reported by a store describe call.

use serde::{Deserialize, Serialize};

/// Data type of a field.
///
/// Only the distinctions the migration engine acts on are modelled; every other
/// type name the store reports is kept verbatim in [`FieldType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Store-generated record identifier.
    Id,
    /// Lookup or master-detail reference to another object type.
    Reference,
    /// Free text.
    String,
    /// Boolean flag.
    Boolean,
    /// Single-select value list.
    Picklist,
    /// Any other store type.
    Other(String),
}

impl FieldType {
    /// Check if this is a reference (foreign key) type.
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference)
    }

    /// The store's name for this type.
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Id => "id",
            FieldType::Reference => "reference",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Picklist => "picklist",
            FieldType::Other(name) => name,
        }
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "id" => FieldType::Id,
            // Older describe payloads call lookups "lookup".
            "reference" | "lookup" => FieldType::Reference,
            "string" => FieldType::String,
            "boolean" => FieldType::Boolean,
            "picklist" => FieldType::Picklist,
            _ => FieldType::Other(name),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
