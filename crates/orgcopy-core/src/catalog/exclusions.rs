//! System fields and objects that are never migrated.

use std::collections::BTreeSet;

/// Audit and identity fields the store manages itself.
pub const DEFAULT_SYSTEM_FIELDS: &[&str] = &[
    "Id",
    "CreatedDate",
    "CreatedById",
    "LastModifiedDate",
    "LastModifiedById",
    "SystemModstamp",
    "IsDeleted",
    "LastActivityDate",
    "LastViewedDate",
    "LastReferencedDate",
];

/// Administrative object types that are not migrated as data dependencies.
pub const DEFAULT_SYSTEM_OBJECTS: &[&str] = &[
    "User",
    "Group",
    "Profile",
    "UserRole",
    "RecordType",
    "Organization",
    "BusinessHours",
    "PermissionSet",
];

/// Exclusion lists applied to schema introspection and record stripping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusions {
    system_fields: BTreeSet<String>,
    system_objects: BTreeSet<String>,
}

impl Default for Exclusions {
    fn default() -> Self {
        Self {
            system_fields: DEFAULT_SYSTEM_FIELDS.iter().map(|s| s.to_string()).collect(),
            system_objects: DEFAULT_SYSTEM_OBJECTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Exclusions {
    /// Exclusions with empty lists.
    pub fn none() -> Self {
        Self {
            system_fields: BTreeSet::new(),
            system_objects: BTreeSet::new(),
        }
    }

    /// Replace the system-field list.
    pub fn with_system_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the system-object list.
    pub fn with_system_objects<I, S>(mut self, objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_objects = objects.into_iter().map(Into::into).collect();
        self
    }

    /// Check if a field is store-managed.
    pub fn is_system_field(&self, name: &str) -> bool {
        self.system_fields.contains(name)
    }

    /// Check if an object type is administrative.
    pub fn is_system_object(&self, name: &str) -> bool {
        self.system_objects.contains(name)
    }

    /// The system-field list.
    pub fn system_fields(&self) -> &BTreeSet<String> {
        &self.system_fields
    }

    /// The system-object list.
    pub fn system_objects(&self) -> &BTreeSet<String> {
        &self.system_objects
    }
}
