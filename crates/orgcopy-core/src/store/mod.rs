//! The remote store collaborator.
//!
//! The migration engine never talks to a store directly; it goes through the
//! [`Store`] trait, which exposes only describe, query, create, update and the
//! resource-limits call. Object names are plain data parameters.

pub mod memory;
pub mod query;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::ObjectDescribe;
use crate::error::StoreError;
use crate::record::Record;

pub use memory::MemoryStore;
pub use query::SelectQuery;

/// One error entry returned by a rejected create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    /// Machine-readable status code, e.g. `DUPLICATE_VALUE`.
    #[serde(alias = "errorCode")]
    pub status_code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Fields the error refers to.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl RemoteError {
    /// Create an error entry.
    pub fn new(status_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code: status_code.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Attach the offending fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of a create or update call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    /// Whether the record was written.
    pub success: bool,
    /// Identifier of the written record.
    #[serde(default)]
    pub id: Option<String>,
    /// Errors reported when `success` is false.
    #[serde(default)]
    pub errors: Vec<RemoteError>,
}

impl CreateResult {
    /// A successful result.
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id.into()),
            errors: Vec::new(),
        }
    }

    /// A rejected result.
    pub fn rejected(errors: Vec<RemoteError>) -> Self {
        Self {
            success: false,
            id: None,
            errors,
        }
    }
}

/// Maximum and remaining amount of one storage resource, in MB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageLimit {
    /// Total capacity.
    #[serde(rename = "Max")]
    pub max: f64,
    /// Capacity not yet used.
    #[serde(rename = "Remaining")]
    pub remaining: f64,
}

/// Resource limits reported by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Data storage in MB.
    #[serde(rename = "DataStorageMB")]
    pub data_storage_mb: StorageLimit,
}

impl ResourceLimits {
    /// Limits with the given data storage figures.
    pub fn with_data_storage(max: f64, remaining: f64) -> Self {
        Self {
            data_storage_mb: StorageLimit { max, remaining },
        }
    }
}

/// An authenticated handle to one store instance.
#[async_trait]
pub trait Store: Send + Sync {
    /// Label identifying this store in logs and caches (e.g. "source").
    fn name(&self) -> &str;

    /// Describe an object type.
    async fn describe(&self, object: &str) -> Result<ObjectDescribe, StoreError>;

    /// Run a query in the select subset and return rows without metadata envelopes.
    async fn query(&self, query: &str) -> Result<Vec<Record>, StoreError>;

    /// Create a record.
    ///
    /// Field-level rejections come back as an unsuccessful [`CreateResult`];
    /// `Err` is reserved for failures where the store gave no structured answer.
    async fn create(&self, object: &str, record: &Record) -> Result<CreateResult, StoreError>;

    /// Set fields on an existing record.
    async fn update(
        &self,
        object: &str,
        id: &str,
        record: &Record,
    ) -> Result<CreateResult, StoreError>;

    /// Report resource limits.
    async fn resource_limits(&self) -> Result<ResourceLimits, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_accepts_error_code_alias() {
        let json = r#"[{"message":"duplicate value found","errorCode":"DUPLICATE_VALUE","fields":[]}]"#;
        let errors: Vec<RemoteError> = serde_json::from_str(json).unwrap();
        assert_eq!(errors[0].status_code, "DUPLICATE_VALUE");
    }

    #[test]
    fn test_resource_limits_payload() {
        let json = r#"{"DataStorageMB":{"Max":5,"Remaining":3.5},"DailyApiRequests":{"Max":15000,"Remaining":14998}}"#;
        let limits: ResourceLimits = serde_json::from_str(json).unwrap();
        assert_eq!(limits.data_storage_mb.max, 5.0);
        assert_eq!(limits.data_storage_mb.remaining, 3.5);
    }

    #[test]
    fn test_create_result_payload() {
        let json = r#"{"id":"003B","success":true,"errors":[]}"#;
        let result: CreateResult = serde_json::from_str(json).unwrap();
        assert_eq!(result, CreateResult::created("003B"));
    }
}
