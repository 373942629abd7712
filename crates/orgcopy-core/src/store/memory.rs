//! In-process store used by tests and local rehearsals.
//!
//! Implements the full [`Store`] contract over in-memory tables, including the
//! query subset, schema validation on create, configurable rejection rules,
//! unique natural keys and resource limits. Call counters let tests assert how
//! many remote round trips an operation made.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::query::SelectQuery;
use super::{CreateResult, RemoteError, ResourceLimits, Store};
use crate::catalog::ObjectDescribe;
use crate::error::StoreError;
use crate::record::{Record, ID_FIELD};

/// Status code for a field the store refuses to set.
pub const INVALID_FIELD_FOR_INSERT_UPDATE: &str = "INVALID_FIELD_FOR_INSERT_UPDATE";
/// Status code for a field unknown to the object schema.
pub const INVALID_FIELD: &str = "INVALID_FIELD";
/// Status code for a unique-key collision.
pub const DUPLICATE_VALUE: &str = "DUPLICATE_VALUE";
/// Status code for a missing cross-reference permission.
pub const INSUFFICIENT_ACCESS_ON_CROSS_REFERENCE_ENTITY: &str =
    "INSUFFICIENT_ACCESS_ON_CROSS_REFERENCE_ENTITY";
/// Field matched by per-record rules.
const NAME_FIELD: &str = "Name";

/// Status code for an update of an unknown record.
pub const ENTITY_IS_DELETED: &str = "ENTITY_IS_DELETED";

/// A rule that makes create calls fail.
#[derive(Debug, Clone)]
enum RejectRule {
    /// Reject when the field is present in the submitted record.
    FieldPresent { object: String, field: String },
    /// Reject every create, naming the field as the offender.
    Always { object: String, field: String },
    /// Reject every create with a permission error.
    Denied { object: String },
    /// Reject creates of the named record with a status code and no fields.
    Status {
        object: String,
        name: String,
        code: String,
    },
    /// Fail creates of the named record without an answer from the store.
    Unreachable { object: String, name: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    schemas: BTreeMap<String, ObjectDescribe>,
    tables: BTreeMap<String, Vec<Record>>,
    rules: Vec<RejectRule>,
    unique_keys: BTreeMap<String, String>,
    limits: ResourceLimits,
    next_id: u64,
    create_calls: BTreeMap<String, usize>,
    update_calls: BTreeMap<String, usize>,
    describe_calls: BTreeMap<String, usize>,
    query_calls: usize,
}

impl MemoryState {
    fn generate_id(&mut self, store: &str, object: &str) -> String {
        self.next_id += 1;
        format!("{}-{}-{:04}", store, object, self.next_id)
    }

    fn check_rules(&self, object: &str, record: &Record) -> Vec<RemoteError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            match rule {
                RejectRule::FieldPresent { object: o, field } if o == object => {
                    if record.contains(field) {
                        errors.push(
                            RemoteError::new(
                                INVALID_FIELD_FOR_INSERT_UPDATE,
                                format!("Unable to create/update fields: {}", field),
                            )
                            .with_fields([field.clone()]),
                        );
                    }
                }
                RejectRule::Always { object: o, field } if o == object => {
                    errors.push(
                        RemoteError::new(
                            INVALID_FIELD_FOR_INSERT_UPDATE,
                            format!("Unable to create/update fields: {}", field),
                        )
                        .with_fields([field.clone()]),
                    );
                }
                RejectRule::Denied { object: o } if o == object => {
                    errors.push(RemoteError::new(
                        INSUFFICIENT_ACCESS_ON_CROSS_REFERENCE_ENTITY,
                        "insufficient access rights on cross-reference id",
                    ));
                }
                RejectRule::Status {
                    object: o,
                    name,
                    code,
                } if o == object && has_name(record, name) => {
                    errors.push(RemoteError::new(
                        code.clone(),
                        format!("create of '{}' rejected", name),
                    ));
                }
                _ => {}
            }
        }
        errors
    }

    fn unreachable(&self, object: &str, record: &Record) -> bool {
        self.rules.iter().any(|rule| {
            matches!(rule, RejectRule::Unreachable { object: o, name }
                if o == object && has_name(record, name))
        })
    }
}

fn has_name(record: &Record, name: &str) -> bool {
    record.get_text(NAME_FIELD).as_deref() == Some(name)
}

/// An in-memory [`Store`].
pub struct MemoryStore {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store with the given label.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                limits: ResourceLimits::with_data_storage(1024.0, 1024.0),
                ..MemoryState::default()
            }),
        }
    }

    /// Register an object schema (builder style).
    pub fn with_object(self, schema: ObjectDescribe) -> Self {
        self.define_object(schema);
        self
    }

    /// Register an object schema.
    pub fn define_object(&self, schema: ObjectDescribe) {
        let mut state = self.state.lock();
        state.tables.entry(schema.name.clone()).or_default();
        state.schemas.insert(schema.name.clone(), schema);
    }

    /// Store a record directly, returning its id.
    ///
    /// An `Id` already on the record is kept; otherwise one is generated.
    pub fn insert(&self, object: &str, mut record: Record) -> String {
        let mut state = self.state.lock();
        let id = match record.id() {
            Some(id) => id.to_string(),
            None => {
                let id = state.generate_id(&self.name, object);
                record.set(ID_FIELD, id.clone());
                id
            }
        };
        state.tables.entry(object.to_string()).or_default().push(record);
        id
    }

    /// Reject creates that carry `field`.
    pub fn reject_field(&self, object: &str, field: &str) {
        self.state.lock().rules.push(RejectRule::FieldPresent {
            object: object.to_string(),
            field: field.to_string(),
        });
    }

    /// Reject every create of `object`, naming `field` as the offender.
    pub fn reject_always(&self, object: &str, field: &str) {
        self.state.lock().rules.push(RejectRule::Always {
            object: object.to_string(),
            field: field.to_string(),
        });
    }

    /// Deny creates of `object` with a permission error.
    pub fn deny_create(&self, object: &str) {
        self.state.lock().rules.push(RejectRule::Denied {
            object: object.to_string(),
        });
    }

    /// Reject creates of the `object` record named `name` with `code`.
    pub fn reject_record(&self, object: &str, name: &str, code: &str) {
        self.state.lock().rules.push(RejectRule::Status {
            object: object.to_string(),
            name: name.to_string(),
            code: code.to_string(),
        });
    }

    /// Fail creates of the `object` record named `name` with a request error.
    pub fn fail_record(&self, object: &str, name: &str) {
        self.state.lock().rules.push(RejectRule::Unreachable {
            object: object.to_string(),
            name: name.to_string(),
        });
    }

    /// Enforce uniqueness of `field` values within `object`.
    pub fn unique_key(&self, object: &str, field: &str) {
        self.state
            .lock()
            .unique_keys
            .insert(object.to_string(), field.to_string());
    }

    /// Set the data storage limits (builder style).
    pub fn with_storage(self, max_mb: f64, remaining_mb: f64) -> Self {
        self.state.lock().limits = ResourceLimits::with_data_storage(max_mb, remaining_mb);
        self
    }

    /// Snapshot of the records of an object type.
    pub fn records(&self, object: &str) -> Vec<Record> {
        self.state
            .lock()
            .tables
            .get(object)
            .cloned()
            .unwrap_or_default()
    }

    /// Look up a record by id.
    pub fn get(&self, object: &str, id: &str) -> Option<Record> {
        self.state
            .lock()
            .tables
            .get(object)?
            .iter()
            .find(|r| r.id() == Some(id))
            .cloned()
    }

    /// Number of create calls made for an object type.
    pub fn create_calls(&self, object: &str) -> usize {
        self.state.lock().create_calls.get(object).copied().unwrap_or(0)
    }

    /// Number of update calls made for an object type.
    pub fn update_calls(&self, object: &str) -> usize {
        self.state.lock().update_calls.get(object).copied().unwrap_or(0)
    }

    /// Number of describe calls made for an object type.
    pub fn describe_calls(&self, object: &str) -> usize {
        self.state
            .lock()
            .describe_calls
            .get(object)
            .copied()
            .unwrap_or(0)
    }

    /// Number of query calls made.
    pub fn query_calls(&self) -> usize {
        self.state.lock().query_calls
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self, object: &str) -> Result<ObjectDescribe, StoreError> {
        let mut state = self.state.lock();
        *state.describe_calls.entry(object.to_string()).or_default() += 1;
        state
            .schemas
            .get(object)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(object.to_string()))
    }

    async fn query(&self, query: &str) -> Result<Vec<Record>, StoreError> {
        let query = SelectQuery::parse(query)?;
        let mut state = self.state.lock();
        state.query_calls += 1;

        let schema = state
            .schemas
            .get(query.object())
            .ok_or_else(|| StoreError::ObjectNotFound(query.object().to_string()))?;
        let unknown = query
            .fields()
            .iter()
            .chain(query.filter().map(|(f, _)| f.to_string()).iter())
            .find(|f| schema.field(f).is_none())
            .cloned();
        if let Some(field) = unknown {
            return Err(StoreError::InvalidQuery(format!(
                "no such column '{}' on entity '{}'",
                field,
                query.object()
            )));
        }

        let rows = state
            .tables
            .get(query.object())
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|record| match query.filter() {
                Some((field, value)) => record.get_text(field).as_deref() == Some(value),
                None => true,
            })
            .take(query.limit().unwrap_or(usize::MAX))
            .map(|record| record.project(query.fields().iter().map(String::as_str)))
            .collect();
        Ok(rows)
    }

    async fn create(&self, object: &str, record: &Record) -> Result<CreateResult, StoreError> {
        let mut state = self.state.lock();
        *state.create_calls.entry(object.to_string()).or_default() += 1;

        if state.unreachable(object, record) {
            return Err(StoreError::Request(format!(
                "connection reset while creating {}",
                object
            )));
        }

        let schema = state
            .schemas
            .get(object)
            .ok_or_else(|| StoreError::ObjectNotFound(object.to_string()))?;

        let mut errors: Vec<RemoteError> = record
            .field_names()
            .filter(|name| schema.field(name).is_none())
            .map(|name| {
                RemoteError::new(
                    INVALID_FIELD,
                    format!("No such column '{}' on sobject of type {}", name, object),
                )
                .with_fields([name.to_string()])
            })
            .collect();
        errors.extend(state.check_rules(object, record));
        if !errors.is_empty() {
            return Ok(CreateResult::rejected(errors));
        }

        if let Some(key) = state.unique_keys.get(object) {
            if let Some(value) = record.get_text(key) {
                let taken = state
                    .tables
                    .get(object)
                    .is_some_and(|rows| rows.iter().any(|r| r.get_text(key).as_ref() == Some(&value)));
                if taken {
                    return Ok(CreateResult::rejected(vec![RemoteError::new(
                        DUPLICATE_VALUE,
                        format!("duplicate value found: {} duplicates value on record", key),
                    )
                    .with_fields([key.clone()])]));
                }
            }
        }

        let id = state.generate_id(&self.name, object);
        let mut stored = record.clone();
        stored.set(ID_FIELD, id.clone());
        state.tables.entry(object.to_string()).or_default().push(stored);
        Ok(CreateResult::created(id))
    }

    async fn update(
        &self,
        object: &str,
        id: &str,
        record: &Record,
    ) -> Result<CreateResult, StoreError> {
        let mut state = self.state.lock();
        *state.update_calls.entry(object.to_string()).or_default() += 1;

        let existing = state
            .tables
            .get_mut(object)
            .and_then(|rows| rows.iter_mut().find(|r| r.id() == Some(id)));
        match existing {
            Some(existing) => {
                for (name, value) in record.iter() {
                    existing.set(name, value.clone());
                }
                Ok(CreateResult::created(id))
            }
            None => Ok(CreateResult::rejected(vec![RemoteError::new(
                ENTITY_IS_DELETED,
                format!("entity {} is deleted or does not exist", id),
            )])),
        }
    }

    async fn resource_limits(&self) -> Result<ResourceLimits, StoreError> {
        Ok(self.state.lock().limits)
    }
}
