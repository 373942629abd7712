//! Record migration with adaptive retry and dependency resolution.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::budget::StorageBudget;
use super::classify::{classify, Rejection};
use super::config::MigrationConfig;
use super::error::MigrationError;
use super::id_map::IdMap;
use super::report::{MigrationReport, RecordOutcome};
use crate::catalog::{ObjectDescribe, SchemaIntrospector};
use crate::graph::DirectDependencyMap;
use crate::record::{Record, ID_FIELD};
use crate::store::{SelectQuery, Store};

/// A reference whose rewrite waits until both records exist in the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredReference {
    /// Object type of the referencing record.
    pub object: String,
    /// Source id of the referencing record.
    pub source_id: String,
    /// Reference field to set.
    pub field: String,
    /// Object type of the referenced record.
    pub target_object: String,
    /// Source id of the referenced record.
    pub target_source_id: String,
}

/// Source records still being resolved, keyed by (object, source id).
type InProgress = HashSet<(String, String)>;

/// Copies records from a source store to a target store.
///
/// Calls are made one at a time. The schema cache, id map and budget are
/// shared state guarded for concurrent readers, but the migrator itself never
/// issues two remote calls at once.
pub struct RecordMigrator {
    source: Arc<dyn Store>,
    target: Arc<dyn Store>,
    introspector: Arc<SchemaIntrospector>,
    budget: Arc<StorageBudget>,
    config: MigrationConfig,
    id_map: IdMap,
    deferred: Mutex<Vec<DeferredReference>>,
    report: Mutex<MigrationReport>,
}

impl RecordMigrator {
    /// Create a migrator between two authenticated stores.
    pub fn new(
        source: Arc<dyn Store>,
        target: Arc<dyn Store>,
        introspector: Arc<SchemaIntrospector>,
        budget: Arc<StorageBudget>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            source,
            target,
            introspector,
            budget,
            config,
            id_map: IdMap::new(),
            deferred: Mutex::new(Vec::new()),
            report: Mutex::new(MigrationReport::new()),
        }
    }

    /// Source-to-target id mapping built so far.
    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    /// References waiting for the post-pass.
    pub fn pending_deferred(&self) -> Vec<DeferredReference> {
        self.deferred.lock().clone()
    }

    /// Snapshot of the run report, with the current budget estimate.
    pub fn report(&self) -> MigrationReport {
        let mut report = self.report.lock().clone();
        report.storage_remaining_mb = self.budget.remaining();
        report
    }

    /// Mark an object as aborted by an object-level failure.
    pub fn fail_object(&self, object: &str, error: &MigrationError) {
        self.report.lock().object_mut(object).error = Some(error.to_string());
    }

    /// Migrate every source record of one object type.
    ///
    /// Record-level failures are logged and counted; only schema failures and
    /// a failing source query end the object.
    #[instrument(skip(self), fields(source = self.source.name(), target = self.target.name()))]
    pub async fn migrate_object(&self, object: &str) -> Result<(), MigrationError> {
        let fields = self
            .introspector
            .common_fields(&*self.source, &*self.target, object)
            .await?;
        let schema = self.introspector.describe(&*self.source, object).await?;

        let query = SelectQuery::new(object)
            .with_fields(std::iter::once(ID_FIELD.to_string()).chain(fields))
            .with_limit(self.config.query_limit);
        debug!(query = %query, "querying source");
        let records = self.source.query(&query.to_query_string()).await?;
        info!(object, records = records.len(), "migrating object");

        for record in records {
            let source_id = record.id().map(str::to_string);
            let key = self.record_key(&schema, &record);

            let prepared = self.strip_system_fields(object, &key, record);
            let prepared = self.rewrite_references(object, &key, &schema, prepared, &BTreeSet::new());
            let result = self.insert_with_retry(object, &key, &schema, prepared).await;
            self.finish(object, &key, source_id.as_deref(), result)?;
        }
        Ok(())
    }

    /// Migrate each root record of `object` together with its dependency chain.
    #[instrument(skip(self, dependencies), fields(source = self.source.name(), target = self.target.name()))]
    pub async fn migrate_root_records(
        &self,
        object: &str,
        dependencies: &DirectDependencyMap,
    ) -> Result<(), MigrationError> {
        let fields = self
            .introspector
            .common_fields(&*self.source, &*self.target, object)
            .await?;
        let query = SelectQuery::new(object)
            .with_fields(std::iter::once(ID_FIELD.to_string()).chain(fields))
            .with_limit(self.config.query_limit);
        let records = self.source.query(&query.to_query_string()).await?;
        info!(object, records = records.len(), "migrating root records");

        for record in records {
            self.migrate_record_with_dependencies(object, record, dependencies)
                .await?;
            self.apply_deferred().await;
        }
        Ok(())
    }

    /// Migrate one record after migrating or locating every record it references.
    ///
    /// Dependencies are resolved depth-first through the fields listed for
    /// `object` in `dependencies`. A reference back to a record that is still
    /// being resolved is left out of the insert and queued for
    /// [`apply_deferred`](Self::apply_deferred).
    ///
    /// Returns `None` when the record was skipped after a record-level failure.
    /// A record already migrated earlier in the run, for instance as another
    /// record's dependency, returns its mapped id without being counted or
    /// charged again.
    pub async fn migrate_record_with_dependencies(
        &self,
        object: &str,
        record: Record,
        dependencies: &DirectDependencyMap,
    ) -> Result<Option<RecordOutcome>, MigrationError> {
        let schema = self.introspector.describe(&*self.source, object).await?;
        let source_id = record.id().map(str::to_string);
        let key = self.record_key(&schema, &record);

        if let Some(id) = source_id
            .as_deref()
            .and_then(|sid| self.id_map.get(object, sid))
        {
            debug!(object, record = %key, id = %id, "record already migrated in this run");
            return Ok(Some(RecordOutcome::Reused { id }));
        }

        let mut in_progress = InProgress::new();
        let result = self
            .resolve(object, record, dependencies, &mut in_progress, true)
            .await;
        self.finish(object, &key, source_id.as_deref(), result)
    }

    fn resolve<'a>(
        &'a self,
        object: &'a str,
        record: Record,
        dependencies: &'a DirectDependencyMap,
        in_progress: &'a mut InProgress,
        is_root: bool,
    ) -> BoxFuture<'a, Result<RecordOutcome, MigrationError>> {
        async move {
            let schema = self.introspector.describe(&*self.source, object).await?;
            let key = self.record_key(&schema, &record);
            let source_id = record.id().map(str::to_string);

            if let Some(sid) = &source_id {
                in_progress.insert((object.to_string(), sid.clone()));
            }

            let mut outgoing = self.strip_system_fields(object, &key, record.clone());
            let mut handled = BTreeSet::new();

            for dependency in dependencies.dependencies(object) {
                let Some(reference) = record.get_str(&dependency.field) else {
                    continue;
                };
                handled.insert(dependency.field.clone());

                if in_progress.contains(&(dependency.object.clone(), reference.to_string())) {
                    outgoing.remove(&dependency.field);
                    match &source_id {
                        Some(sid) => {
                            info!(
                                object,
                                record = %key,
                                field = %dependency.field,
                                "reference cycle; deferring field until both records exist"
                            );
                            self.deferred.lock().push(DeferredReference {
                                object: object.to_string(),
                                source_id: sid.clone(),
                                field: dependency.field.clone(),
                                target_object: dependency.object.clone(),
                                target_source_id: reference.to_string(),
                            });
                            self.report.lock().object_mut(object).deferred += 1;
                        }
                        None => warn!(
                            object,
                            record = %key,
                            field = %dependency.field,
                            "reference cycle on a record without id; dropping field"
                        ),
                    }
                    continue;
                }

                if let Some(id) = self.id_map.get(&dependency.object, reference) {
                    outgoing.set(dependency.field.clone(), id);
                    continue;
                }

                match self
                    .resolve_dependency(&dependency.object, reference, dependencies, in_progress)
                    .await
                {
                    Ok(Some(id)) => outgoing.set(dependency.field.clone(), id),
                    Ok(None) => {
                        outgoing.remove(&dependency.field);
                        warn!(
                            object,
                            record = %key,
                            field = %dependency.field,
                            reason = "referenced record could not be migrated",
                            "dropping reference field"
                        );
                    }
                    Err(e) if e.is_record_level() || matches!(e, MigrationError::Schema { .. }) => {
                        outgoing.remove(&dependency.field);
                        warn!(
                            object,
                            record = %key,
                            field = %dependency.field,
                            error = %e,
                            "dropping reference field"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }

            let outgoing = self.rewrite_references(object, &key, &schema, outgoing, &handled);

            let result = self.create_or_reuse(object, &key, &schema, outgoing, is_root).await;
            if let Some(sid) = source_id {
                in_progress.remove(&(object.to_string(), sid));
            }
            result
        }
        .boxed()
    }

    /// Insert a resolved record. Dependency records are first matched against
    /// the target by natural key.
    async fn create_or_reuse(
        &self,
        object: &str,
        key: &str,
        schema: &ObjectDescribe,
        record: Record,
        is_root: bool,
    ) -> Result<RecordOutcome, MigrationError> {
        if !is_root {
            if let Some(id) = self.find_existing(object, schema, &record).await? {
                info!(object, record = %key, id = %id, "reusing existing target record");
                return Ok(RecordOutcome::Reused { id });
            }
        }
        self.insert_with_retry(object, key, schema, record).await
    }

    /// Fetch one referenced source record and migrate it.
    ///
    /// Returns the target id, or `None` when the record is missing from the
    /// source or was skipped.
    async fn resolve_dependency(
        &self,
        object: &str,
        source_id: &str,
        dependencies: &DirectDependencyMap,
        in_progress: &mut InProgress,
    ) -> Result<Option<String>, MigrationError> {
        let fields = self
            .introspector
            .common_fields(&*self.source, &*self.target, object)
            .await?;
        let query = SelectQuery::new(object)
            .with_fields(std::iter::once(ID_FIELD.to_string()).chain(fields))
            .where_eq(ID_FIELD, source_id)
            .with_limit(Some(1));
        let Some(record) = self
            .source
            .query(&query.to_query_string())
            .await?
            .into_iter()
            .next()
        else {
            warn!(object, record = source_id, "referenced record not found in source");
            return Ok(None);
        };

        let schema = self.introspector.describe(&*self.source, object).await?;
        let key = self.record_key(&schema, &record);
        debug!(object, record = %key, "resolving dependency");

        let result = self
            .resolve(object, record, dependencies, in_progress, false)
            .await;
        Ok(self
            .finish(object, &key, Some(source_id), result)?
            .map(|outcome| outcome.target_id().to_string()))
    }

    /// Set deferred reference fields on records created earlier in the run.
    ///
    /// Only records inserted by this run are updated; a deferral on a reused
    /// target record is dropped. Failures are logged and never abort the run.
    pub async fn apply_deferred(&self) {
        let pending = std::mem::take(&mut *self.deferred.lock());
        for deferred in pending {
            if self.id_map.contains(&deferred.object, &deferred.source_id)
                && !self.id_map.was_created(&deferred.object, &deferred.source_id)
            {
                warn!(
                    object = %deferred.object,
                    record = %deferred.source_id,
                    field = %deferred.field,
                    "deferred reference dropped; target record existed before this run"
                );
                continue;
            }
            let record_id = self.id_map.get(&deferred.object, &deferred.source_id);
            let reference_id = self
                .id_map
                .get(&deferred.target_object, &deferred.target_source_id);
            let (Some(record_id), Some(reference_id)) = (record_id, reference_id) else {
                warn!(
                    object = %deferred.object,
                    record = %deferred.source_id,
                    field = %deferred.field,
                    "deferred reference cannot be applied; a record of the cycle was not migrated"
                );
                continue;
            };

            let patch = Record::new().with_field(deferred.field.clone(), reference_id);
            match self.target.update(&deferred.object, &record_id, &patch).await {
                Ok(result) if result.success => info!(
                    object = %deferred.object,
                    record = %record_id,
                    field = %deferred.field,
                    "applied deferred reference"
                ),
                Ok(result) => warn!(
                    object = %deferred.object,
                    record = %record_id,
                    field = %deferred.field,
                    errors = ?result.errors,
                    "deferred reference update rejected"
                ),
                Err(e) => warn!(
                    object = %deferred.object,
                    record = %record_id,
                    field = %deferred.field,
                    error = %e,
                    "deferred reference update failed"
                ),
            }
        }
    }

    /// Create a record, dropping rejected fields between attempts.
    ///
    /// Makes at most `max_attempts` create calls. A permission error ends the
    /// record at once; a duplicate is resolved by natural key.
    pub async fn insert_with_retry(
        &self,
        object: &str,
        key: &str,
        schema: &ObjectDescribe,
        record: Record,
    ) -> Result<RecordOutcome, MigrationError> {
        let mut problematic: BTreeSet<String> = BTreeSet::new();
        let mut reason = String::new();

        for attempt in 1..=self.config.max_attempts {
            let mut candidate = record.clone();
            candidate.retain(|name, _| !problematic.contains(name));

            let result = match self.target.create(object, &candidate).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(object, record = %key, attempt, error = %e, "create failed");
                    reason = e.to_string();
                    continue;
                }
            };

            if result.success {
                match result.id {
                    Some(id) => {
                        info!(object, record = %key, id = %id, attempt, "inserted record");
                        return Ok(RecordOutcome::Inserted { id });
                    }
                    None => {
                        reason = "create succeeded without an id".to_string();
                        continue;
                    }
                }
            }

            match classify(&result.errors) {
                Rejection::Validation { fields } => {
                    for field in &fields {
                        if problematic.insert(field.clone()) && candidate.contains(field) {
                            info!(
                                object,
                                record = %key,
                                field = %field,
                                attempt,
                                "target rejected field; dropping it"
                            );
                        }
                    }
                    reason = format!(
                        "rejected fields: {}",
                        fields.into_iter().collect::<Vec<_>>().join(", ")
                    );
                }
                Rejection::PermissionDenied { code, message } => {
                    return Err(MigrationError::PermissionDenied {
                        object: object.to_string(),
                        record: key.to_string(),
                        code,
                        message,
                    });
                }
                Rejection::Duplicate { message } => {
                    return match self.find_existing(object, schema, &candidate).await? {
                        Some(id) => {
                            info!(object, record = %key, id = %id, "duplicate; reusing existing target record");
                            Ok(RecordOutcome::Reused { id })
                        }
                        None => Err(MigrationError::DuplicateConflict {
                            object: object.to_string(),
                            record: key.to_string(),
                            message,
                        }),
                    };
                }
                Rejection::Unclassified { code, message } => {
                    debug!(object, record = %key, attempt, code = %code, "create rejected");
                    reason = format!("{}: {}", code, message);
                }
            }
        }

        Err(MigrationError::RetryExhausted {
            object: object.to_string(),
            record: key.to_string(),
            attempts: self.config.max_attempts,
            reason,
        })
    }

    /// Look up a target record with the same natural key.
    pub async fn find_existing(
        &self,
        object: &str,
        schema: &ObjectDescribe,
        record: &Record,
    ) -> Result<Option<String>, MigrationError> {
        let Some((field, value)) = self.natural_key(schema, record) else {
            return Ok(None);
        };
        let query = SelectQuery::new(object)
            .with_fields([ID_FIELD])
            .where_eq(field, value)
            .with_limit(Some(1));
        let rows = self.target.query(&query.to_query_string()).await?;
        Ok(rows
            .into_iter()
            .find_map(|row| row.id().map(str::to_string)))
    }

    /// The natural key of a record: its first populated external-id field, else
    /// the configured key field.
    pub fn natural_key(&self, schema: &ObjectDescribe, record: &Record) -> Option<(String, String)> {
        schema
            .external_id_fields()
            .into_iter()
            .chain(std::iter::once(self.config.natural_key_field.as_str()))
            .find_map(|field| {
                record
                    .get_text(field)
                    .filter(|value| !value.is_empty())
                    .map(|value| (field.to_string(), value))
            })
    }

    /// Remove system fields and null values.
    pub fn strip_system_fields(&self, object: &str, key: &str, mut record: Record) -> Record {
        let exclusions = self.introspector.exclusions();
        record.retain(|name, value| {
            if exclusions.is_system_field(name) {
                return false;
            }
            if value.is_null() {
                info!(object, record = %key, field = name, "skipping null field");
                return false;
            }
            true
        });
        record
    }

    /// Rewrite reference fields to target ids.
    ///
    /// A reference field is any field the source schema types as a reference.
    /// Its value is replaced by the target id of the referenced record when
    /// that record was migrated in this run; otherwise the field is dropped.
    /// Fields in `skip` are left untouched.
    pub fn rewrite_references(
        &self,
        object: &str,
        key: &str,
        schema: &ObjectDescribe,
        mut record: Record,
        skip: &BTreeSet<String>,
    ) -> Record {
        let references: Vec<(String, Option<String>)> = schema
            .reference_fields()
            .filter(|field| !skip.contains(&field.name) && record.contains(&field.name))
            .map(|field| (field.name.clone(), field.primary_target().map(str::to_string)))
            .collect();

        for (field, target) in references {
            let Some(value) = record.get_str(&field).map(str::to_string) else {
                record.remove(&field);
                continue;
            };
            let mapped = target
                .as_deref()
                .and_then(|target| self.id_map.get(target, &value));
            match mapped {
                Some(id) => {
                    debug!(object, record = %key, field = %field, id = %id, "rewrote reference");
                    record.set(field, id);
                }
                None => {
                    record.remove(&field);
                    info!(
                        object,
                        record = %key,
                        field = %field,
                        target = target.as_deref().unwrap_or("unknown"),
                        reason = "referenced record not migrated",
                        "dropping reference field"
                    );
                }
            }
        }
        record
    }

    /// Identifier of a record in logs: natural key value, else source id.
    fn record_key(&self, schema: &ObjectDescribe, record: &Record) -> String {
        self.natural_key(schema, record)
            .map(|(_, value)| value)
            .or_else(|| record.id().map(str::to_string))
            .unwrap_or_else(|| "<no key>".to_string())
    }

    /// Count a record outcome, charge the budget and log skips.
    ///
    /// Record-level failures become `Ok(None)`; other failures propagate.
    fn finish(
        &self,
        object: &str,
        key: &str,
        source_id: Option<&str>,
        result: Result<RecordOutcome, MigrationError>,
    ) -> Result<Option<RecordOutcome>, MigrationError> {
        self.budget.consume(object, 1);
        match result {
            Ok(outcome) => {
                if let Some(sid) = source_id {
                    self.id_map.insert(object, sid, outcome.target_id());
                    if matches!(outcome, RecordOutcome::Inserted { .. }) {
                        self.id_map.mark_created(object, sid);
                    }
                }
                self.report.lock().object_mut(object).record(&outcome);
                Ok(Some(outcome))
            }
            Err(e) if e.is_record_level() => {
                warn!(object, record = %key, reason = %e, "skipping record");
                self.report.lock().object_mut(object).skipped += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
