//! Migration run results.

use std::fmt;

use serde::Serialize;

/// Outcome of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record was created in the target.
    Inserted {
        /// Target id.
        id: String,
    },
    /// An existing target record was used instead of inserting.
    Reused {
        /// Target id.
        id: String,
    },
}

impl RecordOutcome {
    /// Target id the source record maps to.
    pub fn target_id(&self) -> &str {
        match self {
            RecordOutcome::Inserted { id } | RecordOutcome::Reused { id } => id,
        }
    }
}

/// Per-object counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectReport {
    /// Object type name.
    pub object: String,
    /// Records created in the target.
    pub inserted: usize,
    /// Records resolved to existing target records.
    pub reused: usize,
    /// Records skipped after a record-level failure.
    pub skipped: usize,
    /// References deferred to the post-pass.
    pub deferred: usize,
    /// Object-level failure that aborted this object.
    pub error: Option<String>,
}

impl ObjectReport {
    fn new(object: &str) -> Self {
        Self {
            object: object.to_string(),
            ..Self::default()
        }
    }

    /// Count an outcome.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted { .. } => self.inserted += 1,
            RecordOutcome::Reused { .. } => self.reused += 1,
        }
    }

    /// Records processed, whatever the outcome.
    pub fn processed(&self) -> usize {
        self.inserted + self.reused + self.skipped
    }
}

impl fmt::Display for ObjectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} inserted, {} reused, {} skipped, {} deferred",
            self.object, self.inserted, self.reused, self.skipped, self.deferred
        )?;
        if let Some(error) = &self.error {
            write!(f, " (aborted: {})", error)?;
        }
        Ok(())
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    objects: Vec<ObjectReport>,
    /// Estimated remaining target storage at the end of the run, in MB.
    pub storage_remaining_mb: Option<f64>,
}

impl MigrationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of an object, in first-touched order.
    pub fn objects(&self) -> &[ObjectReport] {
        &self.objects
    }

    /// Counters of one object.
    pub fn object(&self, object: &str) -> Option<&ObjectReport> {
        self.objects.iter().find(|r| r.object == object)
    }

    /// Counters of one object, created on first use.
    pub fn object_mut(&mut self, object: &str) -> &mut ObjectReport {
        let idx = match self.objects.iter().position(|r| r.object == object) {
            Some(idx) => idx,
            None => {
                self.objects.push(ObjectReport::new(object));
                self.objects.len() - 1
            }
        };
        &mut self.objects[idx]
    }

    /// Total records created.
    pub fn total_inserted(&self) -> usize {
        self.objects.iter().map(|r| r.inserted).sum()
    }

    /// Total records skipped.
    pub fn total_skipped(&self) -> usize {
        self.objects.iter().map(|r| r.skipped).sum()
    }

    /// Whether any object was aborted.
    pub fn has_failures(&self) -> bool {
        self.objects.iter().any(|r| r.error.is_some())
    }
}
