//! Migration error taxonomy.

use thiserror::Error;

use crate::error::StoreError;

/// Errors raised while planning or running a migration.
///
/// Field-level rejections are not errors here: they are recovered from inside
/// the retry loop (see [`Rejection`](super::classify::Rejection)). Only the
/// outcomes that end a record, an object or a run are represented.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// An object could not be described; aborts that object only.
    #[error("schema error for {object}: {source}")]
    Schema {
        /// The object being described.
        object: String,
        /// The store failure.
        source: StoreError,
    },

    /// The target refused the record for lack of access; never retried.
    #[error("permission denied for {object} record {record}: {code}: {message}")]
    PermissionDenied {
        /// The object being inserted.
        object: String,
        /// Key identifying the record in logs.
        record: String,
        /// Status code reported by the store.
        code: String,
        /// Message reported by the store.
        message: String,
    },

    /// The target reported a duplicate but no existing record matched the natural key.
    #[error("duplicate {object} record {record} could not be matched by natural key: {message}")]
    DuplicateConflict {
        /// The object being inserted.
        object: String,
        /// Key identifying the record in logs.
        record: String,
        /// Message reported by the store.
        message: String,
    },

    /// A cycle survived cycle removal.
    #[error("cyclic dependency through {object} remains after cycle removal")]
    CyclicDependency {
        /// An object on the remaining cycle.
        object: String,
    },

    /// The attempt cap was reached without a classified outcome.
    #[error("gave up on {object} record {record} after {attempts} attempts: {reason}")]
    RetryExhausted {
        /// The object being inserted.
        object: String,
        /// Key identifying the record in logs.
        record: String,
        /// Number of create attempts made.
        attempts: usize,
        /// Reason the last attempt failed.
        reason: String,
    },

    /// A store call failed outside of schema description.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MigrationError {
    /// Whether the failure affects only the current record.
    ///
    /// Record-level failures are logged and the record skipped; everything else
    /// aborts the enclosing object or run.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            MigrationError::PermissionDenied { .. }
                | MigrationError::DuplicateConflict { .. }
                | MigrationError::RetryExhausted { .. }
                | MigrationError::Store(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_level_classification() {
        let exhausted = MigrationError::RetryExhausted {
            object: "Account".into(),
            record: "Acme".into(),
            attempts: 3,
            reason: "rejected fields: Rating".into(),
        };
        let schema = MigrationError::Schema {
            object: "Invoice__c".into(),
            source: StoreError::ObjectNotFound("Invoice__c".into()),
        };
        let cyclic = MigrationError::CyclicDependency { object: "A".into() };

        assert!(exhausted.is_record_level());
        assert!(!schema.is_record_level());
        assert!(!cyclic.is_record_level());
    }

    #[test]
    fn test_error_display() {
        let err = MigrationError::PermissionDenied {
            object: "Contact".into(),
            record: "Jane".into(),
            code: "INSUFFICIENT_ACCESS_OR_READONLY".into(),
            message: "insufficient access".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Contact record Jane"));
        assert!(text.contains("INSUFFICIENT_ACCESS_OR_READONLY"));
    }
}
