//! Migration configuration.

use crate::catalog::Exclusions;

/// Default number of create attempts per record.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default natural key used to match records across stores.
pub const DEFAULT_NATURAL_KEY_FIELD: &str = "Name";

/// Default estimated size of one record in KB.
pub const DEFAULT_RECORD_SIZE_KB: f64 = 3.0;

/// Migration configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Create attempts per record before it is skipped.
    pub max_attempts: usize,
    /// Row cap for each source query. `None` reads every row.
    pub query_limit: Option<usize>,
    /// Field used as natural key when a record has no external id.
    pub natural_key_field: String,
    /// System fields and objects never migrated.
    pub exclusions: Exclusions,
    /// Estimated storage per record, in KB.
    pub record_size_kb: f64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            query_limit: None,
            natural_key_field: DEFAULT_NATURAL_KEY_FIELD.to_string(),
            exclusions: Exclusions::default(),
            record_size_kb: DEFAULT_RECORD_SIZE_KB,
        }
    }
}

impl MigrationConfig {
    /// Set the attempt cap (at least one).
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Cap the rows read per source query.
    pub fn with_query_limit(mut self, limit: Option<usize>) -> Self {
        self.query_limit = limit;
        self
    }

    /// Set the natural key field.
    pub fn with_natural_key_field(mut self, field: impl Into<String>) -> Self {
        self.natural_key_field = field.into();
        self
    }

    /// Set the exclusion lists.
    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Set the per-record size estimate.
    pub fn with_record_size_kb(mut self, kb: f64) -> Self {
        self.record_size_kb = kb;
        self
    }
}
