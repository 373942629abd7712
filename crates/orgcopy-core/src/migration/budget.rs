//! Advisory storage budget.
//!
//! The remaining data storage of the target is read once before migration and
//! decreased by a fixed per-record estimate after each processed record. The
//! figure is for operator visibility only; it never blocks an insert.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::Store;

/// Remaining data storage of a store, in MB.
pub async fn remaining_capacity(store: &dyn Store) -> Result<f64, StoreError> {
    Ok(store.resource_limits().await?.data_storage_mb.remaining)
}

/// Estimated storage taken by `records` records of `record_size_kb` KB each, in MB.
pub fn estimate_size(records: usize, record_size_kb: f64) -> f64 {
    records as f64 * record_size_kb / 1024.0
}

/// Running estimate of the target's remaining storage.
#[derive(Debug)]
pub struct StorageBudget {
    remaining_mb: Mutex<Option<f64>>,
    record_size_kb: f64,
}

impl StorageBudget {
    /// Start from a known remaining capacity.
    pub fn new(remaining_mb: f64, record_size_kb: f64) -> Self {
        Self {
            remaining_mb: Mutex::new(Some(remaining_mb)),
            record_size_kb,
        }
    }

    /// A budget whose starting capacity could not be read.
    pub fn unknown(record_size_kb: f64) -> Self {
        Self {
            remaining_mb: Mutex::new(None),
            record_size_kb,
        }
    }

    /// Read the starting capacity from a store.
    ///
    /// A failed limits call is logged and yields an unknown budget.
    pub async fn from_store(store: &dyn Store, record_size_kb: f64) -> Self {
        match remaining_capacity(store).await {
            Ok(remaining) => {
                info!(store = store.name(), remaining_mb = remaining, "storage available");
                Self::new(remaining, record_size_kb)
            }
            Err(e) => {
                warn!(store = store.name(), error = %e, "cannot read storage limits; budget unknown");
                Self::unknown(record_size_kb)
            }
        }
    }

    /// Current estimate, if the starting capacity is known.
    pub fn remaining(&self) -> Option<f64> {
        *self.remaining_mb.lock()
    }

    /// Charge `records` records against the budget and return the new estimate.
    ///
    /// The estimate may go negative.
    pub fn consume(&self, object: &str, records: usize) -> Option<f64> {
        let mut remaining = self.remaining_mb.lock();
        let used = estimate_size(records, self.record_size_kb);
        if let Some(value) = remaining.as_mut() {
            *value -= used;
            info!(object, used_mb = used, remaining_mb = *value, "storage estimate updated");
            if *value < 0.0 {
                warn!(object, remaining_mb = *value, "estimated storage exhausted; continuing");
            }
        }
        *remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_estimate_size() {
        assert_eq!(estimate_size(0, 3.0), 0.0);
        assert_eq!(estimate_size(1024, 3.0), 3.0);
    }

    #[test]
    fn test_budget_is_non_increasing_and_may_go_negative() {
        let budget = StorageBudget::new(0.005, 3.0);
        let first = budget.consume("Account", 1).unwrap();
        let second = budget.consume("Account", 1).unwrap();

        assert!(first < 0.005);
        assert!(second < first);
        assert!(second < 0.0);
    }

    #[test]
    fn test_unknown_budget_stays_unknown() {
        let budget = StorageBudget::unknown(3.0);
        assert_eq!(budget.consume("Account", 10), None);
        assert_eq!(budget.remaining(), None);
    }

    #[tokio::test]
    async fn test_budget_from_store() {
        let store = MemoryStore::new("target").with_storage(200.0, 120.5);
        assert_eq!(remaining_capacity(&store).await.unwrap(), 120.5);

        let budget = StorageBudget::from_store(&store, 3.0).await;
        assert_eq!(budget.remaining(), Some(120.5));
    }
}
