//! Record migration between two stores.
//!
//! [`MigrationOrchestrator`] plans a run from a root object and drives a
//! [`RecordMigrator`] in one of two modes: bulk (each object type in
//! dependency order) or per-record (each root record with the records it
//! references). Inserts retry after dropping fields the target rejects;
//! rejections are classified by status code in [`classify`].

pub mod budget;
pub mod classify;
pub mod config;
pub mod error;
pub mod id_map;
pub mod migrator;
pub mod orchestrator;
pub mod report;

pub use budget::{estimate_size, remaining_capacity, StorageBudget};
pub use classify::{classify, Rejection};
pub use config::{MigrationConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_NATURAL_KEY_FIELD};
pub use error::MigrationError;
pub use id_map::IdMap;
pub use migrator::{DeferredReference, RecordMigrator};
pub use orchestrator::{MigrationMode, MigrationOrchestrator, MigrationPlan};
pub use report::{MigrationReport, ObjectReport, RecordOutcome};
