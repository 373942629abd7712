//! Integration tests for the migration engine.

use std::sync::Arc;

use orgcopy_core::catalog::{FieldDescriptor, FieldType, ObjectDescribe};
use orgcopy_core::migration::{MigrationConfig, MigrationMode, MigrationOrchestrator};
use orgcopy_core::record::Record;
use orgcopy_core::store::{MemoryStore, Store};

struct TestContext {
    source: Arc<MemoryStore>,
    target: Arc<MemoryStore>,
}

impl TestContext {
    fn new() -> Self {
        let source = MemoryStore::new("source");
        let target = MemoryStore::new("target").with_storage(100.0, 10.0);
        for schema in sales_schema() {
            source.define_object(schema.clone());
            target.define_object(schema);
        }
        Self {
            source: Arc::new(source),
            target: Arc::new(target),
        }
    }

    fn orchestrator(&self) -> MigrationOrchestrator {
        self.orchestrator_with(MigrationConfig::default())
    }

    fn orchestrator_with(&self, config: MigrationConfig) -> MigrationOrchestrator {
        let source: Arc<dyn Store> = self.source.clone();
        let target: Arc<dyn Store> = self.target.clone();
        MigrationOrchestrator::new(source, target, config)
    }

    fn seed_acme_and_jane(&self) -> String {
        let acme = self.source.insert(
            "Account",
            Record::new()
                .with_field("Name", "Acme")
                .with_field("Industry", "Manufacturing")
                .with_field("CreatedDate", "2024-01-01T00:00:00Z"),
        );
        self.source.insert(
            "Contact",
            Record::new()
                .with_field("Name", "Jane")
                .with_field("AccountId", acme.clone()),
        );
        acme
    }
}

fn sales_schema() -> Vec<ObjectDescribe> {
    let account = ObjectDescribe::new("Account")
        .with_field(FieldDescriptor::new("Id", FieldType::Id).read_only())
        .with_field(FieldDescriptor::new("Name", FieldType::String).required())
        .with_field(FieldDescriptor::new("Industry", FieldType::Picklist))
        .with_field(FieldDescriptor::new("Rating", FieldType::Picklist))
        .with_field(FieldDescriptor::new(
            "CreatedDate",
            FieldType::Other("datetime".into()),
        ))
        .with_field(FieldDescriptor::reference("ParentId", ["Account"]))
        .with_field(FieldDescriptor::reference("OwnerId", ["User"]));

    let contact = ObjectDescribe::new("Contact")
        .with_field(FieldDescriptor::new("Id", FieldType::Id).read_only())
        .with_field(FieldDescriptor::new("Name", FieldType::String).required())
        .with_field(FieldDescriptor::new("CustomPicklist__c", FieldType::Picklist))
        .with_field(FieldDescriptor::reference("AccountId", ["Account"]));

    vec![account, contact]
}

#[tokio::test]
async fn test_per_record_inserts_dependency_first() {
    let ctx = TestContext::new();
    ctx.seed_acme_and_jane();

    let report = ctx
        .orchestrator()
        .run("Contact", MigrationMode::PerRecord)
        .await
        .unwrap();

    let accounts = ctx.target.records("Account");
    let contacts = ctx.target.records("Contact");
    assert_eq!(accounts.len(), 1);
    assert_eq!(contacts.len(), 1);

    let account_id = accounts[0].id().unwrap();
    assert_eq!(accounts[0].get_str("Name"), Some("Acme"));
    assert!(!accounts[0].contains("CreatedDate"));
    assert_eq!(contacts[0].get_str("Name"), Some("Jane"));
    assert_eq!(contacts[0].get_str("AccountId"), Some(account_id));

    // The account was created before the contact.
    assert!(account_id.ends_with("0001"));

    assert_eq!(report.object("Account").unwrap().inserted, 1);
    assert_eq!(report.object("Contact").unwrap().inserted, 1);
}

#[tokio::test]
async fn test_per_record_reuses_existing_target_record() {
    let ctx = TestContext::new();
    ctx.seed_acme_and_jane();
    let existing = ctx
        .target
        .insert("Account", Record::new().with_field("Name", "Acme"));

    let report = ctx
        .orchestrator()
        .run("Contact", MigrationMode::PerRecord)
        .await
        .unwrap();

    assert_eq!(ctx.target.records("Account").len(), 1);
    assert_eq!(ctx.target.create_calls("Account"), 0);

    let contacts = ctx.target.records("Contact");
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].get_str("AccountId"), Some(existing.as_str()));
    assert_eq!(report.object("Account").unwrap().reused, 1);
}

#[tokio::test]
async fn test_always_rejected_field_skips_after_exact_attempts() {
    let ctx = TestContext::new();
    ctx.target.reject_always("Contact", "CustomPicklist__c");
    ctx.source.insert(
        "Contact",
        Record::new()
            .with_field("Name", "Jane")
            .with_field("CustomPicklist__c", "Gold"),
    );
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "John"));

    let report = ctx
        .orchestrator()
        .run("Contact", MigrationMode::Bulk)
        .await
        .unwrap();

    assert_eq!(ctx.target.create_calls("Contact"), 6);
    assert!(ctx.target.records("Contact").is_empty());

    let contacts = report.object("Contact").unwrap();
    assert_eq!(contacts.skipped, 2);
    assert_eq!(contacts.error, None);
}

#[tokio::test]
async fn test_rejected_field_is_dropped_and_insert_retried() {
    let ctx = TestContext::new();
    ctx.target.reject_field("Account", "Rating");
    ctx.source.insert(
        "Account",
        Record::new()
            .with_field("Name", "Acme")
            .with_field("Rating", "Hot"),
    );

    let report = ctx
        .orchestrator()
        .run("Account", MigrationMode::Bulk)
        .await
        .unwrap();

    let accounts = ctx.target.records("Account");
    assert_eq!(accounts.len(), 1);
    assert!(!accounts[0].contains("Rating"));
    assert_eq!(accounts[0].get_str("Name"), Some("Acme"));
    assert_eq!(ctx.target.create_calls("Account"), 2);
    assert_eq!(report.object("Account").unwrap().inserted, 1);
}

#[tokio::test]
async fn test_bulk_rerun_is_idempotent() {
    let ctx = TestContext::new();
    ctx.target.unique_key("Account", "Name");
    ctx.source
        .insert("Account", Record::new().with_field("Name", "Acme"));
    ctx.source
        .insert("Account", Record::new().with_field("Name", "Globex"));

    let first = ctx
        .orchestrator()
        .run("Account", MigrationMode::Bulk)
        .await
        .unwrap();
    let ids_after_first: Vec<String> = ctx
        .target
        .records("Account")
        .iter()
        .filter_map(|r| r.id().map(str::to_string))
        .collect();

    let second = ctx
        .orchestrator()
        .run("Account", MigrationMode::Bulk)
        .await
        .unwrap();
    let ids_after_second: Vec<String> = ctx
        .target
        .records("Account")
        .iter()
        .filter_map(|r| r.id().map(str::to_string))
        .collect();

    assert_eq!(first.object("Account").unwrap().inserted, 2);
    assert_eq!(second.object("Account").unwrap().inserted, 0);
    assert_eq!(second.object("Account").unwrap().reused, 2);
    assert_eq!(ids_after_first, ids_after_second);
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let ctx = TestContext::new();
    ctx.target.deny_create("Contact");
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "Jane"));

    let report = ctx
        .orchestrator()
        .run("Contact", MigrationMode::Bulk)
        .await
        .unwrap();

    assert_eq!(ctx.target.create_calls("Contact"), 1);
    assert_eq!(report.object("Contact").unwrap().skipped, 1);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_bulk_rewrites_references_and_drops_unresolvable_ones() {
    let ctx = TestContext::new();
    let acme = ctx.seed_acme_and_jane();
    ctx.source.insert(
        "Account",
        Record::new()
            .with_field("Name", "Acme Europe")
            .with_field("ParentId", acme)
            .with_field("OwnerId", "005000000000001"),
    );

    let orchestrator = ctx.orchestrator();
    let plan = orchestrator.plan("Contact").await.unwrap();
    assert_eq!(plan.order, vec!["Account".to_string(), "Contact".to_string()]);

    orchestrator.run_bulk(&plan.order).await;

    let accounts = ctx.target.records("Account");
    let acme_target = accounts
        .iter()
        .find(|r| r.get_str("Name") == Some("Acme"))
        .and_then(|r| r.id())
        .unwrap();
    let europe = accounts
        .iter()
        .find(|r| r.get_str("Name") == Some("Acme Europe"))
        .unwrap();
    assert_eq!(europe.get_str("ParentId"), Some(acme_target));
    assert!(!europe.contains("OwnerId"));

    let contacts = ctx.target.records("Contact");
    assert_eq!(contacts[0].get_str("AccountId"), Some(acme_target));
}

#[tokio::test]
async fn test_schema_error_aborts_only_that_object() {
    let ctx = TestContext::new();
    ctx.source
        .insert("Account", Record::new().with_field("Name", "Acme"));

    let report = ctx
        .orchestrator()
        .run_bulk(&["Invoice__c".to_string(), "Account".to_string()])
        .await;

    assert!(report.has_failures());
    assert!(report.object("Invoice__c").unwrap().error.is_some());
    assert_eq!(report.object("Account").unwrap().inserted, 1);
}

#[tokio::test]
async fn test_budget_decreases_per_processed_record() {
    let ctx = TestContext::new();
    ctx.target.deny_create("Contact");
    ctx.source
        .insert("Account", Record::new().with_field("Name", "Acme"));
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "Jane"));

    let config = MigrationConfig::default().with_record_size_kb(512.0);
    let report = ctx
        .orchestrator_with(config)
        .run_bulk(&["Account".to_string(), "Contact".to_string()])
        .await;

    assert_eq!(report.storage_remaining_mb, Some(9.0));
}

#[tokio::test]
async fn test_query_limit_caps_source_rows() {
    let ctx = TestContext::new();
    for name in ["A", "B", "C"] {
        ctx.source
            .insert("Account", Record::new().with_field("Name", name));
    }

    let config = MigrationConfig::default().with_query_limit(Some(2));
    let report = ctx
        .orchestrator_with(config)
        .run("Account", MigrationMode::Bulk)
        .await
        .unwrap();

    assert_eq!(report.total_inserted(), 2);
    assert_eq!(ctx.target.records("Account").len(), 2);
}

/// Alpha a1 and Beta b1 referencing each other by id.
fn cyclic_context() -> TestContext {
    let a = ObjectDescribe::new("Alpha__c")
        .with_field(FieldDescriptor::new("Id", FieldType::Id).read_only())
        .with_field(FieldDescriptor::new("Name", FieldType::String))
        .with_field(FieldDescriptor::reference("Beta__c", ["Beta__c"]));
    let b = ObjectDescribe::new("Beta__c")
        .with_field(FieldDescriptor::new("Id", FieldType::Id).read_only())
        .with_field(FieldDescriptor::new("Name", FieldType::String))
        .with_field(FieldDescriptor::reference("Alpha__c", ["Alpha__c"]));

    let ctx = TestContext::new();
    for schema in [a, b] {
        ctx.source.define_object(schema.clone());
        ctx.target.define_object(schema);
    }
    ctx.source.insert(
        "Alpha__c",
        Record::new()
            .with_field("Id", "a1")
            .with_field("Name", "alpha one")
            .with_field("Beta__c", "b1"),
    );
    ctx.source.insert(
        "Beta__c",
        Record::new()
            .with_field("Id", "b1")
            .with_field("Name", "beta one")
            .with_field("Alpha__c", "a1"),
    );
    ctx
}

#[tokio::test]
async fn test_data_level_cycle_is_deferred_to_update() {
    let ctx = cyclic_context();

    let report = ctx
        .orchestrator()
        .run("Alpha__c", MigrationMode::PerRecord)
        .await
        .unwrap();

    let alphas = ctx.target.records("Alpha__c");
    let betas = ctx.target.records("Beta__c");
    assert_eq!(alphas.len(), 1);
    assert_eq!(betas.len(), 1);

    let alpha_id = alphas[0].id().unwrap();
    let beta_id = betas[0].id().unwrap();
    assert_eq!(alphas[0].get_str("Beta__c"), Some(beta_id));
    assert_eq!(betas[0].get_str("Alpha__c"), Some(alpha_id));
    assert_eq!(ctx.target.update_calls("Beta__c"), 1);
    assert_eq!(report.object("Beta__c").unwrap().deferred, 1);
}

#[tokio::test]
async fn test_missing_dependency_drops_reference() {
    let ctx = TestContext::new();
    ctx.source.insert(
        "Contact",
        Record::new()
            .with_field("Name", "Jane")
            .with_field("AccountId", "001-missing"),
    );

    let report = ctx
        .orchestrator()
        .run("Contact", MigrationMode::PerRecord)
        .await
        .unwrap();

    let contacts = ctx.target.records("Contact");
    assert_eq!(contacts.len(), 1);
    assert!(!contacts[0].contains("AccountId"));
    assert_eq!(report.object("Contact").unwrap().inserted, 1);
}

#[tokio::test]
async fn test_deferred_reference_never_updates_reused_record() {
    let ctx = cyclic_context();
    let existing = ctx
        .target
        .insert("Beta__c", Record::new().with_field("Name", "beta one"));

    ctx.orchestrator()
        .run("Alpha__c", MigrationMode::PerRecord)
        .await
        .unwrap();

    let alphas = ctx.target.records("Alpha__c");
    assert_eq!(alphas.len(), 1);
    assert_eq!(alphas[0].get_str("Beta__c"), Some(existing.as_str()));

    assert_eq!(ctx.target.records("Beta__c").len(), 1);
    assert_eq!(ctx.target.update_calls("Beta__c"), 0);
    assert!(!ctx.target.get("Beta__c", &existing).unwrap().contains("Alpha__c"));
}

#[tokio::test]
async fn test_root_migrated_as_dependency_is_counted_once() {
    let ctx = TestContext::new();
    ctx.source.insert(
        "Account",
        Record::new()
            .with_field("Id", "acc-child")
            .with_field("Name", "Acme Europe")
            .with_field("ParentId", "acc-parent"),
    );
    ctx.source.insert(
        "Account",
        Record::new()
            .with_field("Id", "acc-parent")
            .with_field("Name", "Acme"),
    );

    let config = MigrationConfig::default().with_record_size_kb(1024.0);
    let report = ctx
        .orchestrator_with(config)
        .run("Account", MigrationMode::PerRecord)
        .await
        .unwrap();

    let accounts = report.object("Account").unwrap();
    assert_eq!(accounts.inserted, 2);
    assert_eq!(accounts.reused, 0);
    assert_eq!(accounts.processed(), 2);
    assert_eq!(report.storage_remaining_mb, Some(8.0));
    assert_eq!(ctx.target.records("Account").len(), 2);
    assert_eq!(ctx.target.create_calls("Account"), 2);
}

#[tokio::test]
async fn test_unclassified_rejection_exhausts_attempts() {
    let ctx = TestContext::new();
    ctx.target
        .reject_record("Contact", "Jane", "UNKNOWN_EXCEPTION");
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "Jane"));
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "John"));

    let report = ctx
        .orchestrator()
        .run("Contact", MigrationMode::Bulk)
        .await
        .unwrap();

    // Three attempts for Jane, one for John.
    assert_eq!(ctx.target.create_calls("Contact"), 4);
    let contacts = ctx.target.records("Contact");
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].get_str("Name"), Some("John"));

    let summary = report.object("Contact").unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.inserted, 1);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_create_request_failure_counts_as_attempt() {
    let ctx = TestContext::new();
    ctx.target.fail_record("Contact", "Jane");
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "Jane"));
    ctx.source
        .insert("Contact", Record::new().with_field("Name", "John"));

    let config = MigrationConfig::default().with_max_attempts(2);
    let report = ctx
        .orchestrator_with(config)
        .run("Contact", MigrationMode::Bulk)
        .await
        .unwrap();

    assert_eq!(ctx.target.create_calls("Contact"), 3);
    assert_eq!(ctx.target.records("Contact").len(), 1);

    let summary = report.object("Contact").unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.inserted, 1);
}

#[tokio::test]
async fn test_duplicate_without_natural_key_match_is_skipped() {
    let ctx = TestContext::new();
    ctx.target
        .reject_record("Account", "Acme", "DUPLICATE_VALUE");
    ctx.source
        .insert("Account", Record::new().with_field("Name", "Acme"));
    ctx.source
        .insert("Account", Record::new().with_field("Name", "Globex"));

    let report = ctx
        .orchestrator()
        .run("Account", MigrationMode::Bulk)
        .await
        .unwrap();

    // The duplicate is not retried.
    assert_eq!(ctx.target.create_calls("Account"), 2);
    let accounts = ctx.target.records("Account");
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].get_str("Name"), Some("Globex"));

    let summary = report.object("Account").unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.reused, 0);
}

#[tokio::test]
async fn test_null_fields_are_not_copied() {
    let ctx = TestContext::new();
    ctx.source.insert(
        "Account",
        Record::new()
            .with_field("Name", "Acme")
            .with_field("Industry", serde_json::Value::Null),
    );

    ctx.orchestrator()
        .run("Account", MigrationMode::Bulk)
        .await
        .unwrap();

    let accounts = ctx.target.records("Account");
    assert_eq!(accounts.len(), 1);
    assert!(!accounts[0].contains("Industry"));
}
