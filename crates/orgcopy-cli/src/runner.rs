//! Authentication and dispatch to the migration engine.

use std::error::Error;
use std::sync::Arc;

use tracing::info;

use orgcopy_client::RestStore;
use orgcopy_core::{MigrationConfig, MigrationOrchestrator, MigrationReport, Store};

use crate::settings::{Settings, StoreSettings};
use crate::Args;

/// Run the tool with parsed arguments.
///
/// Both stores are authenticated before anything is read or written.
pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok());
    settings.validate()?;

    let config = migration_config(&settings, &args);
    info!(
        object = %args.object,
        mode = ?args.mode,
        max_attempts = config.max_attempts,
        query_limit = ?config.query_limit,
        "configuration loaded"
    );

    let source = connect("source", &settings.source).await?;
    let target = connect("target", &settings.target).await?;

    let orchestrator = MigrationOrchestrator::new(source, target, config);

    if args.plan_only {
        let plan = orchestrator.plan(&args.object).await?;
        print!("{}", plan);
        return Ok(());
    }

    let report = orchestrator.run(&args.object, args.mode.into()).await?;
    println!("{}", render_summary(&report, args.json)?);
    Ok(())
}

/// Migration configuration from the settings file and command-line overrides.
fn migration_config(settings: &Settings, args: &Args) -> MigrationConfig {
    let mut config = settings.migration_config();
    if args.limit.is_some() {
        config = config.with_query_limit(args.limit);
    }
    if let Some(attempts) = args.max_attempts {
        config = config.with_max_attempts(attempts);
    }
    config
}

async fn connect(name: &str, settings: &StoreSettings) -> Result<Arc<dyn Store>, Box<dyn Error>> {
    let store = RestStore::connect(name, settings.store_config(), &settings.credentials())
        .await
        .map_err(|e| format!("cannot log in to the {} store: {}", name, e))?;
    Ok(Arc::new(store))
}

/// Run summary as text, or as JSON with `json`.
fn render_summary(report: &MigrationReport, json: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(report);
    }

    let mut out = String::from("Migration summary:\n");
    for object in report.objects() {
        out.push_str(&format!("  {}\n", object));
    }
    out.push_str(&format!(
        "Total: {} inserted, {} skipped",
        report.total_inserted(),
        report.total_skipped()
    ));
    if let Some(remaining) = report.storage_remaining_mb {
        out.push_str(&format!("\nEstimated storage remaining: {:.2} MB", remaining));
    }
    Ok(out)
}
