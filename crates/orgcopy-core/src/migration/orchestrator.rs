//! Run-level driver: planning and the two migration strategies.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, instrument};

use super::budget::StorageBudget;
use super::config::MigrationConfig;
use super::error::MigrationError;
use super::migrator::RecordMigrator;
use super::report::MigrationReport;
use crate::catalog::SchemaIntrospector;
use crate::graph::{
    build_graph, direct_dependencies, remove_cycles, topological_order, DirectDependencyMap,
    Relationship, RelationshipGraph,
};
use crate::store::Store;

/// How records are selected and inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationMode {
    /// Every record of every object, object types in dependency order.
    #[default]
    Bulk,
    /// Each root record with the minimum chain of records it references.
    PerRecord,
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationMode::Bulk => write!(f, "bulk"),
            MigrationMode::PerRecord => write!(f, "per-record"),
        }
    }
}

impl FromStr for MigrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bulk" => Ok(MigrationMode::Bulk),
            "per-record" | "per_record" | "record" => Ok(MigrationMode::PerRecord),
            other => Err(format!("unknown migration mode: {}", other)),
        }
    }
}

/// Everything computed from the schema before any record is touched.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// The root object.
    pub root: String,
    /// Relationship graph as discovered, cycles included.
    pub graph: RelationshipGraph,
    /// Relationships removed to make the graph acyclic.
    pub removed: Vec<Relationship>,
    /// Insertion order for bulk mode.
    pub order: Vec<String>,
    /// Direct dependencies for per-record mode.
    pub dependencies: DirectDependencyMap,
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Root: {}", self.root)?;
        writeln!(f, "Insertion order:")?;
        for (i, object) in self.order.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, object)?;
        }
        if !self.removed.is_empty() {
            writeln!(f, "Relationships removed to break cycles:")?;
            for relationship in &self.removed {
                writeln!(f, "  {}", relationship)?;
            }
        }
        writeln!(f, "Direct dependencies:")?;
        for (object, dependencies) in self.dependencies.iter() {
            for dependency in dependencies {
                writeln!(f, "  {}.{} -> {}", object, dependency.field, dependency.object)?;
            }
        }
        Ok(())
    }
}

/// Drives schema introspection, planning and record migration for a run.
///
/// One orchestrator owns the schema cache for its run; build a new one per
/// run rather than sharing caches between runs.
pub struct MigrationOrchestrator {
    source: Arc<dyn Store>,
    target: Arc<dyn Store>,
    introspector: Arc<SchemaIntrospector>,
    config: MigrationConfig,
}

impl MigrationOrchestrator {
    /// Create an orchestrator for two authenticated stores.
    pub fn new(source: Arc<dyn Store>, target: Arc<dyn Store>, config: MigrationConfig) -> Self {
        let introspector = Arc::new(SchemaIntrospector::new(config.exclusions.clone()));
        Self {
            source,
            target,
            introspector,
            config,
        }
    }

    /// The schema introspector of this run.
    pub fn introspector(&self) -> &Arc<SchemaIntrospector> {
        &self.introspector
    }

    /// Build the relationship graph of `root` and both plans derived from it.
    #[instrument(skip(self))]
    pub async fn plan(&self, root: &str) -> Result<MigrationPlan, MigrationError> {
        let graph = build_graph(&self.introspector, &*self.source, root).await?;
        info!(
            objects = graph.object_count(),
            relationships = graph.relationship_count(),
            "built relationship graph"
        );

        let dependencies = direct_dependencies(&graph, root);
        let mut acyclic = graph.clone();
        let removed = remove_cycles(&mut acyclic);
        let order = topological_order(&acyclic)?;

        Ok(MigrationPlan {
            root: root.to_string(),
            graph,
            removed,
            order,
            dependencies,
        })
    }

    async fn migrator(&self) -> RecordMigrator {
        let budget = StorageBudget::from_store(&*self.target, self.config.record_size_kb).await;
        RecordMigrator::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            Arc::clone(&self.introspector),
            Arc::new(budget),
            self.config.clone(),
        )
    }

    /// Migrate every record of each object, in the given order.
    ///
    /// An object that fails at object level is recorded in the report and the
    /// run moves on to the next object.
    pub async fn run_bulk(&self, objects: &[String]) -> MigrationReport {
        let migrator = self.migrator().await;
        for object in objects {
            if let Err(e) = migrator.migrate_object(object).await {
                error!(object = %object, error = %e, "object migration aborted");
                migrator.fail_object(object, &e);
            }
        }
        migrator.report()
    }

    /// Migrate each record of `root` with its dependency chain.
    pub async fn run_per_record(
        &self,
        root: &str,
        dependencies: &DirectDependencyMap,
    ) -> MigrationReport {
        let migrator = self.migrator().await;
        if let Err(e) = migrator.migrate_root_records(root, dependencies).await {
            error!(object = root, error = %e, "object migration aborted");
            migrator.fail_object(root, &e);
        }
        migrator.report()
    }

    /// Plan from `root` and migrate with the chosen strategy.
    ///
    /// Fails only when planning fails; object and record failures are in the
    /// report.
    pub async fn run(
        &self,
        root: &str,
        mode: MigrationMode,
    ) -> Result<MigrationReport, MigrationError> {
        let plan = self.plan(root).await?;
        info!(root, mode = %mode, order = ?plan.order, "starting migration");

        let report = match mode {
            MigrationMode::Bulk => self.run_bulk(&plan.order).await,
            MigrationMode::PerRecord => self.run_per_record(root, &plan.dependencies).await,
        };
        for object in report.objects() {
            info!(summary = %object, "object done");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("bulk".parse::<MigrationMode>().unwrap(), MigrationMode::Bulk);
        assert_eq!(
            "Per-Record".parse::<MigrationMode>().unwrap(),
            MigrationMode::PerRecord
        );
        assert!("sync".parse::<MigrationMode>().is_err());
        assert_eq!(MigrationMode::PerRecord.to_string(), "per-record");
    }
}
