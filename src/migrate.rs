//! Cross-environment code migration.
//!
//! Reads a scope's current definitions from one backend and replays
//! them against another. Generation and application are deliberately
//! separable so callers can review or reduce the changeset in between;
//! `migrate` is the straight-through composition.

use crate::apply::{ApplyEngine, ApplyReport};
use crate::backend::BackendClient;
use crate::changeset::Changeset;
use crate::error::GraftError;
use crate::planner::MigrationPlanner;
use crate::types::Scope;
use tracing::info;

/// Result of a full migration run: the changeset that was transferred
/// and the per-change application report.
#[derive(Debug)]
pub struct MigrationReport {
    pub scope_label: String,
    pub changeset: Changeset,
    pub report: ApplyReport,
}

impl MigrationReport {
    pub fn all_applied(&self) -> bool {
        self.report.all_applied()
    }
}

pub struct CrossBackendMigrator {
    planner: MigrationPlanner,
    engine: ApplyEngine,
}

impl CrossBackendMigrator {
    pub fn new(author: impl Into<String>) -> Self {
        CrossBackendMigrator {
            planner: MigrationPlanner::new(author),
            engine: ApplyEngine::new(),
        }
    }

    /// Expands `scope` against the source environment. A migration is
    /// a literal transfer, so no reduction is applied here; callers
    /// that want compression or filtering run it on the returned set.
    pub async fn generate<S: BackendClient + ?Sized>(
        &self,
        scope: &Scope,
        source: &S,
    ) -> Result<Changeset, GraftError> {
        self.planner.expand_scope(scope, source).await
    }

    /// Writes the changeset to the target environment. Partial success
    /// is the expected shape of the result; nothing is rolled back.
    pub async fn apply<T: BackendClient + ?Sized>(
        &self,
        changeset: &mut Changeset,
        target: &T,
    ) -> ApplyReport {
        self.engine.apply_changes(changeset.changes_mut(), target).await
    }

    /// Reads `scope` from `source` and replays it against `target`.
    pub async fn migrate<S, T>(
        &self,
        scope: &Scope,
        source: &S,
        target: &T,
    ) -> Result<MigrationReport, GraftError>
    where
        S: BackendClient + ?Sized,
        T: BackendClient + ?Sized,
    {
        let scope_label = scope.label();
        info!(scope = %scope_label, "Starting migration");
        let mut changeset = self.generate(scope, source).await?;
        let report = self.apply(&mut changeset, target).await;
        info!(
            scope = %scope_label,
            applied = report.applied,
            failed = report.failed,
            "Migration finished"
        );
        Ok(MigrationReport {
            scope_label,
            changeset,
            report,
        })
    }
}
