//! Integration tests for cross-environment migration
//!
//! Tests cover:
//! - Package, class, and method scope migration between environments
//! - Plan ordering (class definitions before methods)
//! - Partial failure reporting and verbatim resubmission
//! - Applying hand-built change lists covering every change type

use super::test_utils::{wire_record, InMemoryBackend};
use graft::apply::ApplyEngine;
use graft::changeset::Changeset;
use graft::error::WriteError;
use graft::migrate::CrossBackendMigrator;
use graft::types::Scope;

fn drawing_source() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_class("Point", "Draw")
        .with_class("Rectangle", "Draw")
        .with_method("Point", "x", "Draw", "x\r\n\t^x")
        .with_method("Point", "y", "Draw", "y\r\n\t^y")
        .with_method("Rectangle", "area", "Draw", "area\r\n\t^width * height")
        .with_package("Draw", &["Point", "Rectangle"])
}

#[tokio::test]
async fn package_migration_replicates_the_scope() {
    let source = drawing_source();
    let target = InMemoryBackend::new();
    let migrator = CrossBackendMigrator::new("alice");

    let report = migrator
        .migrate(&Scope::package("Draw"), &source, &target)
        .await
        .unwrap();

    assert!(report.all_applied());
    assert_eq!(report.report.total, 7);

    let labels: Vec<&str> = report
        .changeset
        .changes()
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    assert_eq!(
        labels,
        vec![
            "Point",
            "Point class",
            "Rectangle",
            "Rectangle class",
            "Point>>x",
            "Point>>y",
            "Rectangle>>area",
        ]
    );

    assert!(target.has_class("Point"));
    assert!(target.has_class("Point class"));
    assert!(target.has_class("Rectangle"));
    assert_eq!(
        target.method_source("Point", "x").as_deref(),
        Some("x\r\n\t^x")
    );
    assert_eq!(
        target.method_source("Rectangle", "area").as_deref(),
        Some("area\r\n\t^width * height")
    );

    // Successful writes read the target back, so every change now
    // carries the source the target actually holds.
    for change in report.changeset.changes() {
        assert!(change.is_applied());
        assert!(change.current_source().is_some(), "{}", change.label);
    }
}

#[tokio::test]
async fn class_migration_includes_metaclass_side_methods() {
    let source = InMemoryBackend::new()
        .with_class("Point", "Draw")
        .with_method("Point", "x", "Draw", "x ^x")
        .with_method("Point class", "origin", "Draw", "origin ^self new");
    let target = InMemoryBackend::new();
    let migrator = CrossBackendMigrator::new("alice");

    let report = migrator
        .migrate(&Scope::class("Point"), &source, &target)
        .await
        .unwrap();

    assert!(report.all_applied());
    assert_eq!(
        target.method_source("Point class", "origin").as_deref(),
        Some("origin ^self new")
    );
    assert_eq!(target.method_source("Point", "x").as_deref(), Some("x ^x"));
}

#[tokio::test]
async fn method_migration_transfers_one_definition() {
    let source = drawing_source();
    let target = InMemoryBackend::new().with_class("Point", "Draw");
    let migrator = CrossBackendMigrator::new("alice");

    let report = migrator
        .migrate(&Scope::method("Point", "x"), &source, &target)
        .await
        .unwrap();

    assert!(report.all_applied());
    assert_eq!(report.report.total, 1);
    assert_eq!(
        target.method_source("Point", "x").as_deref(),
        Some("x\r\n\t^x")
    );
    assert!(target.method_source("Point", "y").is_none());
}

#[tokio::test]
async fn partial_failure_leaves_siblings_applied_and_resubmission_recovers() {
    let source = drawing_source();
    let target = InMemoryBackend::new()
        .failing_write("Rectangle>>area", WriteError::Transport("connection reset".to_string()));
    let migrator = CrossBackendMigrator::new("alice");

    let report = migrator
        .migrate(&Scope::package("Draw"), &source, &target)
        .await
        .unwrap();

    assert!(!report.all_applied());
    assert_eq!(report.report.applied, 6);
    assert_eq!(report.report.failed, 1);
    assert_eq!(report.report.failures[0].label, "Rectangle>>area");
    assert!(target.method_source("Point", "x").is_some());
    assert!(target.method_source("Rectangle", "area").is_none());

    // Resubmitting the whole set is verbatim; the scripted failure was
    // consumed, so the second pass settles everything.
    let mut changeset = report.changeset;
    let second = migrator.apply(&mut changeset, &target).await;
    assert!(second.all_applied());
    assert!(target.method_source("Rectangle", "area").is_some());
    assert_eq!(target.submission_count(), 14);
}

#[tokio::test]
async fn hand_built_records_drive_every_change_type() {
    let target = InMemoryBackend::new()
        .with_class("Shape", "Draw")
        .with_method("Shape", "draw", "Draw", "draw ^self")
        .with_method("Shape", "erase", "Draw", "erase ^self");

    let mut add_method = wire_record("AddMethod", "Shape", Some("paint"));
    add_method.source_code = Some("paint ^self draw".to_string());
    let mut comment = wire_record("CommentClass", "Shape", None);
    comment.comment = Some("Abstract superclass of drawable things".to_string());
    let remove_method = wire_record("RemoveMethod", "Shape", Some("erase"));
    let mut rename = wire_record("RenameClass", "Shape", None);
    rename.new_name = Some("Figure".to_string());

    // Changes within one batch race; these depend on one another, so
    // each goes through its own batch, the way a review flow applies
    // what the user picked.
    let engine = ApplyEngine::new();
    for record in [add_method, comment, remove_method, rename] {
        let mut changeset = Changeset::from_records(&[record]).unwrap();
        let report = engine.apply_changes(changeset.changes_mut(), &target).await;
        assert!(report.all_applied());
    }

    assert!(target.has_class("Figure"));
    assert!(!target.has_class("Shape"));
    assert_eq!(
        target.method_source("Figure", "paint").as_deref(),
        Some("paint ^self draw")
    );
    assert!(target.method_source("Figure", "erase").is_none());
    // The rename carries the comment applied two batches earlier.
    assert_eq!(
        target.class_comment("Figure").as_deref(),
        Some("Abstract superclass of drawable things")
    );
}
