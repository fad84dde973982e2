//! Integration tests for compilation-error recovery
//!
//! Tests cover:
//! - A rejected method write recovered by accepting the backend's
//!   suggestion chain, leaving the image and the change in sync
//! - Declining suggestions, which surfaces the error with its interval
//!   and the source text the interval indexes
//! - Resubmitting a change after a declined recovery

use super::test_utils::{wire_record, InMemoryBackend};
use graft::apply::ApplyEngine;
use graft::changeset::Changeset;
use graft::error::{CompilationError, SourceInterval, Suggestion, WriteError};
use graft::recovery::{AcceptFirst, CompilationRecovery, DeclineAll, RecoveryOutcome};

fn undeclared_foo() -> CompilationError {
    let mut redefine = wire_record("AddClass", "Point", None);
    redefine.definition =
        Some("Object subclass: #Point\n\tinstanceVariableNames: 'foo'".to_string());

    let mut recompile = wire_record("AddMethod", "Point", Some("x"));
    recompile.source_code = Some("x\n\t^foo".to_string());

    CompilationError {
        description: "undeclared variable: foo".to_string(),
        suggestions: vec![Suggestion {
            description: "Declare 'foo' as an instance variable".to_string(),
            changes: vec![redefine, recompile],
        }],
        interval: Some(SourceInterval { start: 5, end: 8 }),
    }
}

fn failing_method() -> Changeset {
    let mut record = wire_record("AddMethod", "Point", Some("x"));
    record.source_code = Some("x\r\n\t^foo".to_string());
    Changeset::from_records(&[record]).unwrap()
}

#[tokio::test]
async fn accepted_suggestion_chain_repairs_the_image() {
    let backend = InMemoryBackend::new()
        .with_class("Point", "Kernel")
        .failing_compile("Point>>x", undeclared_foo());

    let mut changeset = failing_method();
    let engine = ApplyEngine::new();
    let report = engine.apply_changes(changeset.changes_mut(), &backend).await;
    assert_eq!(report.failed, 1);

    let change = &mut changeset.changes_mut()[0];
    let error = change
        .state()
        .failure()
        .and_then(WriteError::compilation)
        .cloned()
        .unwrap();

    let recovery = CompilationRecovery::new(AcceptFirst);
    let outcome = recovery.recover(change, error, &backend).await;

    assert!(outcome.is_resolved());
    assert!(change.is_applied());
    assert_eq!(change.current_source(), Some("x\n\t^foo"));
    assert_eq!(
        backend.method_source("Point", "x").as_deref(),
        Some("x\n\t^foo")
    );
    // The chain went through in order after the rejected submission.
    assert_eq!(
        backend.submitted_labels(),
        vec!["Point>>x", "Point", "Point>>x"]
    );

    // The recompiled method matches the change up to line endings, so a
    // fresh up-to-date check drops it.
    assert_eq!(changeset.reject_up_to_date(&backend).await, 1);
    assert!(changeset.is_empty());
}

#[tokio::test]
async fn declined_suggestions_keep_the_change_failed() {
    let backend = InMemoryBackend::new()
        .with_class("Point", "Kernel")
        .failing_compile("Point>>x", undeclared_foo());

    let mut changeset = failing_method();
    let engine = ApplyEngine::new();
    engine.apply_changes(changeset.changes_mut(), &backend).await;

    let change = &mut changeset.changes_mut()[0];
    let error = change
        .state()
        .failure()
        .and_then(WriteError::compilation)
        .cloned()
        .unwrap();

    let recovery = CompilationRecovery::new(DeclineAll);
    let outcome = recovery.recover(change, error, &backend).await;

    // The interval and the text it indexes travel with the outcome.
    match outcome {
        RecoveryOutcome::Surfaced { error, source } => {
            assert_eq!(error.interval, Some(SourceInterval { start: 5, end: 8 }));
            assert_eq!(source.as_deref(), Some("x\r\n\t^foo"));
        }
        RecoveryOutcome::Resolved { .. } => panic!("declined chain must not resolve"),
    }
    assert!(!change.is_applied());
    let stored = change
        .state()
        .failure()
        .and_then(WriteError::compilation)
        .unwrap();
    assert_eq!(stored.interval, Some(SourceInterval { start: 5, end: 8 }));
    // Nothing from the declined chain reached the backend.
    assert_eq!(backend.submission_count(), 1);
}

#[tokio::test]
async fn resubmission_after_declined_recovery_succeeds() {
    // One scripted rejection; the resubmission goes through clean.
    let backend = InMemoryBackend::new()
        .with_class("Point", "Kernel")
        .failing_compile("Point>>x", undeclared_foo());

    let mut changeset = failing_method();
    let engine = ApplyEngine::new();
    engine.apply_changes(changeset.changes_mut(), &backend).await;

    let change = &mut changeset.changes_mut()[0];
    let error = change
        .state()
        .failure()
        .and_then(WriteError::compilation)
        .cloned()
        .unwrap();
    let outcome = CompilationRecovery::new(DeclineAll)
        .recover(change, error, &backend)
        .await;
    assert!(!outcome.is_resolved());

    let report = engine.apply_changes(changeset.changes_mut(), &backend).await;
    assert!(report.all_applied());
    assert_eq!(
        backend.method_source("Point", "x").as_deref(),
        Some("x\r\n\t^foo")
    );
}
