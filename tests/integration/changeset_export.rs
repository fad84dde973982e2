//! Integration tests for changeset export and source refresh
//!
//! Tests cover:
//! - Exporting a working sequence through the backend's wire format
//!   and reading the records back
//! - Refreshing every change's last known remote source against a
//!   partially populated target

use super::test_utils::{wire_record, InMemoryBackend};
use graft::change::ChangeRecord;
use graft::changeset::Changeset;

fn mixed_records() -> Vec<ChangeRecord> {
    let mut define = wire_record("AddClass", "Point", None);
    define.definition = Some("Object subclass: #Point".to_string());

    let mut x = wire_record("AddMethod", "Point", Some("x"));
    x.source_code = Some("x\n\t^x".to_string());

    let mut comment = wire_record("CommentClass", "Point", None);
    comment.comment = Some("A 2D point".to_string());

    let mut rename = wire_record("RenameClass", "Point", None);
    rename.new_name = Some("Location".to_string());

    vec![define, x, comment, rename]
}

#[tokio::test]
async fn export_round_trips_the_wire_records() {
    let backend = InMemoryBackend::new();
    let changeset = Changeset::from_records(&mixed_records()).unwrap();

    let bytes = changeset.export(&backend).await.unwrap();
    let decoded: Vec<ChangeRecord> = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(decoded.len(), 4);
    let types: Vec<&str> = decoded.iter().map(|r| r.change_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["AddClass", "AddMethod", "CommentClass", "RenameClass"]
    );
    let labels: Vec<&str> = decoded.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Point", "Point>>x", "Point", "Point"]);
    assert_eq!(decoded[1].source_code.as_deref(), Some("x\n\t^x"));
    assert_eq!(decoded[3].new_name.as_deref(), Some("Location"));
    assert!(decoded.iter().all(|r| r.author == "tester"));
}

#[tokio::test]
async fn refresh_populates_sources_from_the_target() {
    let target = InMemoryBackend::new()
        .with_class("Point", "Kernel")
        .with_method("Point", "x", "Kernel", "x\n\t^1");

    let mut y = wire_record("AddMethod", "Point", Some("y"));
    y.source_code = Some("y\n\t^y".to_string());
    let mut records = mixed_records();
    records.push(y);

    let mut changeset = Changeset::from_records(&records).unwrap();
    let refreshed = changeset.refresh_current_sources(&target).await;
    assert_eq!(refreshed, changeset.len());

    let changes = changeset.changes();
    // Present targets carry their text, absent ones read as None.
    assert_eq!(changes[0].current_source(), Some("Object subclass: #Point"));
    assert_eq!(changes[1].current_source(), Some("x\n\t^1"));
    assert_eq!(changes[2].current_source(), None);
    assert_eq!(changes[4].current_source(), None);
}
