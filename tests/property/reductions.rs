//! Property-based tests for changeset reduction and source normalization

use chrono::{DateTime, Duration, TimeZone, Utc};
use graft::change::{Change, ChangeKind, ChangeType, IdentityKey};
use graft::changeset::{normalize_source, ChangeFilter, Changeset};
use proptest::prelude::*;
use std::collections::HashSet;

const CLASSES: [&str; 3] = ["Point", "Rectangle", "Circle"];
const SELECTORS: [&str; 3] = ["x", "y", "area"];

/// Generates one edit against a small pool of targets, so that
/// generated sequences collide on identity keys often.
fn change_strategy() -> impl Strategy<Value = Change> {
    (0..4usize, 0..3usize, 0..3usize, 0..600i64).prop_map(|(shape, class, selector, offset)| {
        let class = CLASSES[class].to_string();
        let kind = match shape {
            0 => ChangeKind::AddMethod {
                class,
                selector: SELECTORS[selector].to_string(),
                source: format!("{} ^{}", SELECTORS[selector], offset),
            },
            1 => ChangeKind::RemoveMethod {
                class,
                selector: SELECTORS[selector].to_string(),
            },
            2 => ChangeKind::AddClass {
                definition: format!("Object subclass: #{}", class),
                class,
            },
            _ => ChangeKind::CommentClass {
                comment: format!("comment {}", offset),
                class,
            },
        };
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        Change::new(kind, "tester", "Kernel").with_timestamp(base + Duration::seconds(offset))
    })
}

fn changes_strategy() -> impl Strategy<Value = Vec<Change>> {
    proptest::collection::vec(change_strategy(), 0..24)
}

/// A change survives compression iff no other change with the same
/// identity key is strictly later, or as late but further down the list.
fn expected_survivor_indices(changes: &[Change]) -> Vec<usize> {
    (0..changes.len())
        .filter(|&i| {
            !changes.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.identity_key() == changes[i].identity_key()
                    && (other.timestamp > changes[i].timestamp
                        || (other.timestamp == changes[i].timestamp && j > i))
            })
        })
        .collect()
}

fn snapshot(changes: &[Change]) -> Vec<(String, DateTime<Utc>, Option<String>)> {
    changes
        .iter()
        .map(|c| (c.label.clone(), c.timestamp, c.payload().map(str::to_string)))
        .collect()
}

#[test]
fn compress_keeps_the_latest_change_per_target() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&changes_strategy(), |changes| {
            let expected: Vec<(String, DateTime<Utc>, Option<String>)> =
                expected_survivor_indices(&changes)
                    .into_iter()
                    .map(|i| {
                        (
                            changes[i].label.clone(),
                            changes[i].timestamp,
                            changes[i].payload().map(str::to_string),
                        )
                    })
                    .collect();

            let mut changeset = Changeset::new(changes.clone());
            let dropped = changeset.compress();

            assert_eq!(dropped, changes.len() - expected.len());
            assert_eq!(snapshot(changeset.changes()), expected);

            // Exactly one survivor per identity key.
            let keys: HashSet<IdentityKey> = changeset
                .changes()
                .iter()
                .map(Change::identity_key)
                .collect();
            assert_eq!(keys.len(), changeset.len());

            Ok(())
        })
        .unwrap();
}

#[test]
fn compress_is_idempotent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&changes_strategy(), |changes| {
            let mut changeset = Changeset::new(changes);
            changeset.compress();
            let first = snapshot(changeset.changes());

            assert_eq!(changeset.compress(), 0);
            assert_eq!(snapshot(changeset.changes()), first);

            Ok(())
        })
        .unwrap();
}

#[test]
fn reductions_never_touch_the_original_snapshot() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&changes_strategy(), |changes| {
            let before = snapshot(&changes);
            let mut changeset = Changeset::new(changes);

            changeset.compress();
            let methods_only = ChangeFilter {
                kinds: Some(HashSet::from([ChangeType::AddMethod])),
                ..Default::default()
            };
            changeset.filter_changes(&methods_only);

            changeset.restore_original();
            assert_eq!(snapshot(changeset.changes()), before);
            assert!(changeset.changes().iter().all(Change::is_pending));

            Ok(())
        })
        .unwrap();
}

#[test]
fn normalization_is_idempotent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<String>(), |text| {
            let once = normalize_source(&text);
            assert_eq!(normalize_source(&once), once);
            Ok(())
        })
        .unwrap();
}

#[test]
fn normalization_equates_line_ending_styles() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec("[a-z\\t ]{0,8}", 0..6),
            |lines| {
                let lf = lines.join("\n");
                let crlf = lines.join("\r\n");
                assert_eq!(normalize_source(&lf), normalize_source(&crlf));
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn normalization_ignores_trailing_whitespace() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(proptest::collection::vec("[a-z]{0,8}", 0..6), 0..4usize),
            |(lines, pad)| {
                let padded: Vec<String> = lines
                    .iter()
                    .map(|line| format!("{}{}", line, " ".repeat(pad)))
                    .collect();
                assert_eq!(
                    normalize_source(&lines.join("\n")),
                    normalize_source(&padded.join("\n"))
                );
                Ok(())
            },
        )
        .unwrap();
}
