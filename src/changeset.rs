//! Ordered change collections and their reductions.
//!
//! A changeset keeps an immutable snapshot of the sequence it was built
//! from; every reduction (compress, filter, reject) narrows the working
//! sequence and can be undone wholesale by restoring the original.

use crate::backend::{fetch_current_source, BackendClient};
use crate::change::{Change, ChangeRecord, ChangeType, IdentityKey};
use crate::error::{GraftError, ReadError};
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Conjunction of optional predicates for narrowing a changeset
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    pub kinds: Option<HashSet<ChangeType>>,
    pub packages: Option<HashSet<String>>,
    pub authors: Option<HashSet<String>>,
    pub target_pattern: Option<Regex>,
}

impl ChangeFilter {
    pub fn matches(&self, change: &Change) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&change.change_type()) {
                return false;
            }
        }
        if let Some(packages) = &self.packages {
            if !packages.contains(&change.package) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.contains(&change.author) {
                return false;
            }
        }
        if let Some(pattern) = &self.target_pattern {
            if !pattern.is_match(&change.label) {
                return false;
            }
        }
        true
    }
}

/// Canonical form for source comparison: NFC, line endings unified,
/// trailing whitespace stripped per line and around the whole text.
pub fn normalize_source(text: &str) -> String {
    let composed: String = text.nfc().collect();
    composed
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn sources_match(payload: Option<&str>, current: Option<&str>) -> bool {
    match (payload, current) {
        (Some(payload), Some(current)) => normalize_source(payload) == normalize_source(current),
        (None, None) => true,
        _ => false,
    }
}

/// Ordered, reducible collection of changes
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<Change>,
    original: Vec<Change>,
}

impl Changeset {
    /// Builds a changeset, snapshotting the sequence as its original.
    pub fn new(changes: Vec<Change>) -> Self {
        let original = changes.clone();
        Changeset { changes, original }
    }

    /// Builds a changeset from wire records, e.g. a backend's change log.
    pub fn from_records(records: &[ChangeRecord]) -> Result<Self, GraftError> {
        let changes = records
            .iter()
            .map(Change::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(changes))
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn changes_mut(&mut self) -> &mut [Change] {
        &mut self.changes
    }

    pub fn original(&self) -> &[Change] {
        &self.original
    }

    pub fn records(&self) -> Vec<ChangeRecord> {
        self.changes.iter().map(Change::to_record).collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Keeps, per identity key, only the chronologically latest change
    /// (later position wins a timestamp tie). Survivors stay in their
    /// original relative order. Returns the number of changes dropped.
    pub fn compress(&mut self) -> usize {
        let mut latest: HashMap<IdentityKey, usize> = HashMap::new();
        for (index, change) in self.changes.iter().enumerate() {
            let key = change.identity_key();
            match latest.get(&key) {
                Some(&kept) if self.changes[kept].timestamp > change.timestamp => {}
                _ => {
                    latest.insert(key, index);
                }
            }
        }
        let survivors: HashSet<usize> = latest.into_values().collect();
        let before = self.changes.len();
        let mut index = 0;
        self.changes.retain(|_| {
            let keep = survivors.contains(&index);
            index += 1;
            keep
        });
        let dropped = before - self.changes.len();
        debug!(before, dropped, "Compressed changeset");
        dropped
    }

    /// Removes changes not matching the filter. Returns the number
    /// removed. The original snapshot is untouched.
    pub fn filter_changes(&mut self, filter: &ChangeFilter) -> usize {
        let before = self.changes.len();
        self.changes.retain(|change| filter.matches(change));
        before - self.changes.len()
    }

    /// Removes every change whose payload already matches the current
    /// remote text for its target. Reads run concurrently; a failed
    /// read leaves its change in place. Returns the number removed.
    pub async fn reject_up_to_date<C: BackendClient + ?Sized>(&mut self, client: &C) -> usize {
        let mut reads = FuturesUnordered::new();
        for (index, change) in self.changes.iter().enumerate() {
            let kind = change.kind().clone();
            reads.push(async move { (index, fetch_current_source(client, &kind).await) });
        }
        let mut up_to_date: HashSet<usize> = HashSet::new();
        while let Some((index, outcome)) = reads.next().await {
            match outcome {
                Ok(current) => {
                    let change = &mut self.changes[index];
                    if sources_match(change.payload(), current.as_deref()) {
                        up_to_date.insert(index);
                    }
                    change.set_current_source(current);
                }
                Err(err) => {
                    warn!(
                        change = %self.changes[index].label,
                        error = %err,
                        "Skipping up-to-date check for unreadable target"
                    );
                }
            }
        }
        let before = self.changes.len();
        let mut index = 0;
        self.changes.retain(|_| {
            let keep = !up_to_date.contains(&index);
            index += 1;
            keep
        });
        before - self.changes.len()
    }

    /// Removes the change at `index`, returning it.
    pub fn reject(&mut self, index: usize) -> Option<Change> {
        if index < self.changes.len() {
            Some(self.changes.remove(index))
        } else {
            None
        }
    }

    /// Resets the working sequence to a copy of the original snapshot.
    /// All lifecycle state goes back to pending.
    pub fn restore_original(&mut self) {
        self.changes = self.original.clone();
        for change in &mut self.changes {
            change.reset_state();
        }
    }

    /// Refreshes every change's last known remote source, concurrently
    /// and best-effort. Returns the number of changes refreshed.
    pub async fn refresh_current_sources<C: BackendClient + ?Sized>(
        &mut self,
        client: &C,
    ) -> usize {
        let mut reads = FuturesUnordered::new();
        for (index, change) in self.changes.iter().enumerate() {
            let kind = change.kind().clone();
            reads.push(async move { (index, fetch_current_source(client, &kind).await) });
        }
        let mut refreshed = 0;
        while let Some((index, outcome)) = reads.next().await {
            match outcome {
                Ok(current) => {
                    self.changes[index].set_current_source(current);
                    refreshed += 1;
                }
                Err(err) => {
                    warn!(
                        change = %self.changes[index].label,
                        error = %err,
                        "Could not refresh current source"
                    );
                }
            }
        }
        refreshed
    }

    /// Renders the working sequence through the backend's changeset
    /// file format.
    pub async fn export<C: BackendClient + ?Sized>(&self, client: &C) -> Result<Vec<u8>, ReadError> {
        client.export_changeset(&self.records()).await
    }
}
