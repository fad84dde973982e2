//! Apply engine: submits a batch of changes concurrently and records
//! per-change outcomes. Failures never touch sibling changes.

use crate::backend::{fetch_current_source, BackendClient};
use crate::change::Change;
use crate::error::WriteError;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

/// One failed submission within a batch
#[derive(Debug, Clone)]
pub struct ApplyFailure {
    pub index: usize,
    pub label: String,
    pub error: WriteError,
}

/// Settled outcome of a batch submission. Every change settles:
/// `applied + failed == total` holds after each invocation.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn all_applied(&self) -> bool {
        self.failed == 0
    }
}

/// Submits changes to a backend with I/O fan-out and a full-wait
/// fan-in. No retry, no deduplication: resubmitting an already applied
/// change sends it verbatim again.
pub struct ApplyEngine;

impl ApplyEngine {
    pub fn new() -> Self {
        ApplyEngine
    }

    pub async fn apply_changes<C: BackendClient + ?Sized>(
        &self,
        changes: &mut [Change],
        client: &C,
    ) -> ApplyReport {
        let total = changes.len();
        info!(total, "Applying changes");

        let mut submissions = Vec::with_capacity(total);
        for (index, change) in changes.iter_mut().enumerate() {
            change.begin_apply();
            submissions.push((index, change.kind().clone(), change.to_record()));
        }

        let mut futures = FuturesUnordered::new();
        for (index, kind, record) in submissions {
            futures.push(async move {
                let outcome = client.apply_change(&record).await;
                // The remote text changed on success; refresh it in the
                // same task, best-effort.
                let refreshed = match &outcome {
                    Ok(_) => match fetch_current_source(client, &kind).await {
                        Ok(current) => Some(current),
                        Err(err) => {
                            warn!(
                                change = %record.label,
                                error = %err,
                                "Could not refresh current source after apply"
                            );
                            None
                        }
                    },
                    Err(_) => None,
                };
                (index, outcome, refreshed)
            });
        }

        let mut applied = 0usize;
        let mut failures: Vec<ApplyFailure> = Vec::new();
        while let Some((index, outcome, refreshed)) = futures.next().await {
            match outcome {
                Ok(_) => {
                    applied += 1;
                    changes[index].mark_applied();
                    if let Some(current) = refreshed {
                        changes[index].set_current_source(current);
                    }
                    debug!(change = %changes[index].label, "Change applied");
                }
                Err(error) => {
                    warn!(
                        change = %changes[index].label,
                        error = %error,
                        "Change failed"
                    );
                    failures.push(ApplyFailure {
                        index,
                        label: changes[index].label.clone(),
                        error: error.clone(),
                    });
                    changes[index].mark_failed(error);
                }
            }
        }

        // Report order follows batch order, not completion order.
        failures.sort_by_key(|failure| failure.index);
        let failed = failures.len();
        info!(total, applied, failed, "Apply batch settled");
        ApplyReport {
            total,
            applied,
            failed,
            failures,
        }
    }
}

impl Default for ApplyEngine {
    fn default() -> Self {
        Self::new()
    }
}
