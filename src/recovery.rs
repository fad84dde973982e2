//! Compilation error recovery: applies backend-proposed suggestion
//! chains to resolve a failed change submission.
//!
//! Chains run strictly sequentially because each step depends on the
//! remote side effects of the previous one. A step that fails with
//! another structured error re-enters the same procedure, so recovery
//! nests to arbitrary depth until a chain resolves or a failure has
//! nothing more to offer.

use crate::backend::{BackendClient, MethodDescriptor};
use crate::change::Change;
use crate::error::{CompilationError, WriteError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

/// Collaborator that picks a suggestion. In an interactive shell this
/// is a dialog; headless flows use one of the shipped policies.
#[async_trait]
pub trait SuggestionChooser: Send + Sync {
    /// Returns the index of the chosen suggestion, or `None` to decline.
    async fn choose(&self, error: &CompilationError) -> Option<usize>;
}

/// Accepts the first suggestion, mirroring the dialog default.
pub struct AcceptFirst;

#[async_trait]
impl SuggestionChooser for AcceptFirst {
    async fn choose(&self, error: &CompilationError) -> Option<usize> {
        if error.suggestions.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Declines every suggestion.
pub struct DeclineAll;

#[async_trait]
impl SuggestionChooser for DeclineAll {
    async fn choose(&self, _error: &CompilationError) -> Option<usize> {
        None
    }
}

/// Terminal result of a recovery run
#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    /// A suggestion chain resolved the failure. `artifact` is the last
    /// compiled method refetched along the chain, when there was one.
    Resolved { artifact: Option<MethodDescriptor> },
    /// No chain resolved it. `source` is the text the error's interval
    /// indexes into, carried forward from the step that failed.
    Surfaced {
        error: CompilationError,
        source: Option<String>,
    },
}

impl RecoveryOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, RecoveryOutcome::Resolved { .. })
    }
}

/// Drives the suggestion protocol for one failed change.
pub struct CompilationRecovery<S> {
    chooser: S,
}

impl<S: SuggestionChooser> CompilationRecovery<S> {
    pub fn new(chooser: S) -> Self {
        CompilationRecovery { chooser }
    }

    /// Attempts to resolve `error` for `change`. On resolution the
    /// change is marked applied (resolved via the chain, not retried);
    /// on a terminal failure it is marked failed with the surfaced
    /// error, interval included, for inline annotation.
    pub async fn recover<C: BackendClient + ?Sized>(
        &self,
        change: &mut Change,
        error: CompilationError,
        client: &C,
    ) -> RecoveryOutcome {
        info!(change = %change.label, error = %error.description, "Recovering failed change");
        let class = change.kind().class_name().to_string();
        let carried = change.payload().map(str::to_string);
        let outcome = self.resolve(error, carried, &class, client).await;
        match &outcome {
            RecoveryOutcome::Resolved { artifact } => {
                change.mark_applied();
                if let Some(method) = artifact {
                    change.set_current_source(Some(method.source.clone()));
                }
                info!(change = %change.label, "Suggestion chain resolved the failure");
            }
            RecoveryOutcome::Surfaced { error, .. } => {
                change.mark_failed(WriteError::Compilation(error.clone()));
                warn!(
                    change = %change.label,
                    error = %error.description,
                    "Compilation error surfaced"
                );
            }
        }
        outcome
    }

    fn resolve<'a, C: BackendClient + ?Sized>(
        &'a self,
        error: CompilationError,
        carried_source: Option<String>,
        class: &'a str,
        client: &'a C,
    ) -> BoxFuture<'a, RecoveryOutcome> {
        Box::pin(async move {
            if !error.has_suggestions() {
                return RecoveryOutcome::Surfaced {
                    error,
                    source: carried_source,
                };
            }
            let suggestion = match self.chooser.choose(&error).await {
                Some(index) if index < error.suggestions.len() => &error.suggestions[index],
                _ => {
                    return RecoveryOutcome::Surfaced {
                        error,
                        source: carried_source,
                    };
                }
            };
            debug!(
                suggestion = %suggestion.description,
                steps = suggestion.changes.len(),
                "Applying suggestion chain"
            );

            let mut artifact: Option<MethodDescriptor> = None;
            for record in &suggestion.changes {
                let step_source = record
                    .carried_source()
                    .map(str::to_string)
                    .or_else(|| carried_source.clone());
                match client.apply_change(record).await {
                    Ok(applied) => {
                        // The echo names the compiled selector; refetch
                        // the artifact from the originating class.
                        if let Some(selector) = applied.selector.as_deref() {
                            match client.get_method(class, selector).await {
                                Ok(method) => artifact = Some(method),
                                Err(err) => {
                                    return RecoveryOutcome::Surfaced {
                                        error: CompilationError {
                                            description: format!(
                                                "Could not fetch compiled method {}>>{}: {}",
                                                class, selector, err
                                            ),
                                            suggestions: Vec::new(),
                                            interval: None,
                                        },
                                        source: step_source,
                                    };
                                }
                            }
                        }
                    }
                    Err(WriteError::Compilation(inner)) => {
                        debug!(error = %inner.description, "Chain step failed, recursing");
                        return self.resolve(inner, step_source, class, client).await;
                    }
                    Err(other) => {
                        return RecoveryOutcome::Surfaced {
                            error: CompilationError {
                                description: other.to_string(),
                                suggestions: Vec::new(),
                                interval: None,
                            },
                            source: step_source,
                        };
                    }
                }
            }
            RecoveryOutcome::Resolved { artifact }
        })
    }
}
