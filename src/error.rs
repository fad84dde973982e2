//! Error types for the change-set management and migration engine.

use crate::change::ChangeRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read-path errors raised while expanding scopes or fetching current state
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ReadError {
    /// Whether the error means the target does not exist, as opposed to
    /// the read itself failing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReadError::PackageNotFound(_)
                | ReadError::ClassNotFound(_)
                | ReadError::MethodNotFound(_)
        )
    }
}

/// Character range into the source text a compilation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInterval {
    pub start: usize,
    pub end: usize,
}

/// One remediation the backend proposes for a compilation error.
///
/// The carried changes are wire records applied verbatim and in order;
/// the backend may suggest shapes the core does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
}

/// Structured compilation failure returned by a backend write.
///
/// `suggestions` is empty when the backend has no remediation to offer;
/// `interval` locates the offending range in the submitted source.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("Compilation failed: {description}")]
pub struct CompilationError {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<SourceInterval>,
}

impl CompilationError {
    pub fn has_suggestions(&self) -> bool {
        !self.suggestions.is_empty()
    }
}

/// Write-path errors raised while applying changes
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("Target missing: {0}")]
    TargetMissing(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl WriteError {
    /// The structured compilation payload, when this failure carries one.
    pub fn compilation(&self) -> Option<&CompilationError> {
        match self {
            WriteError::Compilation(err) => Some(err),
            _ => None,
        }
    }
}

/// Top-level errors for planning and configuration surfaces
#[derive(Debug, Error)]
pub enum GraftError {
    #[error("Read failed: {0}")]
    Read(#[from] ReadError),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Invalid change record: {0}")]
    InvalidRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for GraftError {
    fn from(err: config::ConfigError) -> Self {
        GraftError::Config(err.to_string())
    }
}
