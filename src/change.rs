//! Change model: atomic edits to a remote environment, their identity,
//! lifecycle state, and wire representation.

use crate::error::{GraftError, WriteError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant for the supported change kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    AddClass,
    AddMethod,
    RemoveClass,
    RemoveMethod,
    CommentClass,
    RenameClass,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::AddClass => "AddClass",
            ChangeType::AddMethod => "AddMethod",
            ChangeType::RemoveClass => "RemoveClass",
            ChangeType::RemoveMethod => "RemoveMethod",
            ChangeType::CommentClass => "CommentClass",
            ChangeType::RenameClass => "RenameClass",
        }
    }

    pub fn parse(value: &str) -> Option<ChangeType> {
        match value {
            "AddClass" => Some(ChangeType::AddClass),
            "AddMethod" => Some(ChangeType::AddMethod),
            "RemoveClass" => Some(ChangeType::RemoveClass),
            "RemoveMethod" => Some(ChangeType::RemoveMethod),
            "CommentClass" => Some(ChangeType::CommentClass),
            "RenameClass" => Some(ChangeType::RenameClass),
            _ => None,
        }
    }

    pub fn is_method_level(&self) -> bool {
        matches!(self, ChangeType::AddMethod | ChangeType::RemoveMethod)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic edit, carrying its kind-specific payload.
///
/// The variant is the single dispatch point for wire shape, identity
/// and display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    AddClass {
        class: String,
        definition: String,
    },
    AddMethod {
        class: String,
        selector: String,
        source: String,
    },
    RemoveClass {
        class: String,
    },
    RemoveMethod {
        class: String,
        selector: String,
    },
    CommentClass {
        class: String,
        comment: String,
    },
    RenameClass {
        class: String,
        new_name: String,
    },
}

impl ChangeKind {
    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangeKind::AddClass { .. } => ChangeType::AddClass,
            ChangeKind::AddMethod { .. } => ChangeType::AddMethod,
            ChangeKind::RemoveClass { .. } => ChangeType::RemoveClass,
            ChangeKind::RemoveMethod { .. } => ChangeType::RemoveMethod,
            ChangeKind::CommentClass { .. } => ChangeType::CommentClass,
            ChangeKind::RenameClass { .. } => ChangeType::RenameClass,
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            ChangeKind::AddClass { class, .. }
            | ChangeKind::AddMethod { class, .. }
            | ChangeKind::RemoveClass { class }
            | ChangeKind::RemoveMethod { class, .. }
            | ChangeKind::CommentClass { class, .. }
            | ChangeKind::RenameClass { class, .. } => class,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            ChangeKind::AddMethod { selector, .. }
            | ChangeKind::RemoveMethod { selector, .. } => Some(selector),
            _ => None,
        }
    }

    /// Kind-specific text carried by the change. Remove kinds have none.
    pub fn payload(&self) -> Option<&str> {
        match self {
            ChangeKind::AddClass { definition, .. } => Some(definition),
            ChangeKind::AddMethod { source, .. } => Some(source),
            ChangeKind::CommentClass { comment, .. } => Some(comment),
            ChangeKind::RenameClass { new_name, .. } => Some(new_name),
            ChangeKind::RemoveClass { .. } | ChangeKind::RemoveMethod { .. } => None,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        match self.selector() {
            Some(selector) => IdentityKey::Method {
                kind: self.change_type(),
                class: self.class_name().to_string(),
                selector: selector.to_string(),
            },
            None => IdentityKey::Class {
                kind: self.change_type(),
                class: self.class_name().to_string(),
            },
        }
    }

    /// Display label: `Point` for class-level kinds, `Point>>x:y:`
    /// for method-level kinds.
    pub fn target_label(&self) -> String {
        match self.selector() {
            Some(selector) => format!("{}>>{}", self.class_name(), selector),
            None => self.class_name().to_string(),
        }
    }
}

/// Deduplication identity: kind discriminant plus target. Two changes
/// with equal keys supersede one another in time order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Class {
        kind: ChangeType,
        class: String,
    },
    Method {
        kind: ChangeType,
        class: String,
        selector: String,
    },
}

/// Lifecycle of a change. Written only by the engines that own the
/// corresponding transition.
#[derive(Debug, Clone, Default)]
pub enum ChangeState {
    #[default]
    Pending,
    Applying,
    Applied,
    Failed(WriteError),
}

impl ChangeState {
    pub fn failure(&self) -> Option<&WriteError> {
        match self {
            ChangeState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeState::Pending => f.write_str("pending"),
            ChangeState::Applying => f.write_str("applying"),
            ChangeState::Applied => f.write_str("applied"),
            ChangeState::Failed(_) => f.write_str("failed"),
        }
    }
}

/// Wire form of a change as it crosses the backend boundary.
///
/// Suggestion chains may carry records the core does not model (extra
/// change types, partial fields); records therefore keep `type` as a
/// plain string and every payload field optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub change_type: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, rename = "sourceCode", skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, rename = "newName", skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChangeRecord {
    /// Best-effort source text carried by the record, whatever the kind.
    pub fn carried_source(&self) -> Option<&str> {
        self.source_code
            .as_deref()
            .or(self.definition.as_deref())
            .or(self.comment.as_deref())
    }
}

/// A single tracked edit: immutable identity and payload, engine-owned
/// lifecycle state, and the last known remote source for diff views.
#[derive(Debug, Clone)]
pub struct Change {
    kind: ChangeKind,
    pub author: String,
    pub package: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    state: ChangeState,
    current_source: Option<String>,
}

impl Change {
    pub fn new(kind: ChangeKind, author: impl Into<String>, package: impl Into<String>) -> Self {
        let label = kind.target_label();
        Change {
            kind,
            author: author.into(),
            package: package.into(),
            label,
            timestamp: Utc::now(),
            state: ChangeState::Pending,
            current_source: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> &ChangeKind {
        &self.kind
    }

    pub fn change_type(&self) -> ChangeType {
        self.kind.change_type()
    }

    pub fn identity_key(&self) -> IdentityKey {
        self.kind.identity_key()
    }

    pub fn payload(&self) -> Option<&str> {
        self.kind.payload()
    }

    pub fn state(&self) -> &ChangeState {
        &self.state
    }

    pub fn current_source(&self) -> Option<&str> {
        self.current_source.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ChangeState::Pending)
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.state, ChangeState::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ChangeState::Failed(_))
    }

    pub(crate) fn begin_apply(&mut self) {
        self.state = ChangeState::Applying;
    }

    pub(crate) fn mark_applied(&mut self) {
        self.state = ChangeState::Applied;
    }

    pub(crate) fn mark_failed(&mut self, error: WriteError) {
        self.state = ChangeState::Failed(error);
    }

    pub(crate) fn reset_state(&mut self) {
        self.state = ChangeState::Pending;
    }

    pub(crate) fn set_current_source(&mut self, source: Option<String>) {
        self.current_source = source;
    }

    /// Wire form of this change. The single serialization point.
    pub fn to_record(&self) -> ChangeRecord {
        let (definition, source_code, comment, new_name) = match &self.kind {
            ChangeKind::AddClass { definition, .. } => {
                (Some(definition.clone()), None, None, None)
            }
            ChangeKind::AddMethod { source, .. } => (None, Some(source.clone()), None, None),
            ChangeKind::RemoveClass { .. } | ChangeKind::RemoveMethod { .. } => {
                (None, None, None, None)
            }
            ChangeKind::CommentClass { comment, .. } => (None, None, Some(comment.clone()), None),
            ChangeKind::RenameClass { new_name, .. } => (None, None, None, Some(new_name.clone())),
        };
        ChangeRecord {
            change_type: self.kind.change_type().as_str().to_string(),
            author: self.author.clone(),
            class: self.kind.class_name().to_string(),
            selector: self.kind.selector().map(str::to_string),
            label: self.label.clone(),
            package: self.package.clone(),
            definition,
            source_code,
            comment,
            new_name,
            timestamp: Some(self.timestamp),
        }
    }

    /// Builds a change from a wire record, e.g. when loading a backend's
    /// change log. Rejects records the core does not model.
    pub fn from_record(record: &ChangeRecord) -> Result<Change, GraftError> {
        let change_type = ChangeType::parse(&record.change_type).ok_or_else(|| {
            GraftError::InvalidRecord(format!("unsupported change type: {}", record.change_type))
        })?;
        if record.class.trim().is_empty() {
            return Err(GraftError::InvalidRecord(format!(
                "{} record has no class",
                record.change_type
            )));
        }
        let class = record.class.clone();
        let selector = || {
            record.selector.clone().ok_or_else(|| {
                GraftError::InvalidRecord(format!("{} record has no selector", record.change_type))
            })
        };
        let kind = match change_type {
            ChangeType::AddClass => ChangeKind::AddClass {
                class,
                definition: record.definition.clone().ok_or_else(|| {
                    GraftError::InvalidRecord("AddClass record has no definition".to_string())
                })?,
            },
            ChangeType::AddMethod => ChangeKind::AddMethod {
                class,
                selector: selector()?,
                source: record.source_code.clone().ok_or_else(|| {
                    GraftError::InvalidRecord("AddMethod record has no sourceCode".to_string())
                })?,
            },
            ChangeType::RemoveClass => ChangeKind::RemoveClass { class },
            ChangeType::RemoveMethod => ChangeKind::RemoveMethod {
                class,
                selector: selector()?,
            },
            ChangeType::CommentClass => ChangeKind::CommentClass {
                class,
                comment: record.comment.clone().ok_or_else(|| {
                    GraftError::InvalidRecord("CommentClass record has no comment".to_string())
                })?,
            },
            ChangeType::RenameClass => ChangeKind::RenameClass {
                class,
                new_name: record.new_name.clone().ok_or_else(|| {
                    GraftError::InvalidRecord("RenameClass record has no newName".to_string())
                })?,
            },
        };
        let label = if record.label.trim().is_empty() {
            kind.target_label()
        } else {
            record.label.clone()
        };
        Ok(Change {
            kind,
            author: record.author.clone(),
            package: record.package.clone(),
            label,
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            state: ChangeState::Pending,
            current_source: None,
        })
    }
}
