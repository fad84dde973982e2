//! Backend Client Abstraction
//!
//! Unified interface for live code environments reachable over an API.
//! The engines read current definitions and submit changes through this
//! boundary; everything behind it (transport, sessions, authentication)
//! stays out of the core.

use crate::change::{ChangeKind, ChangeRecord};
use crate::error::{ReadError, WriteError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod http;

pub use http::HttpBackend;

/// Package descriptor: declared classes plus a map of class name to
/// declared selectors (extension methods included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default, rename = "methodsByClass", alias = "methods")]
    pub methods_by_class: BTreeMap<String, Vec<String>>,
}

/// Class descriptor as reported by the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(rename = "metaclassName")]
    pub metaclass_name: String,
    #[serde(default)]
    pub package: String,
    pub definition: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Compiled method descriptor as reported by the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub class: String,
    pub selector: String,
    #[serde(default)]
    pub package: String,
    pub source: String,
}

/// Live environment client trait
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Read a package descriptor
    async fn get_package(&self, name: &str) -> Result<PackageDescriptor, ReadError>;

    /// Read a class descriptor
    async fn get_class(&self, name: &str) -> Result<ClassDescriptor, ReadError>;

    /// Read all methods of a class, optionally including the metaclass side
    async fn get_methods(
        &self,
        class: &str,
        include_metaclass: bool,
    ) -> Result<Vec<MethodDescriptor>, ReadError>;

    /// Read a single method
    async fn get_method(&self, class: &str, selector: &str)
        -> Result<MethodDescriptor, ReadError>;

    /// Apply one change. Success echoes the applied record with any
    /// fields the environment filled in (e.g. the compiled selector).
    async fn apply_change(&self, record: &ChangeRecord) -> Result<ChangeRecord, WriteError>;

    /// Render a set of change records into the environment's changeset
    /// file format. The payload is opaque to the core.
    async fn export_changeset(&self, records: &[ChangeRecord]) -> Result<Vec<u8>, ReadError>;
}

/// Fetches the current remote text for a change target: method source
/// for method-level kinds, class definition or comment for class-level
/// kinds. An absent target reads as `None` rather than an error.
pub async fn fetch_current_source<C: BackendClient + ?Sized>(
    client: &C,
    kind: &ChangeKind,
) -> Result<Option<String>, ReadError> {
    let result = match kind {
        ChangeKind::AddMethod { class, selector, .. }
        | ChangeKind::RemoveMethod { class, selector } => client
            .get_method(class, selector)
            .await
            .map(|method| Some(method.source)),
        ChangeKind::CommentClass { class, .. } => {
            client.get_class(class).await.map(|species| species.comment)
        }
        ChangeKind::AddClass { class, .. }
        | ChangeKind::RemoveClass { class }
        | ChangeKind::RenameClass { class, .. } => client
            .get_class(class)
            .await
            .map(|species| Some(species.definition)),
    };
    match result {
        Ok(source) => Ok(source),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
