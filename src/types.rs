//! Core scope types for migration planning.

use crate::error::GraftError;
use serde::{Deserialize, Serialize};

/// Unit of code a migration expands: a package, a class (with its
/// metaclass side), or a single method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "camelCase")]
pub enum Scope {
    Package { name: String },
    Class { name: String },
    Method { class: String, selector: String },
}

impl Scope {
    pub fn package(name: impl Into<String>) -> Self {
        Scope::Package { name: name.into() }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Scope::Class { name: name.into() }
    }

    pub fn method(class: impl Into<String>, selector: impl Into<String>) -> Self {
        Scope::Method {
            class: class.into(),
            selector: selector.into(),
        }
    }

    pub fn validate(&self) -> Result<(), GraftError> {
        match self {
            Scope::Package { name } => {
                if name.trim().is_empty() {
                    return Err(GraftError::InvalidScope(
                        "Package name cannot be empty".to_string(),
                    ));
                }
            }
            Scope::Class { name } => {
                if name.trim().is_empty() {
                    return Err(GraftError::InvalidScope(
                        "Class name cannot be empty".to_string(),
                    ));
                }
            }
            Scope::Method { class, selector } => {
                if class.trim().is_empty() {
                    return Err(GraftError::InvalidScope(
                        "Method scope class cannot be empty".to_string(),
                    ));
                }
                if selector.trim().is_empty() {
                    return Err(GraftError::InvalidScope(
                        "Method scope selector cannot be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Human-readable label used in reports and log events.
    pub fn label(&self) -> String {
        match self {
            Scope::Package { name } => format!("Package {}", name),
            Scope::Class { name } => format!("Class {}", name),
            Scope::Method { class, selector } => format!("Method {}>>{}", class, selector),
        }
    }
}
