//! Configuration System
//!
//! Hierarchical configuration for change migration: defaults, a
//! user-level file, a workspace file, and environment variables, each
//! layer overriding the previous. Carries the author stamped on
//! generated changes, the named backend environments migrations read
//! from and write to, and HTTP client settings.

use crate::error::GraftError;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use directories::ProjectDirs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraftConfig {
    /// Author stamped on changes generated by this process
    #[serde(default = "default_author")]
    pub author: String,

    /// Named backend environments, keyed by the name call sites use
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One remote environment a backend client can be built against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Base URL of the backend API
    pub url: String,

    /// HTTP basic auth user, when the backend requires one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_author() -> String {
    "unknown".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for GraftConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            environments: HashMap::new(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Author(String),
    Environment(String, String),
    Http(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Author(msg) => {
                write!(f, "Author: {}", msg)
            }
            ValidationError::Environment(name, msg) => {
                write!(f, "Environment '{}': {}", name, msg)
            }
            ValidationError::Http(msg) => {
                write!(f, "Http: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl EnvironmentConfig {
    /// Validate a single environment entry
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        let url = reqwest::Url::parse(&self.url).map_err(|e| format!("Invalid URL: {}", e))?;
        if url.cannot_be_a_base() {
            return Err(format!("URL cannot hold paths: {}", self.url));
        }
        Ok(())
    }
}

impl GraftConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.author.trim().is_empty() {
            errors.push(ValidationError::Author("cannot be empty".to_string()));
        }

        for (name, environment) in &self.environments {
            if let Err(e) = environment.validate() {
                errors.push(ValidationError::Environment(name.clone(), e));
            }
        }

        if self.http.connect_timeout_secs == 0 {
            errors.push(ValidationError::Http(
                "connect_timeout_secs must be positive".to_string(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            errors.push(ValidationError::Http(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Looks up a named environment entry.
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig, GraftError> {
        self.environments
            .get(name)
            .ok_or_else(|| GraftError::Config(format!("Unknown environment '{}'", name)))
    }

    /// Load configuration, merging in precedence order: defaults, the
    /// user-level file, the workspace `graft.toml`, then `GRAFT__*`
    /// environment variables.
    pub fn load(workspace_root: &Path) -> Result<Self, GraftError> {
        let mut builder = builder_with_defaults()?;
        builder = add_user_file(builder);
        builder = add_workspace_file(builder, workspace_root);
        builder = builder.add_source(
            Environment::with_prefix("GRAFT")
                .separator("__")
                .try_parsing(true),
        );
        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load configuration from a single file, on top of defaults only.
    pub fn load_from_file(path: &Path) -> Result<Self, GraftError> {
        let config = builder_with_defaults()?
            .add_source(File::from(path))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Write this configuration as a TOML file, creating parent
    /// directories as needed. Used to scaffold a user-level file.
    pub fn write_template(&self, path: &Path) -> Result<(), GraftError> {
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| GraftError::Config(format!("Failed to render config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraftError::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        std::fs::write(path, rendered).map_err(|e| {
            GraftError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

/// Path to the user-level config file, `~/.config/graft/config.toml`
/// or its platform equivalent.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "graft").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("author", default_author())?
        .set_default("http.connect_timeout_secs", default_connect_timeout())?
        .set_default("http.request_timeout_secs", default_request_timeout())
}

fn add_user_file(mut builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    if let Some(path) = user_config_path() {
        if path.exists() {
            builder = builder.add_source(File::from(path).required(false));
        } else {
            warn!(
                config_path = %path.display(),
                "User configuration file not found. Consider creating it for user-level defaults."
            );
        }
    }
    builder
}

fn add_workspace_file(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> ConfigBuilder<DefaultState> {
    let path = workspace_root.join("graft.toml");
    if path.exists() {
        builder.add_source(File::from(path).required(false))
    } else {
        builder
    }
}

/// Configuration manager for runtime updates
pub struct ConfigManager {
    config: Arc<RwLock<GraftConfig>>,
}

impl ConfigManager {
    /// Create a new configuration manager with the given config
    pub fn new(config: GraftConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Reload configuration from files, keeping the old one on failure
    pub fn reload(&self, workspace_root: &Path) -> Result<(), GraftError> {
        let new_config = GraftConfig::load(workspace_root)?;
        new_config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            GraftError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        *self.config.write() = new_config;
        Ok(())
    }

    /// Get current configuration (read-only)
    pub fn get(&self) -> GraftConfig {
        self.config.read().clone()
    }

    /// Looks up a named environment in the current configuration.
    pub fn environment(&self, name: &str) -> Result<EnvironmentConfig, GraftError> {
        self.config.read().environment(name).cloned()
    }
}
