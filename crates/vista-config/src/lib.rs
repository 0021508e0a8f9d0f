//! Vista Configuration System
//!
//! Provides the inputs a preview build is driven by:
//! - Project snapshots (file tree, template, entry, external resources)
//! - Template definitions (configuration files, entry candidates, HTML entries)
//! - Configuration-set parsing (`package.json`, `.babelrc`, `sandbox.config.json`)
//! - Engine configuration (`vista.toml`) with environment overrides
//!
//! # Engine configuration precedence
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. `vista.toml` (explicit path, or found by walking up from a directory)
//! 3. Environment variables (`VISTA_*`)
//!
//! # Example
//!
//! ```no_run
//! use vista_config::EngineConfigLoader;
//! use std::path::Path;
//!
//! let loader = EngineConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! assert!(config.timing.lease_ttl_ms > 0);
//! ```

pub mod configuration;
pub mod engine;
pub mod loader;
pub mod project;
pub mod template;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("We weren't able to parse: '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
}

impl ConfigError {
    /// Create a parse error for a project configuration file
    pub fn parse(path: impl Into<String>, message: impl ToString) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use configuration::{
    parse_configurations, ConfigFileRole, ConfigurationSet, ParsedConfiguration,
};
pub use engine::{CacheConfig, EngineConfig, PreviewConfig, TimingConfig};
pub use loader::EngineConfigLoader;
pub use project::{absolute, Module, ProjectSnapshot};
pub use template::{ConfigurationFile, TemplateDefinition, TemplateKind};
