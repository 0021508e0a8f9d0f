//! Engine Configuration Loader
//!
//! Loads `vista.toml` and applies environment overrides on top of it.

use crate::engine::EngineConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// File name of the engine configuration
pub const CONFIG_FILE_NAME: &str = "vista.toml";

/// Engine configuration loader
///
/// Precedence, lowest first:
/// 1. Built-in defaults
/// 2. `vista.toml`
/// 3. Environment variables (VISTA_*)
#[derive(Debug)]
pub struct EngineConfigLoader {
    /// Prefix of the environment variables consulted for overrides
    env_prefix: String,
}

impl EngineConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            env_prefix: "VISTA".to_string(),
        }
    }

    /// Use a different environment variable prefix (`<PREFIX>_CACHE_DIR`, ...)
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    fn env_var(&self, key: &str) -> Option<String> {
        env::var(format!("{}_{}", self.env_prefix, key)).ok()
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find vista.toml; falls back to the
    /// defaults when none is found.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<EngineConfig> {
        let config = match Self::find_config_file(start_dir) {
            Some(path) => EngineConfig::load_from_file(&path)?,
            None => EngineConfig::default(),
        };

        self.apply_env_overrides(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, path: &Path) -> ConfigResult<EngineConfig> {
        let config = EngineConfig::load_from_file(path)?;
        self.apply_env_overrides(config)
    }

    /// Defaults plus environment overrides
    pub fn load_default(&self) -> ConfigResult<EngineConfig> {
        self.apply_env_overrides(EngineConfig::default())
    }

    /// Find vista.toml by walking up the directory tree
    pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            current = dir.parent();
        }

        None
    }

    /// Apply environment variable overrides
    ///
    /// Recognized: <PREFIX>_CACHE_DIR, <PREFIX>_CACHE_ENABLED, <PREFIX>_LOCAL_SERVER
    fn apply_env_overrides(&self, mut config: EngineConfig) -> ConfigResult<EngineConfig> {
        if let Some(dir) = self.env_var("CACHE_DIR") {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}_CACHE_DIR", self.env_prefix),
                    reason: "path cannot be empty".to_string(),
                });
            }
            config.cache.dir = Some(PathBuf::from(dir));
        }

        if let Some(enabled) = self.env_var("CACHE_ENABLED") {
            config.cache.enabled = parse_bool(&enabled);
        }

        if let Some(local_server) = self.env_var("LOCAL_SERVER") {
            config.preview.local_server = parse_bool(&local_server);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}
