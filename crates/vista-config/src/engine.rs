//! Engine Configuration (vista.toml)
//!
//! Tunables of the orchestration engine itself: where the persistent session
//! cache lives and the timings of the advisory timers.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration from vista.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Persistent session cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Timer settings
    #[serde(default)]
    pub timing: TimingConfig,

    /// Preview surface settings
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Persistent session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Persist sessions between processes (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory (default: platform cache dir + "/vista")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Timer configuration, all values in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Age after which a running marker is treated as abandoned
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    /// Delay before the running marker is cleared after a build
    #[serde(default = "default_deferred_ms")]
    pub lease_release_delay_ms: u64,

    /// Delay before the test count is reported after a successful build
    #[serde(default = "default_deferred_ms")]
    pub test_count_delay_ms: u64,

    /// Polling interval of the resize watcher
    #[serde(default = "default_resize_interval_ms")]
    pub resize_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lease_ttl_ms: default_lease_ttl_ms(),
            lease_release_delay_ms: default_deferred_ms(),
            test_count_delay_ms: default_deferred_ms(),
            resize_interval_ms: default_resize_interval_ms(),
        }
    }
}

impl TimingConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }

    pub fn lease_release_delay(&self) -> Duration {
        Duration::from_millis(self.lease_release_delay_ms)
    }

    pub fn test_count_delay(&self) -> Duration {
        Duration::from_millis(self.test_count_delay_ms)
    }

    pub fn resize_interval(&self) -> Duration {
        Duration::from_millis(self.resize_interval_ms)
    }
}

/// Preview surface configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PreviewConfig {
    /// The preview shell is served by a local server, so the body is always
    /// written even on the first build of an HTML-disabled preset
    #[serde(default)]
    pub local_server: bool,
}

fn default_true() -> bool {
    true
}

fn default_lease_ttl_ms() -> u64 {
    8000
}

fn default_deferred_ms() -> u64 {
    600
}

fn default_resize_interval_ms() -> u64 {
    5000
}

impl EngineConfig {
    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load engine configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timing.lease_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timing.lease_ttl_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.timing.resize_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timing.resize_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(dir) = &self.cache.dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.dir".to_string(),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Effective cache directory
    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache.dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("vista"),
        }
    }
}
