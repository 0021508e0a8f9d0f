/// Build orchestration error types
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use vista_config::ConfigError;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("We weren't able to parse: '{path}': {message}")]
    Configuration { path: String, message: String },

    #[error("{message}")]
    MissingArtifact { path: String, message: String },

    #[error("Could not fetch dependencies: {0}")]
    DependencyResolution(String),

    #[error("Transpilation failed for module '{module}': {message}")]
    Transpile { module: String, message: String },

    #[error("Error while evaluating '{module}': {message}")]
    Evaluation { module: String, message: String },

    #[error("Build session error: {0}")]
    Session(String),

    #[error("Build cache error: {0}")]
    Cache(String),
}

/// Stable category of a build error, reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    MissingArtifact,
    DependencyResolution,
    Transpile,
    Evaluation,
    Session,
    Cache,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::MissingArtifact => "missing-artifact",
            Self::DependencyResolution => "dependency-resolution",
            Self::Transpile => "transpile",
            Self::Evaluation => "evaluation",
            Self::Session => "session",
            Self::Cache => "cache",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BuildError {
    /// Create a configuration error
    pub fn configuration(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Configuration {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing artifact error
    pub fn missing_artifact(path: impl Into<String>, message: impl ToString) -> Self {
        Self::MissingArtifact {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing entry error naming the first candidate
    pub fn missing_entry(candidate: impl Into<String>) -> Self {
        let candidate = candidate.into();
        let message = format!(
            "Could not find entry file: {}. You can specify one in package.json by defining a `main` property.",
            candidate
        );
        Self::MissingArtifact {
            path: candidate,
            message,
        }
    }

    /// Create a transpilation error
    pub fn transpile(module: impl Into<String>, message: impl ToString) -> Self {
        Self::Transpile {
            module: module.into(),
            message: message.to_string(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(module: impl Into<String>, message: impl ToString) -> Self {
        Self::Evaluation {
            module: module.into(),
            message: message.to_string(),
        }
    }

    /// Create a session error
    pub fn session(message: impl ToString) -> Self {
        Self::Session(message.to_string())
    }

    /// Create a cache error
    pub fn cache(message: impl ToString) -> Self {
        Self::Cache(message.to_string())
    }

    /// File the error is about, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Configuration { path, .. } | Self::MissingArtifact { path, .. } => Some(path),
            Self::Transpile { module, .. } | Self::Evaluation { module, .. } => Some(module),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::MissingArtifact { .. } => ErrorKind::MissingArtifact,
            Self::DependencyResolution(_) => ErrorKind::DependencyResolution,
            Self::Transpile { .. } => ErrorKind::Transpile,
            Self::Evaluation { .. } => ErrorKind::Evaluation,
            Self::Session(_) => ErrorKind::Session,
            Self::Cache(_) => ErrorKind::Cache,
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::ParseError { path, message } => Self::Configuration { path, message },
            other => Self::Configuration {
                path: String::new(),
                message: other.to_string(),
            },
        }
    }
}
