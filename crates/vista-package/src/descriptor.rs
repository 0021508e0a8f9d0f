//! Project descriptor parsing and types (package.json)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Project descriptor (package.json)
///
/// Only the fields the build cares about are modeled; everything else in the
/// file is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageDescriptor {
    /// Parse descriptor from a JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Interpret an already parsed JSON value
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// Add a runtime dependency
    pub fn with_dependency(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), version.into());
        self
    }

    /// Add a development dependency
    pub fn with_dev_dependency(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.dev_dependencies.insert(name.into(), version.into());
        self
    }

    /// Add a peer dependency
    pub fn with_peer_dependency(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.peer_dependencies.insert(name.into(), version.into());
        self
    }

    /// Version declared for a package in either runtime or dev dependencies
    pub fn declared_version(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.dev_dependencies.get(name))
            .map(String::as_str)
    }
}
