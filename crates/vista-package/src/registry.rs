//! Registry client contract
//!
//! The registry client turns a resolved manifest into installable artifacts.
//! It may retry or cache internally; the build only sees the final result.

use crate::manifest::DependencyManifest;
use crate::{PackageError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Concrete version that was installed
    pub version: String,
    /// Range the version was resolved from
    pub resolved_from: String,
}

/// Result of installing a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledManifest {
    pub packages: BTreeMap<String, InstalledPackage>,
}

impl InstalledManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an installed package
    pub fn add_package(&mut self, name: impl Into<String>, package: InstalledPackage) {
        self.packages.insert(name.into(), package);
    }

    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.get(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Registry client
#[async_trait]
pub trait Packager: Send + Sync {
    /// Fetch (or look up) the artifacts for every manifest entry
    ///
    /// `disable_preprocessing` asks the registry to skip server-side bundling
    /// of the packages.
    async fn install(
        &self,
        manifest: &DependencyManifest,
        disable_preprocessing: bool,
    ) -> Result<InstalledManifest>;
}

/// Packager that installs without a registry
///
/// Exact versions and simple `^`/`~`/`=` ranges are pinned to the version they
/// name; anything else is recorded as declared. Used for dry runs and offline
/// tooling.
#[derive(Debug, Clone, Default)]
pub struct OfflinePackager;

impl OfflinePackager {
    pub fn new() -> Self {
        Self
    }

    fn pin(range: &str) -> String {
        let trimmed = range.trim_start_matches(['^', '~', '=']).trim();
        match semver::Version::parse(trimmed) {
            Ok(version) => version.to_string(),
            Err(_) => range.to_string(),
        }
    }
}

#[async_trait]
impl Packager for OfflinePackager {
    async fn install(
        &self,
        manifest: &DependencyManifest,
        _disable_preprocessing: bool,
    ) -> Result<InstalledManifest> {
        let mut installed = InstalledManifest::new();

        for (name, range) in manifest.iter() {
            if range.trim().is_empty() {
                return Err(PackageError::InvalidField {
                    field: name.to_string(),
                    reason: "empty version range".to_string(),
                });
            }

            installed.add_package(
                name,
                InstalledPackage {
                    version: Self::pin(range),
                    resolved_from: range.to_string(),
                },
            );
        }

        Ok(installed)
    }
}
