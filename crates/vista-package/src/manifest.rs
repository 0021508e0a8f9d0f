//! Resolved dependency manifest and its combination fingerprint

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Concrete name -> version-range mapping handed to the registry client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyManifest {
    entries: BTreeMap<String, String>,
}

impl DependencyManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version of a package, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.entries.insert(name.into(), version.into());
    }

    /// Set the version of a package unless it is already present
    pub fn insert_if_absent(&mut self, name: &str, version: &str) {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| version.to_string());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fingerprint of the dependency set
    ///
    /// Two manifests have the same combination exactly when they hold the
    /// same name/version pairs.
    pub fn combination(&self) -> Combination {
        let mut hasher = Sha256::new();
        for (name, version) in &self.entries {
            hasher.update(name.as_bytes());
            hasher.update(b"@");
            hasher.update(version.as_bytes());
            hasher.update(b"\n");
        }
        Combination(format!("{:x}", hasher.finalize()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DependencyManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Set-equality fingerprint of a dependency manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination(String);

impl Combination {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_ignores_insertion_order() {
        let a: DependencyManifest = [("a", "1"), ("b", "2")].into_iter().collect();
        let b: DependencyManifest = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(a.combination(), b.combination());
    }

    #[test]
    fn test_combination_changes_with_version() {
        let a: DependencyManifest = [("a", "1")].into_iter().collect();
        let b: DependencyManifest = [("a", "2")].into_iter().collect();
        assert_ne!(a.combination(), b.combination());
    }

    #[test]
    fn test_combination_is_not_fooled_by_concatenation() {
        let a: DependencyManifest = [("ab", "1")].into_iter().collect();
        let b: DependencyManifest = [("a", "b1")].into_iter().collect();
        assert_ne!(a.combination(), b.combination());
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut manifest = DependencyManifest::new();
        manifest.insert("a", "1");
        manifest.insert_if_absent("a", "2");
        manifest.insert_if_absent("b", "3");
        assert_eq!(manifest.get("a"), Some("1"));
        assert_eq!(manifest.get("b"), Some("3"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let manifest: DependencyManifest = [("a", "1")].into_iter().collect();
        assert_eq!(serde_json::to_string(&manifest).unwrap(), r#"{"a":"1"}"#);
    }
}
