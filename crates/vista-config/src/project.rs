//! Project snapshots
//!
//! A snapshot is the immutable input of one requested build: every module of
//! the project keyed by absolute path, plus the template and entry it should
//! be built with.

use crate::template::TemplateKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single source file of the project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Module {
    /// Absolute path inside the project (always starts with `/`)
    pub path: String,
    /// Source text
    pub code: String,
}

impl Module {
    /// Create a module, normalizing its path
    pub fn new(path: impl AsRef<str>, code: impl Into<String>) -> Self {
        Self {
            path: absolute(path.as_ref()),
            code: code.into(),
        }
    }

    /// Check whether this module is an HTML document
    pub fn is_html(&self) -> bool {
        self.path.ends_with(".html")
    }
}

/// Immutable input of one build request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    /// Project identity; keys the build session and the persistent cache
    pub project_id: String,
    /// Every module of the project, keyed by absolute path
    pub files: BTreeMap<String, Module>,
    /// Template the project is built with
    pub template: TemplateKind,
    /// Entry path requested by the caller (used in module view)
    pub entry: String,
    /// Stylesheets and scripts injected before evaluation
    #[serde(default)]
    pub external_resources: Vec<String>,
}

impl ProjectSnapshot {
    /// Create an empty snapshot for the given project and template
    pub fn new(project_id: impl Into<String>, template: TemplateKind) -> Self {
        Self {
            project_id: project_id.into(),
            files: BTreeMap::new(),
            template,
            entry: String::new(),
            external_resources: Vec::new(),
        }
    }

    /// Add (or replace) a module
    pub fn with_module(mut self, path: impl AsRef<str>, code: impl Into<String>) -> Self {
        let module = Module::new(path, code);
        self.files.insert(module.path.clone(), module);
        self
    }

    /// Set the requested entry path
    pub fn with_entry(mut self, entry: impl AsRef<str>) -> Self {
        self.entry = absolute(entry.as_ref());
        self
    }

    /// Add an external resource URL
    pub fn with_external_resource(mut self, url: impl Into<String>) -> Self {
        self.external_resources.push(url.into());
        self
    }

    /// Look up a module by path (relative paths are made absolute first)
    pub fn module(&self, path: &str) -> Option<&Module> {
        self.files.get(&absolute(path))
    }

    /// Check whether a module exists at the given path
    pub fn contains(&self, path: &str) -> bool {
        self.module(path).is_some()
    }
}

/// Make a project path absolute
///
/// `./src/index.js` and `src/index.js` both become `/src/index.js`.
pub fn absolute(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else if let Some(stripped) = path.strip_prefix("./") {
        format!("/{}", stripped)
    } else {
        format!("/{}", path)
    }
}
