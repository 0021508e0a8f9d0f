//! Project configuration files
//!
//! Parses the configuration files a template declares (`package.json`,
//! `.babelrc`, `sandbox.config.json`) out of a project's file tree. Parse
//! failures are recorded per file instead of aborting, so the build can report
//! the first offending path.

use crate::project::Module;
use crate::template::TemplateDefinition;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Role a configuration file plays for the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigFileRole {
    /// Project descriptor (`package.json`)
    Package,
    /// Transform configuration (`.babelrc`)
    Babel,
    /// Custom template configuration (`sandbox.config.json`)
    CustomTemplate,
}

impl ConfigFileRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Babel => "babel",
            Self::CustomTemplate => "custom-template",
        }
    }
}

impl fmt::Display for ConfigFileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of parsing one configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConfiguration {
    /// Path of the file inside the project
    pub path: String,
    /// Parsed JSON, or the parser message
    pub result: Result<Value, String>,
}

impl ParsedConfiguration {
    pub fn parsed(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// All configuration files of a project, keyed by role
///
/// Files that are absent from the project have no entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationSet {
    files: BTreeMap<ConfigFileRole, ParsedConfiguration>,
}

impl ConfigurationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parsed configuration file
    pub fn insert(&mut self, role: ConfigFileRole, configuration: ParsedConfiguration) {
        self.files.insert(role, configuration);
    }

    pub fn get(&self, role: ConfigFileRole) -> Option<&ParsedConfiguration> {
        self.files.get(&role)
    }

    /// Parsed value for a role, if the file exists and parsed cleanly
    pub fn parsed(&self, role: ConfigFileRole) -> Option<&Value> {
        self.get(role).and_then(ParsedConfiguration::parsed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigFileRole, &ParsedConfiguration)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Fail with the first configuration file that did not parse
    pub fn check(&self) -> ConfigResult<()> {
        match self
            .files
            .values()
            .find_map(|c| c.error().map(|message| (c.path.as_str(), message)))
        {
            Some((path, message)) => Err(ConfigError::parse(path, message)),
            None => Ok(()),
        }
    }

    /// String presets of the transform configuration, nested arrays flattened
    pub fn babel_presets(&self) -> Vec<String> {
        self.babel_entries("presets")
    }

    /// String plugins of the transform configuration, nested arrays flattened
    pub fn babel_plugins(&self) -> Vec<String> {
        self.babel_entries("plugins")
    }

    fn babel_entries(&self, key: &str) -> Vec<String> {
        let Some(entries) = self
            .parsed(ConfigFileRole::Babel)
            .and_then(|babel| babel.get(key))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        // One level of flattening: `["env", { "loose": true }]` yields "env".
        entries
            .iter()
            .flat_map(|entry| match entry {
                Value::Array(inner) => inner.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect()
    }

    /// Pre-installed package override from the custom template configuration
    ///
    /// `None` means the template default applies; an empty list disables
    /// pre-installation entirely.
    pub fn preinstalled_dependencies(&self) -> Option<Vec<String>> {
        let list = self
            .parsed(ConfigFileRole::CustomTemplate)?
            .get("sandpack")?
            .get("preInstalledDependencies")?
            .as_array()?;

        Some(
            list.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }
}

/// Parse the configuration files declared by a template
///
/// Every declared file present in `files` gets an entry; parse failures are
/// kept as errors on that entry.
pub fn parse_configurations(
    template: &TemplateDefinition,
    files: &BTreeMap<String, Module>,
) -> ConfigurationSet {
    let mut set = ConfigurationSet::new();

    for file in template.configuration_files() {
        let Some(module) = files.get(file.path) else {
            continue;
        };

        let result = serde_json::from_str::<Value>(&module.code).map_err(|e| e.to_string());
        set.insert(
            file.role,
            ParsedConfiguration {
                path: file.path.to_string(),
                result,
            },
        );
    }

    set
}
