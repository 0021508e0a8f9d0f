//! Template definitions
//!
//! A template describes how a family of projects is laid out: which
//! configuration files it reads, where its entry module usually lives and
//! which HTML document hosts the preview.

use crate::configuration::{ConfigFileRole, ConfigurationSet};
use crate::project::absolute;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known project templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    Node,
    CreateReactApp,
    CreateReactAppTypescript,
    VueCli,
    PreactCli,
    Svelte,
    Parcel,
    Reason,
    Static,
}

impl TemplateKind {
    /// Template name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::CreateReactApp => "create-react-app",
            Self::CreateReactAppTypescript => "create-react-app-typescript",
            Self::VueCli => "vue-cli",
            Self::PreactCli => "preact-cli",
            Self::Svelte => "svelte",
            Self::Parcel => "parcel",
            Self::Reason => "reason",
            Self::Static => "static",
        }
    }

    /// All templates
    pub fn all() -> [TemplateKind; 9] {
        [
            Self::Node,
            Self::CreateReactApp,
            Self::CreateReactAppTypescript,
            Self::VueCli,
            Self::PreactCli,
            Self::Svelte,
            Self::Parcel,
            Self::Reason,
            Self::Static,
        ]
    }

    /// Get the full definition for this template
    pub fn definition(&self) -> TemplateDefinition {
        TemplateDefinition::for_kind(*self)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemplateKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownTemplate(s.to_string()))
    }
}

/// A configuration file a template reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationFile {
    pub role: ConfigFileRole,
    pub path: &'static str,
    /// Builds cannot proceed without this file
    pub required: bool,
}

const PACKAGE_FILE: ConfigurationFile = ConfigurationFile {
    role: ConfigFileRole::Package,
    path: "/package.json",
    required: true,
};

const BABEL_FILE: ConfigurationFile = ConfigurationFile {
    role: ConfigFileRole::Babel,
    path: "/.babelrc",
    required: false,
};

const CUSTOM_TEMPLATE_FILE: ConfigurationFile = ConfigurationFile {
    role: ConfigFileRole::CustomTemplate,
    path: "/sandbox.config.json",
    required: false,
};

const DEFAULT_HTML_ENTRIES: &[&str] = &["/public/index.html", "/index.html"];

/// Full description of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDefinition {
    pub kind: TemplateKind,
    configuration_files: Vec<ConfigurationFile>,
    entry_candidates: &'static [&'static str],
    html_entries: &'static [&'static str],
}

impl TemplateDefinition {
    /// Look up the definition of a template
    pub fn for_kind(kind: TemplateKind) -> Self {
        let entry_candidates: &'static [&'static str] = match kind {
            TemplateKind::Node => &["/index.js", "/src/index.js"],
            TemplateKind::CreateReactApp => {
                &["/src/index.js", "/src/index.tsx", "/src/index.ts", "/index.js"]
            }
            TemplateKind::CreateReactAppTypescript => &["/src/index.tsx", "/src/index.ts"],
            TemplateKind::VueCli => &["/src/main.js", "/src/main.ts"],
            TemplateKind::PreactCli => &["/src/index.js", "/index.js"],
            TemplateKind::Svelte => &["/src/main.js", "/index.js"],
            TemplateKind::Parcel => &["/index.html", "/src/index.html", "/index.js"],
            TemplateKind::Reason => &["/src/index.re", "/src/index.js"],
            TemplateKind::Static => &["/index.html"],
        };

        let html_entries: &'static [&'static str] = match kind {
            TemplateKind::Parcel => &["/index.html", "/src/index.html"],
            TemplateKind::Static => &["/index.html"],
            _ => DEFAULT_HTML_ENTRIES,
        };

        let configuration_files = match kind {
            TemplateKind::Static => vec![PACKAGE_FILE, CUSTOM_TEMPLATE_FILE],
            _ => vec![PACKAGE_FILE, BABEL_FILE, CUSTOM_TEMPLATE_FILE],
        };

        Self {
            kind,
            configuration_files,
            entry_candidates,
            html_entries,
        }
    }

    /// Template name
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Configuration files read by this template
    pub fn configuration_files(&self) -> &[ConfigurationFile] {
        &self.configuration_files
    }

    /// Configuration files the project must contain
    pub fn required_files(&self) -> impl Iterator<Item = &ConfigurationFile> {
        self.configuration_files.iter().filter(|file| file.required)
    }

    /// Candidate entry modules, most specific first
    ///
    /// The `main` field of the project descriptor, when present, comes before
    /// the template's conventional locations.
    pub fn entries(&self, configurations: &ConfigurationSet) -> Vec<String> {
        let mut entries = Vec::new();

        if let Some(main) = configurations
            .parsed(ConfigFileRole::Package)
            .and_then(|package| package.get("main"))
            .and_then(|main| main.as_str())
        {
            entries.push(absolute(main));
        }

        for candidate in self.entry_candidates {
            if !entries.iter().any(|e| e == *candidate) {
                entries.push((*candidate).to_string());
            }
        }

        entries
    }

    /// Candidate HTML documents hosting the preview
    pub fn html_entries(&self, _configurations: &ConfigurationSet) -> Vec<String> {
        self.html_entries.iter().map(|e| e.to_string()).collect()
    }

    /// Body markup used when the project has no HTML entry
    pub fn fallback_body(&self) -> &'static str {
        match self.kind {
            TemplateKind::VueCli => r#"<div id="app"></div>"#,
            _ => r#"<div id="root"></div>"#,
        }
    }
}
