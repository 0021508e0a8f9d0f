//! Transform tooling version detection
//!
//! Decides which runtime-support package a project needs by looking at the
//! shape of its declared dependencies.

use semver::{Op, VersionReq};
use std::collections::BTreeMap;

/// Runtime-support package injected into every manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformRuntime {
    /// `@babel/runtime`, for tooling major version 7 and later
    Modern,
    /// `babel-runtime`, for older tooling
    Legacy,
}

impl TransformRuntime {
    pub fn detect(
        dependencies: &BTreeMap<String, String>,
        dev_dependencies: &BTreeMap<String, String>,
    ) -> Self {
        if is_transform_v7(dependencies, dev_dependencies) {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    pub fn package_name(&self) -> &'static str {
        match self {
            Self::Modern => "@babel/runtime",
            Self::Legacy => "babel-runtime",
        }
    }

    /// The runtime-support package of the other tooling generation
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Modern => Self::Legacy,
            Self::Legacy => Self::Modern,
        }
    }

    /// Version used when the project does not declare one
    pub fn default_version(&self) -> &'static str {
        match self {
            Self::Modern => "7.3.1",
            Self::Legacy => "6.26.0",
        }
    }
}

/// Check whether the project uses transform tooling major version 7+
pub fn is_transform_v7(
    dependencies: &BTreeMap<String, String>,
    dev_dependencies: &BTreeMap<String, String>,
) -> bool {
    if dev_dependencies.contains_key("@vue/cli-plugin-babel") {
        return true;
    }

    if dependencies.contains_key("@babel/core") || dev_dependencies.contains_key("@babel/core") {
        return true;
    }

    let declared = |name: &str| {
        dev_dependencies
            .get(name)
            .or_else(|| dependencies.get(name))
            .map(String::as_str)
    };

    // babel-core@^7.0.0-bridge.0 bridges old imports onto the v7 core
    if let Some(range) = declared("babel-core") {
        if lower_bound_major(range).is_some_and(|major| major >= 7) {
            return true;
        }
    }

    // react-scripts 2 ships v7 tooling; dist-tags like "next" are treated as new
    if let Some(range) = declared("react-scripts") {
        if range.starts_with(|c: char| c.is_ascii_lowercase()) {
            return true;
        }
        if lower_bound_major(range).is_some_and(|major| major >= 2) {
            return true;
        }
    }

    false
}

/// Highest lower bound major version admitted by a range
fn lower_bound_major(range: &str) -> Option<u64> {
    let req = VersionReq::parse(range.trim()).ok()?;

    req.comparators
        .iter()
        .filter(|c| !matches!(c.op, Op::Less | Op::LessEq))
        .map(|c| c.major)
        .max()
}
