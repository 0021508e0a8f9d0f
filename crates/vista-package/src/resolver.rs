//! Dependency manifest resolution
//!
//! `resolve` is a pure function of the project descriptor, the template rules
//! and the parsed configuration files. It is recomputed on every build; only
//! its combination is compared across builds.

use crate::descriptor::PackageDescriptor;
use crate::manifest::DependencyManifest;
use crate::rules::TemplateRules;
use crate::tooling::TransformRuntime;
use vista_config::ConfigurationSet;

/// Marker entry present in every manifest; bumping it invalidates every
/// previously installed combination
pub const CACHE_BUST_KEY: &str = "csbbust";
pub const CACHE_BUST_VERSION: &str = "1.0.0";

/// Superseded package names and their replacements
const DEPENDENCY_ALIASES: &[(&str, &str)] = &[("@vue/cli-plugin-babel", "@vue/babel-preset-app")];

/// Development dependencies that are installed even though dev dependencies
/// normally are not
const ALLOWED_DEV_DEPENDENCIES: &[&str] = &[
    "redux-devtools",
    "redux-devtools-dock-monitor",
    "redux-devtools-log-monitor",
    "redux-logger",
    "enzyme",
    "react-addons-test-utils",
    "react-test-renderer",
    "identity-obj-proxy",
];

/// `@vue/babel-preset-app` 3.7 started emitting native modules; 3.6.0 is the
/// last release that works in the preview environment
const VUE_BABEL_PRESET: &str = "@vue/babel-preset-app";
const VUE_BABEL_PRESET_PIN: &str = "3.6.0";

/// Resolve the dependency manifest of a project
pub fn resolve(
    descriptor: &PackageDescriptor,
    rules: &TemplateRules,
    configurations: &ConfigurationSet,
) -> DependencyManifest {
    let mut manifest: DependencyManifest = descriptor
        .peer_dependencies
        .iter()
        .map(|(name, version)| (name.as_str(), version.as_str()))
        .collect();

    let allowed_dev = allowed_dev_dependencies(configurations);

    for (name, version) in &descriptor.dependencies {
        if rules.substituted.contains(name) {
            continue;
        }
        manifest.insert(alias(name), version.as_str());
    }

    for (name, version) in &descriptor.dev_dependencies {
        let name = alias(name);
        if !allowed_dev.iter().any(|allowed| allowed == name) {
            continue;
        }

        if name == VUE_BABEL_PRESET && version.starts_with("^3") {
            manifest.insert(name, VUE_BABEL_PRESET_PIN);
        } else {
            manifest.insert(name, version.as_str());
        }
    }

    for (name, version) in &rules.replacements {
        manifest.insert(name.as_str(), version.as_str());
    }

    let runtime = TransformRuntime::detect(&descriptor.dependencies, &descriptor.dev_dependencies);
    // Never both generations of the runtime-support package
    manifest.remove(runtime.counterpart().package_name());
    manifest.insert_if_absent(runtime.package_name(), runtime.default_version());

    manifest.insert(CACHE_BUST_KEY, CACHE_BUST_VERSION);

    let preinstalled = match configurations.preinstalled_dependencies() {
        Some(custom) => custom,
        None => rules.preinstalled.clone(),
    };
    for name in &preinstalled {
        manifest.remove(name);
    }

    manifest
}

fn alias(name: &str) -> &str {
    DEPENDENCY_ALIASES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

/// Baseline allow-list extended with every preset and plugin the transform
/// configuration names, in both bare and conventionally prefixed form
fn allowed_dev_dependencies(configurations: &ConfigurationSet) -> Vec<String> {
    let mut allowed: Vec<String> = ALLOWED_DEV_DEPENDENCIES
        .iter()
        .map(|s| s.to_string())
        .collect();

    for preset in configurations.babel_presets() {
        allowed.push(prefixed_name(&preset, "babel-preset-"));
        allowed.push(preset);
    }

    for plugin in configurations.babel_plugins() {
        allowed.push(prefixed_name(&plugin, "babel-plugin-"));
        allowed.push(plugin);
    }

    allowed
}

/// `env` -> `babel-preset-env`, `@scope/env` -> `@scope/babel-preset-env`
fn prefixed_name(name: &str, prefix: &str) -> String {
    if name.starts_with('@') {
        let mut parts = name.splitn(2, '/');
        let scope = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();
        format!("{}/{}{}", scope, prefix, rest)
    } else {
        format!("{}{}", prefix, name)
    }
}
