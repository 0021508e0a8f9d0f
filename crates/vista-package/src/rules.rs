//! Per-template dependency rules

use std::collections::{BTreeMap, BTreeSet};
use vista_config::{TemplateDefinition, TemplateKind};

/// Packages every execution environment already ships; never fetched
pub const PREINSTALLED_DEPENDENCIES: &[&str] = &[
    "node-libs-browser",
    "react-scripts",
    "react-scripts-ts",
    "parcel-bundler",
    "babel-plugin-check-es2015-constants",
    "babel-plugin-external-helpers",
    "babel-plugin-inline-replace-variables",
    "babel-plugin-syntax-async-functions",
    "babel-plugin-syntax-async-generators",
    "babel-plugin-syntax-class-constructor-call",
    "babel-plugin-syntax-class-properties",
    "babel-plugin-syntax-decorators",
    "babel-plugin-syntax-do-expressions",
    "babel-plugin-syntax-exponentiation-operator",
    "babel-plugin-syntax-export-extensions",
    "babel-plugin-syntax-flow",
    "babel-plugin-syntax-function-bind",
    "babel-plugin-syntax-function-sent",
    "babel-plugin-syntax-jsx",
    "babel-plugin-syntax-object-rest-spread",
    "babel-plugin-syntax-trailing-function-commas",
    "babel-plugin-transform-async-functions",
    "babel-plugin-transform-async-to-generator",
    "babel-plugin-transform-async-to-module-method",
    "babel-plugin-transform-class-constructor-call",
    "babel-plugin-transform-class-properties",
    "babel-plugin-transform-decorators",
    "babel-plugin-transform-decorators-legacy",
    "babel-plugin-transform-do-expressions",
    "babel-plugin-transform-es2015-arrow-functions",
    "babel-plugin-transform-es2015-block-scoped-functions",
    "babel-plugin-transform-es2015-block-scoping",
    "babel-plugin-transform-es2015-classes",
    "babel-plugin-transform-es2015-computed-properties",
    "babel-plugin-transform-es2015-destructuring",
    "babel-plugin-transform-es2015-duplicate-keys",
    "babel-plugin-transform-es2015-for-of",
    "babel-plugin-transform-es2015-function-name",
    "babel-plugin-transform-es2015-instanceof",
    "babel-plugin-transform-es2015-literals",
    "babel-plugin-transform-es2015-modules-amd",
    "babel-plugin-transform-es2015-modules-commonjs",
    "babel-plugin-transform-es2015-modules-systemjs",
    "babel-plugin-transform-es2015-modules-umd",
    "babel-plugin-transform-es2015-object-super",
    "babel-plugin-transform-es2015-parameters",
    "babel-plugin-transform-es2015-shorthand-properties",
    "babel-plugin-transform-es2015-spread",
    "babel-plugin-transform-es2015-sticky-regex",
    "babel-plugin-transform-es2015-template-literals",
    "babel-plugin-transform-es2015-typeof-symbol",
    "babel-plugin-transform-es2015-unicode-regex",
    "babel-plugin-transform-es3-member-expression-literals",
    "babel-plugin-transform-es3-property-literals",
    "babel-plugin-transform-es5-property-mutators",
    "babel-plugin-transform-eval",
    "babel-plugin-transform-exponentiation-operator",
    "babel-plugin-transform-export-extensions",
    "babel-plugin-transform-flow-comments",
    "babel-plugin-transform-flow-strip-types",
    "babel-plugin-transform-function-bind",
    "babel-plugin-transform-jscript",
    "babel-plugin-transform-object-assign",
    "babel-plugin-transform-object-rest-spread",
    "babel-plugin-transform-object-set-prototype-of-to-assign",
    "babel-plugin-transform-proto-to-assign",
    "babel-plugin-transform-react-constant-elements",
    "babel-plugin-transform-react-display-name",
    "babel-plugin-transform-react-inline-elements",
    "babel-plugin-transform-react-jsx",
    "babel-plugin-transform-react-jsx-compat",
    "babel-plugin-transform-react-jsx-self",
    "babel-plugin-transform-react-jsx-source",
    "babel-plugin-transform-regenerator",
    "babel-plugin-transform-runtime",
    "babel-plugin-transform-strict-mode",
    "babel-plugin-undeclared-variables-check",
    "babel-plugin-dynamic-import-node",
    "babel-plugin-detective",
    "babel-plugin-transform-prevent-infinite-loops",
    "babel-plugin-transform-vue-jsx",
    "flow-bin",
    "babel-preset-env",
    "babel-preset-latest",
    "babel-preset-es2015",
    "babel-preset-es2015-loose",
    "babel-preset-es2016",
    "babel-preset-es2017",
    "babel-preset-react",
    "babel-preset-stage-0",
    "babel-preset-stage-1",
    "babel-preset-stage-2",
    "babel-preset-stage-3",
];

/// What a template changes about dependency resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRules {
    /// Declared runtime packages the template provides its own build of
    pub substituted: BTreeSet<String>,
    /// Packages force-set regardless of what the project declares
    pub replacements: BTreeMap<String, String>,
    /// Packages guaranteed present in the execution environment
    pub preinstalled: Vec<String>,
}

impl TemplateRules {
    /// Rules of a template with the default pre-installed list
    pub fn for_template(template: &TemplateDefinition) -> Self {
        let mut rules = Self {
            substituted: BTreeSet::new(),
            replacements: BTreeMap::new(),
            preinstalled: PREINSTALLED_DEPENDENCIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        if template.kind == TemplateKind::Reason {
            rules.substituted.insert("reason-react".to_string());
            rules
                .replacements
                .insert("@jaredly/bs-core".to_string(), "3.0.0-alpha.2".to_string());
            rules
                .replacements
                .insert("@jaredly/reason-react".to_string(), "0.3.4".to_string());
        }

        rules
    }
}
