//! Manifest command - print the dependency manifest a project resolves to

use crate::project::load_snapshot;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use vista_config::{parse_configurations, ConfigFileRole, TemplateKind};
use vista_package::{resolve, PackageDescriptor, TemplateRules};

pub struct ManifestArgs {
    /// Project directory
    pub project_dir: PathBuf,
    pub template: TemplateKind,
    /// Print the combination fingerprint alongside the manifest
    pub combination: bool,
}

pub fn run(args: ManifestArgs) -> Result<()> {
    let snapshot = load_snapshot(&args.project_dir, args.template)?;
    let definition = args.template.definition();

    let configurations = parse_configurations(&definition, &snapshot.files);
    configurations.check()?;

    let package = configurations
        .parsed(ConfigFileRole::Package)
        .context("Could not find package.json")?;
    let descriptor = PackageDescriptor::from_value(package).context("Invalid package.json")?;

    let rules = TemplateRules::for_template(&definition);
    let manifest = resolve(&descriptor, &rules, &configurations);
    tracing::debug!("Resolved {} dependencies", manifest.len());

    let output = if args.combination {
        json!({
            "dependencies": manifest,
            "combination": manifest.combination().as_str(),
        })
    } else {
        json!(manifest)
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
