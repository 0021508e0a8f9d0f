//! Loading project snapshots from disk

use anyhow::{Context, Result};
use std::path::Path;
use vista_config::{ProjectSnapshot, TemplateKind};
use walkdir::{DirEntry, WalkDir};

/// Directories never treated as project sources
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build"];

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

/// Read every text file under `root` into a snapshot
///
/// Paths become absolute project paths (`/src/index.js`). Files that are not
/// valid UTF-8 are skipped.
pub fn load_snapshot(root: &Path, template: TemplateKind) -> Result<ProjectSnapshot> {
    if !root.is_dir() {
        anyhow::bail!("Project directory not found: {}", root.display());
    }

    let project_id = project_id(root);
    let mut snapshot = ProjectSnapshot::new(project_id, template);

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        let entry = entry.context("Failed to read project directory")?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .context("File outside project directory")?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        match std::fs::read_to_string(entry.path()) {
            Ok(code) => snapshot = snapshot.with_module(&path, code),
            Err(e) => tracing::debug!("Skipping {}: {}", path, e),
        }
    }

    Ok(snapshot)
}

/// Project identity derived from its canonical location
fn project_id(root: &Path) -> String {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    root.to_string_lossy().into_owned()
}
