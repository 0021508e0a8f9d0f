//! Dry-run build session
//!
//! Tracks the module tree and which modules would need transforming, without
//! transforming or executing anything. JSON modules are parsed, since they
//! load as data. Lets the CLI drive the full pipeline against a project on
//! disk.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use vista_build::{
    BuildError, BuildResult, BuildSession, EvaluateOptions, PlainPreset, Preset,
    SerializeOptions, SessionFactory, SessionOptions, SessionSnapshot, Stage, TestFinder,
};
use vista_config::{ConfigurationSet, Module, TemplateKind};
use vista_package::InstalledManifest;

/// Source extensions a session transforms
const SOURCE_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".vue", ".svelte", ".re"];

fn is_source(path: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_test(path: &str) -> bool {
    is_source(path) && (path.contains(".test.") || path.contains(".spec.") || path.contains("/__tests__/"))
}

pub struct DryRunSession {
    project_id: String,
    template: TemplateKind,
    files: BTreeMap<String, Module>,
    transpiled: BTreeSet<String>,
    dependencies: BTreeMap<String, String>,
    stage: Stage,
}

impl DryRunSession {
    /// Session with an empty module tree; the first update reports every
    /// module unless a snapshot was loaded before it
    pub fn new(project_id: &str, template: TemplateKind) -> Self {
        Self {
            project_id: project_id.to_string(),
            template,
            files: BTreeMap::new(),
            transpiled: BTreeSet::new(),
            dependencies: BTreeMap::new(),
            stage: Stage::Idle,
        }
    }
}

#[async_trait]
impl BuildSession for DryRunSession {
    fn id(&self) -> &str {
        &self.project_id
    }

    fn preset(&self) -> Arc<dyn Preset> {
        Arc::new(PlainPreset::for_template(self.template))
    }

    fn set_manifest(&mut self, manifest: &InstalledManifest) {
        self.dependencies = manifest
            .packages
            .iter()
            .map(|(name, package)| (name.clone(), package.version.clone()))
            .collect();
    }

    fn update_configurations(&mut self, _configurations: &ConfigurationSet) {}

    fn set_stage(&mut self, stage: Stage) {
        tracing::trace!("Session stage: {:?}", stage);
        self.stage = stage;
    }

    async fn update_modules(&mut self, files: &BTreeMap<String, Module>) -> BuildResult<Vec<String>> {
        let mut changed: Vec<String> = files
            .values()
            .filter(|module| self.files.get(&module.path) != Some(*module))
            .map(|module| module.path.clone())
            .collect();
        changed.extend(self.files.keys().filter(|path| !files.contains_key(*path)).cloned());

        for path in &changed {
            self.transpiled.remove(path);
        }
        self.files = files.clone();
        Ok(changed)
    }

    async fn verify_tree_transpiled(&mut self) -> BuildResult<()> {
        let files = &self.files;
        self.transpiled.retain(|path| files.contains_key(path));
        Ok(())
    }

    async fn transpile_modules(&mut self, entry: &Module) -> BuildResult<()> {
        if !self.files.contains_key(&entry.path) {
            return Err(BuildError::transpile(entry.path.as_str(), "module is not part of the project"));
        }

        let pending: Vec<String> = self
            .files
            .keys()
            .filter(|path| (is_source(path) || is_json(path)) && !self.transpiled.contains(*path))
            .cloned()
            .collect();

        for path in pending.iter().filter(|path| is_json(path)) {
            if let Some(module) = self.files.get(path.as_str()) {
                serde_json::from_str::<Value>(&module.code)
                    .map_err(|e| BuildError::transpile(path.as_str(), e))?;
            }
        }
        tracing::debug!("Would transpile {} module(s)", pending.len());
        self.transpiled.extend(pending);
        Ok(())
    }

    async fn evaluate_module(
        &mut self,
        entry: &Module,
        _options: EvaluateOptions,
    ) -> BuildResult<Option<Value>> {
        Ok(Some(json!({
            "entry": entry.path,
            "modules": self.transpiled.len(),
        })))
    }

    fn clear_compiled_cache(&mut self) {
        self.transpiled.clear();
    }

    fn clear_cache(&mut self) {
        self.transpiled.clear();
    }

    fn dispose(&mut self) {
        tracing::debug!("Disposing dry-run session for '{}'", self.project_id);
        self.files.clear();
        self.transpiled.clear();
    }

    async fn serialize(&self, options: SerializeOptions) -> BuildResult<SessionSnapshot> {
        let sources: BTreeMap<&str, &str> = self
            .files
            .values()
            .map(|module| (module.path.as_str(), module.code.as_str()))
            .collect();

        let mut snapshot = SessionSnapshot::new();
        snapshot.insert("transpiled".to_string(), json!(self.transpiled));
        snapshot.insert("modules".to_string(), json!(sources));
        if !options.optimize_for_size {
            snapshot.insert("dependencies".to_string(), json!(self.dependencies));
        }
        Ok(snapshot)
    }

    async fn load_snapshot(&mut self, mut snapshot: SessionSnapshot) -> BuildResult<()> {
        let transpiled = snapshot
            .remove("transpiled")
            .ok_or_else(|| BuildError::cache("snapshot has no transpiled modules"))?;
        let sources: BTreeMap<String, String> = match snapshot.remove("modules") {
            Some(modules) => serde_json::from_value(modules).map_err(BuildError::cache)?,
            None => BTreeMap::new(),
        };

        self.transpiled = serde_json::from_value(transpiled).map_err(BuildError::cache)?;
        self.files = sources
            .into_iter()
            .map(|(path, code)| {
                let module = Module::new(&path, code);
                (module.path.clone(), module)
            })
            .collect();
        Ok(())
    }

    fn test_finder(&self) -> Arc<dyn TestFinder> {
        Arc::new(DryRunTestFinder)
    }
}

fn is_json(path: &str) -> bool {
    path.ends_with(".json")
}

/// Counts test files by naming convention
pub struct DryRunTestFinder;

impl TestFinder for DryRunTestFinder {
    fn find_tests(&self, files: &BTreeMap<String, Module>) -> usize {
        files.keys().filter(|path| is_test(path)).count()
    }
}

pub struct DryRunFactory;

impl SessionFactory for DryRunFactory {
    fn create(
        &self,
        project_id: &str,
        template: TemplateKind,
        _files: &BTreeMap<String, Module>,
        _options: SessionOptions,
    ) -> BuildResult<Box<dyn BuildSession>> {
        Ok(Box::new(DryRunSession::new(project_id, template)))
    }
}
