//! Build session contract
//!
//! A build session owns a project's module graph, its transformation cache
//! and its evaluation environment. The orchestrator drives it through
//! [`BuildSession`]; how transformation and evaluation work is up to the
//! implementation.

use crate::error::BuildResult;
use crate::host::Stage;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use vista_config::{ConfigurationSet, Module, TemplateKind};
use vista_package::InstalledManifest;

/// Serialized session state
pub type SessionSnapshot = Map<String, Value>;

/// Snapshot key holding the transient resolved-path cache
pub const CACHED_PATHS_KEY: &str = "cachedPaths";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluateOptions {
    /// Re-evaluate even when the compiled output is unchanged
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub optimize_for_size: bool,
}

/// Options a session is created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub has_file_resolver: bool,
}

#[async_trait]
pub trait BuildSession: Send + Sync {
    /// Project identity the session was created for
    fn id(&self) -> &str;

    /// Template hooks of this session
    fn preset(&self) -> Arc<dyn Preset>;

    fn set_manifest(&mut self, manifest: &InstalledManifest);

    fn update_configurations(&mut self, configurations: &ConfigurationSet);

    fn set_stage(&mut self, stage: Stage);

    /// Replace the module tree, returning the paths that changed
    async fn update_modules(&mut self, files: &BTreeMap<String, Module>) -> BuildResult<Vec<String>>;

    /// Re-derive every invalidated module
    async fn verify_tree_transpiled(&mut self) -> BuildResult<()>;

    /// Transform the closure of the entry module
    async fn transpile_modules(&mut self, entry: &Module) -> BuildResult<()>;

    /// Execute the entry module, returning its exports if any
    async fn evaluate_module(
        &mut self,
        entry: &Module,
        options: EvaluateOptions,
    ) -> BuildResult<Option<Value>>;

    /// Drop compiled output so the next evaluation starts from source
    fn clear_compiled_cache(&mut self);

    /// Drop volatile caches, keeping the session identity
    fn clear_cache(&mut self);

    fn dispose(&mut self);

    async fn serialize(&self, options: SerializeOptions) -> BuildResult<SessionSnapshot>;

    /// Restore previously serialized state
    async fn load_snapshot(&mut self, snapshot: SessionSnapshot) -> BuildResult<()>;

    /// Test discovery of this session, queried after a successful build
    fn test_finder(&self) -> Arc<dyn TestFinder>;

    /// The session applies hot replacement itself, so the preview is not
    /// reconciled by the orchestrator
    fn handles_hot_reload(&self) -> bool {
        false
    }

    /// Post-evaluation preview helper, when the session provides one
    fn preview_helper(&self) -> Option<Arc<dyn PreviewHelper>> {
        None
    }
}

/// Template hooks run around a build
#[async_trait]
pub trait Preset: Send + Sync {
    fn name(&self) -> &str;

    /// The preview markup is served by the host, not written by the build
    fn html_disabled(&self) -> bool {
        false
    }

    async fn setup(&self, _session: &mut dyn BuildSession) -> BuildResult<()> {
        Ok(())
    }

    async fn pre_evaluate(
        &self,
        _session: &mut dyn BuildSession,
        _changed: &[String],
    ) -> BuildResult<()> {
        Ok(())
    }

    async fn teardown(&self, _session: &mut dyn BuildSession, _changed: &[String]) -> BuildResult<()> {
        Ok(())
    }
}

/// Preset without hooks
#[derive(Debug, Clone)]
pub struct PlainPreset {
    name: String,
    html_disabled: bool,
}

impl PlainPreset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html_disabled: false,
        }
    }

    pub fn for_template(template: TemplateKind) -> Self {
        Self::new(template.name())
    }

    pub fn with_html_disabled(mut self, disabled: bool) -> Self {
        self.html_disabled = disabled;
        self
    }
}

#[async_trait]
impl Preset for PlainPreset {
    fn name(&self) -> &str {
        &self.name
    }

    fn html_disabled(&self) -> bool {
        self.html_disabled
    }
}

/// Interactive helper layered on an evaluated module
#[async_trait]
pub trait PreviewHelper: Send + Sync {
    async fn attach(&self, entry: &Module, evaluated: &Value) -> BuildResult<()>;
}

/// Finds the test modules of a project
///
/// Shared with the delayed test-count report, which runs after the build
/// released the session.
pub trait TestFinder: Send + Sync {
    fn find_tests(&self, files: &BTreeMap<String, Module>) -> usize;
}

/// Creates build sessions
pub trait SessionFactory: Send + Sync {
    fn create(
        &self,
        project_id: &str,
        template: TemplateKind,
        files: &BTreeMap<String, Module>,
        options: SessionOptions,
    ) -> BuildResult<Box<dyn BuildSession>>;
}
