//! Shared test fixtures
//!
//! A scripted build session that records every call into a journal shared by
//! all sessions of a factory, plus packager and cache store doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Semaphore;
use vista_build::*;
use vista_config::{ConfigurationSet, Module};
use vista_package::{DependencyManifest, PackageError};

pub use pretty_assertions::{assert_eq, assert_ne};

/// Something a session or preset was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { instance: usize, project: String },
    SetManifest(usize),
    UpdateConfigurations(usize),
    UpdateModules(usize),
    VerifyTree(usize),
    Transpile { instance: usize, entry: String },
    Evaluate { instance: usize, entry: String, force: bool },
    ClearCompiledCache(usize),
    ClearCache(usize),
    Dispose(usize),
    LoadSnapshot(usize),
    Setup(usize),
    PreEvaluate(usize),
    Teardown { instance: usize, changed: Vec<String> },
    HelperAttached(String),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// How sessions behave; shared so tests can change it between builds
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub fail_transpile: Option<String>,
    pub fail_evaluate: Option<String>,
    /// Report no changed modules regardless of the files
    pub report_unchanged: bool,
    pub hot_reload: bool,
    pub html_disabled: bool,
    /// Body markup written by evaluation
    pub evaluation_writes: Option<String>,
    pub with_helper: bool,
    pub tests_found: usize,
    /// Evaluation panics instead of returning
    pub panic_on_evaluate: bool,
    /// Evaluation waits for a permit
    pub gate: Option<Arc<Semaphore>>,
}

pub type SharedBehavior = Arc<Mutex<Behavior>>;

pub struct FakePreset {
    instance: usize,
    journal: Journal,
    html_disabled: bool,
}

#[async_trait]
impl Preset for FakePreset {
    fn name(&self) -> &str {
        "fake"
    }

    fn html_disabled(&self) -> bool {
        self.html_disabled
    }

    async fn setup(&self, _session: &mut dyn BuildSession) -> BuildResult<()> {
        self.journal.push(Call::Setup(self.instance));
        Ok(())
    }

    async fn pre_evaluate(&self, _session: &mut dyn BuildSession, _changed: &[String]) -> BuildResult<()> {
        self.journal.push(Call::PreEvaluate(self.instance));
        Ok(())
    }

    async fn teardown(&self, _session: &mut dyn BuildSession, changed: &[String]) -> BuildResult<()> {
        self.journal.push(Call::Teardown {
            instance: self.instance,
            changed: changed.to_vec(),
        });
        Ok(())
    }
}

pub struct FakeHelper {
    journal: Journal,
}

#[async_trait]
impl PreviewHelper for FakeHelper {
    async fn attach(&self, entry: &Module, _evaluated: &Value) -> BuildResult<()> {
        self.journal.push(Call::HelperAttached(entry.path.clone()));
        Err(BuildError::session("helper exploded"))
    }
}

pub struct FakeSession {
    instance: usize,
    project_id: String,
    journal: Journal,
    behavior: SharedBehavior,
    surface: Arc<HeadlessSurface>,
    files: BTreeMap<String, Module>,
    restored: Option<SessionSnapshot>,
}

#[async_trait]
impl BuildSession for FakeSession {
    fn id(&self) -> &str {
        &self.project_id
    }

    fn preset(&self) -> Arc<dyn Preset> {
        Arc::new(FakePreset {
            instance: self.instance,
            journal: self.journal.clone(),
            html_disabled: self.behavior.lock().unwrap().html_disabled,
        })
    }

    fn set_manifest(&mut self, _manifest: &InstalledManifest) {
        self.journal.push(Call::SetManifest(self.instance));
    }

    fn update_configurations(&mut self, _configurations: &ConfigurationSet) {
        self.journal.push(Call::UpdateConfigurations(self.instance));
    }

    fn set_stage(&mut self, _stage: Stage) {}

    async fn update_modules(&mut self, files: &BTreeMap<String, Module>) -> BuildResult<Vec<String>> {
        self.journal.push(Call::UpdateModules(self.instance));

        let mut changed: Vec<String> = files
            .values()
            .filter(|m| self.files.get(&m.path) != Some(*m))
            .map(|m| m.path.clone())
            .collect();
        changed.extend(self.files.keys().filter(|p| !files.contains_key(*p)).cloned());
        self.files = files.clone();

        if self.behavior.lock().unwrap().report_unchanged {
            changed.clear();
        }
        Ok(changed)
    }

    async fn verify_tree_transpiled(&mut self) -> BuildResult<()> {
        self.journal.push(Call::VerifyTree(self.instance));
        Ok(())
    }

    async fn transpile_modules(&mut self, entry: &Module) -> BuildResult<()> {
        self.journal.push(Call::Transpile {
            instance: self.instance,
            entry: entry.path.clone(),
        });
        match self.behavior.lock().unwrap().fail_transpile.clone() {
            Some(message) => Err(BuildError::transpile(entry.path.as_str(), message)),
            None => Ok(()),
        }
    }

    async fn evaluate_module(
        &mut self,
        entry: &Module,
        options: EvaluateOptions,
    ) -> BuildResult<Option<Value>> {
        self.journal.push(Call::Evaluate {
            instance: self.instance,
            entry: entry.path.clone(),
            force: options.force,
        });

        let behavior = self.behavior.lock().unwrap().clone();
        if let Some(gate) = behavior.gate {
            gate.acquire().await.unwrap().forget();
        }
        if behavior.panic_on_evaluate {
            panic!("evaluation panicked");
        }
        if let Some(message) = behavior.fail_evaluate {
            return Err(BuildError::evaluation(entry.path.as_str(), message));
        }
        if let Some(body) = behavior.evaluation_writes {
            self.surface.set_body(&body);
        }
        Ok(Some(json!({ "default": entry.path })))
    }

    fn clear_compiled_cache(&mut self) {
        self.journal.push(Call::ClearCompiledCache(self.instance));
    }

    fn clear_cache(&mut self) {
        self.journal.push(Call::ClearCache(self.instance));
    }

    fn dispose(&mut self) {
        self.journal.push(Call::Dispose(self.instance));
    }

    async fn serialize(&self, options: SerializeOptions) -> BuildResult<SessionSnapshot> {
        let mut snapshot = SessionSnapshot::new();
        snapshot.insert("instance".to_string(), json!(self.instance));
        snapshot.insert("modules".to_string(), json!(self.files.keys().collect::<Vec<_>>()));
        snapshot.insert("optimized".to_string(), json!(options.optimize_for_size));
        snapshot.insert("cachedPaths".to_string(), json!({ "/index.js": {} }));
        Ok(snapshot)
    }

    async fn load_snapshot(&mut self, snapshot: SessionSnapshot) -> BuildResult<()> {
        self.journal.push(Call::LoadSnapshot(self.instance));
        self.restored = Some(snapshot);
        Ok(())
    }

    fn test_finder(&self) -> Arc<dyn TestFinder> {
        Arc::new(FakeTestFinder {
            behavior: Arc::clone(&self.behavior),
        })
    }

    fn handles_hot_reload(&self) -> bool {
        self.behavior.lock().unwrap().hot_reload
    }

    fn preview_helper(&self) -> Option<Arc<dyn PreviewHelper>> {
        if self.behavior.lock().unwrap().with_helper {
            Some(Arc::new(FakeHelper {
                journal: self.journal.clone(),
            }))
        } else {
            None
        }
    }
}

/// Reports whatever test count the behavior holds when asked
pub struct FakeTestFinder {
    behavior: SharedBehavior,
}

impl TestFinder for FakeTestFinder {
    fn find_tests(&self, _files: &BTreeMap<String, Module>) -> usize {
        self.behavior.lock().unwrap().tests_found
    }
}

pub struct FakeFactory {
    journal: Journal,
    behavior: SharedBehavior,
    surface: Arc<HeadlessSurface>,
    created: AtomicUsize,
}

impl SessionFactory for FakeFactory {
    fn create(
        &self,
        project_id: &str,
        _template: TemplateKind,
        _files: &BTreeMap<String, Module>,
        _options: SessionOptions,
    ) -> BuildResult<Box<dyn BuildSession>> {
        let instance = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.push(Call::Create {
            instance,
            project: project_id.to_string(),
        });

        Ok(Box::new(FakeSession {
            instance,
            project_id: project_id.to_string(),
            journal: self.journal.clone(),
            behavior: Arc::clone(&self.behavior),
            surface: Arc::clone(&self.surface),
            files: BTreeMap::new(),
            restored: None,
        }))
    }
}

/// Packager recording every manifest it is asked to install
#[derive(Default)]
pub struct RecordingPackager {
    manifests: Mutex<Vec<DependencyManifest>>,
    pub fail: Mutex<bool>,
}

impl RecordingPackager {
    pub fn manifests(&self) -> Vec<DependencyManifest> {
        self.manifests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<DependencyManifest> {
        self.manifests().last().cloned()
    }
}

#[async_trait]
impl Packager for RecordingPackager {
    async fn install(
        &self,
        manifest: &DependencyManifest,
        disable_preprocessing: bool,
    ) -> vista_package::Result<InstalledManifest> {
        self.manifests.lock().unwrap().push(manifest.clone());
        if *self.fail.lock().unwrap() {
            return Err(PackageError::RegistryError("registry unavailable".to_string()));
        }
        OfflinePackager::new()
            .install(manifest, disable_preprocessing)
            .await
    }
}

/// Cache store counting deletions
#[derive(Default)]
pub struct CountingCacheStore {
    pub inner: MemoryCacheStore,
    deletes: AtomicUsize,
}

impl CountingCacheStore {
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingCacheStore {
    async fn load(&self, project_id: &str) -> BuildResult<Option<CacheEntry>> {
        self.inner.load(project_id).await
    }

    async fn store(&self, entry: &CacheEntry) -> BuildResult<()> {
        self.inner.store(entry).await
    }

    async fn delete(&self, project_id: &str) -> BuildResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(project_id).await
    }
}

/// Everything a test needs to drive and observe a compiler
pub struct Fixture {
    pub journal: Journal,
    pub behavior: SharedBehavior,
    pub surface: Arc<HeadlessSurface>,
    pub packager: Arc<RecordingPackager>,
    pub cache: Arc<CountingCacheStore>,
    pub lease: Arc<MemoryLeaseStore>,
    pub events: UnboundedReceiver<HostEvent>,
}

impl Fixture {
    /// Build a compiler wired to fresh doubles
    pub fn compiler() -> (Compiler, Fixture) {
        Self::compiler_with_lease(MemoryLeaseStore::new())
    }

    pub fn compiler_with_lease(lease: MemoryLeaseStore) -> (Compiler, Fixture) {
        let journal = Journal::default();
        let behavior = SharedBehavior::default();
        let surface = Arc::new(HeadlessSurface::new());
        let packager = Arc::new(RecordingPackager::default());
        let cache = Arc::new(CountingCacheStore::default());
        let lease = Arc::new(lease);
        let (sink, events) = ChannelSink::new();

        let factory = FakeFactory {
            journal: journal.clone(),
            behavior: Arc::clone(&behavior),
            surface: Arc::clone(&surface),
            created: AtomicUsize::new(0),
        };

        let compiler = Compiler::new(
            Arc::new(factory),
            packager.clone(),
            surface.clone(),
            Arc::new(sink),
        )
        .with_cache_store(cache.clone())
        .with_lease_store(lease.clone());

        let fixture = Fixture {
            journal,
            behavior,
            surface,
            packager,
            cache,
            lease,
            events,
        };
        (compiler, fixture)
    }

    pub fn behave(&self, change: impl FnOnce(&mut Behavior)) {
        change(&mut self.behavior.lock().unwrap());
    }

    /// Events emitted so far
    pub fn drain(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// The `node` project used throughout the tests
pub fn node_project(project_id: &str) -> ProjectSnapshot {
    ProjectSnapshot::new(project_id, TemplateKind::Node)
        .with_module("/package.json", r#"{ "dependencies": { "left-pad": "^1.0.0" } }"#)
        .with_module("/index.js", "module.exports = 1")
        .with_entry("/index.js")
}

pub fn task(snapshot: ProjectSnapshot) -> CompileTask {
    CompileTask::new(snapshot)
}

/// Event types in order, for compact sequence assertions
pub fn kinds(events: &[HostEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            HostEvent::Status { status } => format!("status:{}", serde_json::to_value(status).unwrap().as_str().unwrap()),
            other => serde_json::to_value(other).unwrap()["type"]
                .as_str()
                .unwrap()
                .to_string(),
        })
        .collect()
}
