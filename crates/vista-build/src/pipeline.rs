//! Compile pipeline
//!
//! One build runs these stages in order, announcing each to the host:
//! install dependencies, prepare the session, transpile, evaluate, teardown,
//! finalize. Stage failures short-circuit into a single error path, and the
//! terminal reporting phase runs for every build.

use crate::cache::{CacheManager, CacheStore};
use crate::controller::SessionController;
use crate::error::{BuildError, BuildResult, ErrorKind};
use crate::host::{ErrorAction, HostEvent, HostSink, Stage};
use crate::lease::{LeaseStatus, LeaseStore, MemoryLeaseStore, RunningLease};
use crate::reconcile::{preview_markup, reconcile, Reconciliation, RenderSurface};
use crate::resize::ResizeWatcher;
use crate::session::{
    BuildSession, EvaluateOptions, SerializeOptions, SessionFactory, SessionOptions,
    CACHED_PATHS_KEY,
};
use crate::state::OrchestratorState;
use crate::task::CompileTask;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use vista_config::{absolute, parse_configurations, ConfigFileRole, EngineConfig};
use vista_package::{resolve, PackageDescriptor, Packager, TemplateRules};

/// Summary of one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// The build reported an error to the host
    pub had_error: bool,
    /// Entry module selected for the build
    pub entry: Option<String>,
    /// The preview head changed and the environment was reloaded
    pub reloaded: bool,
    /// An abandoned running lease was found and evaluation was skipped
    pub resume_prompted: bool,
}

/// How the stages ended when nothing failed outright
enum StagesOutcome {
    Completed { reloaded: bool },
    ResumePrompted,
}

/// Runs builds against the live session
///
/// Owns the session controller and every piece of process-scoped state; the
/// scheduler guarantees only one build runs at a time.
pub struct Compiler {
    config: EngineConfig,
    controller: SessionController,
    packager: Arc<dyn Packager>,
    surface: Arc<dyn RenderSurface>,
    sink: Arc<dyn HostSink>,
    cache: CacheManager,
    lease: RunningLease,
    state: OrchestratorState,
    resize: Option<ResizeWatcher>,
}

impl Compiler {
    /// Create a compiler with default configuration, no persistent cache and
    /// an in-memory lease
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        packager: Arc<dyn Packager>,
        surface: Arc<dyn RenderSurface>,
        sink: Arc<dyn HostSink>,
    ) -> Self {
        let config = EngineConfig::default();
        let lease = RunningLease::new(Arc::new(MemoryLeaseStore::new()), config.timing.lease_ttl());

        Self {
            config,
            controller: SessionController::new(factory),
            packager,
            surface,
            sink,
            cache: CacheManager::disabled(),
            lease,
            state: OrchestratorState::new(),
            resize: None,
        }
    }

    /// Set engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.lease = RunningLease::new(self.lease.store(), config.timing.lease_ttl());
        if !config.cache.enabled {
            self.cache = CacheManager::disabled();
        }
        self.config = config;
        self
    }

    /// Persist sessions in the given store
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = if self.config.cache.enabled {
            CacheManager::new(store)
        } else {
            CacheManager::disabled()
        };
        self
    }

    /// Keep the running marker in the given store
    pub fn with_lease_store(mut self, store: Arc<dyn LeaseStore>) -> Self {
        self.lease = RunningLease::new(store, self.config.timing.lease_ttl());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn is_resize_watcher_running(&self) -> bool {
        self.resize.as_ref().is_some_and(ResizeWatcher::is_running)
    }

    pub fn stop_resize_watcher(&mut self) {
        if let Some(watcher) = self.resize.take() {
            watcher.stop();
        }
    }

    /// Stop background work, clear the running marker and dispose the live
    /// session
    pub fn dispose(&mut self) {
        self.stop_resize_watcher();
        self.lease.release();
        self.controller.dispose();
    }

    /// Run one build to completion
    ///
    /// Never fails: every error is reported to the host, and the host always
    /// sees `status{idle}` and `done` at the end.
    pub async fn compile(&mut self, task: CompileTask) -> BuildReport {
        let started = Instant::now();
        self.sink.dispatch(HostEvent::Start);

        let hot_reload = self
            .controller
            .live()
            .is_some_and(|live| live.session.handles_hot_reload());
        self.surface.reset_overlay(hot_reload || self.state.had_error);

        self.state.had_error = false;
        self.state.actions_enabled = task.flags.has_actions;

        let mut report = BuildReport::default();
        match self.run_stages(&task, &mut report.entry).await {
            Ok(StagesOutcome::Completed { reloaded }) => {
                report.reloaded = reloaded;
                self.finish(&task, report.entry.as_deref()).await;
            }
            Ok(StagesOutcome::ResumePrompted) => {
                tracing::info!("Found an abandoned running marker, waiting for manual resume");
                report.resume_prompted = true;
            }
            Err(error) => self.recover(error).await,
        }

        tracing::debug!("Total time: {}ms", started.elapsed().as_millis());

        self.terminate(report.entry.clone()).await;
        report.had_error = self.state.had_error;
        report
    }

    async fn run_stages(
        &mut self,
        task: &CompileTask,
        entry_out: &mut Option<String>,
    ) -> BuildResult<StagesOutcome> {
        let snapshot = &task.snapshot;
        let flags = task.flags;
        let definition = snapshot.template.definition();

        let configurations = parse_configurations(&definition, &snapshot.files);
        configurations.check()?;

        for file in definition.required_files() {
            if !snapshot.contains(file.path) {
                return Err(BuildError::missing_artifact(
                    file.path,
                    format!("Could not find {}", file.path.trim_start_matches('/')),
                ));
            }
        }

        let descriptor = match configurations.parsed(ConfigFileRole::Package) {
            Some(package) => PackageDescriptor::from_value(package)
                .map_err(|e| BuildError::configuration("/package.json", e))?,
            None => PackageDescriptor::default(),
        };

        // install-dependencies
        self.sink.dispatch(HostEvent::status(Stage::InstallingDependencies));

        let rules = TemplateRules::for_template(&definition);
        let manifest = resolve(&descriptor, &rules, &configurations);
        let installed = self
            .packager
            .install(&manifest, flags.disable_dependency_preprocessing)
            .await
            .map_err(|e| BuildError::DependencyResolution(e.to_string()))?;
        let combination = manifest.combination();

        // session-prepare
        let t = Instant::now();
        self.controller.invalidate_combination(&combination);
        let prepared = self.controller.prepare(
            &snapshot.project_id,
            snapshot.template,
            &snapshot.files,
            SessionOptions {
                has_file_resolver: flags.has_file_resolver,
            },
            &combination,
        )?;

        let first_load = self.state.first_load;
        let live = self
            .controller
            .live_mut()
            .ok_or_else(|| BuildError::session("no live session after prepare"))?;
        let session: &mut dyn BuildSession = live.session.as_mut();

        if first_load && prepared.newly_created {
            self.cache.restore(session).await;
        }
        if prepared.manifest_stale {
            session.set_manifest(&installed);
        }
        session.update_configurations(&configurations);

        let preset = session.preset();
        preset.setup(session).await?;

        let changed = session.update_modules(&snapshot.files).await?;
        self.state.changed_module_count = changed.len();

        let entry_path = if flags.module_view {
            absolute(&snapshot.entry)
        } else {
            let candidates = definition.entries(&configurations);
            match candidates.iter().find(|path| snapshot.contains(path)) {
                Some(path) => path.clone(),
                None => {
                    let first = candidates.first().map_or("/index.js", String::as_str);
                    return Err(BuildError::missing_entry(first));
                }
            }
        };
        let entry = snapshot
            .module(&entry_path)
            .cloned()
            .ok_or_else(|| BuildError::missing_entry(entry_path.as_str()))?;
        *entry_out = Some(entry.path.clone());

        // transpiling
        self.sink.dispatch(HostEvent::status(Stage::Transpiling));
        session.set_stage(Stage::Transpiling);

        session.verify_tree_transpiled().await?;
        session.transpile_modules(&entry).await?;
        tracing::debug!("Transpilation time {}ms", t.elapsed().as_millis());

        // evaluating
        self.sink.dispatch(HostEvent::status(Stage::Evaluating));
        session.set_stage(Stage::Evaluating);

        let mut reloaded = false;

        if !flags.skip_eval {
            self.surface.reset_screen();

            if first_load && self.lease.status() == LeaseStatus::Abandoned {
                self.lease.release();
                self.surface.show_resume_prompt();
                return Ok(StagesOutcome::ResumePrompted);
            }
            self.lease.acquire();

            preset.pre_evaluate(session, &changed).await?;

            if !session.handles_hot_reload() {
                let markup = preview_markup(&definition, &configurations, snapshot);
                let outcome = reconcile(
                    &mut self.state,
                    &markup,
                    preset.html_disabled(),
                    self.config.preview.local_server,
                    self.surface.as_ref(),
                    session,
                );
                reloaded = outcome == Reconciliation::Reloaded;
            }

            if !reloaded {
                let t = Instant::now();
                self.surface
                    .load_external_resources(&snapshot.external_resources)
                    .await?;
                tracing::debug!(
                    "Loaded external resources in {}ms",
                    t.elapsed().as_millis()
                );

                let t = Instant::now();
                let body_before = self.surface.body();
                let value = session
                    .evaluate_module(
                        &entry,
                        EvaluateOptions {
                            force: flags.module_view,
                        },
                    )
                    .await
                    .map_err(|error| match error {
                        error @ BuildError::Evaluation { .. } => error,
                        other => BuildError::evaluation(entry.path.as_str(), other),
                    })?;
                tracing::debug!("Evaluation time: {}ms", t.elapsed().as_millis());
                self.lease.renew();

                let dom_changed = !preset.html_disabled() && body_before != self.surface.body();
                if flags.module_view && !dom_changed && !entry.is_html() {
                    if let (Some(helper), Some(value)) = (session.preview_helper(), value) {
                        if let Err(e) = helper.attach(&entry, &value).await {
                            tracing::warn!("Preview helper failed: {}", e);
                        }
                    }
                }
            }
        }

        preset.teardown(session, &changed).await?;

        if self.resize.is_none() && !preset.html_disabled() {
            self.resize = Some(ResizeWatcher::start(
                Arc::clone(&self.surface),
                Arc::clone(&self.sink),
                self.config.timing.resize_interval(),
            ));
        }

        Ok(StagesOutcome::Completed { reloaded })
    }

    /// Finalize a build whose stages all ran
    async fn finish(&mut self, task: &CompileTask, entry: Option<&str>) {
        let Some(live) = self.controller.live() else {
            return;
        };
        let session = live.session.as_ref();

        if let Err(e) = self
            .cache
            .save(
                session,
                entry,
                self.state.changed_module_count,
                self.state.first_load,
            )
            .await
        {
            tracing::warn!("Could not save session cache: {}", e);
        }

        self.sink.dispatch(HostEvent::Success);

        let finder = session.test_finder();
        let files = task.snapshot.files.clone();
        let sink = Arc::clone(&self.sink);
        let delay = self.config.timing.test_count_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink.dispatch(HostEvent::test_count(finder.find_tests(&files)));
        });
    }

    /// Error path: clear volatile caches, evict a poisoned cache, report
    async fn recover(&mut self, error: BuildError) {
        tracing::error!("Build failed: {}", error);

        if let Some(live) = self.controller.live_mut() {
            live.session.clear_cache();

            if self.state.first_load && self.state.changed_module_count == 0 {
                if let Err(e) = self.cache.evict(&live.project_id).await {
                    tracing::warn!("Could not evict session cache: {}", e);
                }
            }
        }

        self.state.had_error = true;
        self.report_error(&error);
    }

    fn report_error(&self, error: &BuildError) {
        let actions = if self.state.actions_enabled {
            error_actions(error)
        } else {
            Vec::new()
        };

        self.sink.dispatch(HostEvent::Error {
            message: error.to_string(),
            path: error.path().map(str::to_string),
            kind: error.kind(),
            actions,
        });
    }

    /// Terminal phase, run after every build
    async fn terminate(&mut self, entry: Option<String>) {
        self.lease
            .release_after(self.config.timing.lease_release_delay());

        if let Some(live) = self.controller.live() {
            match live
                .session
                .serialize(SerializeOptions {
                    optimize_for_size: false,
                })
                .await
            {
                Ok(mut state) => {
                    state.remove(CACHED_PATHS_KEY);
                    state.insert(
                        "entry".to_string(),
                        entry.map_or(Value::Null, Value::String),
                    );
                    self.sink.dispatch(HostEvent::State {
                        state: Value::Object(state),
                    });
                }
                Err(e) => tracing::warn!("Could not serialize build session: {}", e),
            }
        }

        self.state.first_load = false;

        if let Some(live) = self.controller.live_mut() {
            live.session.set_stage(Stage::Idle);
        }
        self.sink.dispatch(HostEvent::status(Stage::Idle));
        self.sink.dispatch(HostEvent::Done {
            had_error: self.state.had_error,
        });
    }
}

fn error_actions(error: &BuildError) -> Vec<ErrorAction> {
    let Some(path) = error.path().map(str::to_string) else {
        return Vec::new();
    };

    match error.kind() {
        ErrorKind::MissingArtifact => vec![ErrorAction::CreateModule { path }],
        _ => vec![ErrorAction::OpenModule { path }],
    }
}
