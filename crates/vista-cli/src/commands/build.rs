//! Build command - drive a dry-run build and stream host events as JSON lines

use crate::project::load_snapshot;
use crate::session::DryRunFactory;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use vista_build::{
    CompileFlags, CompileTask, Compiler, FsCacheStore, FsLeaseStore, HeadlessSurface,
    JsonLinesSink, Scheduler,
};
use vista_config::{EngineConfig, EngineConfigLoader, TemplateKind};
use vista_package::OfflinePackager;

/// Build command arguments
pub struct BuildArgs {
    /// Project directory
    pub project_dir: PathBuf,
    pub template: TemplateKind,
    /// Entry evaluated in module view
    pub entry: Option<String>,
    /// Stop after transpilation
    pub skip_eval: bool,
    /// Engine configuration file (defaults to the nearest vista.toml)
    pub config_path: Option<PathBuf>,
    /// Do not read or write the persistent session cache
    pub no_cache: bool,
    /// Rebuild on file changes
    pub watch: bool,
}

/// Run the build command
pub async fn run(args: BuildArgs) -> Result<()> {
    let config = load_config(&args)?;
    let compiler = create_compiler(config);
    let scheduler = Scheduler::start(compiler);

    scheduler.submit(load_task(&args)?);
    scheduler.wait_idle().await;

    if args.watch {
        super::watch::run(&args, &scheduler).await?;
    }

    let mut compiler = scheduler
        .shutdown()
        .await
        .context("Build worker stopped unexpectedly")?;
    let had_error = compiler.state().had_error;
    compiler.dispose();

    if had_error && !args.watch {
        anyhow::bail!("Build failed");
    }
    Ok(())
}

fn load_config(args: &BuildArgs) -> Result<EngineConfig> {
    let loader = EngineConfigLoader::new();
    let mut config = match &args.config_path {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => loader.load_from_directory(&args.project_dir)?,
    };

    if args.no_cache {
        config.cache.enabled = false;
    }
    Ok(config)
}

fn create_compiler(config: EngineConfig) -> Compiler {
    let cache_dir = config.cache_dir();
    let cache_enabled = config.cache.enabled;

    let compiler = Compiler::new(
        Arc::new(DryRunFactory),
        Arc::new(OfflinePackager::new()),
        Arc::new(HeadlessSurface::new()),
        Arc::new(JsonLinesSink::stdout()),
    )
    .with_config(config)
    .with_lease_store(Arc::new(FsLeaseStore::new(cache_dir.join("running"))));

    if cache_enabled {
        tracing::debug!("Session cache: {}", cache_dir.display());
        compiler.with_cache_store(Arc::new(FsCacheStore::new(cache_dir)))
    } else {
        compiler
    }
}

/// Snapshot the project directory into a task
pub(crate) fn load_task(args: &BuildArgs) -> Result<CompileTask> {
    let mut snapshot = load_snapshot(&args.project_dir, args.template)?;
    let mut flags = CompileFlags {
        skip_eval: args.skip_eval,
        ..CompileFlags::default()
    };

    if let Some(entry) = &args.entry {
        snapshot = snapshot.with_entry(entry);
        flags.module_view = true;
    }

    Ok(CompileTask::new(snapshot).with_flags(flags))
}
