//! Vista build orchestration
//!
//! Drives live-preview builds of a project:
//! - Coalescing task scheduler (one build at a time, newest snapshot wins)
//! - Build session lifecycle (reuse, replacement, disposal)
//! - Staged compile pipeline with a single terminal reporting phase
//! - Preview reconciliation (reload, compiled-cache clear, or neither)
//! - Persistent session cache with poisoned-cache eviction
//! - Running lease and resize reporting

pub mod cache;
pub mod controller;
pub mod error;
pub mod host;
pub mod lease;
pub mod pipeline;
pub mod reconcile;
pub mod resize;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod task;

// Re-export main types
pub use cache::{CacheEntry, CacheManager, CacheStore, FsCacheStore, MemoryCacheStore};
pub use controller::{LiveSession, PreparedSession, SessionController};
pub use error::{BuildError, BuildResult, ErrorKind};
pub use host::{ChannelSink, ErrorAction, HostEvent, HostSink, JsonLinesSink, Stage};
pub use lease::{FsLeaseStore, LeaseStatus, LeaseStore, MemoryLeaseStore, RunningLease};
pub use pipeline::{BuildReport, Compiler};
pub use reconcile::{html_parts, reconcile, HeadlessSurface, HtmlParts, Reconciliation, RenderSurface};
pub use resize::ResizeWatcher;
pub use scheduler::Scheduler;
pub use session::{
    BuildSession, EvaluateOptions, PlainPreset, Preset, PreviewHelper, SerializeOptions,
    SessionFactory, SessionOptions, SessionSnapshot, TestFinder,
};
pub use state::OrchestratorState;
pub use task::{CompileFlags, CompileTask};

// Re-export collaborator types for convenience
pub use vista_config::{EngineConfig, ProjectSnapshot, TemplateKind};
pub use vista_package::{InstalledManifest, OfflinePackager, Packager};
