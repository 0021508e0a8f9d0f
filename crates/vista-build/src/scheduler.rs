//! Coalescing task scheduler
//!
//! A single worker task owns the [`Compiler`] and runs one build at a time.
//! Submissions overwrite a one-slot pending queue, so however many tasks
//! arrive while a build runs, exactly one more build runs afterwards, with
//! the newest snapshot.

use crate::error::{BuildError, BuildResult};
use crate::pipeline::Compiler;
use crate::task::CompileTask;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Slot {
    pending: Option<CompileTask>,
    running: bool,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    /// Signalled on submission and shutdown
    wake: Notify,
    /// Signalled whenever the worker runs out of work
    idle: Notify,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Compiler>>,
}

impl Scheduler {
    /// Spawn the worker; must be called from within a tokio runtime
    pub fn start(compiler: Compiler) -> Self {
        let shared = Arc::new(Shared::default());
        let worker = tokio::spawn(run_worker(Arc::clone(&shared), compiler));

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Queue a build, replacing any build that has not started yet
    pub fn submit(&self, task: CompileTask) {
        {
            let mut slot = self.shared.slot();
            if slot.closed {
                tracing::warn!("Scheduler is shut down, dropping task for '{}'", task.project_id());
                return;
            }
            if slot.pending.replace(task).is_some() {
                tracing::debug!("Superseded a pending build");
            }
        }
        self.shared.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.shared.slot().running
    }

    pub fn has_pending(&self) -> bool {
        self.shared.slot().pending.is_some()
    }

    /// Wait until no build is running or pending
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let slot = self.shared.slot();
                if slot.closed || (!slot.running && slot.pending.is_none()) {
                    return;
                }
            }

            notified.await;
        }
    }

    /// Drop any pending build, wait for the running one and stop the worker
    ///
    /// Hands back the compiler so the owner can dispose the live session.
    pub async fn shutdown(mut self) -> BuildResult<Compiler> {
        {
            let mut slot = self.shared.slot();
            slot.closed = true;
            slot.pending = None;
        }
        self.shared.wake.notify_one();

        let worker = self
            .worker
            .take()
            .ok_or_else(|| BuildError::session("scheduler worker already stopped"))?;
        worker
            .await
            .map_err(|e| BuildError::session(format!("scheduler worker failed: {}", e)))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shared.slot().closed = true;
            self.shared.wake.notify_one();
        }
    }
}

/// Marks the running build finished when dropped
///
/// A build that panics takes the worker down with it; the scheduler is then
/// closed so waiters return instead of hanging.
struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        {
            let mut slot = self.0.slot();
            slot.running = false;
            if std::thread::panicking() {
                tracing::error!("Build panicked, stopping the scheduler");
                slot.closed = true;
                slot.pending = None;
            }
        }
        if std::thread::panicking() {
            self.0.idle.notify_waiters();
        }
    }
}

async fn run_worker(shared: Arc<Shared>, mut compiler: Compiler) -> Compiler {
    loop {
        let task = {
            let mut slot = shared.slot();
            if slot.closed {
                break;
            }
            let task = slot.pending.take();
            slot.running = task.is_some();
            task
        };

        match task {
            Some(task) => {
                let _running = RunningGuard(&shared);
                let report = compiler.compile(task).await;
                tracing::debug!("Build finished (had_error: {})", report.had_error);
            }
            None => {
                shared.idle.notify_waiters();
                shared.wake.notified().await;
            }
        }
    }

    compiler.stop_resize_watcher();
    shared.idle.notify_waiters();
    compiler
}
