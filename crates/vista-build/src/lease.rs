//! Running lease
//!
//! A timestamped marker telling other processes sharing the same storage that
//! a build is evaluating. A marker older than the TTL at the start of a
//! process is treated as abandoned (the previous process likely hung while
//! evaluating), never as a lock.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// Storage of the lease marker
pub trait LeaseStore: Send + Sync {
    /// Time the marker was last written
    fn read(&self) -> Option<SystemTime>;

    fn write(&self, at: SystemTime);

    fn clear(&self);
}

/// Lease marker kept in memory
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    marker: Mutex<Option<SystemTime>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a marker already written at `at`
    pub fn with_marker(at: SystemTime) -> Self {
        Self {
            marker: Mutex::new(Some(at)),
        }
    }

    fn marker(&self) -> MutexGuard<'_, Option<SystemTime>> {
        self.marker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn read(&self) -> Option<SystemTime> {
        *self.marker()
    }

    fn write(&self, at: SystemTime) {
        *self.marker() = Some(at);
    }

    fn clear(&self) {
        *self.marker() = None;
    }
}

/// Lease marker stored as a file holding epoch milliseconds
///
/// Shared by every process using the same path. Unreadable markers count as
/// absent.
#[derive(Debug, Clone)]
pub struct FsLeaseStore {
    path: PathBuf,
}

impl FsLeaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LeaseStore for FsLeaseStore {
    fn read(&self) -> Option<SystemTime> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let millis = content.trim().parse::<u64>().ok()?;
        Some(UNIX_EPOCH + Duration::from_millis(millis))
    }

    fn write(&self, at: SystemTime) {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Could not create {}: {}", parent.display(), e);
            }
        }
        if let Err(e) = std::fs::write(&self.path, millis.to_string()) {
            tracing::warn!("Could not write running marker: {}", e);
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not clear running marker: {}", e),
        }
    }
}

/// State of the lease marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseStatus {
    /// No marker
    Free,
    /// Marker younger than the TTL
    Active,
    /// Marker older than the TTL
    Abandoned,
}

pub struct RunningLease {
    store: Arc<dyn LeaseStore>,
    ttl: Duration,
    pending_release: Option<JoinHandle<()>>,
}

impl RunningLease {
    pub fn new(store: Arc<dyn LeaseStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            pending_release: None,
        }
    }

    pub fn store(&self) -> Arc<dyn LeaseStore> {
        Arc::clone(&self.store)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn status(&self) -> LeaseStatus {
        self.status_at(SystemTime::now())
    }

    pub fn status_at(&self, now: SystemTime) -> LeaseStatus {
        match self.store.read() {
            None => LeaseStatus::Free,
            // A marker from the future (clock skew) is not stale
            Some(at) => match now.duration_since(at) {
                Ok(age) if age > self.ttl => LeaseStatus::Abandoned,
                _ => LeaseStatus::Active,
            },
        }
    }

    /// Write the marker, cancelling a pending deferred release
    pub fn acquire(&mut self) {
        if let Some(pending) = self.pending_release.take() {
            pending.abort();
        }
        self.store.write(SystemTime::now());
    }

    /// Refresh the timestamp of a held marker
    ///
    /// Keeps a long evaluation from looking abandoned during the deferred
    /// release window. Does nothing when the marker is gone.
    pub fn renew(&mut self) {
        if self.store.read().is_some() {
            self.store.write(SystemTime::now());
        }
    }

    pub fn release(&mut self) {
        if let Some(pending) = self.pending_release.take() {
            pending.abort();
        }
        self.store.clear();
    }

    /// Release after `delay`, so runtime errors right after a build still
    /// happen under the marker
    pub fn release_after(&mut self, delay: Duration) {
        if let Some(pending) = self.pending_release.take() {
            pending.abort();
        }

        let store = Arc::clone(&self.store);
        self.pending_release = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.clear();
        }));
    }
}

impl Drop for RunningLease {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_release.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(store: Arc<MemoryLeaseStore>) -> RunningLease {
        RunningLease::new(store, Duration::from_millis(8000))
    }

    #[test]
    fn test_status() {
        let now = SystemTime::now();

        assert_eq!(lease(Arc::new(MemoryLeaseStore::new())).status_at(now), LeaseStatus::Free);

        let fresh = Arc::new(MemoryLeaseStore::with_marker(now - Duration::from_secs(2)));
        assert_eq!(lease(fresh).status_at(now), LeaseStatus::Active);

        let stale = Arc::new(MemoryLeaseStore::with_marker(now - Duration::from_secs(9)));
        assert_eq!(lease(stale).status_at(now), LeaseStatus::Abandoned);

        let skewed = Arc::new(MemoryLeaseStore::with_marker(now + Duration::from_secs(60)));
        assert_eq!(lease(skewed).status_at(now), LeaseStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_release() {
        let store = Arc::new(MemoryLeaseStore::new());
        let mut lease = lease(store.clone());

        lease.acquire();
        lease.release_after(Duration::from_millis(600));
        assert!(store.read().is_some());

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(store.read().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_cancels_pending_release() {
        let store = Arc::new(MemoryLeaseStore::new());
        let mut lease = lease(store.clone());

        lease.acquire();
        lease.release_after(Duration::from_millis(600));
        lease.acquire();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(store.read().is_some());
    }

    #[test]
    fn test_renew_refreshes_held_marker_only() {
        let old = SystemTime::now() - Duration::from_secs(30);
        let store = Arc::new(MemoryLeaseStore::with_marker(old));
        let mut held = lease(store.clone());

        assert_eq!(held.status(), LeaseStatus::Abandoned);
        held.renew();
        assert_eq!(held.status(), LeaseStatus::Active);
        assert!(store.read().unwrap() > old);

        let free = Arc::new(MemoryLeaseStore::new());
        lease(free.clone()).renew();
        assert!(free.read().is_none());
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLeaseStore::new(dir.path().join("running"));

        assert!(store.read().is_none());
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        store.write(at);
        assert_eq!(store.read(), Some(at));
        store.clear();
        assert!(store.read().is_none());
        // Clearing an absent marker is not an error
        store.clear();
    }

    #[test]
    fn test_fs_store_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = FsLeaseStore::new(blocker.join("running"));

        store.write(SystemTime::now());
        assert!(store.read().is_none());
        store.clear();

        let mut lease = RunningLease::new(Arc::new(store), Duration::from_millis(8000));
        lease.acquire();
        assert_eq!(lease.status(), LeaseStatus::Free);
        lease.release();
    }
}
