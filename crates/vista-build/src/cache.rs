//! Persistent session cache
//!
//! A successful build stores the serialized session keyed by project
//! identity. The first build of a process restores it to shortcut the cold
//! start; a first build that fails without any module changes evicts it so a
//! poisoned entry is not restored again.

use crate::error::{BuildError, BuildResult};
use crate::session::{BuildSession, SerializeOptions, SessionSnapshot, CACHED_PATHS_KEY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted session state of one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub project_id: String,
    /// Entry module of the build that produced the snapshot
    pub entry_path: Option<String>,
    pub snapshot: SessionSnapshot,
    pub changed_module_count: usize,
    pub first_load: bool,
    /// Milliseconds since the Unix epoch
    pub saved_at: u64,
}

/// Durable storage for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, project_id: &str) -> BuildResult<Option<CacheEntry>>;

    async fn store(&self, entry: &CacheEntry) -> BuildResult<()>;

    /// Delete the entry of a project; deleting a missing entry is not an error
    async fn delete(&self, project_id: &str) -> BuildResult<()>;
}

/// One JSON file per project under a cache directory
///
/// Files are named by the SHA-256 of the project id so arbitrary ids map to
/// valid file names.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding a project's entry
    pub fn entry_path(&self, project_id: &str) -> PathBuf {
        let digest = Sha256::digest(project_id.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn load(&self, project_id: &str) -> BuildResult<Option<CacheEntry>> {
        let path = self.entry_path(project_id);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BuildError::cache(format!("{}: {}", path.display(), e))),
        };

        let entry: CacheEntry = serde_json::from_slice(&content)
            .map_err(|e| BuildError::cache(format!("{}: {}", path.display(), e)))?;

        // Hash collisions are not worth a restore
        if entry.project_id != project_id {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn store(&self, entry: &CacheEntry) -> BuildResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BuildError::cache(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.entry_path(&entry.project_id);
        let content = serde_json::to_vec(entry).map_err(BuildError::cache)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| BuildError::cache(format!("{}: {}", path.display(), e)))
    }

    async fn delete(&self, project_id: &str) -> BuildResult<()> {
        let path = self.entry_path(project_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::cache(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Cache store kept in memory
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.entries().insert(entry.project_id.clone(), entry);
    }

    pub fn get(&self, project_id: &str) -> Option<CacheEntry> {
        self.entries().get(project_id).cloned()
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.entries().contains_key(project_id)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, project_id: &str) -> BuildResult<Option<CacheEntry>> {
        Ok(self.get(project_id))
    }

    async fn store(&self, entry: &CacheEntry) -> BuildResult<()> {
        self.insert(entry.clone());
        Ok(())
    }

    async fn delete(&self, project_id: &str) -> BuildResult<()> {
        self.entries().remove(project_id);
        Ok(())
    }
}

/// Restore, save and evict policy over a [`CacheStore`]
pub struct CacheManager {
    store: Option<Arc<dyn CacheStore>>,
    restore_attempted: bool,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            restore_attempted: false,
        }
    }

    /// Manager that never persists anything
    pub fn disabled() -> Self {
        Self {
            store: None,
            restore_attempted: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Load the cached snapshot into a fresh session
    ///
    /// Attempted at most once per manager. Failures fall through to a cold
    /// build. Returns whether a snapshot was loaded.
    pub async fn restore(&mut self, session: &mut dyn BuildSession) -> bool {
        if self.restore_attempted {
            return false;
        }
        self.restore_attempted = true;

        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let entry = match store.load(session.id()).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return false,
            Err(e) => {
                tracing::debug!("Could not read session cache: {}", e);
                return false;
            }
        };

        match session.load_snapshot(entry.snapshot).await {
            Ok(()) => {
                tracing::debug!("Restored session cache for '{}'", entry.project_id);
                true
            }
            Err(e) => {
                tracing::debug!("Could not restore session cache: {}", e);
                false
            }
        }
    }

    /// Persist the session after a successful build
    pub async fn save(
        &self,
        session: &dyn BuildSession,
        entry_path: Option<&str>,
        changed_module_count: usize,
        first_load: bool,
    ) -> BuildResult<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let mut snapshot = session
            .serialize(SerializeOptions {
                optimize_for_size: true,
            })
            .await?;
        snapshot.remove(CACHED_PATHS_KEY);

        let entry = CacheEntry {
            project_id: session.id().to_string(),
            entry_path: entry_path.map(str::to_string),
            snapshot,
            changed_module_count,
            first_load,
            saved_at: now_millis(),
        };

        store.store(&entry).await
    }

    /// Delete the persisted entry of a project
    pub async fn evict(&self, project_id: &str) -> BuildResult<()> {
        match self.store.as_ref() {
            Some(store) => {
                tracing::debug!("Evicting session cache for '{}'", project_id);
                store.delete(project_id).await
            }
            None => Ok(()),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
