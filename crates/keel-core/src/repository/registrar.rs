//! Repository registration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, info_span};

use crate::error::EngineError;

use super::fetcher::IndexFetcher;
use super::lock::{CancelToken, IndexLock, LockPolicy, lock_path_for};
use super::schema::RepositoryEntry;
use super::store::IndexStore;

/// Adds repositories to a shared index file.
///
/// Every add runs under the index lock, so adds from any number of threads
/// or processes pointing at the same file are applied one at a time.
#[derive(Clone)]
pub struct RepositoryRegistrar {
    store: IndexStore,
    lock_policy: LockPolicy,
    fetcher: Arc<dyn IndexFetcher>,
}

impl fmt::Debug for RepositoryRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRegistrar")
            .field("index", &self.store.path())
            .field("lock_policy", &self.lock_policy)
            .finish_non_exhaustive()
    }
}

impl RepositoryRegistrar {
    pub fn new(index_path: PathBuf, fetcher: Arc<dyn IndexFetcher>) -> Self {
        Self {
            store: IndexStore::new(index_path),
            lock_policy: LockPolicy::default(),
            fetcher,
        }
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn index_path(&self) -> &Path {
        self.store.path()
    }

    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(self.store.path())
    }

    /// Add `entry`, or replace an existing entry of the same name when
    /// `force_update` is set.
    ///
    /// Re-adding an identical entry succeeds without `force_update`. The
    /// repository must answer with a valid index before anything is written.
    pub fn add(
        &self,
        entry: RepositoryEntry,
        force_update: bool,
        cancel: &CancelToken,
    ) -> Result<RepositoryEntry, EngineError> {
        let _span = info_span!("repo_add", repository = %entry.name).entered();

        entry.validate()?;
        self.ensure_index_dir()?;

        let _lock = IndexLock::acquire(&self.lock_path(), &self.lock_policy, cancel)?;
        check_cancelled(cancel, &entry.name, "after taking the lock")?;

        let mut index = self.store.load().map_err(|e| {
            EngineError::internal(format!("repository add {}: load index", entry.name), e)
        })?;

        if !force_update
            && let Some(existing) = index.get(&entry.name)
            && existing != &entry
        {
            return Err(EngineError::Conflict(format!(
                "repository name ({}) already exists, please use force_update to update or a different name to make a new entry",
                entry.name
            )));
        }

        if let Err(e) = self.fetcher.fetch_index(&entry, cancel) {
            check_cancelled(cancel, &entry.name, "while fetching the index")?;
            return Err(EngineError::transient(
                format!(
                    "repository add {}: {} looks like it is not a valid chart repository or cannot be reached",
                    entry.name, entry.url
                ),
                e,
            ));
        }

        check_cancelled(cancel, &entry.name, "before write")?;

        index.upsert(entry.clone());
        index.generated = Some(chrono::Utc::now());
        self.store.save(&index).map_err(|e| {
            EngineError::internal(format!("repository add {}: write index", entry.name), e)
        })?;

        info!(url = %entry.url, "repository has been added");
        Ok(entry)
    }

    /// Current entries, read without taking the lock.
    pub fn list(&self) -> Result<Vec<RepositoryEntry>, EngineError> {
        self.store
            .load()
            .map(|index| index.repositories)
            .map_err(|e| EngineError::internal("repository list", e))
    }

    fn ensure_index_dir(&self) -> Result<(), EngineError> {
        let Some(dir) = self
            .store
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        else {
            return Ok(());
        };
        match std::fs::create_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(EngineError::internal(
                format!("create index directory {}", dir.display()),
                e,
            )),
        }
    }
}

fn check_cancelled(cancel: &CancelToken, name: &str, stage: &str) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled(format!(
            "repository add {} {}",
            name, stage
        )));
    }
    Ok(())
}
