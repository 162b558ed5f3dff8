use std::collections::HashMap;
use std::sync::RwLock;

use strata_model::{
    CommitLogEntry, GlobalPointer, GlobalStateLogEntry, KeyListEntity, RefLogEntry,
    RepoDescription,
};
use strata_types::Hash;

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// In-memory, HashMap-based store.
///
/// Intended for tests and embedding. All records are held behind one
/// `RwLock`; the pointer CAS takes the write lock, which makes it atomic
/// with respect to every other access.
pub struct InMemoryStore {
    repository_id: String,
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    pointer: Option<GlobalPointer>,
    commit_log: HashMap<Hash, CommitLogEntry>,
    key_lists: HashMap<Hash, KeyListEntity>,
    global_log: HashMap<Hash, GlobalStateLogEntry>,
    ref_log: HashMap<Hash, RefLogEntry>,
    repo_description: Option<RepoDescription>,
}

impl InMemoryStore {
    /// Create an empty store for the given repository id.
    pub fn new(repository_id: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// The repository id this store serves.
    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// Number of commit-log entries currently stored.
    pub fn commit_log_len(&self) -> usize {
        self.read_state().map(|s| s.commit_log.len()).unwrap_or(0)
    }

    /// Number of ref-log entries currently stored.
    pub fn ref_log_len(&self) -> usize {
        self.read_state().map(|s| s.ref_log.len()).unwrap_or(0)
    }

    fn read_state(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write_state(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Store for InMemoryStore {
    fn get_global_pointer(&self) -> StoreResult<Option<GlobalPointer>> {
        Ok(self.read_state()?.pointer.clone())
    }

    fn cas_global_pointer(
        &self,
        expected: Option<&GlobalPointer>,
        new: &GlobalPointer,
    ) -> StoreResult<bool> {
        let mut state = self.write_state()?;
        if state.pointer.as_ref() != expected {
            return Ok(false);
        }
        state.pointer = Some(new.clone());
        Ok(true)
    }

    fn put_commit_log(&self, entry: &CommitLogEntry) -> StoreResult<()> {
        let mut state = self.write_state()?;
        // Idempotent: content-addressing guarantees the same hash always
        // maps to the same record.
        state.commit_log.entry(entry.hash).or_insert_with(|| entry.clone());
        Ok(())
    }

    fn get_commit_log(&self, hash: &Hash) -> StoreResult<Option<CommitLogEntry>> {
        Ok(self.read_state()?.commit_log.get(hash).cloned())
    }

    fn put_key_list(&self, entity: &KeyListEntity) -> StoreResult<()> {
        let mut state = self.write_state()?;
        state.key_lists.entry(entity.id).or_insert_with(|| entity.clone());
        Ok(())
    }

    fn get_key_list(&self, id: &Hash) -> StoreResult<Option<KeyListEntity>> {
        Ok(self.read_state()?.key_lists.get(id).cloned())
    }

    fn put_global_log(&self, entry: &GlobalStateLogEntry) -> StoreResult<()> {
        let mut state = self.write_state()?;
        state.global_log.entry(entry.id).or_insert_with(|| entry.clone());
        Ok(())
    }

    fn get_global_log(&self, id: &Hash) -> StoreResult<Option<GlobalStateLogEntry>> {
        Ok(self.read_state()?.global_log.get(id).cloned())
    }

    fn put_ref_log(&self, entry: &RefLogEntry) -> StoreResult<()> {
        let mut state = self.write_state()?;
        state.ref_log.entry(entry.ref_log_id).or_insert_with(|| entry.clone());
        Ok(())
    }

    fn get_ref_log(&self, id: &Hash) -> StoreResult<Option<RefLogEntry>> {
        Ok(self.read_state()?.ref_log.get(id).cloned())
    }

    fn get_repo_description(&self) -> StoreResult<Option<RepoDescription>> {
        Ok(self.read_state()?.repo_description.clone())
    }

    fn cas_repo_description(
        &self,
        expected: Option<&RepoDescription>,
        new: &RepoDescription,
    ) -> StoreResult<bool> {
        let mut state = self.write_state()?;
        if state.repo_description.as_ref() != expected {
            return Ok(false);
        }
        state.repo_description = Some(new.clone());
        Ok(true)
    }

    fn erase(&self) -> StoreResult<()> {
        let mut state = self.write_state()?;
        *state = StoreState::default();
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("repository_id", &self.repository_id)
            .field("commit_log_len", &self.commit_log_len())
            .finish()
    }
}
