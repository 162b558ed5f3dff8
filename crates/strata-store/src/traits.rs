use strata_model::{
    CommitLogEntry, GlobalPointer, GlobalStateLogEntry, KeyListEntity, RefLogEntry,
    RepoDescription,
};
use strata_types::Hash;

use crate::error::StoreResult;

/// Storage backend for one repository.
///
/// All implementations must satisfy these invariants:
/// - The global pointer is the sole mutable record; it changes only through
///   [`cas_global_pointer`](Store::cas_global_pointer).
/// - Log records are immutable once written; writes are idempotent on the
///   record's own hash.
/// - Concurrent reads are always safe.
/// - The store never interprets record contents beyond keying them by hash.
/// - All I/O errors are propagated, never silently ignored.
/// - `erase` removes every record belonging to the store's configured
///   repository id, and nothing else.
pub trait Store: Send + Sync {
    /// Read the current global pointer.
    ///
    /// Returns `Ok(None)` while the repository is uninitialized.
    fn get_global_pointer(&self) -> StoreResult<Option<GlobalPointer>>;

    /// Atomically replace the global pointer.
    ///
    /// Succeeds only when the stored pointer equals `expected`
    /// (`expected = None` means "no pointer yet", used for repository
    /// initialization). Returns `false` on mismatch without writing.
    fn cas_global_pointer(
        &self,
        expected: Option<&GlobalPointer>,
        new: &GlobalPointer,
    ) -> StoreResult<bool>;

    /// Write a commit-log entry. A no-op if the hash is already present.
    fn put_commit_log(&self, entry: &CommitLogEntry) -> StoreResult<()>;

    /// Read a commit-log entry by hash. Returns `Ok(None)` if absent.
    fn get_commit_log(&self, hash: &Hash) -> StoreResult<Option<CommitLogEntry>>;

    /// Read multiple commit-log entries in a batch.
    ///
    /// Default implementation calls `get_commit_log` per hash. Backends may
    /// override for fewer I/O round-trips.
    fn batch_get_commit_log(&self, hashes: &[Hash]) -> StoreResult<Vec<Option<CommitLogEntry>>> {
        hashes.iter().map(|h| self.get_commit_log(h)).collect()
    }

    /// Write a spilled key-list entity. A no-op if already present.
    fn put_key_list(&self, entity: &KeyListEntity) -> StoreResult<()>;

    /// Read a spilled key-list entity by id.
    fn get_key_list(&self, id: &Hash) -> StoreResult<Option<KeyListEntity>>;

    /// Write a global-state log entry. A no-op if already present.
    fn put_global_log(&self, entry: &GlobalStateLogEntry) -> StoreResult<()>;

    /// Read a global-state log entry by id.
    fn get_global_log(&self, id: &Hash) -> StoreResult<Option<GlobalStateLogEntry>>;

    /// Write a ref-log entry. A no-op if already present.
    fn put_ref_log(&self, entry: &RefLogEntry) -> StoreResult<()>;

    /// Read a ref-log entry by id.
    fn get_ref_log(&self, id: &Hash) -> StoreResult<Option<RefLogEntry>>;

    /// Read the repository description. Returns `Ok(None)` if never written.
    fn get_repo_description(&self) -> StoreResult<Option<RepoDescription>>;

    /// Atomically replace the repository description, conditional on the
    /// currently stored value equalling `expected`.
    fn cas_repo_description(
        &self,
        expected: Option<&RepoDescription>,
        new: &RepoDescription,
    ) -> StoreResult<bool>;

    /// Remove every record of this store's repository.
    fn erase(&self) -> StoreResult<()>;
}
