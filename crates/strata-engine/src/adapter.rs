//! The adapter type, shared internals, and repository lifecycle.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use strata_model::{
    push_ring, CommitLogEntry, GlobalPointer, NamedReference, RefLogEntry, RefLogOp, RefPointer,
    RefType, RepoDescription,
};
use strata_store::Store;
use strata_types::Hash;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};

/// The database adapter: atomic, multi-key transactions over a branching
/// history of content references.
///
/// All operations are thread-safe; synchronization is entirely CAS on the
/// global pointer plus append-only writes of every other record. Clone the
/// surrounding `Arc` (or the adapter's store handle) to share across
/// request handlers.
pub struct DatabaseAdapter<S: Store> {
    store: Arc<S>,
    config: AdapterConfig,
}

impl<S: Store> DatabaseAdapter<S> {
    pub fn new(store: Arc<S>, config: AdapterConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The "beginning of time" hash: the parent of the first commit on
    /// every branch of descent.
    pub fn no_ancestor_hash(&self) -> Hash {
        Hash::no_ancestor()
    }

    // ---------------------------------------------------------------
    // Repository lifecycle
    // ---------------------------------------------------------------

    /// Ensure the mandatory repository data is present. Does not change an
    /// already-initialized repository.
    ///
    /// Creates the default branch pointing at the no-ancestor hash, the
    /// initial ref-log entry, and the initial global pointer.
    pub fn initialize_repo(&self) -> AdapterResult<()> {
        if self.store.get_global_pointer()?.is_some() {
            return Ok(());
        }

        let ref_log = RefLogEntry {
            ref_log_id: Hash::no_ancestor(),
            parents: vec![],
            ref_name: self.config.default_branch.clone(),
            ref_type: RefType::Branch,
            commit_hash: Hash::no_ancestor(),
            operation: RefLogOp::CreateReference,
            operation_time: now_micros(),
            source_hashes: vec![],
        }
        .seal()?;

        let mut pointer = GlobalPointer {
            global_id: Hash::no_ancestor(),
            named_references: vec![],
            ref_log_id: ref_log.ref_log_id,
            global_parents_incl_head: vec![Hash::no_ancestor()],
            ref_log_parents_incl_head: vec![ref_log.ref_log_id],
        };
        pointer.touch_reference(
            &self.config.default_branch,
            RefPointer::branch(Hash::no_ancestor()),
        );

        self.store.put_ref_log(&ref_log)?;
        if self.store.cas_global_pointer(None, &pointer)? {
            info!(
                repository_id = %self.config.repository_id,
                default_branch = %self.config.default_branch,
                "initialized repository"
            );
        }
        // A lost CAS means another instance initialized concurrently, which
        // is just as good.
        Ok(())
    }

    /// Remove all records of the configured repository. Call
    /// [`initialize_repo`](Self::initialize_repo) afterwards to reuse the
    /// repository id.
    pub fn erase_repo(&self) -> AdapterResult<()> {
        self.store.erase()?;
        info!(repository_id = %self.config.repository_id, "erased repository");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Repository description
    // ---------------------------------------------------------------

    /// Fetch the current version and descriptive attributes of the
    /// repository.
    pub fn fetch_repo_description(&self) -> AdapterResult<RepoDescription> {
        Ok(self.store.get_repo_description()?.unwrap_or_default())
    }

    /// Update the repository description through a pure function.
    ///
    /// The updater receives the current description; returning `None`
    /// aborts the update. Concurrent updates are resolved optimistically
    /// with the configured retry budget.
    pub fn update_repo_description<F>(&self, updater: F) -> AdapterResult<()>
    where
        F: Fn(RepoDescription) -> Option<RepoDescription>,
    {
        for _ in 0..=self.config.commit_retries {
            let stored = self.store.get_repo_description()?;
            let current = stored.clone().unwrap_or_default();
            let Some(next) = updater(current) else {
                return Ok(());
            };
            if self.store.cas_repo_description(stored.as_ref(), &next)? {
                return Ok(());
            }
            debug!("repository description CAS miss; retrying");
        }
        Err(AdapterError::ReferenceConflict(
            "repository description could not be updated due to concurrent changes".into(),
        ))
    }

    // ---------------------------------------------------------------
    // Shared internals
    // ---------------------------------------------------------------

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// The current global pointer; the repository must be initialized.
    pub(crate) fn require_pointer(&self) -> AdapterResult<GlobalPointer> {
        self.store
            .get_global_pointer()?
            .ok_or_else(AdapterError::repo_not_initialized)
    }

    pub(crate) fn named_reference<'p>(
        &self,
        pointer: &'p GlobalPointer,
        name: &str,
    ) -> AdapterResult<&'p NamedReference> {
        pointer
            .get_reference(name)
            .ok_or_else(|| AdapterError::ref_not_found(name))
    }

    /// Resolve a branch HEAD, rejecting tags as commit targets.
    pub(crate) fn branch_head(
        &self,
        pointer: &GlobalPointer,
        name: &str,
    ) -> AdapterResult<Hash> {
        let named = self.named_reference(pointer, name)?;
        if named.pointer.ref_type != RefType::Branch {
            return Err(AdapterError::InvalidArgument(format!(
                "reference '{name}' is a tag; only branches accept commits"
            )));
        }
        Ok(named.pointer.hash)
    }

    /// Load a commit-log entry that must exist.
    pub(crate) fn entry(&self, hash: Hash) -> AdapterResult<CommitLogEntry> {
        self.store
            .get_commit_log(&hash)?
            .ok_or_else(|| AdapterError::commit_not_found(hash))
    }

    /// Load the entry behind a HEAD; `None` when the HEAD is the
    /// no-ancestor sentinel (empty branch).
    pub(crate) fn optional_entry(&self, hash: Hash) -> AdapterResult<Option<CommitLogEntry>> {
        if hash.is_no_ancestor() {
            return Ok(None);
        }
        self.entry(hash).map(Some)
    }

    /// Verify a commit hash resolves (the no-ancestor sentinel always does).
    pub(crate) fn verify_commit_exists(&self, hash: Hash) -> AdapterResult<()> {
        if hash.is_no_ancestor() || self.store.get_commit_log(&hash)?.is_some() {
            Ok(())
        } else {
            Err(AdapterError::commit_not_found(hash))
        }
    }

    /// Build the ref-log entry for one reference operation, chained onto
    /// the pointer's current ref-log head.
    pub(crate) fn new_ref_log_entry(
        &self,
        pointer: &GlobalPointer,
        ref_name: &str,
        ref_type: RefType,
        commit_hash: Hash,
        operation: RefLogOp,
        operation_time: u64,
        source_hashes: Vec<Hash>,
    ) -> AdapterResult<RefLogEntry> {
        let entry = RefLogEntry {
            ref_log_id: Hash::no_ancestor(),
            parents: pointer.ref_log_parents_incl_head.clone(),
            ref_name: ref_name.to_string(),
            ref_type,
            commit_hash,
            operation,
            operation_time,
            source_hashes,
        }
        .seal()?;
        Ok(entry)
    }

    /// Install a new ref-log head into a pointer being prepared for CAS.
    pub(crate) fn install_ref_log(&self, pointer: &mut GlobalPointer, entry: &RefLogEntry) {
        pointer.ref_log_id = entry.ref_log_id;
        push_ring(
            &mut pointer.ref_log_parents_incl_head,
            entry.ref_log_id,
            self.config.ref_log_parents_ring,
        );
    }
}

/// Current wall-clock time in microseconds since the UNIX epoch.
pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
