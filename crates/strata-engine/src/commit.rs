//! The commit operation and shared commit-entry construction.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, warn};

use strata_model::{
    push_ring, CommitLogEntry, GlobalStateLogEntry, KeyListEntity, RefLogOp, RefPointer, RefType,
};
use strata_store::Store;
use strata_types::{ContentIdAndBytes, ContentKey, Hash, KeyWithBytes};

use crate::adapter::{now_micros, DatabaseAdapter};
use crate::error::{AdapterError, AdapterResult};
use crate::keylist::apply_entry;

/// Callback invoked on the tentative commit entry after it is built but
/// before the pointer CAS. A failure aborts the commit.
pub type CommitValidator = Box<dyn Fn(&CommitLogEntry) -> AdapterResult<()> + Send + Sync>;

/// Parameters of one commit operation.
#[derive(Default)]
pub struct CommitAttempt {
    /// Branch to commit to.
    pub branch: String,
    /// If present, the branch HEAD must equal this hash.
    pub expected_head: Option<Hash>,
    /// Opaque commit metadata (author, message, ...).
    pub metadata: Vec<u8>,
    /// Puts in application order; the last put wins for a repeated key.
    pub puts: Vec<KeyWithBytes>,
    /// Keys to delete; must be disjoint from the put keys.
    pub deletes: Vec<ContentKey>,
    /// Shared global-state values for content types that carry them.
    pub global_puts: Vec<ContentIdAndBytes>,
    /// Optional pre-CAS validation of the tentative entry.
    pub validator: Option<CommitValidator>,
}

impl fmt::Debug for CommitAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitAttempt")
            .field("branch", &self.branch)
            .field("expected_head", &self.expected_head)
            .field("puts", &self.puts.len())
            .field("deletes", &self.deletes.len())
            .field("global_puts", &self.global_puts.len())
            .finish()
    }
}

impl<S: Store> DatabaseAdapter<S> {
    /// Commit a set of puts and deletes onto a branch.
    ///
    /// Returns the hash of the new commit entry, the branch's new HEAD.
    /// Retries on CAS misses up to the configured budget; expected-HEAD
    /// mismatches and malformed attempts fail immediately.
    pub fn commit(&self, attempt: CommitAttempt) -> AdapterResult<Hash> {
        let put_keys: BTreeSet<&ContentKey> = attempt.puts.iter().map(|p| &p.key).collect();
        for deleted in &attempt.deletes {
            if put_keys.contains(deleted) {
                return Err(AdapterError::InvalidArgument(format!(
                    "key '{deleted}' occurs in both puts and deletes of the commit attempt"
                )));
            }
        }

        for retry in 0..=self.config().commit_retries {
            let pointer = self.require_pointer()?;
            let head = self.branch_head(&pointer, &attempt.branch)?;
            if let Some(expected) = attempt.expected_head {
                if expected != head {
                    return Err(AdapterError::expected_head_mismatch(
                        &attempt.branch,
                        expected,
                    ));
                }
            }

            let parent = self.optional_entry(head)?;
            let (entry, spilled) = self.build_commit_entry(
                head,
                parent.as_ref(),
                attempt.metadata.clone(),
                attempt.puts.clone(),
                attempt.deletes.clone(),
            )?;

            let mut new_pointer = pointer.clone();
            let mut global_entry = None;
            if !attempt.global_puts.is_empty() {
                let global = GlobalStateLogEntry {
                    id: Hash::no_ancestor(),
                    parents: pointer.global_parents_incl_head.clone(),
                    puts: attempt.global_puts.clone(),
                    created_time: entry.created_time,
                }
                .seal()?;
                new_pointer.global_id = global.id;
                push_ring(
                    &mut new_pointer.global_parents_incl_head,
                    global.id,
                    self.config().global_parents_ring,
                );
                global_entry = Some(global);
            }

            if let Some(validator) = &attempt.validator {
                validator(&entry)?;
            }

            let ref_log = self.new_ref_log_entry(
                &pointer,
                &attempt.branch,
                RefType::Branch,
                entry.hash,
                RefLogOp::Commit,
                entry.created_time,
                vec![],
            )?;
            self.install_ref_log(&mut new_pointer, &ref_log);
            new_pointer.touch_reference(&attempt.branch, RefPointer::branch(entry.hash));

            self.persist_commit(&entry, &spilled)?;
            if let Some(global) = &global_entry {
                self.store().put_global_log(global)?;
            }
            self.store().put_ref_log(&ref_log)?;

            if self.store().cas_global_pointer(Some(&pointer), &new_pointer)? {
                debug!(
                    branch = %attempt.branch,
                    hash = %entry.hash.short_hex(),
                    seq = entry.commit_seq,
                    "committed"
                );
                return Ok(entry.hash);
            }
            debug!(branch = %attempt.branch, retry, "commit CAS miss; retrying");
        }

        warn!(
            branch = %attempt.branch,
            retries = self.config().commit_retries,
            "commit retries exhausted"
        );
        Err(AdapterError::retries_exhausted(
            "commit",
            &attempt.branch,
            self.config().commit_retries,
        ))
    }

    /// Build one commit entry on top of `parent_hash`.
    ///
    /// Computes the sequence number and parent list, advances the key-list
    /// distance, and materialises an embedded key list when the configured
    /// distance is reached. `created_time` is forced strictly past the
    /// parent's so commit times stay monotone along a branch.
    pub(crate) fn build_commit_entry(
        &self,
        parent_hash: Hash,
        parent: Option<&CommitLogEntry>,
        metadata: Vec<u8>,
        puts: Vec<KeyWithBytes>,
        deletes: Vec<ContentKey>,
    ) -> AdapterResult<(CommitLogEntry, Vec<KeyListEntity>)> {
        let created_time = match parent {
            Some(p) => now_micros().max(p.created_time + 1),
            None => now_micros(),
        };

        let mut parents = vec![parent_hash];
        if let Some(p) = parent {
            let carry = self.config().parents_per_commit.saturating_sub(1);
            parents.extend(p.parents.iter().copied().take(carry));
        }

        let mut entry = CommitLogEntry {
            hash: Hash::no_ancestor(),
            parents,
            created_time,
            commit_seq: parent.map(|p| p.commit_seq + 1).unwrap_or(1),
            metadata,
            puts,
            deletes,
            key_list_distance: parent.map(|p| p.key_list_distance + 1).unwrap_or(1),
            key_list: None,
            key_list_ids: vec![],
        };

        let mut spilled = vec![];
        if entry.key_list_distance >= self.config().key_list_distance {
            let mut list = self.key_list_at(parent_hash)?;
            apply_entry(&mut list, &entry);
            let (embedded, spill) = self.split_key_list(list.into_values().collect())?;
            debug!(
                embedded = embedded.len(),
                spilled = spill.len(),
                "materialised key list"
            );
            entry.key_list = Some(embedded);
            entry.key_list_ids = spill.iter().map(|e| e.id).collect();
            entry.key_list_distance = 0;
            spilled = spill;
        }

        Ok((entry.seal()?, spilled))
    }

    /// Persist a sealed commit entry and its spilled key-list entities.
    pub(crate) fn persist_commit(
        &self,
        entry: &CommitLogEntry,
        spilled: &[KeyListEntity],
    ) -> AdapterResult<()> {
        for entity in spilled {
            self.store().put_key_list(entity)?;
        }
        self.store().put_commit_log(entry)?;
        Ok(())
    }
}
