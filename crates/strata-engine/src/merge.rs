//! Merge and transplant: replaying source commits onto a target branch
//! with key-level conflict detection.
//!
//! Both operations produce a fast-forward rebase chain on the target, never
//! a two-parent merge commit. A key conflicts when the value most recently
//! associated with it on the target tip differs from its value at the
//! common ancestor (deletes count as modifications).

use std::collections::BTreeSet;

use tracing::debug;

use strata_model::{CommitLogEntry, GlobalPointer, RefLogOp, RefPointer, RefType};
use strata_store::Store;
use strata_types::{ContentKey, Hash};

use crate::adapter::{now_micros, DatabaseAdapter};
use crate::error::{AdapterError, AdapterResult};

impl<S: Store> DatabaseAdapter<S> {
    /// Merge all commits on the source side since the common ancestor of
    /// `from` and `to_branch`'s HEAD onto `to_branch`.
    ///
    /// Applies the source commits oldest-first with `rewriter` transforming
    /// each commit's metadata. Returns the target's new HEAD.
    pub fn merge<F>(
        &self,
        from: Hash,
        to_branch: &str,
        expected_head: Option<Hash>,
        mut rewriter: F,
    ) -> AdapterResult<Hash>
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        self.verify_commit_exists(from)?;

        for retry in 0..=self.config().commit_retries {
            let pointer = self.require_pointer()?;
            let head = self.branch_head(&pointer, to_branch)?;
            if let Some(expected) = expected_head {
                if expected != head {
                    return Err(AdapterError::expected_head_mismatch(to_branch, expected));
                }
            }

            let ancestor = self.common_ancestor(from, head)?.ok_or_else(|| {
                AdapterError::ReferenceNotFound(format!(
                    "no common ancestor found for merge of '{from}' into '{to_branch}'"
                ))
            })?;
            if ancestor == from {
                return Err(AdapterError::InvalidArgument(format!(
                    "No hashes to merge from '{from}' onto '{to_branch}'."
                )));
            }

            // Source commits strictly between the ancestor and `from`,
            // oldest first.
            let mut sources = Vec::new();
            let mut cursor = from;
            while cursor != ancestor {
                let entry = self.entry(cursor)?;
                cursor = entry.primary_parent();
                sources.push(entry);
            }
            sources.reverse();

            let source_hashes = vec![from];
            if let Some(new_head) = self.apply_sequence(
                &pointer,
                to_branch,
                head,
                ancestor,
                &sources,
                &mut rewriter,
                RefLogOp::Merge,
                source_hashes,
            )? {
                return Ok(new_head);
            }
            debug!(branch = %to_branch, retry, "merge CAS miss; retrying");
        }

        Err(AdapterError::retries_exhausted(
            "merge",
            to_branch,
            self.config().commit_retries,
        ))
    }

    /// Cherry-pick `sequence` (a contiguous primary-parent chain, in
    /// application order) onto `target_branch`.
    ///
    /// Returns the target's new HEAD after the last replayed commit.
    pub fn transplant<F>(
        &self,
        target_branch: &str,
        expected_head: Option<Hash>,
        sequence: &[Hash],
        mut rewriter: F,
    ) -> AdapterResult<Hash>
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        if sequence.is_empty() {
            return Err(AdapterError::InvalidArgument(
                "No hashes to transplant given.".into(),
            ));
        }

        for retry in 0..=self.config().commit_retries {
            let pointer = self.require_pointer()?;
            let head = self.branch_head(&pointer, target_branch)?;
            if let Some(expected) = expected_head {
                if expected != head {
                    return Err(AdapterError::expected_head_mismatch(
                        target_branch,
                        expected,
                    ));
                }
            }

            let mut sources = Vec::with_capacity(sequence.len());
            for (loaded, hash) in self
                .store()
                .batch_get_commit_log(sequence)?
                .into_iter()
                .zip(sequence)
            {
                sources.push(loaded.ok_or_else(|| AdapterError::commit_not_found(*hash))?);
            }
            for pair in sources.windows(2) {
                if pair[1].primary_parent() != pair[0].hash {
                    return Err(AdapterError::InvalidArgument(
                        "Sequence of hashes to transplant is not contiguous.".into(),
                    ));
                }
            }

            let base = sources[0].primary_parent();
            if let Some(new_head) = self.apply_sequence(
                &pointer,
                target_branch,
                head,
                base,
                &sources,
                &mut rewriter,
                RefLogOp::Transplant,
                sequence.to_vec(),
            )? {
                return Ok(new_head);
            }
            debug!(branch = %target_branch, retry, "transplant CAS miss; retrying");
        }

        Err(AdapterError::retries_exhausted(
            "transplant",
            target_branch,
            self.config().commit_retries,
        ))
    }

    /// Find the lowest common ancestor of two commits, walking both primary
    /// parent chains in lock-step.
    ///
    /// The no-ancestor sentinel is the ancestor of last resort shared by
    /// all commits of a repository.
    pub(crate) fn common_ancestor(&self, a: Hash, b: Hash) -> AdapterResult<Option<Hash>> {
        let mut seen_a = BTreeSet::new();
        let mut seen_b = BTreeSet::new();
        let mut cursor_a = Some(a);
        let mut cursor_b = Some(b);

        while cursor_a.is_some() || cursor_b.is_some() {
            if let Some(current) = cursor_a {
                seen_a.insert(current);
                if seen_b.contains(&current) {
                    return Ok(Some(current));
                }
                cursor_a = self.step_back(current)?;
            }
            if let Some(current) = cursor_b {
                seen_b.insert(current);
                if seen_a.contains(&current) {
                    return Ok(Some(current));
                }
                cursor_b = self.step_back(current)?;
            }
        }
        Ok(None)
    }

    fn step_back(&self, hash: Hash) -> AdapterResult<Option<Hash>> {
        if hash.is_no_ancestor() {
            return Ok(None);
        }
        Ok(Some(self.entry(hash)?.primary_parent()))
    }

    /// Check conflicts and replay `sources` onto `head`, then CAS the
    /// pointer. Returns `Ok(None)` on a CAS miss (the caller retries).
    #[allow(clippy::too_many_arguments)]
    fn apply_sequence<F>(
        &self,
        pointer: &GlobalPointer,
        branch: &str,
        head: Hash,
        base: Hash,
        sources: &[CommitLogEntry],
        rewriter: &mut F,
        operation: RefLogOp,
        source_hashes: Vec<Hash>,
    ) -> AdapterResult<Option<Hash>>
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        // Key-level conflicts: any key written by the sources whose value
        // on the target tip differs from its value at the base.
        let mut touched: BTreeSet<ContentKey> = BTreeSet::new();
        for source in sources {
            touched.extend(source.puts.iter().map(|p| p.key.clone()));
            touched.extend(source.deletes.iter().cloned());
        }
        let base_values = self.resolve_puts(base, &touched)?;
        let head_values = self.resolve_puts(head, &touched)?;
        let conflicts: Vec<ContentKey> = touched
            .iter()
            .filter(|key| {
                let at_base = base_values.get(*key).map(|p| (&p.content_id, &p.value));
                let at_head = head_values.get(*key).map(|p| (&p.content_id, &p.value));
                at_base != at_head
            })
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(AdapterError::key_conflicts(&conflicts));
        }

        // Replay, oldest first, on top of the growing tip.
        let mut tip = head;
        let mut tip_entry = self.optional_entry(head)?;
        let mut new_entries = Vec::with_capacity(sources.len());
        for source in sources {
            let metadata = rewriter(&source.metadata);
            let (entry, spilled) = self.build_commit_entry(
                tip,
                tip_entry.as_ref(),
                metadata,
                source.puts.clone(),
                source.deletes.clone(),
            )?;
            tip = entry.hash;
            new_entries.push((entry.clone(), spilled));
            tip_entry = Some(entry);
        }

        let ref_log = self.new_ref_log_entry(
            pointer,
            branch,
            RefType::Branch,
            tip,
            operation,
            now_micros(),
            source_hashes,
        )?;
        let mut new_pointer = pointer.clone();
        self.install_ref_log(&mut new_pointer, &ref_log);
        new_pointer.touch_reference(branch, RefPointer::branch(tip));

        for (entry, spilled) in &new_entries {
            self.persist_commit(entry, spilled)?;
        }
        self.store().put_ref_log(&ref_log)?;

        if self.store().cas_global_pointer(Some(pointer), &new_pointer)? {
            debug!(
                branch = %branch,
                operation = %operation,
                new_head = %tip.short_hex(),
                replayed = sources.len(),
                "applied commit sequence"
            );
            Ok(Some(tip))
        } else {
            Ok(None)
        }
    }
}
