//! The read path: reference resolution, value and key lookups, the lazy
//! commit-log iterator, diffs, and global-state reads.

use std::collections::{BTreeMap, BTreeSet};

use strata_model::CommitLogEntry;
use strata_store::Store;
use strata_types::{
    ContentAndState, ContentId, ContentIdAndBytes, ContentKey, ContentType, Hash, KeyWithBytes,
    KeyWithType,
};

use crate::adapter::DatabaseAdapter;
use crate::error::{AdapterError, AdapterResult};

/// One entry of a diff between two commits: the key plus the value bytes on
/// either side (`None` where the key is absent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Difference {
    pub key: ContentKey,
    pub from_value: Option<Vec<u8>>,
    pub to_value: Option<Vec<u8>>,
}

impl<S: Store> DatabaseAdapter<S> {
    /// Resolve a named reference, optionally verifying that `hash` is
    /// reachable from its HEAD.
    ///
    /// Returns the verified hash, or the current HEAD when `hash` is
    /// absent.
    pub fn hash_on_reference(&self, name: &str, hash: Option<Hash>) -> AdapterResult<Hash> {
        let pointer = self.require_pointer()?;
        let head = self.named_reference(&pointer, name)?.pointer.hash;
        let Some(wanted) = hash else {
            return Ok(head);
        };

        let mut cursor = head;
        loop {
            if cursor == wanted {
                return Ok(wanted);
            }
            if cursor.is_no_ancestor() {
                return Err(AdapterError::hash_not_reachable(name, wanted));
            }
            cursor = self.entry(cursor)?.primary_parent();
        }
    }

    /// Retrieve the reference-local and global state for `keys` at
    /// `commit`. Keys rejected by `filter` and keys not present at the
    /// commit are omitted from the result.
    pub fn values<F>(
        &self,
        commit: Hash,
        keys: &[ContentKey],
        filter: F,
    ) -> AdapterResult<BTreeMap<ContentKey, ContentAndState>>
    where
        F: Fn(&ContentKey, &ContentId, ContentType) -> bool,
    {
        let wanted: BTreeSet<ContentKey> = keys.iter().cloned().collect();
        let resolved = self.resolve_puts(commit, &wanted)?;

        let mut result = BTreeMap::new();
        for (key, put) in resolved {
            if !filter(&key, &put.content_id, put.content_type) {
                continue;
            }
            let global_state = if self.config().global_state_types.contains(&put.content_type) {
                self.global_content(&put.content_id)?.map(|g| g.bytes)
            } else {
                None
            };
            result.insert(
                key,
                ContentAndState {
                    ref_state: put.value,
                    global_state,
                },
            );
        }
        Ok(result)
    }

    /// The content keys present at `commit`, ordered, with content ids and
    /// types. Keys rejected by `filter` are omitted.
    pub fn keys<F>(&self, commit: Hash, filter: F) -> AdapterResult<Vec<KeyWithType>>
    where
        F: Fn(&ContentKey, &ContentId, ContentType) -> bool,
    {
        self.verify_commit_exists(commit)?;
        let list = self.key_list_at(commit)?;
        Ok(list
            .into_values()
            .filter(|kwt| filter(&kwt.key, &kwt.content_id, kwt.content_type))
            .collect())
    }

    /// The commit log starting at `offset`, newest first, following primary
    /// parents down to the beginning of history.
    ///
    /// The iterator fetches lazily; dropping it releases the walk. Restart
    /// by calling again with the last observed hash.
    pub fn commit_log(&self, offset: Hash) -> AdapterResult<CommitLogIter<'_, S>> {
        self.verify_commit_exists(offset)?;
        Ok(CommitLogIter {
            adapter: self,
            next: (!offset.is_no_ancestor()).then_some(offset),
        })
    }

    /// Compute the difference of the content of two commits.
    ///
    /// Emits one [`Difference`] per key whose value differs between `from`
    /// and `to`, excluding keys rejected by `filter`.
    pub fn diff<F>(&self, from: Hash, to: Hash, filter: F) -> AdapterResult<Vec<Difference>>
    where
        F: Fn(&ContentKey, &ContentId, ContentType) -> bool,
    {
        self.verify_commit_exists(from)?;
        self.verify_commit_exists(to)?;

        let from_list = self.key_list_at(from)?;
        let to_list = self.key_list_at(to)?;

        let mut candidates: BTreeSet<ContentKey> = BTreeSet::new();
        for kwt in from_list.values().chain(to_list.values()) {
            if filter(&kwt.key, &kwt.content_id, kwt.content_type) {
                candidates.insert(kwt.key.clone());
            }
        }

        let from_values = self.resolve_puts(from, &candidates)?;
        let to_values = self.resolve_puts(to, &candidates)?;

        let mut differences = Vec::new();
        for key in candidates {
            let from_put = from_values.get(&key);
            let to_put = to_values.get(&key);
            let changed = match (from_put, to_put) {
                (Some(f), Some(t)) => f.content_id != t.content_id || f.value != t.value,
                (None, None) => false,
                _ => true,
            };
            if changed {
                differences.push(Difference {
                    key,
                    from_value: from_put.map(|p| p.value.clone()),
                    to_value: to_put.map(|p| p.value.clone()),
                });
            }
        }
        Ok(differences)
    }

    // ---------------------------------------------------------------
    // Global state
    // ---------------------------------------------------------------

    /// The current shared global value of a content id, if any.
    ///
    /// Walks the global-state log from the pointer's head; the first
    /// matching put is the current value.
    pub fn global_content(
        &self,
        content_id: &ContentId,
    ) -> AdapterResult<Option<ContentIdAndBytes>> {
        let pointer = self.require_pointer()?;
        let mut cursor = pointer.global_id;
        while !cursor.is_no_ancestor() {
            let entry = self.global_entry(cursor)?;
            if let Some(put) = entry.puts.iter().rev().find(|p| &p.content_id == content_id) {
                return Ok(Some(put.clone()));
            }
            cursor = entry.primary_parent();
        }
        Ok(None)
    }

    /// All content ids recorded in the global-state log.
    pub fn global_keys(&self) -> AdapterResult<Vec<ContentId>> {
        let pointer = self.require_pointer()?;
        let mut seen: BTreeSet<ContentId> = BTreeSet::new();
        let mut cursor = pointer.global_id;
        while !cursor.is_no_ancestor() {
            let entry = self.global_entry(cursor)?;
            for put in &entry.puts {
                seen.insert(put.content_id.clone());
            }
            cursor = entry.primary_parent();
        }
        Ok(seen.into_iter().collect())
    }

    fn global_entry(&self, id: Hash) -> AdapterResult<strata_model::GlobalStateLogEntry> {
        self.store().get_global_log(&id)?.ok_or_else(|| {
            AdapterError::ReferenceNotFound(format!("global-log entry '{id}' not found"))
        })
    }

    // ---------------------------------------------------------------
    // Shared resolution
    // ---------------------------------------------------------------

    /// Resolve the most recent put for each of `keys` at `commit`.
    ///
    /// Walks primary parents newest-first; a delete or an embedded key list
    /// that excludes a key settles it as absent. Keys without a settled put
    /// are omitted from the result.
    pub(crate) fn resolve_puts(
        &self,
        commit: Hash,
        keys: &BTreeSet<ContentKey>,
    ) -> AdapterResult<BTreeMap<ContentKey, KeyWithBytes>> {
        self.verify_commit_exists(commit)?;

        let mut remaining = keys.clone();
        let mut found = BTreeMap::new();
        let mut cursor = commit;
        while !remaining.is_empty() && !cursor.is_no_ancestor() {
            let entry = self.entry(cursor)?;
            self.scan_entry_for_puts(&entry, &mut remaining, &mut found)?;
            cursor = entry.primary_parent();
        }
        Ok(found)
    }

    /// Settle any of `remaining` that this entry decides: a delete settles
    /// the key as absent, a put settles it with its value (the last put
    /// wins within an entry), and a materialised key list settles every key
    /// it does not contain.
    pub(crate) fn scan_entry_for_puts(
        &self,
        entry: &CommitLogEntry,
        remaining: &mut BTreeSet<ContentKey>,
        found: &mut BTreeMap<ContentKey, KeyWithBytes>,
    ) -> AdapterResult<()> {
        for deleted in &entry.deletes {
            remaining.remove(deleted);
        }
        for put in entry.puts.iter().rev() {
            if remaining.remove(&put.key) {
                found.insert(put.key.clone(), put.clone());
            }
        }
        if entry.has_key_list() && !remaining.is_empty() {
            let listed: BTreeSet<&ContentKey> = entry
                .key_list
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|kwt| &kwt.key)
                .collect();
            if entry.key_list_ids.is_empty() {
                remaining.retain(|key| listed.contains(key));
            } else {
                let full = self.materialised_key_list(entry)?;
                let full_keys: BTreeSet<&ContentKey> = full.iter().map(|kwt| &kwt.key).collect();
                remaining.retain(|key| full_keys.contains(key));
            }
        }
        Ok(())
    }
}

/// Lazy iterator over the commit log, newest first.
///
/// Yields each entry or the first error encountered; terminates at the
/// beginning of history.
pub struct CommitLogIter<'a, S: Store> {
    adapter: &'a DatabaseAdapter<S>,
    next: Option<Hash>,
}

impl<S: Store> Iterator for CommitLogIter<'_, S> {
    type Item = AdapterResult<CommitLogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.next.take()?;
        match self.adapter.entry(cursor) {
            Ok(entry) => {
                let parent = entry.primary_parent();
                self.next = (!parent.is_no_ancestor()).then_some(parent);
                Some(Ok(entry))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
