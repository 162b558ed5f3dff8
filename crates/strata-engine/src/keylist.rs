//! Key-list rebuild and materialisation.
//!
//! The full key list at a commit is rebuilt by walking primary parents to
//! the nearest entry carrying an embedded key list, then replaying the
//! puts/deletes of the walked commits oldest-first (newer operations shadow
//! older ones). The commit engine materialises a fresh list every
//! `key_list_distance` commits to bound the replay cost.

use std::collections::BTreeMap;

use strata_model::{CommitLogEntry, KeyListEntity};
use strata_store::Store;
use strata_types::{ContentKey, Hash, KeyWithType};

use crate::adapter::DatabaseAdapter;
use crate::error::{AdapterError, AdapterResult};

impl<S: Store> DatabaseAdapter<S> {
    /// Rebuild the full key list live at `commit`.
    pub(crate) fn key_list_at(
        &self,
        commit: Hash,
    ) -> AdapterResult<BTreeMap<ContentKey, KeyWithType>> {
        if commit.is_no_ancestor() {
            return Ok(BTreeMap::new());
        }

        // Walk towards the root until an entry with a materialised list.
        let mut walked: Vec<CommitLogEntry> = Vec::new();
        let mut cursor = commit;
        loop {
            let entry = self.entry(cursor)?;
            let has_list = entry.has_key_list();
            cursor = entry.primary_parent();
            walked.push(entry);
            if has_list || cursor.is_no_ancestor() {
                break;
            }
        }

        // The oldest walked entry either carries the base list (its own
        // puts/deletes already folded in at materialisation time) or is the
        // first commit in history.
        let mut list = BTreeMap::new();
        let base = walked
            .last()
            .map(|e| e.has_key_list())
            .unwrap_or(false);
        if base {
            let entry = walked.pop().expect("walked is non-empty");
            for kwt in self.materialised_key_list(&entry)? {
                list.insert(kwt.key.clone(), kwt);
            }
        }

        // Replay the remaining commits oldest-first.
        for entry in walked.iter().rev() {
            apply_entry(&mut list, entry);
        }
        Ok(list)
    }

    /// The complete materialised list of an entry: embedded entries plus
    /// any spilled key-list entities.
    pub(crate) fn materialised_key_list(
        &self,
        entry: &CommitLogEntry,
    ) -> AdapterResult<Vec<KeyWithType>> {
        let mut entries = entry.key_list.clone().unwrap_or_default();
        for id in &entry.key_list_ids {
            let spilled = self.store().get_key_list(id)?.ok_or_else(|| {
                AdapterError::ReferenceNotFound(format!("key-list entity '{id}' not found"))
            })?;
            entries.extend(spilled.entries);
        }
        Ok(entries)
    }

    /// Split a materialised key list into the embedded part and spilled
    /// entities per the configured embedded budget.
    pub(crate) fn split_key_list(
        &self,
        entries: Vec<KeyWithType>,
    ) -> AdapterResult<(Vec<KeyWithType>, Vec<KeyListEntity>)> {
        let budget = self.config().max_embedded_key_list.max(1);
        if entries.len() <= budget {
            return Ok((entries, vec![]));
        }
        let mut iter = entries.into_iter();
        let embedded: Vec<KeyWithType> = iter.by_ref().take(budget).collect();
        let mut spilled = Vec::new();
        loop {
            let chunk: Vec<KeyWithType> = iter.by_ref().take(budget).collect();
            if chunk.is_empty() {
                break;
            }
            spilled.push(KeyListEntity::build(chunk)?);
        }
        Ok((embedded, spilled))
    }
}

/// Apply one commit's puts and deletes to a key-list map. Within an entry
/// the put and delete key sets are disjoint; a later put for the same key
/// shadows an earlier one.
pub(crate) fn apply_entry(list: &mut BTreeMap<ContentKey, KeyWithType>, entry: &CommitLogEntry) {
    for key in &entry.deletes {
        list.remove(key);
    }
    for put in &entry.puts {
        list.insert(put.key.clone(), put.to_key_with_type());
    }
}
