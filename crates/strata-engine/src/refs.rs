//! Reference management: create, delete, assign, reference info, and the
//! ref-log read path.

use tracing::debug;

use strata_model::{RefLogEntry, RefLogOp, RefPointer, RefType};
use strata_store::Store;
use strata_types::Hash;

use crate::adapter::{now_micros, DatabaseAdapter};
use crate::error::{AdapterError, AdapterResult};

/// Options controlling which fields [`ReferenceInfo`] carries.
///
/// Implementations walk the commit log only as far as the requested fields
/// require; with the default options a reference lookup reads nothing but
/// the pointer.
#[derive(Clone, Debug, Default)]
pub struct GetNamedRefsParams {
    /// Fetch the metadata bytes of the HEAD commit.
    pub include_commit_meta: bool,
    /// Count the commits ahead of the common ancestor. Only computed when
    /// `retrieve_common_ancestor_with` is set.
    pub include_num_commits: bool,
    /// Fetch the total commit count (the HEAD's sequence number).
    pub include_num_total_commits: bool,
    /// Also resolve the common ancestor with this reference's HEAD.
    pub retrieve_common_ancestor_with: Option<String>,
}

/// A named reference with the optional extras requested via
/// [`GetNamedRefsParams`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceInfo {
    pub name: String,
    pub ref_type: RefType,
    pub hash: Hash,
    pub commit_meta: Option<Vec<u8>>,
    pub num_commits: Option<u64>,
    pub num_total_commits: Option<u64>,
    pub common_ancestor: Option<Hash>,
}

impl<S: Store> DatabaseAdapter<S> {
    /// Create a new named reference pointing at `target`.
    ///
    /// `target = None` is allowed only when re-creating the default branch
    /// (after an erase); the reference then starts at the no-ancestor hash.
    pub fn create(
        &self,
        name: &str,
        ref_type: RefType,
        target: Option<Hash>,
    ) -> AdapterResult<Hash> {
        let target_hash = match target {
            Some(hash) => {
                self.verify_commit_exists(hash)?;
                hash
            }
            None if name == self.config().default_branch => Hash::no_ancestor(),
            None => {
                return Err(AdapterError::InvalidArgument(format!(
                    "a target hash is required to create reference '{name}'"
                )))
            }
        };

        for retry in 0..=self.config().commit_retries {
            let pointer = self.require_pointer()?;
            if pointer.get_reference(name).is_some() {
                return Err(AdapterError::ReferenceAlreadyExists(name.to_string()));
            }

            let ref_log = self.new_ref_log_entry(
                &pointer,
                name,
                ref_type,
                target_hash,
                RefLogOp::CreateReference,
                now_micros(),
                vec![],
            )?;
            let mut new_pointer = pointer.clone();
            self.install_ref_log(&mut new_pointer, &ref_log);
            new_pointer.touch_reference(
                name,
                RefPointer {
                    ref_type,
                    hash: target_hash,
                },
            );

            self.store().put_ref_log(&ref_log)?;
            if self.store().cas_global_pointer(Some(&pointer), &new_pointer)? {
                debug!(name, ?ref_type, hash = %target_hash.short_hex(), "created reference");
                return Ok(target_hash);
            }
            debug!(name, retry, "create CAS miss; retrying");
        }
        Err(AdapterError::retries_exhausted(
            "create",
            name,
            self.config().commit_retries,
        ))
    }

    /// Delete a named reference.
    ///
    /// When `expected_head` is present, the reference's HEAD must equal it.
    /// The dropped commit chain stays reachable through the ref log only.
    pub fn delete(&self, name: &str, expected_head: Option<Hash>) -> AdapterResult<()> {
        for retry in 0..=self.config().commit_retries {
            let pointer = self.require_pointer()?;
            let named = self.named_reference(&pointer, name)?;
            let head = named.pointer.hash;
            let ref_type = named.pointer.ref_type;
            if let Some(expected) = expected_head {
                if expected != head {
                    return Err(AdapterError::expected_head_mismatch(name, expected));
                }
            }

            let ref_log = self.new_ref_log_entry(
                &pointer,
                name,
                ref_type,
                head,
                RefLogOp::DeleteReference,
                now_micros(),
                vec![],
            )?;
            let mut new_pointer = pointer.clone();
            self.install_ref_log(&mut new_pointer, &ref_log);
            new_pointer.remove_reference(name);

            self.store().put_ref_log(&ref_log)?;
            if self.store().cas_global_pointer(Some(&pointer), &new_pointer)? {
                debug!(name, dropped = %head.short_hex(), "deleted reference");
                return Ok(());
            }
            debug!(name, retry, "delete CAS miss; retrying");
        }
        Err(AdapterError::retries_exhausted(
            "delete",
            name,
            self.config().commit_retries,
        ))
    }

    /// Re-assign a named reference to `target`.
    ///
    /// The ref-log entry records the prior HEAD in `source_hashes`; no
    /// commit data is lost, though the prior chain may only remain
    /// reachable through the ref log.
    pub fn assign(
        &self,
        name: &str,
        expected_head: Option<Hash>,
        target: Hash,
    ) -> AdapterResult<()> {
        self.verify_commit_exists(target)?;

        for retry in 0..=self.config().commit_retries {
            let pointer = self.require_pointer()?;
            let named = self.named_reference(&pointer, name)?;
            let previous = named.pointer.hash;
            let ref_type = named.pointer.ref_type;
            if let Some(expected) = expected_head {
                if expected != previous {
                    return Err(AdapterError::expected_head_mismatch(name, expected));
                }
            }

            let ref_log = self.new_ref_log_entry(
                &pointer,
                name,
                ref_type,
                target,
                RefLogOp::AssignReference,
                now_micros(),
                vec![previous],
            )?;
            let mut new_pointer = pointer.clone();
            self.install_ref_log(&mut new_pointer, &ref_log);
            new_pointer.touch_reference(
                name,
                RefPointer {
                    ref_type,
                    hash: target,
                },
            );

            self.store().put_ref_log(&ref_log)?;
            if self.store().cas_global_pointer(Some(&pointer), &new_pointer)? {
                debug!(
                    name,
                    from = %previous.short_hex(),
                    to = %target.short_hex(),
                    "assigned reference"
                );
                return Ok(());
            }
            debug!(name, retry, "assign CAS miss; retrying");
        }
        Err(AdapterError::retries_exhausted(
            "assign",
            name,
            self.config().commit_retries,
        ))
    }

    /// Resolve one named reference with the requested extras.
    pub fn named_ref(&self, name: &str, params: &GetNamedRefsParams) -> AdapterResult<ReferenceInfo> {
        let pointer = self.require_pointer()?;
        let named = self.named_reference(&pointer, name)?;
        self.reference_info(named.name.clone(), named.pointer, params)
    }

    /// All named references, most recently touched first.
    pub fn named_refs(&self, params: &GetNamedRefsParams) -> AdapterResult<Vec<ReferenceInfo>> {
        let pointer = self.require_pointer()?;
        pointer
            .named_references
            .iter()
            .map(|named| self.reference_info(named.name.clone(), named.pointer, params))
            .collect()
    }

    fn reference_info(
        &self,
        name: String,
        pointer: RefPointer,
        params: &GetNamedRefsParams,
    ) -> AdapterResult<ReferenceInfo> {
        let head = pointer.hash;
        let mut info = ReferenceInfo {
            name,
            ref_type: pointer.ref_type,
            hash: head,
            commit_meta: None,
            num_commits: None,
            num_total_commits: None,
            common_ancestor: None,
        };

        if params.include_commit_meta || params.include_num_total_commits {
            let entry = self.optional_entry(head)?;
            if params.include_commit_meta {
                info.commit_meta = entry.as_ref().map(|e| e.metadata.clone());
            }
            if params.include_num_total_commits {
                info.num_total_commits = Some(entry.as_ref().map(|e| e.commit_seq).unwrap_or(0));
            }
        }

        if let Some(other) = &params.retrieve_common_ancestor_with {
            let current = self.require_pointer()?;
            let other_head = self.named_reference(&current, other)?.pointer.hash;
            let ancestor = self.common_ancestor(head, other_head)?;
            info.common_ancestor = ancestor;
            if params.include_num_commits {
                if let Some(ancestor) = ancestor {
                    let mut count = 0u64;
                    let mut cursor = head;
                    while cursor != ancestor && !cursor.is_no_ancestor() {
                        cursor = self.entry(cursor)?.primary_parent();
                        count += 1;
                    }
                    info.num_commits = Some(count);
                }
            }
        }

        Ok(info)
    }

    /// The ref log starting at `offset` (or the current head), newest
    /// first, following primary parents.
    pub fn ref_log(&self, offset: Option<Hash>) -> AdapterResult<RefLogIter<'_, S>> {
        let start = match offset {
            Some(hash) => {
                if self.store().get_ref_log(&hash)?.is_none() {
                    return Err(AdapterError::RefLogNotFound(hash));
                }
                hash
            }
            None => self.require_pointer()?.ref_log_id,
        };
        Ok(RefLogIter {
            adapter: self,
            next: (!start.is_no_ancestor()).then_some(start),
        })
    }
}

/// Lazy iterator over the ref log, newest first.
pub struct RefLogIter<'a, S: Store> {
    adapter: &'a DatabaseAdapter<S>,
    next: Option<Hash>,
}

impl<S: Store> std::fmt::Debug for RefLogIter<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefLogIter").field("next", &self.next).finish()
    }
}

impl<S: Store> Iterator for RefLogIter<'_, S> {
    type Item = AdapterResult<RefLogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.next.take()?;
        let entry = match self.adapter.store().get_ref_log(&cursor) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Some(Err(AdapterError::RefLogNotFound(cursor))),
            Err(err) => return Some(Err(err.into())),
        };
        let parent = entry.primary_parent();
        self.next = (!parent.is_no_ancestor()).then_some(parent);
        Some(Ok(entry))
    }
}
