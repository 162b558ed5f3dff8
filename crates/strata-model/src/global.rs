//! Global-state log entries.
//!
//! Some content types carry one shared piece of state per content id in
//! addition to the per-reference bytes in commit entries. The global-state
//! log is append-only; a content id's current value is the most recent put
//! reachable from the log head tracked in the global pointer.

use serde::{Deserialize, Serialize};
use strata_types::{ContentIdAndBytes, Hash};

use crate::error::ModelError;
use crate::hashing::RecordHasher;

/// One append-only entry of the global-state log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStateLogEntry {
    /// Content hash of this entry.
    pub id: Hash,
    /// Previous log head first, then recent ancestors.
    pub parents: Vec<Hash>,
    /// Shared values written by this entry, one per content id.
    pub puts: Vec<ContentIdAndBytes>,
    /// Creation time in microseconds since the UNIX epoch.
    pub created_time: u64,
}

impl GlobalStateLogEntry {
    /// The immediate predecessor, or the no-ancestor sentinel for the first
    /// entry.
    pub fn primary_parent(&self) -> Hash {
        self.parents.first().copied().unwrap_or(Hash::no_ancestor())
    }

    /// Compute the content hash over all fields except `id` itself.
    pub fn compute_id(&self) -> Result<Hash, ModelError> {
        let mut unhashed = self.clone();
        unhashed.id = Hash::no_ancestor();
        RecordHasher::GLOBAL.hash_record(&unhashed)
    }

    /// Fill in the entry's own content hash.
    pub fn seal(mut self) -> Result<Self, ModelError> {
        self.id = self.compute_id()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ContentId;

    fn entry() -> GlobalStateLogEntry {
        GlobalStateLogEntry {
            id: Hash::no_ancestor(),
            parents: vec![Hash::of_bytes(b"previous")],
            puts: vec![ContentIdAndBytes::new(
                ContentId::new("C0"),
                b"shared state".to_vec(),
            )],
            created_time: 42,
        }
    }

    #[test]
    fn seal_is_deterministic() {
        assert_eq!(entry().seal().unwrap().id, entry().seal().unwrap().id);
    }

    #[test]
    fn id_changes_with_puts() {
        let base = entry().seal().unwrap();
        let mut changed = entry();
        changed.puts[0].bytes = b"other state".to_vec();
        assert_ne!(base.id, changed.seal().unwrap().id);
    }

    #[test]
    fn first_entry_has_no_ancestor_parent() {
        let mut first = entry();
        first.parents.clear();
        assert!(first.primary_parent().is_no_ancestor());
    }
}
