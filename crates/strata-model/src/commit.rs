//! Commit-log entries and key-list spill records.
//!
//! A [`CommitLogEntry`] is immutable once written. Its hash is a
//! deterministic function of its fully-serialized contents, so re-building
//! an entry from the same inputs reproduces the same hash.
//!
//! # Invariants
//!
//! - `parents[0]` is the immediate predecessor; additional parents are
//!   recent ancestors carried forward as lookup shortcuts.
//! - The key sets of `puts` and `deletes` are disjoint within one entry.
//! - `commit_seq` is `parents[0]`'s sequence plus one.
//! - `key_list_distance == 0` exactly when the entry embeds a key list.

use serde::{Deserialize, Serialize};
use strata_types::{ContentKey, Hash, KeyWithBytes, KeyWithType};

use crate::error::ModelError;
use crate::hashing::RecordHasher;

/// One immutable entry of the commit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLogEntry {
    /// Content hash of this entry (over all other fields).
    pub hash: Hash,
    /// Primary parent first, then recent secondary ancestors.
    pub parents: Vec<Hash>,
    /// Creation time in microseconds since the UNIX epoch.
    pub created_time: u64,
    /// Monotone sequence number within this branch of descent.
    pub commit_seq: u64,
    /// Opaque commit metadata (author, message, ...). Never interpreted.
    pub metadata: Vec<u8>,
    /// Puts applied by this commit, in caller order.
    pub puts: Vec<KeyWithBytes>,
    /// Keys deleted by this commit.
    pub deletes: Vec<ContentKey>,
    /// Commits since the last embedded full key list.
    pub key_list_distance: u32,
    /// Embedded full key list, present when `key_list_distance == 0`.
    pub key_list: Option<Vec<KeyWithType>>,
    /// Hashes of spilled [`KeyListEntity`] records holding the remainder of
    /// an oversized key list.
    pub key_list_ids: Vec<Hash>,
}

impl CommitLogEntry {
    /// The immediate predecessor, or the no-ancestor sentinel for the first
    /// commit in history.
    pub fn primary_parent(&self) -> Hash {
        self.parents.first().copied().unwrap_or(Hash::no_ancestor())
    }

    /// Returns `true` if this entry carries a materialised key list.
    pub fn has_key_list(&self) -> bool {
        self.key_list.is_some()
    }

    /// Compute the content hash over all fields except `hash` itself.
    pub fn compute_hash(&self) -> Result<Hash, ModelError> {
        let mut unhashed = self.clone();
        unhashed.hash = Hash::no_ancestor();
        RecordHasher::COMMIT.hash_record(&unhashed)
    }

    /// Fill in the entry's own content hash.
    pub fn seal(mut self) -> Result<Self, ModelError> {
        self.hash = self.compute_hash()?;
        Ok(self)
    }

    /// Serialize to the stable binary wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        bincode::serialize(self).map_err(|e| ModelError::Serialization(e.to_string()))
    }

    /// Deserialize from the stable binary wire format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ModelError> {
        bincode::deserialize(data).map_err(|e| ModelError::Serialization(e.to_string()))
    }
}

/// Spill record for an oversized key list.
///
/// When a materialised key list exceeds the embedded budget, the remainder
/// is chunked into `KeyListEntity` records referenced by
/// [`CommitLogEntry::key_list_ids`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyListEntity {
    pub id: Hash,
    pub entries: Vec<KeyWithType>,
}

impl KeyListEntity {
    /// Build a spill record, deriving its id from the entries.
    pub fn build(entries: Vec<KeyWithType>) -> Result<Self, ModelError> {
        let id = RecordHasher::KEY_LIST.hash_record(&entries)?;
        Ok(Self { id, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{ContentId, ContentType};

    fn put(key: &str, value: &str) -> KeyWithBytes {
        KeyWithBytes::new(
            ContentKey::of(&[key]).unwrap(),
            ContentId::new(format!("C-{key}")),
            ContentType(0),
            value.as_bytes().to_vec(),
        )
    }

    fn entry() -> CommitLogEntry {
        CommitLogEntry {
            hash: Hash::no_ancestor(),
            parents: vec![Hash::of_bytes(b"parent")],
            created_time: 1_000_000,
            commit_seq: 7,
            metadata: b"initial import".to_vec(),
            puts: vec![put("a", "1")],
            deletes: vec![ContentKey::of(&["old"]).unwrap()],
            key_list_distance: 3,
            key_list: None,
            key_list_ids: vec![],
        }
    }

    #[test]
    fn seal_is_deterministic() {
        let e1 = entry().seal().unwrap();
        let e2 = entry().seal().unwrap();
        assert_eq!(e1.hash, e2.hash);
        assert!(!e1.hash.is_no_ancestor());
    }

    #[test]
    fn hash_covers_every_field() {
        let base = entry().seal().unwrap();

        let mut changed = entry();
        changed.metadata = b"other".to_vec();
        let changed = changed.seal().unwrap();
        assert_ne!(base.hash, changed.hash);

        let mut changed = entry();
        changed.commit_seq = 8;
        let changed = changed.seal().unwrap();
        assert_ne!(base.hash, changed.hash);
    }

    #[test]
    fn sealed_hash_verifies_against_recompute() {
        let sealed = entry().seal().unwrap();
        assert_eq!(sealed.compute_hash().unwrap(), sealed.hash);
    }

    #[test]
    fn wire_roundtrip_is_byte_equal() {
        let sealed = entry().seal().unwrap();
        let bytes = sealed.to_bytes().unwrap();
        let decoded = CommitLogEntry::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, sealed);
        assert_eq!(decoded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn primary_parent_of_root_is_no_ancestor() {
        let mut root = entry();
        root.parents.clear();
        assert!(root.primary_parent().is_no_ancestor());
    }

    #[test]
    fn key_list_entity_id_depends_on_entries() {
        let a = KeyListEntity::build(vec![put("a", "1").to_key_with_type()]).unwrap();
        let b = KeyListEntity::build(vec![put("b", "1").to_key_with_type()]).unwrap();
        assert_ne!(a.id, b.id);
    }
}
