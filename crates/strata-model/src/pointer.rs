//! The global pointer: the single mutable root record of a repository.
//!
//! Every successful write replaces the pointer atomically via CAS; all
//! other records are write-once. The pointer tracks branch/tag HEADs in
//! most-recently-touched order, the heads of the global-state and ref logs,
//! and bounded rings of recent log-entry hashes.

use serde::{Deserialize, Serialize};
use strata_types::Hash;

/// Kind of a named reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefType {
    /// Mutable reference that advances via commits.
    Branch,
    /// Reference intended to be immutable, movable only via explicit
    /// assignment.
    Tag,
}

/// The target of a named reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefPointer {
    pub ref_type: RefType,
    pub hash: Hash,
}

impl RefPointer {
    pub fn branch(hash: Hash) -> Self {
        Self {
            ref_type: RefType::Branch,
            hash,
        }
    }

    pub fn tag(hash: Hash) -> Self {
        Self {
            ref_type: RefType::Tag,
            hash,
        }
    }
}

/// A named reference as stored in the pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedReference {
    pub name: String,
    pub pointer: RefPointer,
}

/// The single atomically-updated root record of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPointer {
    /// Current head of the global-state log (no-ancestor when empty).
    pub global_id: Hash,
    /// All named references, most recently touched first.
    pub named_references: Vec<NamedReference>,
    /// Current head of the ref log.
    pub ref_log_id: Hash,
    /// Bounded ring of recent global-log hashes, head first.
    pub global_parents_incl_head: Vec<Hash>,
    /// Bounded ring of recent ref-log hashes, head first.
    pub ref_log_parents_incl_head: Vec<Hash>,
}

impl GlobalPointer {
    /// Look up a named reference.
    pub fn get_reference(&self, name: &str) -> Option<&NamedReference> {
        self.named_references.iter().find(|r| r.name == name)
    }

    /// Insert or update a named reference, moving it to the front of the
    /// most-recently-touched order.
    pub fn touch_reference(&mut self, name: &str, pointer: RefPointer) {
        self.named_references.retain(|r| r.name != name);
        self.named_references.insert(
            0,
            NamedReference {
                name: name.to_string(),
                pointer,
            },
        );
    }

    /// Remove a named reference, returning its previous target.
    pub fn remove_reference(&mut self, name: &str) -> Option<RefPointer> {
        let position = self.named_references.iter().position(|r| r.name == name)?;
        Some(self.named_references.remove(position).pointer)
    }
}

/// Rotate a bounded parent ring: the new head goes first, the oldest entry
/// falls off once `capacity` is reached.
pub fn push_ring(ring: &mut Vec<Hash>, head: Hash, capacity: usize) {
    ring.insert(0, head);
    ring.truncate(capacity);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer() -> GlobalPointer {
        GlobalPointer {
            global_id: Hash::no_ancestor(),
            named_references: vec![],
            ref_log_id: Hash::no_ancestor(),
            global_parents_incl_head: vec![Hash::no_ancestor()],
            ref_log_parents_incl_head: vec![Hash::no_ancestor()],
        }
    }

    fn hash(byte: u8) -> Hash {
        Hash::from_digest([byte; 32])
    }

    #[test]
    fn touch_inserts_at_front() {
        let mut p = pointer();
        p.touch_reference("main", RefPointer::branch(hash(1)));
        p.touch_reference("dev", RefPointer::branch(hash(2)));
        assert_eq!(p.named_references[0].name, "dev");
        assert_eq!(p.named_references[1].name, "main");
    }

    #[test]
    fn touch_moves_existing_to_front() {
        let mut p = pointer();
        p.touch_reference("main", RefPointer::branch(hash(1)));
        p.touch_reference("dev", RefPointer::branch(hash(2)));
        p.touch_reference("main", RefPointer::branch(hash(3)));

        assert_eq!(p.named_references.len(), 2);
        assert_eq!(p.named_references[0].name, "main");
        assert_eq!(p.named_references[0].pointer.hash, hash(3));
    }

    #[test]
    fn remove_returns_previous_target() {
        let mut p = pointer();
        p.touch_reference("tag-1", RefPointer::tag(hash(9)));
        let removed = p.remove_reference("tag-1").unwrap();
        assert_eq!(removed.ref_type, RefType::Tag);
        assert_eq!(removed.hash, hash(9));
        assert!(p.get_reference("tag-1").is_none());
        assert!(p.remove_reference("tag-1").is_none());
    }

    #[test]
    fn ring_is_bounded_and_head_first() {
        let mut ring = vec![];
        for i in 0..5 {
            push_ring(&mut ring, hash(i), 3);
        }
        assert_eq!(ring, vec![hash(4), hash(3), hash(2)]);
    }

    #[test]
    fn serde_roundtrip() {
        let mut p = pointer();
        p.touch_reference("main", RefPointer::branch(hash(1)));
        let json = serde_json::to_string(&p).unwrap();
        let parsed: GlobalPointer = serde_json::from_str(&json).unwrap();
        assert_eq!(p, parsed);
    }
}
