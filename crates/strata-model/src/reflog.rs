//! Ref-log entries: the audit log of reference operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::Hash;

use crate::error::ModelError;
use crate::hashing::RecordHasher;
use crate::pointer::RefType;

/// The operation a ref-log entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefLogOp {
    CreateReference,
    Commit,
    DeleteReference,
    AssignReference,
    Merge,
    Transplant,
}

impl fmt::Display for RefLogOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefLogOp::CreateReference => "CREATE_REFERENCE",
            RefLogOp::Commit => "COMMIT",
            RefLogOp::DeleteReference => "DELETE_REFERENCE",
            RefLogOp::AssignReference => "ASSIGN_REFERENCE",
            RefLogOp::Merge => "MERGE",
            RefLogOp::Transplant => "TRANSPLANT",
        };
        write!(f, "{name}")
    }
}

/// One append-only entry of the ref log.
///
/// `source_hashes` encodes the operation's inputs: the prior HEAD for
/// ASSIGN_REFERENCE, the source commits for MERGE and TRANSPLANT, empty for
/// COMMIT and CREATE_REFERENCE.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefLogEntry {
    /// Content hash of this entry.
    pub ref_log_id: Hash,
    /// Previous log head first, then recent ancestors.
    pub parents: Vec<Hash>,
    /// Name of the reference the operation touched.
    pub ref_name: String,
    /// Kind of the reference the operation touched.
    pub ref_type: RefType,
    /// The commit hash the operation left the reference at (or dropped it
    /// from, for DELETE_REFERENCE).
    pub commit_hash: Hash,
    /// The recorded operation.
    pub operation: RefLogOp,
    /// Operation time in microseconds since the UNIX epoch.
    pub operation_time: u64,
    /// Operation inputs, per the operation's semantics.
    pub source_hashes: Vec<Hash>,
}

impl RefLogEntry {
    /// The immediate predecessor, or the no-ancestor sentinel for the first
    /// entry.
    pub fn primary_parent(&self) -> Hash {
        self.parents.first().copied().unwrap_or(Hash::no_ancestor())
    }

    /// Compute the content hash over all fields except `ref_log_id` itself.
    pub fn compute_id(&self) -> Result<Hash, ModelError> {
        let mut unhashed = self.clone();
        unhashed.ref_log_id = Hash::no_ancestor();
        RecordHasher::REF_LOG.hash_record(&unhashed)
    }

    /// Fill in the entry's own content hash.
    pub fn seal(mut self) -> Result<Self, ModelError> {
        self.ref_log_id = self.compute_id()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: RefLogOp) -> RefLogEntry {
        RefLogEntry {
            ref_log_id: Hash::no_ancestor(),
            parents: vec![Hash::of_bytes(b"previous")],
            ref_name: "main".into(),
            ref_type: RefType::Branch,
            commit_hash: Hash::of_bytes(b"head"),
            operation: op,
            operation_time: 99,
            source_hashes: vec![],
        }
    }

    #[test]
    fn seal_is_deterministic() {
        let a = entry(RefLogOp::Commit).seal().unwrap();
        let b = entry(RefLogOp::Commit).seal().unwrap();
        assert_eq!(a.ref_log_id, b.ref_log_id);
    }

    #[test]
    fn operation_is_part_of_identity() {
        let commit = entry(RefLogOp::Commit).seal().unwrap();
        let merge = entry(RefLogOp::Merge).seal().unwrap();
        assert_ne!(commit.ref_log_id, merge.ref_log_id);
    }

    #[test]
    fn operation_display_matches_audit_names() {
        assert_eq!(RefLogOp::CreateReference.to_string(), "CREATE_REFERENCE");
        assert_eq!(RefLogOp::AssignReference.to_string(), "ASSIGN_REFERENCE");
        assert_eq!(RefLogOp::Transplant.to_string(), "TRANSPLANT");
    }
}
