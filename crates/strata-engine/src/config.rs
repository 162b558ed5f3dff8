//! Adapter configuration.

use std::collections::BTreeSet;

use strata_types::ContentType;

/// Default number of commits between embedded key-list materialisations.
pub const DEFAULT_KEY_LIST_DISTANCE: u32 = 20;

/// Default number of CAS retries for write operations.
pub const DEFAULT_COMMIT_RETRIES: u32 = 5;

/// Configuration of a [`DatabaseAdapter`](crate::DatabaseAdapter).
///
/// Plain struct with explicit fields; construct with struct-update syntax
/// over [`AdapterConfig::default`].
#[derive(Clone, Debug)]
pub struct AdapterConfig {
    /// Identifies the repository within a shared storage backend. Carried
    /// for diagnostics; record scoping is the store's concern.
    pub repository_id: String,
    /// Name of the branch created by `initialize_repo`.
    pub default_branch: String,
    /// Commits between embedded key-list materialisations. Bounds the
    /// replay cost of key-list rebuilds.
    pub key_list_distance: u32,
    /// Maximum key-list entries embedded in a commit entry (and per spilled
    /// key-list entity). Larger lists spill into separate records.
    pub max_embedded_key_list: usize,
    /// CAS retries before a write fails with a reference conflict.
    pub commit_retries: u32,
    /// Parents recorded per commit entry: the primary parent plus recent
    /// ancestors carried as lookup shortcuts.
    pub parents_per_commit: usize,
    /// Capacity of the global-log recent-parents ring in the pointer.
    pub global_parents_ring: usize,
    /// Capacity of the ref-log recent-parents ring in the pointer.
    pub ref_log_parents_ring: usize,
    /// Content types whose values carry shared global state in addition to
    /// the per-reference bytes.
    pub global_state_types: BTreeSet<ContentType>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            repository_id: String::new(),
            default_branch: "main".into(),
            key_list_distance: DEFAULT_KEY_LIST_DISTANCE,
            max_embedded_key_list: 1000,
            commit_retries: DEFAULT_COMMIT_RETRIES,
            parents_per_commit: 20,
            global_parents_ring: 20,
            ref_log_parents_ring: 20,
            global_state_types: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AdapterConfig::default();
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.key_list_distance, 20);
        assert_eq!(config.commit_retries, 5);
        assert_eq!(config.parents_per_commit, 20);
        assert_eq!(config.global_parents_ring, 20);
        assert_eq!(config.ref_log_parents_ring, 20);
        assert!(config.global_state_types.is_empty());
    }
}
