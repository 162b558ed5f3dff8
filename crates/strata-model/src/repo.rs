//! Repository description: version and free-form properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Descriptive attributes of a repository, updated under the same
/// optimistic discipline as the global pointer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDescription {
    /// Data-model version of the repository, for upgrade tooling.
    pub repo_version: u32,
    /// Free-form string properties.
    pub properties: BTreeMap<String, String>,
}

impl RepoDescription {
    /// A description with the given version and no properties.
    pub fn with_version(repo_version: u32) -> Self {
        Self {
            repo_version,
            properties: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_version_zero() {
        let desc = RepoDescription::default();
        assert_eq!(desc.repo_version, 0);
        assert!(desc.properties.is_empty());
    }

    #[test]
    fn properties_are_ordered() {
        let mut desc = RepoDescription::with_version(1);
        desc.properties.insert("b".into(), "2".into());
        desc.properties.insert("a".into(), "1".into());
        let keys: Vec<&String> = desc.properties.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
