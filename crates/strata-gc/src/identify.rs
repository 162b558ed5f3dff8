//! Pass 2: expired-content identification.

use std::collections::BTreeMap;

use tracing::info;

use strata_engine::DatabaseAdapter;
use strata_store::Store;
use strata_types::{ContentId, ContentKey, ContentType, Hash};

use crate::bloom::ContentBloomFilter;
use crate::config::GcParams;
use crate::error::GcResult;
use crate::liveset::{GcWalker, ReferenceHandle, ReferenceResult};

/// One globally-expired content value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiredContent {
    pub key: ContentKey,
    pub content_id: ContentId,
    pub content_type: ContentType,
    pub value: Vec<u8>,
    /// The commit whose put carried the value.
    pub commit: Hash,
}

/// Expired content grouped by reference name, then content id.
#[derive(Debug, Default)]
pub struct IdentifiedResult {
    pub expired: BTreeMap<String, BTreeMap<ContentId, Vec<ExpiredContent>>>,
    pub references: Vec<ReferenceResult>,
}

impl IdentifiedResult {
    /// Total number of expired values across all references.
    pub fn expired_count(&self) -> usize {
        self.expired
            .values()
            .flat_map(|per_cid| per_cid.values())
            .map(Vec::len)
            .sum()
    }
}

impl<S: Store> GcWalker<'_, S> {
    /// Pass 2: re-walk every reference and report each put whose value is
    /// absent from its content id's live-set filter.
    ///
    /// A content id without a filter has no live values at all; every put
    /// for it is expired.
    pub fn identify_expired(
        &self,
        references: &[ReferenceHandle],
        filters: &BTreeMap<ContentId, ContentBloomFilter>,
    ) -> GcResult<IdentifiedResult> {
        let outcomes = self.run_sharded(references, |handle| {
            let mut expired: BTreeMap<ContentId, Vec<ExpiredContent>> = BTreeMap::new();
            for entry in self.adapter().commit_log(handle.head)? {
                let entry = entry?;
                for put in &entry.puts {
                    let live = filters
                        .get(&put.content_id)
                        .map(|filter| filter.might_contain(&put.value))
                        .unwrap_or(false);
                    if !live {
                        expired.entry(put.content_id.clone()).or_default().push(
                            ExpiredContent {
                                key: put.key.clone(),
                                content_id: put.content_id.clone(),
                                content_type: put.content_type,
                                value: put.value.clone(),
                                commit: entry.hash,
                            },
                        );
                    }
                }
            }
            Ok(expired)
        });

        let mut result = IdentifiedResult::default();
        for (reference, expired) in outcomes {
            if let Some(expired) = expired {
                if !expired.is_empty() {
                    let slot = result.expired.entry(reference.name.clone()).or_default();
                    for (content_id, mut values) in expired {
                        slot.entry(content_id).or_default().append(&mut values);
                    }
                }
            }
            result.references.push(reference);
        }
        info!(
            references = references.len(),
            expired = result.expired_count(),
            "identified expired contents"
        );
        Ok(result)
    }
}

/// Run the full two-pass identification over all references of the
/// repository.
pub fn identify_expired_contents<S: Store>(
    adapter: &DatabaseAdapter<S>,
    params: GcParams,
) -> GcResult<IdentifiedResult> {
    let walker = GcWalker::new(adapter, params);
    let references = walker.collect_references()?;
    let live = walker.live_contents(&references)?;
    walker.identify_expired(&references, &live.filters)
}
