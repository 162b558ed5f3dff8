//! Pass 1: live-set construction.

use std::collections::{BTreeMap, BTreeSet};
use std::thread;

use tracing::{debug, warn};

use strata_engine::{DatabaseAdapter, GetNamedRefsParams};
use strata_model::{RefLogOp, RefType};
use strata_store::Store;
use strata_types::{ContentId, ContentKey, ContentType, Hash, KeyWithBytes};

use crate::bloom::ContentBloomFilter;
use crate::config::GcParams;
use crate::error::GcResult;

/// One unit of GC work: a live or dead reference with its effective cutoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceHandle {
    pub name: String,
    pub ref_type: RefType,
    pub head: Hash,
    /// Effective cutoff for this reference: the global cutoff, or the drop
    /// time for dead references, whichever is earlier.
    pub cutoff_micros: u64,
    /// Recovered from the ref log rather than the pointer.
    pub dead: bool,
}

/// Outcome of walking one reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceResult {
    pub name: String,
    pub head: Hash,
    pub success: bool,
    pub error: Option<String>,
}

/// Merged output of the live-set pass.
#[derive(Debug)]
pub struct LiveContentsResult {
    /// One bloom filter per content id, covering every live value.
    pub filters: BTreeMap<ContentId, ContentBloomFilter>,
    /// Per-reference success flags.
    pub references: Vec<ReferenceResult>,
}

/// Walks references for garbage collection.
pub struct GcWalker<'a, S: Store> {
    adapter: &'a DatabaseAdapter<S>,
    params: GcParams,
}

impl<'a, S: Store> GcWalker<'a, S> {
    pub fn new(adapter: &'a DatabaseAdapter<S>, params: GcParams) -> Self {
        Self { adapter, params }
    }

    pub fn params(&self) -> &GcParams {
        &self.params
    }

    pub(crate) fn adapter(&self) -> &DatabaseAdapter<S> {
        self.adapter
    }

    /// Enumerate all references to walk: the live ones from the pointer
    /// plus the dead ones recovered from DELETE_REFERENCE and
    /// ASSIGN_REFERENCE ref-log entries.
    pub fn collect_references(&self) -> GcResult<Vec<ReferenceHandle>> {
        let mut handles = Vec::new();

        for info in self.adapter.named_refs(&GetNamedRefsParams::default())? {
            handles.push(ReferenceHandle {
                name: info.name,
                ref_type: info.ref_type,
                head: info.hash,
                cutoff_micros: self.params.cutoff_micros,
                dead: false,
            });
        }

        for entry in self.adapter.ref_log(None)? {
            let entry = entry?;
            let dropped = match entry.operation {
                RefLogOp::DeleteReference => entry.commit_hash,
                RefLogOp::AssignReference => match entry.source_hashes.first() {
                    Some(hash) => *hash,
                    None => continue,
                },
                _ => continue,
            };
            if dropped.is_no_ancestor() {
                continue;
            }
            handles.push(ReferenceHandle {
                name: entry.ref_name.clone(),
                ref_type: entry.ref_type,
                head: dropped,
                cutoff_micros: self.params.cutoff_micros.min(entry.operation_time),
                dead: true,
            });
        }

        debug!(
            total = handles.len(),
            dead = handles.iter().filter(|h| h.dead).count(),
            "collected references for GC"
        );
        Ok(handles)
    }

    /// Expected bloom entries: the configured override, or the total commit
    /// count on the default branch.
    pub fn expected_entries(&self) -> GcResult<u64> {
        if let Some(expected) = self.params.bloom_filter_expected_entries {
            return Ok(expected);
        }
        let default_branch = self.adapter.config().default_branch.clone();
        let info = self.adapter.named_ref(
            &default_branch,
            &GetNamedRefsParams {
                include_num_total_commits: true,
                ..GetNamedRefsParams::default()
            },
        )?;
        Ok(info.num_total_commits.unwrap_or(0).max(1))
    }

    /// Pass 1: build the per-content-id bloom filters over every reference.
    ///
    /// References are partitioned into shards executed on scoped threads; a
    /// failed reference walk is reported in its [`ReferenceResult`] without
    /// aborting the other walks. Merged filters whose estimated
    /// false-positive probability exceeds the configured target are logged
    /// as degraded.
    pub fn live_contents(&self, references: &[ReferenceHandle]) -> GcResult<LiveContentsResult> {
        let expected = self.expected_entries()?;
        let outcomes = self.run_sharded(references, |handle| {
            self.walk_live_reference(handle, expected)
        });

        let mut filters: BTreeMap<ContentId, ContentBloomFilter> = BTreeMap::new();
        let mut results = Vec::with_capacity(outcomes.len());
        for (result, walked) in outcomes {
            if let Some(walked) = walked {
                for (content_id, filter) in walked {
                    match filters.entry(content_id) {
                        std::collections::btree_map::Entry::Vacant(slot) => {
                            slot.insert(filter);
                        }
                        std::collections::btree_map::Entry::Occupied(mut slot) => {
                            slot.get_mut().merge(&filter)?;
                        }
                    }
                }
            }
            results.push(result);
        }

        for (content_id, filter) in &filters {
            let observed = filter.expected_fpp();
            if observed > self.params.bloom_filter_fpp {
                warn!(
                    content_id = %content_id,
                    observed_fpp = observed,
                    target_fpp = self.params.bloom_filter_fpp,
                    "bloom filter degraded"
                );
            }
        }

        Ok(LiveContentsResult {
            filters,
            references: results,
        })
    }

    /// Walk one reference for the live-set pass.
    ///
    /// Puts of commits at or after the reference's cutoff are live. At the
    /// first expired commit the keys live there are captured; each such
    /// key's most recent value at the cutoff is live too. The walk stops
    /// once every captured key is accounted for.
    fn walk_live_reference(
        &self,
        handle: &ReferenceHandle,
        expected_entries: u64,
    ) -> GcResult<BTreeMap<ContentId, ContentBloomFilter>> {
        let mut filters: BTreeMap<ContentId, ContentBloomFilter> = BTreeMap::new();
        let mut pending_at_cutoff: Option<BTreeSet<ContentKey>> = None;

        for entry in self.adapter.commit_log(handle.head)? {
            let entry = entry?;

            if pending_at_cutoff.is_none() && entry.created_time >= handle.cutoff_micros {
                for put in &entry.puts {
                    self.admit(&mut filters, put, expected_entries);
                }
                continue;
            }

            // Expired region. Capture the live key set once, at the cutoff
            // commit, then hunt down each key's current value; the first
            // put found walking backwards is the value live at the cutoff.
            if pending_at_cutoff.is_none() {
                let live: BTreeSet<ContentKey> = self
                    .adapter
                    .keys(entry.hash, all_keys)?
                    .into_iter()
                    .map(|kwt| kwt.key)
                    .collect();
                pending_at_cutoff = Some(live);
            }
            if let Some(pending) = pending_at_cutoff.as_mut() {
                for put in entry.puts.iter().rev() {
                    if pending.remove(&put.key) {
                        self.admit(&mut filters, put, expected_entries);
                    }
                }
                if pending.is_empty() {
                    break;
                }
            }
        }

        Ok(filters)
    }

    fn admit(
        &self,
        filters: &mut BTreeMap<ContentId, ContentBloomFilter>,
        put: &KeyWithBytes,
        expected_entries: u64,
    ) {
        filters
            .entry(put.content_id.clone())
            .or_insert_with(|| {
                ContentBloomFilter::new(expected_entries, self.params.bloom_filter_fpp)
            })
            .put(&put.value);
    }

    /// Run `work` over the references, partitioned into the configured
    /// number of shards on scoped threads. Failures become per-reference
    /// results instead of aborting the job.
    pub(crate) fn run_sharded<T, W>(
        &self,
        references: &[ReferenceHandle],
        work: W,
    ) -> Vec<(ReferenceResult, Option<T>)>
    where
        T: Send,
        W: Fn(&ReferenceHandle) -> GcResult<T> + Sync,
    {
        if references.is_empty() {
            return Vec::new();
        }
        let shards = self
            .params
            .task_count
            .unwrap_or(references.len())
            .clamp(1, references.len());
        let chunk_size = references.len().div_ceil(shards);

        thread::scope(|scope| {
            let handles: Vec<_> = references
                .chunks(chunk_size)
                .map(|chunk| {
                    let work = &work;
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|reference| match work(reference) {
                                Ok(value) => (
                                    ReferenceResult {
                                        name: reference.name.clone(),
                                        head: reference.head,
                                        success: true,
                                        error: None,
                                    },
                                    Some(value),
                                ),
                                Err(err) => (
                                    ReferenceResult {
                                        name: reference.name.clone(),
                                        head: reference.head,
                                        success: false,
                                        error: Some(err.to_string()),
                                    },
                                    None,
                                ),
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().expect("GC shard thread panicked"))
                .collect()
        })
    }
}

fn all_keys(_: &ContentKey, _: &ContentId, _: ContentType) -> bool {
    true
}
