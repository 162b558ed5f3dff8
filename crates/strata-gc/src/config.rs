//! GC run parameters.

/// Parameters of one garbage-collection run.
#[derive(Clone, Debug)]
pub struct GcParams {
    /// Cutoff timestamp in microseconds since the UNIX epoch. Commits at
    /// or after the cutoff are live; older commits are expired except for
    /// the content still current at the cutoff.
    pub cutoff_micros: u64,
    /// Target false-positive probability per content-id bloom filter.
    /// Merged filters exceeding this are logged as degraded.
    pub bloom_filter_fpp: f64,
    /// Expected entries per bloom filter. Defaults to the total commit
    /// count on the default branch.
    pub bloom_filter_expected_entries: Option<u64>,
    /// Parallel shards for the per-reference walks. Defaults to one shard
    /// per reference.
    pub task_count: Option<usize>,
}

impl Default for GcParams {
    fn default() -> Self {
        Self {
            cutoff_micros: 0,
            bloom_filter_fpp: 0.01,
            bloom_filter_expected_entries: None,
            task_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let params = GcParams::default();
        assert_eq!(params.bloom_filter_fpp, 0.01);
        assert!(params.bloom_filter_expected_entries.is_none());
        assert!(params.task_count.is_none());
    }
}
