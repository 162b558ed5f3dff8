//! Two-pass GC tests over the in-memory store.

use std::sync::Arc;

use strata_engine::{AdapterConfig, CommitAttempt, DatabaseAdapter};
use strata_model::RefType;
use strata_store::InMemoryStore;
use strata_types::{ContentId, ContentKey, ContentType, Hash, KeyWithBytes};

use crate::config::GcParams;
use crate::identify::identify_expired_contents;
use crate::liveset::{GcWalker, ReferenceHandle};

fn harness() -> DatabaseAdapter<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new("gc-repo"));
    let adapter = DatabaseAdapter::new(store, AdapterConfig::default());
    adapter.initialize_repo().unwrap();
    adapter
}

fn commit_value(adapter: &DatabaseAdapter<InMemoryStore>, value: &str) -> Hash {
    adapter
        .commit(CommitAttempt {
            branch: "main".into(),
            metadata: value.as_bytes().to_vec(),
            puts: vec![KeyWithBytes::new(
                ContentKey::of(&["table"]).unwrap(),
                ContentId::new("C-table"),
                ContentType(0),
                value.as_bytes().to_vec(),
            )],
            ..Default::default()
        })
        .unwrap()
}

fn created_time(adapter: &DatabaseAdapter<InMemoryStore>, commit: Hash) -> u64 {
    adapter
        .commit_log(commit)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .created_time
}

/// Space out wall-clock-sensitive steps so commit times and ref-log
/// operation times land in distinct microseconds.
fn tick() {
    std::thread::sleep(std::time::Duration::from_millis(2));
}

fn params(cutoff_micros: u64) -> GcParams {
    GcParams {
        cutoff_micros,
        bloom_filter_expected_entries: Some(64),
        ..GcParams::default()
    }
}

// ---------------------------------------------------------------------
// Reference collection
// ---------------------------------------------------------------------

#[test]
fn collects_live_and_dropped_references() {
    let adapter = harness();
    let c1 = commit_value(&adapter, "one");
    let c2 = commit_value(&adapter, "two");

    adapter.create("dropped", RefType::Branch, Some(c1)).unwrap();
    adapter.delete("dropped", Some(c1)).unwrap();
    adapter.create("moved", RefType::Branch, Some(c2)).unwrap();
    adapter.assign("moved", Some(c2), c1).unwrap();

    let walker = GcWalker::new(&adapter, params(0));
    let handles = walker.collect_references().unwrap();

    let live: Vec<&str> = handles
        .iter()
        .filter(|h| !h.dead)
        .map(|h| h.name.as_str())
        .collect();
    assert!(live.contains(&"main"));
    assert!(live.contains(&"moved"));

    // The deleted branch contributes its dropped HEAD; the assigned branch
    // contributes the HEAD it was moved away from.
    let dead: Vec<(&str, Hash)> = handles
        .iter()
        .filter(|h| h.dead)
        .map(|h| (h.name.as_str(), h.head))
        .collect();
    assert!(dead.contains(&("dropped", c1)));
    assert!(dead.contains(&("moved", c2)));
}

// ---------------------------------------------------------------------
// Live-set construction + expired identification
// ---------------------------------------------------------------------

#[test]
fn cutoff_preserves_time_travel_and_expires_older_values() {
    let adapter = harness();
    let v0 = commit_value(&adapter, "value zero");
    tick();
    let v1 = commit_value(&adapter, "value one");
    tick();

    // A branch still pointing at v1, dropped before the cutoff.
    adapter.create("pinned", RefType::Branch, Some(v1)).unwrap();
    adapter.delete("pinned", Some(v1)).unwrap();
    tick();

    let v2 = commit_value(&adapter, "value two");
    commit_value(&adapter, "value three");
    let cutoff = created_time(&adapter, v2);

    let walker = GcWalker::new(&adapter, params(cutoff));
    let references = walker.collect_references().unwrap();
    let live = walker.live_contents(&references).unwrap();
    assert!(live.references.iter().all(|r| r.success));

    // Everything at or after the cutoff is live, and so is the value
    // current at the cutoff (v1) — both via main's cutoff commit and via
    // the dropped reference.
    let filter = &live.filters[&ContentId::new("C-table")];
    assert!(filter.might_contain(b"value three"));
    assert!(filter.might_contain(b"value two"));
    assert!(filter.might_contain(b"value one"));
    assert!(!filter.might_contain(b"value zero"));

    let identified = walker.identify_expired(&references, &live.filters).unwrap();
    assert!(identified.references.iter().all(|r| r.success));

    // v0's value is expired on every reference that can still reach it.
    for reference in ["main", "pinned"] {
        let per_cid = &identified.expired[reference];
        let expired = &per_cid[&ContentId::new("C-table")];
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].value, b"value zero".to_vec());
        assert_eq!(expired[0].commit, v0);
    }
}

#[test]
fn nothing_expires_with_a_zero_cutoff() {
    let adapter = harness();
    for i in 0..5 {
        commit_value(&adapter, &format!("value {i}"));
    }

    let identified = identify_expired_contents(&adapter, params(0)).unwrap();
    assert_eq!(identified.expired_count(), 0);
    assert!(identified.references.iter().all(|r| r.success));
}

#[test]
fn single_shard_matches_per_reference_sharding() {
    let adapter = harness();
    let v0 = commit_value(&adapter, "old value");
    let v1 = commit_value(&adapter, "kept value");
    let v2 = commit_value(&adapter, "new value");
    adapter.create("side", RefType::Branch, Some(v1)).unwrap();
    let cutoff = created_time(&adapter, v2);

    let sharded = identify_expired_contents(&adapter, params(cutoff)).unwrap();
    let single = identify_expired_contents(
        &adapter,
        GcParams {
            task_count: Some(1),
            ..params(cutoff)
        },
    )
    .unwrap();

    assert_eq!(sharded.expired_count(), single.expired_count());
    for result in [&sharded, &single] {
        // v1 is the live-at-cutoff value on both references; only v0's
        // value expires.
        let expired = &result.expired["main"][&ContentId::new("C-table")];
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].commit, v0);
        assert_eq!(
            result.expired["side"][&ContentId::new("C-table")][0].commit,
            v0
        );
    }
}

// ---------------------------------------------------------------------
// Failure semantics
// ---------------------------------------------------------------------

#[test]
fn a_failing_reference_walk_does_not_abort_the_job() {
    let adapter = harness();
    commit_value(&adapter, "present");

    let good = GcWalker::new(&adapter, params(0))
        .collect_references()
        .unwrap();
    let mut references = good;
    references.push(ReferenceHandle {
        name: "phantom".into(),
        ref_type: RefType::Branch,
        head: Hash::of_bytes(b"not a commit"),
        cutoff_micros: 0,
        dead: true,
    });

    let walker = GcWalker::new(&adapter, params(0));
    let live = walker.live_contents(&references).unwrap();

    let phantom = live
        .references
        .iter()
        .find(|r| r.name == "phantom")
        .unwrap();
    assert!(!phantom.success);
    assert!(phantom.error.is_some());
    assert!(live
        .references
        .iter()
        .filter(|r| r.name != "phantom")
        .all(|r| r.success));

    // The healthy reference still produced its filter.
    assert!(live.filters[&ContentId::new("C-table")].might_contain(b"present"));
}
