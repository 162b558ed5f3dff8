//! Per-content-id bloom filters over content values.
//!
//! Classic double-hashing construction: two 64-bit lattice hashes are
//! derived from one BLAKE3 digest of the value bytes, and bit `i` is
//! `h1 + i * h2 mod m`. Sizing uses the standard formulas
//! `m = -n ln p / (ln 2)^2` and `k = m/n * ln 2`.
//!
//! Filters serialize through serde/bincode like every other strata record;
//! two filters merge when their parameters agree.

use serde::{Deserialize, Serialize};

use crate::error::{GcError, GcResult};

const LN2: f64 = std::f64::consts::LN_2;

/// A mergeable bloom filter tracking the live values of one content id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentBloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    expected_entries: u64,
    inserted: u64,
}

impl ContentBloomFilter {
    /// Create a filter sized for `expected_entries` insertions at the given
    /// false-positive probability.
    pub fn new(expected_entries: u64, fpp: f64) -> Self {
        let n = expected_entries.max(1) as f64;
        let p = fpp.clamp(1e-9, 0.5);
        let num_bits = (-(n * p.ln()) / (LN2 * LN2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * LN2).round().max(1.0) as u32;
        Self {
            bits: vec![0u64; num_bits.div_ceil(64) as usize],
            num_bits,
            num_hashes,
            expected_entries: expected_entries.max(1),
            inserted: 0,
        }
    }

    /// Insert a value. Returns `true` if any bit changed (the value was
    /// definitely not present before).
    pub fn put(&mut self, value: &[u8]) -> bool {
        let (h1, h2) = lattice_hashes(value);
        let mut changed = false;
        for i in 0..self.num_hashes {
            let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits;
            let word = (bit / 64) as usize;
            let mask = 1u64 << (bit % 64);
            if self.bits[word] & mask == 0 {
                self.bits[word] |= mask;
                changed = true;
            }
        }
        if changed {
            self.inserted += 1;
        }
        changed
    }

    /// Membership test; may report false positives, never false negatives.
    pub fn might_contain(&self, value: &[u8]) -> bool {
        let (h1, h2) = lattice_hashes(value);
        (0..self.num_hashes).all(|i| {
            let bit = h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0
        })
    }

    /// Merge another filter into this one. Both must have been created
    /// with the same parameters.
    pub fn merge(&mut self, other: &Self) -> GcResult<()> {
        if self.num_bits != other.num_bits || self.num_hashes != other.num_hashes {
            return Err(GcError::IncompatibleFilters(format!(
                "{}x{} vs {}x{} bits/hashes",
                self.num_bits, self.num_hashes, other.num_bits, other.num_hashes
            )));
        }
        for (word, other_word) in self.bits.iter_mut().zip(&other.bits) {
            *word |= other_word;
        }
        self.inserted += other.inserted;
        Ok(())
    }

    /// Estimated false-positive probability at the current fill level.
    pub fn expected_fpp(&self) -> f64 {
        let k = self.num_hashes as f64;
        let fill = 1.0 - (-k * self.inserted as f64 / self.num_bits as f64).exp();
        fill.powf(k)
    }

    /// Values inserted so far (an upper bound; repeats of known values do
    /// not count).
    pub fn approximate_entries(&self) -> u64 {
        self.inserted
    }
}

fn lattice_hashes(value: &[u8]) -> (u64, u64) {
    let digest = blake3::hash(value);
    let bytes = digest.as_bytes();
    let h1 = u64::from_le_bytes(bytes[0..8].try_into().expect("digest is 32 bytes"));
    let h2 = u64::from_le_bytes(bytes[8..16].try_into().expect("digest is 32 bytes"));
    // An even h2 could degenerate the lattice; force it odd.
    (h1, h2 | 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_values_are_always_found() {
        let mut filter = ContentBloomFilter::new(100, 0.01);
        for i in 0..100 {
            filter.put(format!("value {i}").as_bytes());
        }
        for i in 0..100 {
            assert!(filter.might_contain(format!("value {i}").as_bytes()));
        }
    }

    #[test]
    fn unknown_values_are_mostly_absent() {
        let mut filter = ContentBloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            filter.put(format!("present {i}").as_bytes());
        }
        let false_positives = (0..1000)
            .filter(|i| filter.might_contain(format!("absent {i}").as_bytes()))
            .count();
        // 1% target; leave generous slack for an unlucky lattice.
        assert!(false_positives < 50, "{false_positives} false positives");
    }

    #[test]
    fn put_reports_novelty() {
        let mut filter = ContentBloomFilter::new(10, 0.01);
        assert!(filter.put(b"fresh"));
        assert!(!filter.put(b"fresh"));
        assert_eq!(filter.approximate_entries(), 1);
    }

    #[test]
    fn merge_unions_both_sides() {
        let mut left = ContentBloomFilter::new(100, 0.01);
        let mut right = ContentBloomFilter::new(100, 0.01);
        left.put(b"only left");
        right.put(b"only right");

        left.merge(&right).unwrap();
        assert!(left.might_contain(b"only left"));
        assert!(left.might_contain(b"only right"));
    }

    #[test]
    fn merge_rejects_mismatched_parameters() {
        let mut small = ContentBloomFilter::new(10, 0.01);
        let large = ContentBloomFilter::new(100_000, 0.001);
        assert!(matches!(
            small.merge(&large),
            Err(GcError::IncompatibleFilters(_))
        ));
    }

    #[test]
    fn expected_fpp_grows_with_fill() {
        let mut filter = ContentBloomFilter::new(10, 0.01);
        let empty = filter.expected_fpp();
        for i in 0..100 {
            filter.put(format!("overfill {i}").as_bytes());
        }
        assert!(filter.expected_fpp() > empty);
        assert!(filter.expected_fpp() > 0.01);
    }
}
