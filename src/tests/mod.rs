//! Behavioral test suites.

mod test_diff;
mod test_multi_bisect;

use rand::RngCore;

use crate::Hash32;

/// A block hash whose first bytes encode the index.
pub(crate) fn indexed_hash(i: u64) -> Hash32 {
    let mut h = [0u8; 32];
    h[..8].copy_from_slice(&i.to_le_bytes());
    h
}

pub(crate) fn indexed_hashes(count: u64) -> Vec<Hash32> {
    (0..count).map(indexed_hash).collect()
}

pub(crate) fn random_hashes(count: usize) -> Vec<Hash32> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut h = [0u8; 32];
            rng.fill_bytes(&mut h);
            h
        })
        .collect()
}

/// True when `height` falls inside one of the ranges.
pub(crate) fn covered(diffs: &[crate::DiffRange], height: u64) -> bool {
    diffs
        .iter()
        .any(|d| d.start <= height && height < d.end())
}

pub(crate) fn total_count(diffs: &[crate::DiffRange]) -> u64 {
    diffs.iter().map(|d| u64::from(d.count)).sum()
}
