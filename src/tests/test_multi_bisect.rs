//! Parallel multi-range diff.

use std::sync::atomic::AtomicBool;

use super::{covered, random_hashes};
use crate::{Builder, Config, DefaultHasher, Error};

fn build(hashes: &[crate::Hash32], block_merge: usize) -> Builder<DefaultHasher> {
    let mut b = Builder::new(Config {
        block_merge,
        ..Config::default()
    });
    b.push(0, hashes).expect("push");
    b
}

#[test]
fn test_finds_all_mutated_chunks() {
    let hashes = random_hashes(3000);
    let b1 = build(&hashes, 10);

    let indices = [105u64, 500, 1500, 1990];
    let mut mutated = hashes.clone();
    for &idx in &indices {
        mutated[idx as usize][0] ^= 0xFF;
    }
    let b2 = build(&mutated, 10);

    let diffs = b1.multi_bisect(&b2, 4).expect("multi");
    assert_eq!(diffs.len(), indices.len());
    for idx in indices {
        assert!(covered(&diffs, idx), "index {idx} not covered");
    }
}

#[test]
fn test_result_is_identical_for_any_concurrency() {
    let hashes = random_hashes(3000);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    for idx in [3usize, 777, 1501, 2998] {
        mutated[idx][0] ^= 0xFF;
    }
    let b2 = build(&mutated, 10);

    let baseline = b1.multi_bisect(&b2, 1).expect("multi k=1");
    for k in [0usize, 2, 4, 8] {
        assert_eq!(b1.multi_bisect(&b2, k).expect("multi"), baseline);
    }
}

#[test]
fn test_unequal_lengths_with_mutations() {
    let count_a = 3000usize;
    let count_b = 2500usize;
    let mut hashes = random_hashes(count_a);
    let b1 = build(&hashes, 10);

    // Replica holds a mutated prefix.
    for idx in [1605usize, 1700, 1990] {
        hashes[idx][0] ^= 0xFF;
    }
    let b2 = build(&hashes[..count_b], 10);

    let diffs = b1.multi_bisect(&b2, 4).expect("multi");
    for idx in [1605u64, 1700, 1990] {
        assert!(covered(&diffs, idx), "index {idx} not covered");
    }
    // Everything past the replica's end must be reported.
    for idx in [2500u64, 2750, 2999] {
        assert!(covered(&diffs, idx), "tail index {idx} not covered");
    }

    assert_eq!(
        b1.multi_bisect(&b2, 1).expect("multi k=1"),
        b1.multi_bisect(&b2, 8).expect("multi k=8"),
    );
}

#[test]
fn test_partial_buffers_equal_content_no_diff() {
    let hashes = random_hashes(17);
    let b1 = build(&hashes, 10);
    let b2 = build(&hashes, 10);

    assert!(b1.multi_bisect(&b2, 2).expect("multi").is_empty());
}

#[test]
fn test_partial_buffer_content_mismatch() {
    let hashes = random_hashes(17);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[15][0] ^= 0xFF; // inside the open partial chunk [10, 17)
    let b2 = build(&mutated, 10);

    let diffs = b1.multi_bisect(&b2, 2).expect("multi");
    assert_eq!(diffs.len(), 1);
    assert_eq!((diffs[0].start, diffs[0].count), (10, 7));
}

#[test]
fn test_partial_buffer_length_mismatch_covers_union() {
    let hashes = random_hashes(17);
    let b1 = build(&hashes, 10);
    let b2 = build(&hashes[..13], 10);

    let diffs = b1.multi_bisect(&b2, 2).expect("multi");
    assert_eq!(diffs.len(), 1);
    assert_eq!((diffs[0].start, diffs[0].count), (10, 7));
}

#[test]
fn test_agrees_with_tree_diff_on_aligned_trees() {
    let hashes = random_hashes(2000);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[40][0] ^= 0xFF;
    mutated[41][0] ^= 0xFF;
    mutated[1999][0] ^= 0xFF;
    let b2 = build(&mutated, 10);

    let multi = b1.multi_bisect(&b2, 4).expect("multi");
    let walked = crate::consolidate_diffs(b1.tree_diff(&b2).expect("tree diff"));
    assert_eq!(multi, walked);
}

#[test]
fn test_pre_raised_token_cancels_with_partial_results() {
    let hashes = random_hashes(3000);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[1500][0] ^= 0xFF;
    let b2 = build(&mutated, 10);

    let cancel = AtomicBool::new(true);
    let err = b1
        .multi_bisect_cancellable(&b2, 4, &cancel)
        .expect_err("must report cancellation");
    match err {
        Error::Cancelled(partial) => {
            // Workers stopped before descending; whatever was collected is
            // a subset of the full diff.
            let full = b1.multi_bisect(&b2, 4).expect("full multi");
            for d in partial {
                assert!(full.iter().any(|f| f.start <= d.start && d.end() <= f.end()));
            }
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unraised_token_behaves_like_plain_multi_bisect() {
    let hashes = random_hashes(500);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[250][0] ^= 0xFF;
    let b2 = build(&mutated, 10);

    let cancel = AtomicBool::new(false);
    let got = b1
        .multi_bisect_cancellable(&b2, 4, &cancel)
        .expect("uncancelled run");
    assert_eq!(got, b1.multi_bisect(&b2, 4).expect("plain run"));
}
