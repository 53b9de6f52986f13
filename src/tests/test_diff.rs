//! Full-tree diff walks.

use super::{covered, random_hashes, total_count};
use crate::{consolidate_diffs, Builder, Config, DefaultHasher};

fn build(hashes: &[crate::Hash32], block_merge: usize) -> Builder<DefaultHasher> {
    let mut b = Builder::new(Config {
        block_merge,
        ..Config::default()
    });
    b.push(0, hashes).expect("push");
    b
}

#[test]
fn test_identical_trees_have_no_diffs() {
    let hashes = random_hashes(3000);
    let b1 = build(&hashes, 10);
    let b2 = build(&hashes, 10);

    assert!(b1.tree_diff(&b2).expect("diff").is_empty());
}

#[test]
fn test_single_mutation_yields_one_chunk_range() {
    let hashes = random_hashes(3000);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[1500][0] ^= 0xFF;
    let b2 = build(&mutated, 10);

    let diffs = b1.tree_diff(&b2).expect("diff");
    assert_eq!(diffs.len(), 1);
    assert_eq!((diffs[0].start, diffs[0].count), (1500, 10));
}

#[test]
fn test_two_mutations_yield_two_ranges() {
    let hashes = random_hashes(3000);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[500][0] ^= 0xFF;
    mutated[1500][0] ^= 0xFF;
    let b2 = build(&mutated, 10);

    let diffs = b1.tree_diff(&b2).expect("diff");
    assert_eq!(diffs.len(), 2);
    assert!(covered(&diffs, 500));
    assert!(covered(&diffs, 1500));

    // The first differing range is what tree_bisect reports.
    let (start, _) = b1.tree_bisect(&b2).expect("bisect");
    assert_eq!(start, 500);

    // The parallel engine agrees after consolidation.
    let multi = b1.multi_bisect(&b2, 4).expect("multi");
    assert_eq!(multi, consolidate_diffs(diffs));
}

#[test]
fn test_prefix_shorter_tree_reports_missing_tail() {
    let hashes = random_hashes(3000);
    let b_full = build(&hashes, 10);
    let b_prefix = build(&hashes[..200], 10);

    let diffs = b_full.tree_diff(&b_prefix).expect("diff");
    assert!(!diffs.is_empty());
    assert_eq!(diffs[0].start, 200);
    assert_eq!(total_count(&diffs), 2800);
}

#[test]
fn test_inner_mutations_and_missing_tail_both_found() {
    let hashes = random_hashes(3000);
    let b_full = build(&hashes, 100);

    // Shorter replica with extra mutations inside the shared prefix.
    let mut prefix = hashes[..200].to_vec();
    prefix[55][0] ^= 0xFF;
    prefix[155][0] ^= 0xFF;
    let b_prefix = build(&prefix, 100);

    let diffs = b_full.tree_diff(&b_prefix).expect("diff");
    assert!(covered(&diffs, 55));
    assert!(covered(&diffs, 155));

    let tail: u64 = diffs
        .iter()
        .filter(|d| d.start >= 200)
        .map(|d| u64::from(d.count))
        .sum();
    assert_eq!(tail, 2800);
}

#[test]
fn test_diff_is_symmetric_in_coverage() {
    let hashes = random_hashes(600);
    let b1 = build(&hashes, 10);

    let mut mutated = hashes.clone();
    mutated[123][0] ^= 0xFF;
    let b2 = build(&mutated, 10);

    let forward = b1.tree_diff(&b2).expect("forward diff");
    let backward = b2.tree_diff(&b1).expect("backward diff");
    assert_eq!(consolidate_diffs(forward), consolidate_diffs(backward));
}
