//! Streaming peaks accumulator over range-tagged leaves.
//!
//! A Merkle-mountain-range-style structure: leaves are appended left to
//! right and merged into a sparse array of peaks indexed by level. Unlike a
//! positional MMR, leaves here are chunks of *variable* width (the tail
//! chunk of an ingest may be short), so merging is driven purely by slot
//! occupancy and every combine asserts range contiguity instead of relying
//! on position arithmetic. A slot at level `l` therefore does not
//! necessarily hold exactly `2^l` underlying blocks; the maintained
//! invariant is that iterating peaks from the highest occupied level down
//! yields subtrees whose ranges tile the committed history left to right.

use std::io::Read;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hash::{Hash32, NodeCombiner, ZERO_HASH};
use crate::node::SpanNode;
use crate::snapshot::{read_u32, read_u64, read_u8, read_hash};

/// Ceiling on the decoded peak slot count. 64 levels already cover any
/// u64 leaf count; anything above this is a hostile snapshot.
pub(crate) const MAX_PEAK_SLOTS: usize = 128;

/// Sparse by-level peak array with a pluggable combine digest.
#[derive(Debug)]
pub(crate) struct PeaksAccumulator {
    /// Peaks indexed by level; `None` marks an empty slot.
    pub(crate) peaks: Vec<Option<Arc<SpanNode>>>,
    /// Number of leaves appended so far.
    pub(crate) leaf_count: u64,
    /// Range-tagged combine digest for internal nodes.
    pub(crate) combiner: NodeCombiner,
}

impl PeaksAccumulator {
    pub(crate) fn new(combiner: NodeCombiner) -> Self {
        Self {
            peaks: Vec::new(),
            leaf_count: 0,
            combiner,
        }
    }

    pub(crate) fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    pub(crate) fn peaks(&self) -> &[Option<Arc<SpanNode>>] {
        &self.peaks
    }

    /// Append a leaf, carrying it up through occupied slots.
    ///
    /// While the slot at the current level holds a peak, that peak combines
    /// with the carry as `(left, right)` and the merged node carries to the
    /// next level. Each combine asserts that the left range ends exactly
    /// where the right range begins; on violation the accumulator is left
    /// unchanged and the error surfaces to the caller.
    pub(crate) fn add_leaf(&mut self, leaf: SpanNode) -> Result<()> {
        let mut carry = Arc::new(leaf);
        let mut level = 0usize;

        // Build the carry chain without touching the slots, so a
        // contiguity violation leaves the accumulator untouched.
        while let Some(Some(left)) = self.peaks.get(level) {
            if left.end() != carry.start {
                return Err(Error::NonContiguousCombine {
                    level,
                    left_end: left.end(),
                    right_start: carry.start,
                });
            }
            let count = left.count + carry.count;
            let sum = (self.combiner)(left.start, count, &left.sum, &carry.sum);
            carry = Arc::new(SpanNode::internal(
                left.start,
                count,
                sum,
                Arc::clone(left),
                carry,
            ));
            level += 1;
        }

        // Commit: clear the merged slots and place the carry.
        for slot in &mut self.peaks[..level] {
            *slot = None;
        }
        if level == self.peaks.len() {
            self.peaks.push(None);
        }
        self.peaks[level] = Some(carry);
        self.leaf_count += 1;
        Ok(())
    }

    /// Fold the remaining peaks into the global root digest.
    ///
    /// Peaks are processed from the highest occupied level down, each step
    /// combining the accumulated fold as *left* with the next peak as
    /// *right*. This direction is part of the digest definition; folding
    /// the other way changes every outer-node hash. An empty accumulator
    /// folds to the zero hash, as does a contiguity violation between
    /// peaks (which cannot arise from `add_leaf`).
    pub(crate) fn root(&self) -> Hash32 {
        let mut fold: Option<(u64, u32, Hash32)> = None;
        for p in self.peaks.iter().rev().flatten() {
            fold = match fold {
                None => Some((p.start, p.count, p.sum)),
                Some((start, count, sum)) => {
                    if start + u64::from(count) != p.start {
                        return ZERO_HASH;
                    }
                    let merged = count + p.count;
                    Some((start, merged, (self.combiner)(start, merged, &sum, &p.sum)))
                }
            };
        }
        fold.map(|(_, _, sum)| sum).unwrap_or(ZERO_HASH)
    }

    /// Materialize the logical root node for tree descent.
    ///
    /// Same fold order as [`root`](Self::root), but the intermediate
    /// combine nodes retain `Arc` links to both children so diff engines
    /// can walk down into the peaks. Returns `Ok(None)` for an empty
    /// accumulator.
    pub(crate) fn root_node(&self) -> Result<Option<Arc<SpanNode>>> {
        let mut fold: Option<Arc<SpanNode>> = None;
        for (level, p) in self.peaks.iter().enumerate().rev() {
            let Some(p) = p else { continue };
            fold = Some(match fold {
                None => Arc::clone(p),
                Some(left) => {
                    if left.end() != p.start {
                        return Err(Error::NonContiguousCombine {
                            level,
                            left_end: left.end(),
                            right_start: p.start,
                        });
                    }
                    let count = left.count + p.count;
                    let sum = (self.combiner)(left.start, count, &left.sum, &p.sum);
                    Arc::new(SpanNode::internal(
                        left.start,
                        count,
                        sum,
                        left,
                        Arc::clone(p),
                    ))
                }
            });
        }
        Ok(fold)
    }

    /// Serialize `leaf_count` and the sparse peak array.
    ///
    /// Layout: `leaf_count_u64 || slot_count_u32 || slots`, where each slot
    /// is a presence byte optionally followed by
    /// `start_u64 || count_u32 || sum_32`. Little-endian throughout.
    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.leaf_count.to_le_bytes());
        buf.extend_from_slice(&(self.peaks.len() as u32).to_le_bytes());
        for slot in &self.peaks {
            match slot {
                None => buf.push(0),
                Some(p) => {
                    buf.push(1);
                    buf.extend_from_slice(&p.start.to_le_bytes());
                    buf.extend_from_slice(&p.count.to_le_bytes());
                    buf.extend_from_slice(&p.sum);
                }
            }
        }
    }

    /// Decode a peak array written by [`encode_into`](Self::encode_into).
    ///
    /// The declared slot count is capped at [`MAX_PEAK_SLOTS`] before any
    /// allocation, so a hostile length cannot force an OOM. Decoded peaks
    /// carry no child links.
    pub(crate) fn decode<R: Read>(r: &mut R, combiner: NodeCombiner) -> Result<Self> {
        let leaf_count = read_u64(r, "peaks leaf_count")?;
        let slot_count = read_u32(r, "peaks slot_count")? as usize;
        if slot_count > MAX_PEAK_SLOTS {
            return Err(Error::SnapshotBounds(format!(
                "peak slot count {} exceeds maximum of {}",
                slot_count, MAX_PEAK_SLOTS
            )));
        }

        let mut peaks = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            match read_u8(r, "peak presence flag")? {
                0 => peaks.push(None),
                1 => {
                    let start = read_u64(r, "peak start")?;
                    let count = read_u32(r, "peak count")?;
                    let sum = read_hash(r, "peak sum")?;
                    peaks.push(Some(Arc::new(SpanNode::detached(start, count, sum))));
                }
                other => {
                    return Err(Error::InvalidSnapshot(format!(
                        "invalid peak presence flag: {:#04x}",
                        other
                    )));
                }
            }
        }

        Ok(Self {
            peaks,
            leaf_count,
            combiner,
        })
    }
}

#[cfg(test)]
mod tests {
    use sha2::Sha256;

    use super::*;
    use crate::hash::outer_node_digest;

    fn leaf(start: u64, count: u32, fill: u8) -> SpanNode {
        SpanNode::chunk(start, count, [fill; 32])
    }

    #[test]
    fn test_single_leaf_root_is_leaf_sum() {
        let mut acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        acc.add_leaf(leaf(0, 10, 0xAA)).expect("add leaf");
        assert_eq!(acc.root(), [0xAA; 32]);
        assert_eq!(acc.leaf_count(), 1);
    }

    #[test]
    fn test_empty_root_is_zero() {
        let acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        assert_eq!(acc.root(), ZERO_HASH);
        assert!(acc.root_node().expect("root node").is_none());
    }

    #[test]
    fn test_fold_direction_highest_level_first() {
        // Three leaves: levels hold [2-leaf subtree at L1, leaf C at L0].
        // The root must fold the L1 subtree as left with C as right.
        let mut acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        acc.add_leaf(leaf(0, 4, 0x01)).expect("add a");
        acc.add_leaf(leaf(4, 4, 0x02)).expect("add b");
        acc.add_leaf(leaf(8, 4, 0x03)).expect("add c");

        let ab = outer_node_digest::<Sha256>(0, 8, &[0x01; 32], &[0x02; 32]);
        let expected = outer_node_digest::<Sha256>(0, 12, &ab, &[0x03; 32]);
        assert_eq!(acc.root(), expected);
    }

    #[test]
    fn test_root_node_retains_children() {
        let mut acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        acc.add_leaf(leaf(0, 4, 0x01)).expect("add a");
        acc.add_leaf(leaf(4, 4, 0x02)).expect("add b");
        acc.add_leaf(leaf(8, 2, 0x03)).expect("add c");

        let root = acc.root_node().expect("root node").expect("non-empty");
        assert_eq!(root.sum, acc.root());
        assert_eq!((root.start, root.count), (0, 10));
        assert!(!root.is_leaf());

        let left = root.left.as_ref().expect("left child");
        let right = root.right.as_ref().expect("right child");
        assert_eq!((left.start, left.count), (0, 8));
        assert_eq!((right.start, right.count), (8, 2));
        assert!(right.has_data);
    }

    #[test]
    fn test_non_contiguous_combine_rejected_and_state_unchanged() {
        let mut acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        acc.add_leaf(leaf(0, 4, 0x01)).expect("add a");
        let before_root = acc.root();

        let err = acc.add_leaf(leaf(100, 4, 0x02)).expect_err("gap must fail");
        assert!(matches!(err, Error::NonContiguousCombine { level: 0, .. }));
        assert_eq!(acc.root(), before_root);
        assert_eq!(acc.leaf_count(), 1);
    }

    #[test]
    fn test_short_tail_chunk_keeps_tiling() {
        // Variable-width leaves: a full chunk followed by a short tail.
        let mut acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        acc.add_leaf(leaf(0, 200, 0x01)).expect("full chunk");
        acc.add_leaf(leaf(200, 3, 0x02)).expect("tail chunk");

        let expected = outer_node_digest::<Sha256>(0, 203, &[0x01; 32], &[0x02; 32]);
        assert_eq!(acc.root(), expected);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut acc = PeaksAccumulator::new(outer_node_digest::<Sha256>);
        for i in 0..5u64 {
            acc.add_leaf(leaf(i * 10, 10, i as u8 + 1)).expect("add");
        }

        let mut buf = Vec::new();
        acc.encode_into(&mut buf);

        let decoded = PeaksAccumulator::decode(&mut buf.as_slice(), outer_node_digest::<Sha256>)
            .expect("decode");
        assert_eq!(decoded.leaf_count(), 5);
        assert_eq!(decoded.root(), acc.root());
    }

    #[test]
    fn test_decode_rejects_hostile_slot_count() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&200_000_000u32.to_le_bytes());

        let err = PeaksAccumulator::decode(&mut buf.as_slice(), outer_node_digest::<Sha256>)
            .expect_err("hostile slot count");
        assert!(matches!(err, Error::SnapshotBounds(_)));
    }
}
