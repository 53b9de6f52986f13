//! Structured snapshot: a serde value-tree mirror of builder state.
//!
//! Unlike the binary format, the structured form records each peak as a
//! recursive [`SnapshotNode`] subtree, so a builder rebuilt through
//! [`Builder::from_snapshot`] keeps full child links and stays capable of
//! the structure-aware diff walks. Only peak-level roots are authoritative;
//! descendants are revalidated against them on load and any inconsistency
//! rejects the snapshot. Depth and node-count ceilings defeat adversarial
//! payloads.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::digest::{consts::U32, Digest};

use crate::builder::{Builder, Config};
use crate::error::{Error, Result};
use crate::hash::{outer_node_digest, Hash32, NodeCombiner};
use crate::node::SpanNode;
use crate::peaks::{PeaksAccumulator, MAX_PEAK_SLOTS};

/// Version tag carried by [`BuilderSnapshot`].
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Maximum nesting depth accepted when rebuilding a peak subtree. The tree
/// height is bounded by the peak level, which 64 levels already exceed for
/// any u64 leaf count.
const MAX_SNAPSHOT_DEPTH: usize = 64;

/// Maximum total node count accepted across all peak subtrees.
const MAX_SNAPSHOT_NODES: usize = 1 << 20;

/// Complete builder state as a plain serializable value tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuilderSnapshot {
    pub version: u32,
    pub config: SnapshotConfig,
    pub total_blocks: u64,
    pub expected_next_height: u64,
    pub enforce_heights: bool,
    /// Element digests of the open partial chunk.
    pub in_chunk_elems: Vec<Hash32>,
    pub in_chunk_start: u64,
    /// Sparse peak array by level; empty slots are `None`.
    pub peaks: Vec<Option<SnapshotNode>>,
}

/// The config fields that affect hashing and determinism.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub block_merge: u32,
    pub expected_total: u64,
}

/// A recursive mirror of one accumulator tree node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotNode {
    pub root: Hash32,
    pub start: u64,
    pub count: u32,
    pub has_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<SnapshotNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<SnapshotNode>>,
    /// For chunk leaves this repeats `root`; advisory on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Hash32>,
}

fn snapshot_node_from(node: &SpanNode) -> SnapshotNode {
    SnapshotNode {
        root: node.sum,
        start: node.start,
        count: node.count,
        has_data: node.has_data,
        left: node
            .left
            .as_deref()
            .map(|n| Box::new(snapshot_node_from(n))),
        right: node
            .right
            .as_deref()
            .map(|n| Box::new(snapshot_node_from(n))),
        data: node.has_data.then_some(node.sum),
    }
}

// Rebuild one subtree, charging a shared node budget and revalidating every
// internal digest against its children. Returns the node and the number of
// leaves underneath it.
fn span_node_from(
    sn: &SnapshotNode,
    depth: usize,
    budget: &mut usize,
    combiner: NodeCombiner,
) -> Result<(Arc<SpanNode>, u64)> {
    if depth > MAX_SNAPSHOT_DEPTH {
        return Err(Error::SnapshotBounds(format!(
            "peak subtree exceeds maximum depth of {}",
            MAX_SNAPSHOT_DEPTH
        )));
    }
    if *budget == 0 {
        return Err(Error::SnapshotBounds(format!(
            "peak subtrees exceed maximum of {} nodes",
            MAX_SNAPSHOT_NODES
        )));
    }
    *budget -= 1;

    if sn.count == 0 {
        return Err(Error::InvalidSnapshot(format!(
            "zero-count node at start {}",
            sn.start
        )));
    }

    match (&sn.left, &sn.right) {
        (None, None) => {
            let node = if sn.has_data {
                SpanNode::chunk(sn.start, sn.count, sn.root)
            } else {
                SpanNode::detached(sn.start, sn.count, sn.root)
            };
            Ok((Arc::new(node), 1))
        }
        (Some(l), Some(r)) => {
            if sn.has_data {
                return Err(Error::InvalidSnapshot(format!(
                    "chunk leaf at start {} has children",
                    sn.start
                )));
            }
            let (left, left_leaves) = span_node_from(l, depth + 1, budget, combiner)?;
            let (right, right_leaves) = span_node_from(r, depth + 1, budget, combiner)?;

            if left.start != sn.start
                || left.end() != right.start
                || u64::from(left.count) + u64::from(right.count) != u64::from(sn.count)
            {
                return Err(Error::InvalidSnapshot(format!(
                    "child ranges do not tile parent [{}, +{})",
                    sn.start, sn.count
                )));
            }
            let expected = combiner(sn.start, sn.count, &left.sum, &right.sum);
            if expected != sn.root {
                return Err(Error::InvalidSnapshot(format!(
                    "node digest at [{}, +{}) does not match its children",
                    sn.start, sn.count
                )));
            }

            Ok((
                Arc::new(SpanNode::internal(
                    sn.start, sn.count, sn.root, left, right,
                )),
                left_leaves + right_leaves,
            ))
        }
        _ => Err(Error::InvalidSnapshot(format!(
            "internal node at start {} is missing one child",
            sn.start
        ))),
    }
}

impl<D: Digest<OutputSize = U32>> Builder<D> {
    /// Capture the builder as a structured snapshot, including full peak
    /// subtrees for inspection and structure-preserving restore.
    pub fn to_snapshot(&self) -> BuilderSnapshot {
        BuilderSnapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            config: SnapshotConfig {
                block_merge: self.block_merge as u32,
                expected_total: self.config.expected_total,
            },
            total_blocks: self.total_blocks,
            expected_next_height: self.expected_next_height,
            enforce_heights: self.enforce_heights,
            in_chunk_elems: self.in_chunk_elems.clone(),
            in_chunk_start: self.in_chunk_start,
            peaks: self
                .outer
                .peaks()
                .iter()
                .map(|slot| slot.as_deref().map(snapshot_node_from))
                .collect(),
        }
    }

    /// Rebuild a builder from a structured snapshot.
    ///
    /// Every peak subtree is revalidated: child ranges must tile their
    /// parent and every internal digest must recompute from its children
    /// under this builder's hasher. The committed-chunk count is recovered
    /// by counting subtree leaves.
    pub fn from_snapshot(snap: &BuilderSnapshot) -> Result<Self> {
        if snap.version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::StructuredSnapshotVersion(snap.version));
        }

        let block_merge = snap.config.block_merge as usize;
        if block_merge == 0 {
            return Err(Error::InvalidSnapshot("block_merge is zero".into()));
        }
        if snap.in_chunk_elems.len() > block_merge {
            return Err(Error::SnapshotBounds(format!(
                "in_chunk_elems length {} exceeds block_merge {}",
                snap.in_chunk_elems.len(),
                block_merge
            )));
        }
        if snap.peaks.len() > MAX_PEAK_SLOTS {
            return Err(Error::SnapshotBounds(format!(
                "peak slot count {} exceeds maximum of {}",
                snap.peaks.len(),
                MAX_PEAK_SLOTS
            )));
        }

        let combiner = outer_node_digest::<D>;
        let mut budget = MAX_SNAPSHOT_NODES;
        let mut leaf_count = 0u64;
        let mut peaks = Vec::with_capacity(snap.peaks.len());
        for slot in &snap.peaks {
            match slot {
                None => peaks.push(None),
                Some(sn) => {
                    let (node, leaves) = span_node_from(sn, 0, &mut budget, combiner)?;
                    leaf_count += leaves;
                    peaks.push(Some(node));
                }
            }
        }

        let mut outer = PeaksAccumulator::new(combiner);
        outer.peaks = peaks;
        outer.leaf_count = leaf_count;

        Ok(Self {
            config: Config {
                block_merge,
                expected_total: snap.config.expected_total,
                start_height: None,
            },
            block_merge,
            expected_next_height: snap.expected_next_height,
            enforce_heights: snap.enforce_heights,
            in_chunk_elems: snap.in_chunk_elems.clone(),
            in_chunk_start: snap.in_chunk_start,
            outer,
            total_blocks: snap.total_blocks,
            _hasher: PhantomData,
        })
    }

    /// Write the structured snapshot to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_snapshot())?;
        Ok(())
    }

    /// Load a builder from a JSON file written by
    /// [`save_json`](Self::save_json).
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let snap: BuilderSnapshot = serde_json::from_reader(BufReader::new(file))?;
        Self::from_snapshot(&snap)
    }
}
