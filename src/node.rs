//! Range-tagged tree nodes and diff output ranges.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hash::Hash32;

/// A node of the logical accumulator tree.
///
/// Every node covers a contiguous height range `[start, start + count)` and
/// carries the range-tagged digest of its subtree. Leaf nodes (`has_data`)
/// are committed chunks; internal nodes keep `Arc` links to the two children
/// they were combined from so the diff engines can descend without
/// rebuilding the tree.
///
/// Nodes decoded from a binary snapshot have no child links. They behave as
/// indivisible leaves during diff walks, which keeps divergence reporting
/// sound at peak granularity.
#[derive(Debug, Clone)]
pub struct SpanNode {
    /// First height covered by this subtree.
    pub start: u64,
    /// Number of heights covered.
    pub count: u32,
    /// Range-tagged digest of the subtree.
    pub sum: Hash32,
    /// Left child, if this node was produced by a combine.
    pub left: Option<Arc<SpanNode>>,
    /// Right child, if this node was produced by a combine.
    pub right: Option<Arc<SpanNode>>,
    /// True for committed chunk leaves.
    pub has_data: bool,
}

impl SpanNode {
    /// A committed chunk leaf.
    pub fn chunk(start: u64, count: u32, sum: Hash32) -> Self {
        Self {
            start,
            count,
            sum,
            left: None,
            right: None,
            has_data: true,
        }
    }

    /// An internal combine node retaining links to both children.
    pub(crate) fn internal(
        start: u64,
        count: u32,
        sum: Hash32,
        left: Arc<SpanNode>,
        right: Arc<SpanNode>,
    ) -> Self {
        Self {
            start,
            count,
            sum,
            left: Some(left),
            right: Some(right),
            has_data: false,
        }
    }

    /// A peak decoded from a binary snapshot: range and digest only, no
    /// child links.
    pub(crate) fn detached(start: u64, count: u32, sum: Hash32) -> Self {
        Self {
            start,
            count,
            sum,
            left: None,
            right: None,
            has_data: false,
        }
    }

    /// One past the last height covered by this subtree.
    pub fn end(&self) -> u64 {
        self.start + u64::from(self.count)
    }

    /// Whether a diff walk may descend into this node. Chunk leaves and
    /// detached (snapshot-restored) peaks are indivisible.
    pub fn is_leaf(&self) -> bool {
        self.has_data || (self.left.is_none() && self.right.is_none())
    }

    /// The `(start, count)` range of this subtree.
    pub fn range(&self) -> (u64, u32) {
        (self.start, self.count)
    }
}

/// A contiguous range of heights where two builders disagree or one side
/// has no data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffRange {
    /// First differing height.
    pub start: u64,
    /// Number of differing heights.
    pub count: u32,
}

impl DiffRange {
    /// One past the last height in the range.
    pub fn end(&self) -> u64 {
        self.start + u64::from(self.count)
    }
}
