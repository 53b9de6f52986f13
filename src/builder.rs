//! Streaming builder: batching, height enforcement, chunk formation, and
//! finalization.
//!
//! Two-level structure: incoming block hashes are digested into per-element
//! hashes and buffered; every `block_merge` elements form a chunk whose
//! digest is committed to the outer peaks accumulator as a range-tagged
//! leaf. `finalize` flushes the partial tail chunk (short chunks bind their
//! true count) and folds the peaks into a single 32-byte root.

use std::marker::PhantomData;
use std::sync::Arc;

use sha2::digest::{consts::U32, Digest};

use crate::error::{Error, Result};
use crate::hash::{
    chunk_digest, chunk_merkle_wrap, elem_digest, inner_leaf_digest, inner_node_digest,
    outer_node_digest, DefaultHasher, Hash32, ZERO_HASH,
};
use crate::node::SpanNode;
use crate::peaks::PeaksAccumulator;

/// Chunk size used when the config requests neither a size nor an expected
/// total.
pub const DEFAULT_BLOCK_MERGE: usize = 200;

/// Ceiling on a `block_merge` derived from `expected_total`, so a hostile
/// total cannot size an unbounded element buffer.
pub const MAX_BLOCK_MERGE: usize = 65_536;

/// Builder configuration.
///
/// `block_merge` of 0 means "derive": 0.5% of `expected_total` clamped to
/// `[1, MAX_BLOCK_MERGE]`, or [`DEFAULT_BLOCK_MERGE`] when no total is
/// given. Setting `start_height` enables strict mode, where every batch
/// must begin exactly at the next expected height.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Elements per chunk; 0 derives a value.
    pub block_merge: usize,
    /// Expected total number of blocks, used only to derive `block_merge`.
    pub expected_total: u64,
    /// Enables strict contiguity enforcement starting at this height.
    pub start_height: Option<u64>,
}

impl Config {
    fn resolved_block_merge(&self) -> usize {
        if self.block_merge > 0 {
            return self.block_merge;
        }
        if self.expected_total > 0 {
            return (self.expected_total / 200).clamp(1, MAX_BLOCK_MERGE as u64) as usize;
        }
        DEFAULT_BLOCK_MERGE
    }
}

/// Read-only view of builder progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Total blocks ingested.
    pub total_blocks: u64,
    /// Chunks committed to the outer accumulator.
    pub committed: u64,
    /// Elements buffered in the current partial chunk.
    pub in_chunk_count: usize,
    /// Next expected height; meaningful only in strict mode.
    pub next_height: u64,
}

/// Streaming two-level accumulator builder.
///
/// `D` is the streaming 32-byte hasher used for every digest; SHA-256 by
/// default. All mutating operations are single-writer: the caller
/// serializes `push`, `finalize`, `restore`, and snapshotting. Read-only
/// operations (`state`, `root_node`, the diff engines) may run concurrently
/// across distinct builders.
#[derive(Debug)]
pub struct Builder<D: Digest<OutputSize = U32> = DefaultHasher> {
    pub(crate) config: Config,
    pub(crate) block_merge: usize,
    pub(crate) expected_next_height: u64,
    pub(crate) enforce_heights: bool,
    pub(crate) in_chunk_elems: Vec<Hash32>,
    pub(crate) in_chunk_start: u64,
    pub(crate) outer: PeaksAccumulator,
    pub(crate) total_blocks: u64,
    pub(crate) _hasher: PhantomData<fn() -> D>,
}

impl<D: Digest<OutputSize = U32>> Builder<D> {
    /// Create an empty builder from the given config.
    pub fn new(config: Config) -> Self {
        let block_merge = config.resolved_block_merge();
        let (enforce_heights, expected_next_height) = match config.start_height {
            Some(h) => (true, h),
            None => (false, 0),
        };
        Self {
            config,
            block_merge,
            expected_next_height,
            enforce_heights,
            in_chunk_elems: Vec::with_capacity(block_merge.min(MAX_BLOCK_MERGE)),
            in_chunk_start: 0,
            outer: PeaksAccumulator::new(outer_node_digest::<D>),
            total_blocks: 0,
            _hasher: PhantomData,
        }
    }

    /// The resolved chunk size.
    pub fn block_merge(&self) -> usize {
        self.block_merge
    }

    /// Current builder progress.
    pub fn state(&self) -> State {
        State {
            total_blocks: self.total_blocks,
            committed: self.outer.leaf_count(),
            in_chunk_count: self.in_chunk_elems.len(),
            next_height: self.expected_next_height,
        }
    }

    /// Ingest a contiguous batch of block hashes, returning the number
    /// accepted.
    ///
    /// In strict mode `start_height` must equal the expected next height
    /// and per-element heights advance from there. In lax mode heights are
    /// `start_height + i` for the i-th batch element, and contiguity is
    /// still checked against the open partial chunk, so callers must pass
    /// the true batch start even without strict mode.
    ///
    /// On [`Error::NonContiguousInChunk`] the elements before the
    /// offending one remain ingested; the error carries that count.
    pub fn push(&mut self, start_height: u64, block_hashes: &[Hash32]) -> Result<usize> {
        if block_hashes.is_empty() {
            return Ok(0);
        }

        if self.enforce_heights && start_height != self.expected_next_height {
            return Err(Error::UnexpectedStartHeight {
                got: start_height,
                want: self.expected_next_height,
            });
        }

        let mut accepted = 0usize;
        for (i, block_hash) in block_hashes.iter().enumerate() {
            let height = if self.enforce_heights {
                self.expected_next_height
            } else {
                start_height + i as u64
            };

            if self.in_chunk_elems.is_empty() {
                self.in_chunk_start = height;
            } else {
                let want = self.in_chunk_start + self.in_chunk_elems.len() as u64;
                if height != want {
                    return Err(Error::NonContiguousInChunk {
                        accepted,
                        got: height,
                        want,
                    });
                }
            }

            self.in_chunk_elems.push(elem_digest::<D>(height, block_hash));
            self.total_blocks += 1;
            accepted += 1;
            if self.enforce_heights {
                self.expected_next_height += 1;
            }

            if self.in_chunk_elems.len() == self.block_merge {
                self.commit_current_chunk()?;
            }
        }

        Ok(accepted)
    }

    /// Commit any partial chunk and return the global root.
    ///
    /// An empty builder finalizes to the zero hash. The builder is not
    /// meant to ingest further batches afterwards, but stays valid for
    /// snapshots and diff queries.
    pub fn finalize(&mut self) -> Result<Hash32> {
        if !self.in_chunk_elems.is_empty() {
            self.commit_current_chunk()?;
        }
        Ok(self.outer.root())
    }

    /// The materialized logical root for tree descent, or `None` when no
    /// chunk has been committed yet.
    pub fn root_node(&self) -> Result<Option<Arc<SpanNode>>> {
        self.outer.root_node()
    }

    // Commit the buffered chunk (full or short) into the outer accumulator
    // and reset the buffer.
    fn commit_current_chunk(&mut self) -> Result<()> {
        if self.in_chunk_elems.is_empty() {
            return Ok(());
        }
        let start = self.in_chunk_start;
        let count = self.in_chunk_elems.len() as u32;
        let sum = chunk_digest::<D>(start, count, &self.in_chunk_elems);
        self.outer.add_leaf(SpanNode::chunk(start, count, sum))?;
        self.in_chunk_elems.clear();
        self.in_chunk_start = 0;
        Ok(())
    }
}

/// Stateless replica of the fast path for a single chunk.
///
/// For a batch of at most `block_merge` hashes starting at `start_height`,
/// this equals the builder's `finalize` output, because a single peak's
/// digest is the chunk digest itself. Empty input gives the zero hash.
pub fn compute_chunk_digest<D: Digest<OutputSize = U32>>(
    start_height: u64,
    block_hashes: &[Hash32],
) -> Hash32 {
    if block_hashes.is_empty() {
        return ZERO_HASH;
    }
    let elems: Vec<Hash32> = block_hashes
        .iter()
        .enumerate()
        .map(|(i, h)| elem_digest::<D>(start_height + i as u64, h))
        .collect();
    chunk_digest::<D>(start_height, elems.len() as u32, &elems)
}

/// On-demand true Merkle root for a specific range, for debug/repair.
///
/// Builds a peaks accumulator over inner-leaf digests with the inner node
/// combiner, so the result lives in a digest domain disjoint from the fast
/// path even for identical inputs. With `wrap` the root is additionally
/// bound to its full range. Empty input gives the zero hash.
pub fn inner_merkle_for_range<D: Digest<OutputSize = U32>>(
    start_height: u64,
    block_hashes: &[Hash32],
    wrap: bool,
) -> Result<Hash32> {
    if block_hashes.is_empty() {
        return Ok(ZERO_HASH);
    }

    let mut acc = PeaksAccumulator::new(inner_node_digest::<D>);
    for (i, block_hash) in block_hashes.iter().enumerate() {
        let height = start_height + i as u64;
        acc.add_leaf(SpanNode::chunk(
            height,
            1,
            inner_leaf_digest::<D>(height, block_hash),
        ))?;
    }

    let root = acc.root();
    if wrap {
        Ok(chunk_merkle_wrap::<D>(
            start_height,
            block_hashes.len() as u32,
            &root,
        ))
    } else {
        Ok(root)
    }
}

/// Compare two roots, failing with [`Error::RootsDiffer`] on mismatch.
pub fn ensure_same_root(a: &Hash32, b: &Hash32) -> Result<()> {
    if a != b {
        return Err(Error::RootsDiffer);
    }
    Ok(())
}
