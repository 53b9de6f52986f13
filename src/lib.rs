//! Streaming, range-tagged two-level Merkle accumulator for contiguous
//! block-hash histories.
//!
//! Block hashes arrive in paginated batches. Each one is digested together
//! with its height, buffered, and every `block_merge` elements form a chunk
//! whose digest is committed to a streaming Merkle-mountain-range of peaks.
//! Every digest in both layers binds the `(start, count)` range it covers,
//! so the single 32-byte root commits to content and placement at once.
//!
//! # Core pieces
//!
//! - [`Builder`]: paginated ingestion, chunk formation, finalization.
//! - [`SpanNode`]: the logical tree node; peaks retain child links so the
//!   diff engines can descend without rebuilding anything.
//! - Snapshots: a compact binary format ([`Builder::snapshot`] /
//!   [`Builder::restore`]) and a structured serde mirror
//!   ([`Builder::to_snapshot`] / [`Builder::from_snapshot`], JSON file
//!   helpers) that both capture in-flight state bit-exactly.
//! - Divergence queries between two nearly identical replicas:
//!   [`Builder::bisect`] (peaks-level), [`Builder::tree_bisect`] (first
//!   differing range), [`Builder::tree_diff`] (all differing ranges), and
//!   [`Builder::multi_bisect`] (parallel, consolidated).
//!
//! Memory stays at O(log n) peaks plus one partial chunk during
//! construction. The hasher is injected as a type parameter
//! (`Digest<OutputSize = U32>`, SHA-256 by default); domain-separation tags
//! keep element, chunk, and node digests in disjoint domains.
//!
//! Not an inclusion-proof library: there is no proof generation or
//! verification, no sparse ranges, and no variable-length leaf data.

mod bisect;
mod builder;
mod error;
mod hash;
mod multi_bisect;
mod node;
mod peaks;
mod snapshot;
mod snapshot_types;
mod tree_walk;

#[cfg(test)]
mod tests;

pub use builder::{
    compute_chunk_digest, ensure_same_root, inner_merkle_for_range, Builder, Config, State,
    DEFAULT_BLOCK_MERGE, MAX_BLOCK_MERGE,
};
pub use error::{Error, Result};
pub use hash::{DefaultHasher, Hash32, ZERO_HASH};
pub use multi_bisect::consolidate_diffs;
pub use node::{DiffRange, SpanNode};
pub use snapshot_types::{BuilderSnapshot, SnapshotConfig, SnapshotNode, SNAPSHOT_FORMAT_VERSION};
