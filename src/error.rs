//! Error types for accumulator, snapshot, and diff operations.

use std::io;

use thiserror::Error;

use crate::node::DiffRange;

/// Alias for `core::result::Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all accumulator operations.
///
/// Covers ingestion contiguity violations, snapshot decoding failures, and
/// diff-engine cancellation. Content mismatches between two builders are
/// never errors; the diff engines report them as ranges.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Strict-mode `push` with a batch that does not start at the expected
    /// next height. No elements from the batch were ingested.
    #[error("unexpected batch start height: got {got}, want {want}")]
    UnexpectedStartHeight { got: u64, want: u64 },

    /// A lax-mode batch element breaks contiguity inside the current chunk.
    /// `accepted` elements earlier in the batch remain ingested.
    #[error("non-contiguous height inside chunk: got {got}, want {want} ({accepted} accepted)")]
    NonContiguousInChunk {
        accepted: usize,
        got: u64,
        want: u64,
    },

    /// Two peaks with non-adjacent ranges were asked to combine. Cannot be
    /// produced by `push`; indicates a forged snapshot or an internal bug.
    #[error("non-contiguous combine at level {level}: left ends at {left_end}, right starts at {right_start}")]
    NonContiguousCombine {
        level: usize,
        left_end: u64,
        right_start: u64,
    },

    /// The binary snapshot does not begin with the supported magic byte.
    #[error("unsupported snapshot version byte: {0:#04x}")]
    SnapshotVersion(u8),

    /// The structured snapshot declares an unknown format version.
    #[error("unsupported structured snapshot version: {0}")]
    StructuredSnapshotVersion(u32),

    /// The snapshot was produced by a builder with a different chunk size.
    #[error("snapshot block_merge {snapshot} does not match builder block_merge {builder}")]
    SnapshotConfigMismatch { snapshot: u32, builder: usize },

    /// A declared length or count in the snapshot exceeds its ceiling.
    #[error("snapshot bounds exceeded: {0}")]
    SnapshotBounds(String),

    /// The snapshot ended before the named field could be read.
    #[error("snapshot truncated while reading {0}")]
    SnapshotTruncated(&'static str),

    /// The snapshot decoded but its contents are inconsistent.
    #[error("invalid snapshot data: {0}")]
    InvalidSnapshot(String),

    /// Raised by [`ensure_same_root`](crate::ensure_same_root) only.
    #[error("roots differ")]
    RootsDiffer,

    /// A cancellable multi-bisect observed its token mid-walk. Carries the
    /// consolidated ranges collected before cancellation.
    #[error("multi-bisect cancelled with {} partial ranges", .0.len())]
    Cancelled(Vec<DiffRange>),

    /// The bounded worker pool for multi-bisect could not be created.
    #[error("worker pool: {0}")]
    WorkerPool(String),

    /// An I/O failure while persisting or loading a snapshot file.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A JSON encode/decode failure for the structured snapshot.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
