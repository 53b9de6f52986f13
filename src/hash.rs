//! Domain-tagged digest functions.
//!
//! Hash domain separation (single leading byte, little-endian integers):
//! - Element:           `H(0x21 || height_u64 || block_hash)`
//! - Chunk:             `H(0x10 || start_u64 || count_u32 || elem_1 || ... || elem_k)`
//! - Outer node:        `H(0x11 || start_u64 || count_u32 || left || right)`
//! - Inner leaf:        `H(0x30 || height_u64 || block_hash)`
//! - Inner node:        `H(0x31 || start_u64 || count_u32 || left || right)`
//! - Chunk-merkle wrap: `H(0x32 || start_u64 || count_u32 || inner_root)`
//!
//! The tags keep the fast-path chunk layer, the outer accumulator, and the
//! on-demand inner Merkle path in disjoint digest domains; identical inputs
//! hashed under different tags never collide. Tags are part of the wire
//! format and of every persisted root. Changing one is a breaking format
//! change and requires a snapshot version bump.
//!
//! All functions are generic over a streaming 32-byte hasher from the
//! RustCrypto `digest` ecosystem. SHA-256 is the default.

use sha2::digest::{consts::U32, Digest};

/// An opaque 32-byte digest or block hash.
pub type Hash32 = [u8; 32];

/// The all-zero hash, returned for empty accumulators.
pub const ZERO_HASH: Hash32 = [0u8; 32];

/// Default hasher used when no other digest is injected.
pub type DefaultHasher = sha2::Sha256;

/// Per-block element inside a chunk digest.
pub(crate) const TAG_ELEM: u8 = 0x21;
/// Direct chunk digest over element digests.
pub(crate) const TAG_CHUNK: u8 = 0x10;
/// Internal combine in the outer peaks accumulator.
pub(crate) const TAG_OUTER_NODE: u8 = 0x11;
/// On-demand inner Merkle leaf.
pub(crate) const TAG_INNER_LEAF: u8 = 0x30;
/// On-demand inner Merkle combine.
pub(crate) const TAG_INNER_NODE: u8 = 0x31;
/// Optional range wrapper around an inner Merkle root.
pub(crate) const TAG_CHUNK_MERK: u8 = 0x32;
/// Binary snapshot format v1 magic byte.
pub(crate) const SNAPSHOT_MAGIC: u8 = 0xA1;

/// A range-tagged combine function for two sibling digests.
///
/// Arguments are `(start, count, left, right)` of the combined node. The
/// outer accumulator and the on-demand inner Merkle path each instantiate
/// the accumulator with their own combiner.
pub(crate) type NodeCombiner = fn(u64, u32, &Hash32, &Hash32) -> Hash32;

/// Element digest: binds a block hash to its height.
pub(crate) fn elem_digest<D: Digest<OutputSize = U32>>(height: u64, block_hash: &Hash32) -> Hash32 {
    let mut h = D::new();
    h.update([TAG_ELEM]);
    h.update(height.to_le_bytes());
    h.update(block_hash);
    h.finalize().into()
}

/// Chunk digest: direct concatenation of element digests under the chunk
/// range. No inner Merkle on this path.
pub(crate) fn chunk_digest<D: Digest<OutputSize = U32>>(
    start: u64,
    count: u32,
    elems: &[Hash32],
) -> Hash32 {
    let mut h = D::new();
    h.update([TAG_CHUNK]);
    h.update(start.to_le_bytes());
    h.update(count.to_le_bytes());
    for e in elems {
        h.update(e);
    }
    h.finalize().into()
}

/// Outer internal node digest, used for every combine inside the peaks
/// accumulator.
pub(crate) fn outer_node_digest<D: Digest<OutputSize = U32>>(
    start: u64,
    count: u32,
    left: &Hash32,
    right: &Hash32,
) -> Hash32 {
    tagged_node_digest::<D>(TAG_OUTER_NODE, start, count, left, right)
}

/// Inner Merkle leaf digest for the on-demand debug/repair path.
pub(crate) fn inner_leaf_digest<D: Digest<OutputSize = U32>>(
    height: u64,
    block_hash: &Hash32,
) -> Hash32 {
    let mut h = D::new();
    h.update([TAG_INNER_LEAF]);
    h.update(height.to_le_bytes());
    h.update(block_hash);
    h.finalize().into()
}

/// Inner Merkle combine digest for the on-demand debug/repair path.
pub(crate) fn inner_node_digest<D: Digest<OutputSize = U32>>(
    start: u64,
    count: u32,
    left: &Hash32,
    right: &Hash32,
) -> Hash32 {
    tagged_node_digest::<D>(TAG_INNER_NODE, start, count, left, right)
}

/// Range wrapper binding an inner Merkle root to its full range.
pub(crate) fn chunk_merkle_wrap<D: Digest<OutputSize = U32>>(
    start: u64,
    count: u32,
    inner_root: &Hash32,
) -> Hash32 {
    let mut h = D::new();
    h.update([TAG_CHUNK_MERK]);
    h.update(start.to_le_bytes());
    h.update(count.to_le_bytes());
    h.update(inner_root);
    h.finalize().into()
}

fn tagged_node_digest<D: Digest<OutputSize = U32>>(
    tag: u8,
    start: u64,
    count: u32,
    left: &Hash32,
    right: &Hash32,
) -> Hash32 {
    let mut h = D::new();
    h.update([tag]);
    h.update(start.to_le_bytes());
    h.update(count.to_le_bytes());
    h.update(left);
    h.update(right);
    h.finalize().into()
}
