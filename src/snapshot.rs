//! Binary snapshot format v1.
//!
//! Captures the full in-flight builder state so that construction can
//! resume in another process and roots stay reproducible.
//!
//! # Wire format
//!
//! ```text
//! magic(0xA1)
//! block_merge        u32
//! enforce_heights    u8 (0/1)
//! [expected_next_height u64]       only when enforce_heights = 1
//! total_blocks       u64
//! in_chunk_start     u64
//! in_chunk_count     u32
//! elem_32 * in_chunk_count
//! leaf_count         u64
//! peak_slot_count    u32
//! per slot: presence u8 [ start u64, count u32, sum 32 ]
//! ```
//!
//! All integers little-endian. The hasher is not serialized; the restoring
//! builder must be configured with the same digest and chunk size.

use std::io::Read;

use sha2::digest::{consts::U32, Digest};

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::hash::{Hash32, SNAPSHOT_MAGIC};
use crate::peaks::PeaksAccumulator;

pub(crate) fn read_u8<R: Read>(r: &mut R, field: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)
        .map_err(|_| Error::SnapshotTruncated(field))?;
    Ok(buf[0])
}

pub(crate) fn read_u32<R: Read>(r: &mut R, field: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| Error::SnapshotTruncated(field))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(r: &mut R, field: &'static str) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|_| Error::SnapshotTruncated(field))?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_hash<R: Read>(r: &mut R, field: &'static str) -> Result<Hash32> {
    let mut buf = [0u8; 32];
    r.read_exact(&mut buf)
        .map_err(|_| Error::SnapshotTruncated(field))?;
    Ok(buf)
}

impl<D: Digest<OutputSize = U32>> Builder<D> {
    /// Serialize the builder state (peaks + partial chunk) to bytes.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        if self.block_merge > u32::MAX as usize {
            return Err(Error::SnapshotBounds(format!(
                "block_merge {} does not fit the snapshot format",
                self.block_merge
            )));
        }

        let mut buf = Vec::with_capacity(64 + self.in_chunk_elems.len() * 32);
        buf.push(SNAPSHOT_MAGIC);
        buf.extend_from_slice(&(self.block_merge as u32).to_le_bytes());

        if self.enforce_heights {
            buf.push(1);
            buf.extend_from_slice(&self.expected_next_height.to_le_bytes());
        } else {
            buf.push(0);
        }

        buf.extend_from_slice(&self.total_blocks.to_le_bytes());
        buf.extend_from_slice(&self.in_chunk_start.to_le_bytes());
        buf.extend_from_slice(&(self.in_chunk_elems.len() as u32).to_le_bytes());
        for elem in &self.in_chunk_elems {
            buf.extend_from_slice(elem);
        }

        self.outer.encode_into(&mut buf);
        Ok(buf)
    }

    /// Load a snapshot previously produced by [`snapshot`](Self::snapshot).
    ///
    /// The builder must be configured with the same chunk size and digest.
    /// Restoration is atomic: the whole snapshot is decoded and validated
    /// first, and on any error the builder is left exactly as it was.
    pub fn restore(&mut self, snapshot: &[u8]) -> Result<()> {
        let mut r = snapshot;

        let version = read_u8(&mut r, "version")?;
        if version != SNAPSHOT_MAGIC {
            return Err(Error::SnapshotVersion(version));
        }

        let block_merge = read_u32(&mut r, "block_merge")?;
        if block_merge as usize != self.block_merge {
            return Err(Error::SnapshotConfigMismatch {
                snapshot: block_merge,
                builder: self.block_merge,
            });
        }

        let (enforce_heights, expected_next_height) = match read_u8(&mut r, "enforce flag")? {
            0 => (false, 0),
            1 => (true, read_u64(&mut r, "expected_next_height")?),
            other => {
                return Err(Error::InvalidSnapshot(format!(
                    "invalid enforce flag: {:#04x}",
                    other
                )));
            }
        };

        let total_blocks = read_u64(&mut r, "total_blocks")?;
        let in_chunk_start = read_u64(&mut r, "in_chunk_start")?;
        let in_chunk_count = read_u32(&mut r, "in_chunk_count")? as usize;
        if in_chunk_count > self.block_merge {
            return Err(Error::SnapshotBounds(format!(
                "in_chunk_count {} exceeds block_merge {}",
                in_chunk_count, self.block_merge
            )));
        }

        let mut in_chunk_elems = Vec::with_capacity(in_chunk_count);
        for _ in 0..in_chunk_count {
            in_chunk_elems.push(read_hash(&mut r, "in_chunk element")?);
        }

        let outer = PeaksAccumulator::decode(&mut r, self.outer.combiner)?;

        // Everything decoded; replace state in one step.
        self.enforce_heights = enforce_heights;
        self.expected_next_height = expected_next_height;
        self.total_blocks = total_blocks;
        self.in_chunk_start = in_chunk_start;
        self.in_chunk_elems = in_chunk_elems;
        self.outer = outer;
        Ok(())
    }
}
