//! Peaks-level bisection: first differing peak range.

use sha2::digest::{consts::U32, Digest};

use crate::builder::Builder;
use crate::error::Result;

impl<D: Digest<OutputSize = U32>> Builder<D> {
    /// Find the first differing range by comparing peak arrays directly.
    ///
    /// Scans both arrays from the highest level down and returns the range
    /// of the first peak that is missing on one side or whose digest
    /// differs. Coarser than [`tree_bisect`](Self::tree_bisect), but does
    /// not descend and works even when peaks carry no child links; use it
    /// when both builders are known to have aligned peak structures.
    /// Returns `(0, 0)` when all peaks match.
    pub fn bisect(&self, other: &Builder<D>) -> Result<(u64, u32)> {
        let peaks1 = self.outer.peaks();
        let peaks2 = other.outer.peaks();
        let max_level = peaks1.len().max(peaks2.len());

        for level in (0..max_level).rev() {
            let p1 = peaks1.get(level).and_then(|slot| slot.as_ref());
            let p2 = peaks2.get(level).and_then(|slot| slot.as_ref());
            match (p1, p2) {
                (None, None) => {}
                (Some(p), None) | (None, Some(p)) => return Ok(p.range()),
                (Some(p1), Some(p2)) => {
                    if p1.sum != p2.sum {
                        return Ok(p1.range());
                    }
                }
            }
        }
        Ok((0, 0))
    }
}
