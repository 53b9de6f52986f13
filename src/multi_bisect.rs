//! Parallel multi-range diff over a bounded worker pool.
//!
//! Peaks are compared top-down; each differing peak pair becomes a task
//! that descends its subtree pair, recursing on child pairs through the
//! pool's work-stealing scheduler so at most `concurrency` workers run at
//! once. The partial chunk buffers are compared synchronously at the end.
//! Workers append into a mutex-guarded list; the collected set is then
//! sorted and merged into canonical non-overlapping ranges.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sha2::digest::{consts::U32, Digest};

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::node::{DiffRange, SpanNode};

fn record(diffs: &Mutex<Vec<DiffRange>>, start: u64, count: u32) {
    if count == 0 {
        return;
    }
    let mut guard = diffs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.push(DiffRange { start, count });
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Relaxed))
}

// Compare one subtree pair. The pair is known (or assumed) to differ when
// called; equal digests stop the descent immediately.
fn compare_subtrees(
    n1: Option<&Arc<SpanNode>>,
    n2: Option<&Arc<SpanNode>>,
    diffs: &Mutex<Vec<DiffRange>>,
    cancel: Option<&AtomicBool>,
) {
    if is_cancelled(cancel) {
        return;
    }

    match (n1, n2) {
        (None, None) => {}
        // One side absent entirely: the survivor's whole range differs.
        (Some(n), None) | (None, Some(n)) => record(diffs, n.start, n.count),
        (Some(a), Some(b)) => {
            if a.sum == b.sum {
                return;
            }
            if a.is_leaf() {
                record(diffs, a.start, a.count);
                return;
            }
            if b.is_leaf() {
                record(diffs, b.start, b.count);
                return;
            }
            rayon::join(
                || descend_child_pair(a.left.as_ref(), b.left.as_ref(), diffs, cancel),
                || descend_child_pair(a.right.as_ref(), b.right.as_ref(), diffs, cancel),
            );
        }
    }
}

// A missing child is detected structurally and the surviving side's range
// emitted outright; matching digests skip the pair.
fn descend_child_pair(
    c1: Option<&Arc<SpanNode>>,
    c2: Option<&Arc<SpanNode>>,
    diffs: &Mutex<Vec<DiffRange>>,
    cancel: Option<&AtomicBool>,
) {
    match (c1, c2) {
        (None, None) => {}
        (Some(n), None) | (None, Some(n)) => record(diffs, n.start, n.count),
        (Some(x), Some(y)) => {
            if x.sum != y.sum {
                compare_subtrees(Some(x), Some(y), diffs, cancel);
            }
        }
    }
}

impl<D: Digest<OutputSize = U32>> Builder<D> {
    /// Find all differing ranges between two builders in parallel.
    ///
    /// `concurrency` bounds the worker pool (values below 1 are treated as
    /// 1). The result is consolidated: sorted by start with overlapping or
    /// touching ranges merged, so the output is identical for any
    /// concurrency level.
    pub fn multi_bisect(&self, other: &Builder<D>, concurrency: usize) -> Result<Vec<DiffRange>> {
        self.multi_bisect_inner(other, concurrency, None)
    }

    /// Cancellable variant of [`multi_bisect`](Self::multi_bisect).
    ///
    /// Workers observe `cancel` before each subtree comparison and finish
    /// the comparison they are in. When the token was raised mid-walk the
    /// call returns [`Error::Cancelled`] carrying the consolidated ranges
    /// collected so far.
    pub fn multi_bisect_cancellable(
        &self,
        other: &Builder<D>,
        concurrency: usize,
        cancel: &AtomicBool,
    ) -> Result<Vec<DiffRange>> {
        self.multi_bisect_inner(other, concurrency, Some(cancel))
    }

    fn multi_bisect_inner(
        &self,
        other: &Builder<D>,
        concurrency: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<DiffRange>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let diffs = Mutex::new(Vec::new());
        let peaks1 = self.outer.peaks();
        let peaks2 = other.outer.peaks();
        let max_level = peaks1.len().max(peaks2.len());

        pool.install(|| {
            rayon::scope(|s| {
                for level in (0..max_level).rev() {
                    let p1 = peaks1.get(level).and_then(|slot| slot.as_ref());
                    let p2 = peaks2.get(level).and_then(|slot| slot.as_ref());
                    match (p1, p2) {
                        (None, None) => {}
                        (Some(p), None) | (None, Some(p)) => record(&diffs, p.start, p.count),
                        (Some(a), Some(b)) => {
                            if a.sum == b.sum {
                                continue;
                            }
                            let (a, b) = (Arc::clone(a), Arc::clone(b));
                            let diffs = &diffs;
                            s.spawn(move |_| {
                                compare_subtrees(Some(&a), Some(&b), diffs, cancel)
                            });
                        }
                    }
                }
            });
        });

        // Partial chunk buffers, compared synchronously.
        if self.in_chunk_elems.len() != other.in_chunk_elems.len() {
            let start = if !other.in_chunk_elems.is_empty() {
                other.in_chunk_start
            } else {
                self.in_chunk_start
            };
            let count = self.in_chunk_elems.len().max(other.in_chunk_elems.len()) as u32;
            record(&diffs, start, count);
        } else if self.in_chunk_elems != other.in_chunk_elems {
            record(&diffs, self.in_chunk_start, self.in_chunk_elems.len() as u32);
        }

        let collected = diffs
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let consolidated = consolidate_diffs(collected);

        if is_cancelled(cancel) {
            return Err(Error::Cancelled(consolidated));
        }
        Ok(consolidated)
    }
}

/// Sort and merge diff ranges into canonical non-overlapping form.
///
/// Ranges are sorted by start ascending (larger count first on ties, so a
/// wide range consumes the narrower ones it contains), then any range that
/// overlaps or touches the current one extends it.
pub fn consolidate_diffs(mut diffs: Vec<DiffRange>) -> Vec<DiffRange> {
    diffs.sort_by(|a, b| a.start.cmp(&b.start).then(b.count.cmp(&a.count)));

    let mut iter = diffs.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut result = Vec::new();
    for next in iter {
        if next.start <= current.end() {
            if next.end() > current.end() {
                current.count = (next.end() - current.start) as u32;
            }
        } else {
            result.push(current);
            current = next;
        }
    }
    result.push(current);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, count: u32) -> DiffRange {
        DiffRange { start, count }
    }

    #[test]
    fn test_consolidate_empty() {
        assert!(consolidate_diffs(Vec::new()).is_empty());
    }

    #[test]
    fn test_consolidate_disjoint_sorted() {
        let out = consolidate_diffs(vec![range(50, 10), range(0, 10)]);
        assert_eq!(out, vec![range(0, 10), range(50, 10)]);
    }

    #[test]
    fn test_consolidate_touching_merge() {
        let out = consolidate_diffs(vec![range(0, 10), range(10, 10)]);
        assert_eq!(out, vec![range(0, 20)]);
    }

    #[test]
    fn test_consolidate_overlap_extends() {
        let out = consolidate_diffs(vec![range(0, 15), range(10, 20)]);
        assert_eq!(out, vec![range(0, 30)]);
    }

    #[test]
    fn test_consolidate_contained_is_absorbed() {
        let out = consolidate_diffs(vec![range(5, 5), range(0, 100), range(40, 10)]);
        assert_eq!(out, vec![range(0, 100)]);
    }
}
