//! Structure-aware tree walks: first-divergence bisect and full diff.
//!
//! Both walks run iteratively over two stacks seeded with each builder's
//! materialized root. The discipline is the same: exact matches pop both
//! sides, a start mismatch means the streams desynchronized, and when the
//! ranges share a start the larger side is broken down first so differently
//! shaped trees can still be compared leaf against leaf.

use std::sync::Arc;

use sha2::digest::{consts::U32, Digest};

use crate::builder::Builder;
use crate::error::Result;
use crate::node::{DiffRange, SpanNode};

fn push_children(stack: &mut Vec<Arc<SpanNode>>, node: &SpanNode) {
    // Right first so the left child is compared next.
    if let Some(right) = &node.right {
        stack.push(Arc::clone(right));
    }
    if let Some(left) = &node.left {
        stack.push(Arc::clone(left));
    }
}

fn exact_match(a: &SpanNode, b: &SpanNode) -> bool {
    a.start == b.start && a.count == b.count && a.sum == b.sum
}

impl<D: Digest<OutputSize = U32>> Builder<D> {
    /// Find the leftmost differing range at leaf granularity.
    ///
    /// Unlike [`bisect`](Self::bisect) this treats each side as a single
    /// logical tree and descends into children, so it tolerates different
    /// peak shapes. Returns `(0, 0)` when the trees are identical;
    /// otherwise the returned range contains at least one differing
    /// height.
    pub fn tree_bisect(&self, other: &Builder<D>) -> Result<(u64, u32)> {
        let mut stack1: Vec<Arc<SpanNode>> = self.root_node()?.into_iter().collect();
        let mut stack2: Vec<Arc<SpanNode>> = other.root_node()?.into_iter().collect();

        while !stack1.is_empty() || !stack2.is_empty() {
            let (n1, n2) = match (stack1.last(), stack2.last()) {
                // One tree ended while the other still has content.
                (None, Some(n2)) => return Ok(n2.range()),
                (Some(n1), None) => return Ok(n1.range()),
                (Some(n1), Some(n2)) => (Arc::clone(n1), Arc::clone(n2)),
                (None, None) => break,
            };

            if exact_match(&n1, &n2) {
                stack1.pop();
                stack2.pop();
                continue;
            }

            // Streams desynchronized on start: definite mismatch.
            if n1.start != n2.start {
                return Ok(n1.range());
            }

            if n1.count > n2.count {
                if n1.is_leaf() {
                    // An indivisible leaf wider than its peer cannot be
                    // broken down further.
                    return Ok(n1.range());
                }
                stack1.pop();
                push_children(&mut stack1, &n1);
                continue;
            }

            if n2.count > n1.count {
                if n2.is_leaf() {
                    return Ok(n1.range());
                }
                stack2.pop();
                push_children(&mut stack2, &n2);
                continue;
            }

            // Same range, different digest.
            if n1.is_leaf() || n2.is_leaf() {
                return Ok(n1.range());
            }

            stack1.pop();
            stack2.pop();
            push_children(&mut stack1, &n1);
            push_children(&mut stack2, &n2);
        }

        Ok((0, 0))
    }

    /// Collect every differing or missing range between the two trees.
    ///
    /// Same descent discipline as [`tree_bisect`](Self::tree_bisect), but
    /// instead of returning on the first mismatch every divergent range is
    /// appended and the walk continues. When a wider indivisible leaf
    /// faces a narrower peer, the leaf's full range is reported and the
    /// peer is consumed with it; a narrower peer holding further internal
    /// mismatches is therefore covered by that single range rather than
    /// reported separately. Output order is not guaranteed; use
    /// [`consolidate_diffs`](crate::consolidate_diffs) for a canonical
    /// merged form.
    pub fn tree_diff(&self, other: &Builder<D>) -> Result<Vec<DiffRange>> {
        let mut diffs = Vec::new();
        let mut stack1: Vec<Arc<SpanNode>> = self.root_node()?.into_iter().collect();
        let mut stack2: Vec<Arc<SpanNode>> = other.root_node()?.into_iter().collect();

        while !stack1.is_empty() || !stack2.is_empty() {
            let (n1, n2) = match (stack1.last(), stack2.last()) {
                (None, Some(n2)) => {
                    // Extra content on the other side only.
                    diffs.push(DiffRange {
                        start: n2.start,
                        count: n2.count,
                    });
                    stack2.pop();
                    continue;
                }
                (Some(n1), None) => {
                    diffs.push(DiffRange {
                        start: n1.start,
                        count: n1.count,
                    });
                    stack1.pop();
                    continue;
                }
                (Some(n1), Some(n2)) => (Arc::clone(n1), Arc::clone(n2)),
                (None, None) => break,
            };

            if exact_match(&n1, &n2) {
                stack1.pop();
                stack2.pop();
                continue;
            }

            // The earlier-starting side is extra until the other catches up.
            if n1.start < n2.start {
                diffs.push(DiffRange {
                    start: n1.start,
                    count: n1.count,
                });
                stack1.pop();
                continue;
            }
            if n2.start < n1.start {
                diffs.push(DiffRange {
                    start: n2.start,
                    count: n2.count,
                });
                stack2.pop();
                continue;
            }

            if n1.count > n2.count {
                if n1.is_leaf() {
                    // The wide leaf covers the peer's range and more;
                    // consume both so the peer is not double-counted.
                    diffs.push(DiffRange {
                        start: n1.start,
                        count: n1.count,
                    });
                    stack1.pop();
                    stack2.pop();
                    continue;
                }
                stack1.pop();
                push_children(&mut stack1, &n1);
                continue;
            }

            if n2.count > n1.count {
                if n2.is_leaf() {
                    diffs.push(DiffRange {
                        start: n2.start,
                        count: n2.count,
                    });
                    stack1.pop();
                    stack2.pop();
                    continue;
                }
                stack2.pop();
                push_children(&mut stack2, &n2);
                continue;
            }

            // Same range: leaf mismatch reports, internal mismatch recurses.
            if n1.is_leaf() || n2.is_leaf() {
                diffs.push(DiffRange {
                    start: n1.start,
                    count: n1.count,
                });
                stack1.pop();
                stack2.pop();
                continue;
            }

            stack1.pop();
            stack2.pop();
            push_children(&mut stack1, &n1);
            push_children(&mut stack2, &n2);
        }

        Ok(diffs)
    }
}
