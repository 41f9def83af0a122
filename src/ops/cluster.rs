//! Priority-ordered greedy local clustering.
//!
//! Walks each segment's points in a caller-supplied priority order. A point
//! that no earlier point has claimed becomes a cluster representative and
//! claims every still-unclaimed point in its neighbor row. Claimed points are
//! absorbed; every point ends up owned by exactly one representative.
//!
//! ```text
//! priority order:  p2  p0  p4  p1  p3        (descending score)
//! neighbors(p2) = {p2, p1}   → p2 reps {p2, p1}
//! neighbors(p0) = {p0, p1}   → p1 taken; p0 reps {p0}
//! p4 unclaimed               → p4 reps {p4, ...}
//! ```
//!
//! Representatives are emitted in ascending index order within each segment,
//! so the selection is a strictly increasing sequence per segment regardless
//! of the priority permutation that produced it.

use ndarray::ArrayView2;

use crate::error::{Error, Result};
use crate::ragged::RowSplits;

const UNCLAIMED: usize = usize::MAX;

/// Greedily cluster each segment following `priority_order`.
///
/// `neighbor_indices` is `N x K` and segment-local; `priority_order` is a
/// permutation of `0..N` whose per-segment blocks appear in segment order
/// (the output of [`crate::pool::hierarchy_sort`]).
///
/// Returns `(reduced_row_splits, selection_indices, back_gather_indices)`:
/// the new boundaries, the representatives' original indices (length
/// `M = reduced_row_splits[last]`), and for each original point the reduced
/// position of its representative (length `N`).
pub fn local_cluster(
    neighbor_indices: ArrayView2<'_, usize>,
    priority_order: &[usize],
    row_splits: &RowSplits,
) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>)> {
    let n = neighbor_indices.nrows();
    if row_splits.is_deferred() {
        return Ok((vec![0], Vec::new(), vec![0; n]));
    }
    if row_splits.total() != n {
        return Err(Error::DimensionMismatch {
            expected: row_splits.total(),
            found: n,
        });
    }
    if priority_order.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: priority_order.len(),
        });
    }

    // owner[p] = original index of the representative that claimed p.
    let mut owner = vec![UNCLAIMED; n];
    let order_splits = match row_splits {
        RowSplits::Known(s) => s.as_slice(),
        RowSplits::Deferred => &[],
    };

    for (i, seg) in row_splits.iter_segments().enumerate() {
        let block = &priority_order[order_splits[i]..order_splits[i + 1]];
        for &p in block {
            if !seg.contains(&p) {
                return Err(Error::IndexOutOfRange {
                    index: p,
                    len: seg.end,
                });
            }
            if owner[p] != UNCLAIMED {
                continue;
            }
            owner[p] = p;
            for &q in neighbor_indices.row(p) {
                if !seg.contains(&q) {
                    return Err(Error::IndexOutOfRange {
                        index: q,
                        len: seg.end,
                    });
                }
                if owner[q] == UNCLAIMED {
                    owner[q] = p;
                }
            }
        }
        // The block is a permutation of the segment, so nothing is left over.
        if seg.clone().any(|p| owner[p] == UNCLAIMED) {
            return Err(Error::InvalidParameter {
                name: "priority_order",
                message: "order does not cover every point exactly once",
            });
        }
    }

    // Emit representatives ascending per segment and map points to reduced
    // positions.
    let mut reduced_row_splits = Vec::with_capacity(row_splits.n_segments() + 1);
    reduced_row_splits.push(0);
    let mut selection = Vec::new();
    let mut position = vec![UNCLAIMED; n];
    for seg in row_splits.iter_segments() {
        for p in seg {
            if owner[p] == p {
                position[p] = selection.len();
                selection.push(p);
            }
        }
        reduced_row_splits.push(selection.len());
    }

    let back_gather = (0..n).map(|p| position[owner[p]]).collect();
    Ok((reduced_row_splits, selection, back_gather))
}
