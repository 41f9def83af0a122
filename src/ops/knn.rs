//! Segment-local k-nearest-neighbor search.
//!
//! Brute force within each segment: for `S` points per segment this is
//! O(S²·D), which is fine for the segment sizes ragged batches carry.
//! Neighbors never cross a segment boundary.
//!
//! # Padding policy
//!
//! Output rows have fixed width `k`. Slot 0 is always the query point itself
//! at squared distance 0. When a radius cutoff or a small segment leaves
//! fewer than `k - 1` other candidates, the remaining slots repeat the query
//! point's own index with squared distance 0. Downstream accumulation
//! tolerates the over-counting (extra self copies carry weight `exp(0) = 1`).

use ndarray::{Array2, ArrayView2};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::ragged::RowSplits;

/// Find the `k` nearest neighbors (including self) of every point.
///
/// `k` counts the self slot, so `k = 4` returns each point plus its 3
/// nearest segment-mates. `max_radius < 0` disables the radius cutoff;
/// otherwise candidates with squared distance above `max_radius` are
/// excluded and the row is padded per the module policy.
///
/// Returns `(indices, squared_distances)`, both `N x k`. Deferred row splits
/// short-circuit to all-zero outputs of that shape.
pub fn select_knn(
    k: usize,
    coordinates: ArrayView2<'_, f32>,
    row_splits: &RowSplits,
    max_radius: f32,
) -> Result<(Array2<usize>, Array2<f32>)> {
    if k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            message: "need at least the self slot",
        });
    }
    let n = coordinates.nrows();
    if row_splits.is_deferred() {
        return Ok((Array2::zeros((n, k)), Array2::zeros((n, k))));
    }
    if row_splits.total() != n {
        return Err(Error::DimensionMismatch {
            expected: row_splits.total(),
            found: n,
        });
    }

    let mut indices = Array2::<usize>::zeros((n, k));
    let mut distances = Array2::<f32>::zeros((n, k));

    for seg in row_splits.iter_segments() {
        let run = |p: usize| (p, knn_row(p, seg.clone(), &coordinates, k, max_radius));
        #[cfg(feature = "parallel")]
        let rows: Vec<(usize, Vec<(f32, usize)>)> =
            seg.clone().into_par_iter().map(run).collect();
        #[cfg(not(feature = "parallel"))]
        let rows: Vec<(usize, Vec<(f32, usize)>)> = seg.clone().map(run).collect();
        for (p, row) in rows {
            for (slot, (d, q)) in row.into_iter().enumerate() {
                indices[[p, slot]] = q;
                distances[[p, slot]] = d;
            }
        }
    }

    Ok((indices, distances))
}

/// One point's neighbor row: self first, then others by (distance, index).
fn knn_row(
    p: usize,
    seg: std::ops::Range<usize>,
    coordinates: &ArrayView2<'_, f32>,
    k: usize,
    max_radius: f32,
) -> Vec<(f32, usize)> {
    let own = coordinates.row(p);
    let mut candidates: Vec<(f32, usize)> = seg
        .filter(|&q| q != p)
        .map(|q| {
            let d = own
                .iter()
                .zip(coordinates.row(q).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>();
            (d, q)
        })
        .filter(|&(d, _)| max_radius < 0.0 || d <= max_radius)
        .collect();
    candidates.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut row = Vec::with_capacity(k);
    row.push((0.0, p));
    row.extend(candidates.into_iter().take(k - 1));
    // Radius-starved or small segment: pad with self.
    while row.len() < k {
        row.push((0.0, p));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_neighbors_stay_in_segment() {
        // Two segments [0,3) and [3,5); K=1 plus the self slot.
        let coords = array![[0.0], [1.0], [2.0], [10.0], [11.0]];
        let rs = RowSplits::known(vec![0, 3, 5]).unwrap();
        let (idx, _) = select_knn(2, coords.view(), &rs, -1.0).unwrap();

        for p in 0..3 {
            for slot in 0..2 {
                assert!(idx[[p, slot]] < 3, "point {p} left its segment");
            }
        }
        for p in 3..5 {
            for slot in 0..2 {
                let q = idx[[p, slot]];
                assert!((3..5).contains(&q), "point {p} left its segment");
            }
        }
    }

    #[test]
    fn test_self_in_slot_zero() {
        let coords = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]];
        let rs = RowSplits::single_segment(3);
        let (idx, dist) = select_knn(3, coords.view(), &rs, -1.0).unwrap();

        for p in 0..3 {
            assert_eq!(idx[[p, 0]], p);
            assert_eq!(dist[[p, 0]], 0.0);
        }
        // Point 0's nearest other point is 1 (d²=1), then 2 (d²=4).
        assert_eq!(idx[[0, 1]], 1);
        assert_eq!(dist[[0, 1]], 1.0);
        assert_eq!(idx[[0, 2]], 2);
        assert_eq!(dist[[0, 2]], 4.0);
    }

    #[test]
    fn test_radius_starved_rows_pad_with_self() {
        let coords = array![[0.0], [5.0]];
        let rs = RowSplits::single_segment(2);
        // Radius 1.0 excludes the only other point (d² = 25).
        let (idx, dist) = select_knn(3, coords.view(), &rs, 1.0).unwrap();
        assert_eq!(idx.row(0).to_vec(), vec![0, 0, 0]);
        assert_eq!(dist.row(0).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_negative_radius_means_unrestricted() {
        let coords = array![[0.0], [100.0]];
        let rs = RowSplits::single_segment(2);
        let (idx, dist) = select_knn(2, coords.view(), &rs, -1.0).unwrap();
        assert_eq!(idx[[0, 1]], 1);
        assert_eq!(dist[[0, 1]], 10000.0);
    }

    #[test]
    fn test_deferred_returns_placeholder() {
        let coords = array![[0.0], [1.0]];
        let (idx, dist) = select_knn(4, coords.view(), &RowSplits::Deferred, -1.0).unwrap();
        assert_eq!(idx.dim(), (2, 4));
        assert!(idx.iter().all(|&i| i == 0));
        assert!(dist.iter().all(|&d| d == 0.0));
    }
}
