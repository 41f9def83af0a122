//! Neighbor-statistic accumulation ("moments").
//!
//! For each point, gathers the features of its listed neighbors, weights each
//! by `exp(-d)` for that slot's distance entry, and emits two statistics per
//! feature column: a mean-like sum over the fixed slot count and an
//! element-wise max. Zero distances make the weights 1, i.e. plain
//! average-and-max pooling.
//!
//! The mean divides by the fixed row width `W`, not by the number of distinct
//! neighbors: rows padded with repeated self slots over-count on purpose, per
//! the padding policy in [`crate::ops::knn`].

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};

/// Accumulate `[mean, max]` neighbor statistics.
///
/// `distances` and `indices` are `N x W`; `features` is `N x F`. The output
/// is `N x 2F`: columns `[0, F)` hold the weighted mean, columns `[F, 2F)`
/// the weighted element-wise max. Any index outside `[0, N)` fails fast.
pub fn accumulate_knn(
    distances: ArrayView2<'_, f32>,
    features: ArrayView2<'_, f32>,
    indices: ArrayView2<'_, usize>,
) -> Result<Array2<f32>> {
    let (n, w) = indices.dim();
    let f = features.ncols();
    if distances.dim() != (n, w) {
        return Err(Error::ShapeMismatch {
            expected: format!("{n}x{w} distances"),
            actual: format!("{}x{} distances", distances.nrows(), distances.ncols()),
        });
    }
    if features.nrows() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: features.nrows(),
        });
    }
    if w == 0 {
        return Err(Error::InvalidParameter {
            name: "indices",
            message: "neighbor rows must have at least one slot",
        });
    }

    let mut out = Array2::<f32>::zeros((n, 2 * f));
    for p in 0..n {
        for slot in 0..w {
            let q = indices[[p, slot]];
            if q >= n {
                return Err(Error::IndexOutOfRange { index: q, len: n });
            }
            let weight = (-distances[[p, slot]]).exp();
            for c in 0..f {
                let v = weight * features[[q, c]];
                out[[p, c]] += v;
                if slot == 0 || v > out[[p, f + c]] {
                    out[[p, f + c]] = v;
                }
            }
        }
        for c in 0..f {
            out[[p, c]] /= w as f32;
        }
    }
    Ok(out)
}

/// Unweighted average-and-max over an explicit neighbor index set.
///
/// Equivalent to [`accumulate_knn`] with an all-zero distance tensor.
pub fn collect_neighbour_average_and_max(
    features: ArrayView2<'_, f32>,
    indices: ArrayView2<'_, usize>,
) -> Result<Array2<f32>> {
    let zeros = Array2::<f32>::zeros(indices.dim());
    accumulate_knn(zeros.view(), features, indices)
}
