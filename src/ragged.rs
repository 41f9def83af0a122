//! Ragged batches: concatenated point sets partitioned by row splits.
//!
//! A batch of variable-sized point clouds is stored as one `N x F` feature
//! matrix plus **row splits**: `B + 1` boundary offsets partitioning the rows
//! into `B` contiguous segments. Segment `i` owns rows
//! `[row_splits[i], row_splits[i+1])`. No padding is involved; every derived
//! index array (neighbors, selections, back-gathers) must stay inside the
//! owning segment.
//!
//! ```text
//! features   │ x0 x1 x2 │ x3 x4 │ x5 x6 x7 x8 │
//! row_splits │ 0        3       5             9
//! ```
//!
//! Shape-inference passes sometimes run with no concrete batch at all. That
//! state is modeled explicitly as [`RowSplits::Deferred`] rather than an
//! implicit null check: components receiving deferred splits short-circuit to
//! zero-valued outputs of the right shape instead of failing.

use ndarray::Array2;
use std::ops::Range;

use crate::error::{Error, Result};

/// Segment boundaries of a concatenated batch.
///
/// `Known` holds validated offsets (`splits[0] == 0`, non-decreasing).
/// `Deferred` marks a batch whose length is not yet known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSplits {
    /// Batch length unknown; consumers short-circuit to placeholder outputs.
    Deferred,
    /// Validated boundary offsets, one more than the number of segments.
    Known(Vec<usize>),
}

impl RowSplits {
    /// Validate and wrap explicit boundary offsets.
    pub fn known(splits: Vec<usize>) -> Result<Self> {
        if splits.is_empty() {
            return Err(Error::EmptyInput);
        }
        if splits[0] != 0 {
            return Err(Error::InvalidParameter {
                name: "row_splits",
                message: "first boundary must be 0",
            });
        }
        if splits.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidParameter {
                name: "row_splits",
                message: "boundaries must be non-decreasing",
            });
        }
        Ok(RowSplits::Known(splits))
    }

    /// Splits describing a single segment of `n` points.
    pub fn single_segment(n: usize) -> Self {
        RowSplits::Known(vec![0, n])
    }

    /// True for the shape-deferred variant.
    pub fn is_deferred(&self) -> bool {
        matches!(self, RowSplits::Deferred)
    }

    /// Number of segments (0 when deferred).
    pub fn n_segments(&self) -> usize {
        match self {
            RowSplits::Deferred => 0,
            RowSplits::Known(s) => s.len().saturating_sub(1),
        }
    }

    /// Total number of points across all segments (0 when deferred).
    pub fn total(&self) -> usize {
        match self {
            RowSplits::Deferred => 0,
            RowSplits::Known(s) => *s.last().unwrap_or(&0),
        }
    }

    /// Row range owned by segment `i`.
    ///
    /// Empty range when deferred or out of bounds.
    pub fn segment(&self, i: usize) -> Range<usize> {
        match self {
            RowSplits::Known(s) if i + 1 < s.len() => s[i]..s[i + 1],
            _ => 0..0,
        }
    }

    /// Iterate over per-segment row ranges in segment order.
    pub fn iter_segments(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let slice: &[usize] = match self {
            RowSplits::Deferred => &[],
            RowSplits::Known(s) => s,
        };
        slice.windows(2).map(|w| w[0]..w[1])
    }
}

/// A row-split-partitioned batch of point features.
///
/// Produced fresh per forward evaluation; carries no state across passes.
#[derive(Debug, Clone)]
pub struct RaggedBatch {
    features: Array2<f32>,
    splits: RowSplits,
}

impl RaggedBatch {
    /// Bundle features with their segment boundaries.
    ///
    /// Known splits must account for every feature row.
    pub fn new(features: Array2<f32>, splits: RowSplits) -> Result<Self> {
        if let RowSplits::Known(_) = &splits {
            if splits.total() != features.nrows() {
                return Err(Error::DimensionMismatch {
                    expected: splits.total(),
                    found: features.nrows(),
                });
            }
        }
        Ok(Self { features, splits })
    }

    /// The `N x F` feature matrix.
    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    /// The batch's segment boundaries.
    pub fn row_splits(&self) -> &RowSplits {
        &self.splits
    }

    /// Number of points.
    pub fn n_points(&self) -> usize {
        self.features.nrows()
    }

    /// Feature width.
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Replace the feature matrix, keeping the segment structure.
    pub fn with_features(&self, features: Array2<f32>) -> Result<Self> {
        Self::new(features, self.splits.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_known_splits_validated() {
        assert!(RowSplits::known(vec![0, 3, 5]).is_ok());
        assert_eq!(RowSplits::known(vec![]), Err(Error::EmptyInput));
        assert!(RowSplits::known(vec![1, 3]).is_err());
        assert!(RowSplits::known(vec![0, 4, 2]).is_err());
        // Empty segments are legal.
        assert!(RowSplits::known(vec![0, 0, 2, 2]).is_ok());
    }

    #[test]
    fn test_segment_ranges() {
        let rs = RowSplits::known(vec![0, 3, 5]).unwrap();
        assert_eq!(rs.n_segments(), 2);
        assert_eq!(rs.total(), 5);
        assert_eq!(rs.segment(0), 0..3);
        assert_eq!(rs.segment(1), 3..5);
        let segs: Vec<_> = rs.iter_segments().collect();
        assert_eq!(segs, vec![0..3, 3..5]);
    }

    #[test]
    fn test_deferred_is_empty() {
        let rs = RowSplits::Deferred;
        assert!(rs.is_deferred());
        assert_eq!(rs.n_segments(), 0);
        assert_eq!(rs.total(), 0);
        assert_eq!(rs.iter_segments().count(), 0);
    }

    #[test]
    fn test_batch_row_count_checked() {
        let feats = Array2::<f32>::zeros((5, 2));
        assert!(RaggedBatch::new(feats.clone(), RowSplits::known(vec![0, 3, 5]).unwrap()).is_ok());
        assert!(RaggedBatch::new(feats.clone(), RowSplits::known(vec![0, 4]).unwrap()).is_err());
        // Deferred splits accept any row count.
        assert!(RaggedBatch::new(feats, RowSplits::Deferred).is_ok());
    }
}
