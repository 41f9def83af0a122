//! Hierarchical local-cluster pooling and back-gather bookkeeping.
//!
//! One pooling level works in three steps:
//!
//! 1. [`hierarchy_sort`] orders each segment's points by a scalar priority
//!    score, descending.
//! 2. [`local_cluster`](crate::ops::local_cluster) greedily absorbs each
//!    point into the highest-priority representative whose neighbor set
//!    reached it first.
//! 3. [`LocalPooling`] validates the primitive's outputs into a
//!    [`ClusterSelection`]: the representatives, the reduced row splits, and
//!    the back-gather indices that broadcast coarse values to the original
//!    resolution.
//!
//! Multi-stage pipelines push each stage's back-gather layer onto a
//! caller-owned [`BackGatherStack`]. The stack is batch-scoped, appended in
//! pooling order, and applied in reverse order:
//!
//! ```text
//! N ──pool──▶ M₁ ──pool──▶ M₂      coarse tensor (M₂ rows)
//! N ◀─layer₁── M₁ ◀─layer₂── M₂    stack.apply: newest layer first
//! ```

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ops::local_cluster;
use crate::ragged::RowSplits;

/// The identity index column `0..n`, threaded through pooling stages to
/// track which original points survive each level.
pub fn global_indices(n: usize) -> Array1<usize> {
    Array1::from_iter(0..n)
}

/// Per-segment descending sort of a scalar priority score.
///
/// `scores` must be `N x 1`. Returns the concatenation of each segment's
/// indices sorted by score descending, each block offset by the segment
/// start, so the result indexes the full `N`-row batch. Equal scores keep
/// ascending index order (stable sort). Deferred splits return an empty
/// permutation without sorting.
pub fn hierarchy_sort(scores: &Array2<f32>, row_splits: &RowSplits) -> Result<Vec<usize>> {
    if scores.ncols() != 1 {
        return Err(Error::ShapeMismatch {
            expected: "Nx1 priority scores".to_string(),
            actual: format!("{}x{}", scores.nrows(), scores.ncols()),
        });
    }
    if row_splits.is_deferred() {
        return Ok(Vec::new());
    }
    if row_splits.total() != scores.nrows() {
        return Err(Error::DimensionMismatch {
            expected: row_splits.total(),
            found: scores.nrows(),
        });
    }

    let mut order = Vec::with_capacity(scores.nrows());
    for seg in row_splits.iter_segments() {
        let mut block: Vec<usize> = seg.collect();
        block.sort_by(|&a, &b| {
            scores[[b, 0]]
                .partial_cmp(&scores[[a, 0]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.extend(block);
    }
    Ok(order)
}

/// One pooling level's index bookkeeping.
#[derive(Debug, Clone)]
pub struct ClusterSelection {
    /// Original indices of the representatives, strictly increasing per
    /// segment; length `M`.
    pub selection: Vec<usize>,
    /// Boundaries of the reduced batch, one per original boundary.
    pub reduced_row_splits: RowSplits,
    /// For each original point, the reduced position of its representative;
    /// length `N`.
    pub back_gather: Vec<usize>,
}

impl ClusterSelection {
    /// Points before pooling.
    pub fn n_before(&self) -> usize {
        self.back_gather.len()
    }

    /// Representatives after pooling.
    pub fn n_after(&self) -> usize {
        self.selection.len()
    }

    /// Diagnostic compression ratio `M / N`.
    pub fn compression(&self) -> f64 {
        if self.n_before() == 0 {
            return 0.0;
        }
        self.n_after() as f64 / self.n_before() as f64
    }
}

/// Priority-driven local-clustering pooling stage.
#[derive(Debug, Clone, Default)]
pub struct LocalPooling {
    verbose: bool,
}

impl LocalPooling {
    /// Pooling stage with diagnostics off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the compression ratio of every pooled batch.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Pool one level.
    ///
    /// `neighbor_indices` is the `N x K` segment-local graph, `scores` the
    /// `N x 1` clustering priority. Deferred splits short-circuit to an
    /// empty selection with zeroed back-gather indices.
    pub fn pool(
        &self,
        neighbor_indices: &Array2<usize>,
        scores: &Array2<f32>,
        row_splits: &RowSplits,
    ) -> Result<ClusterSelection> {
        let order = hierarchy_sort(scores, row_splits)?;
        if row_splits.is_deferred() {
            return Ok(ClusterSelection {
                selection: Vec::new(),
                reduced_row_splits: RowSplits::Deferred,
                back_gather: vec![0; neighbor_indices.nrows()],
            });
        }

        let (reduced, selection, back_gather) =
            local_cluster(neighbor_indices.view(), &order, row_splits)?;
        let reduced_row_splits = RowSplits::known(reduced)?;

        if selection.len() != reduced_row_splits.total() {
            return Err(Error::DimensionMismatch {
                expected: reduced_row_splits.total(),
                found: selection.len(),
            });
        }
        if back_gather.len() != row_splits.total() {
            return Err(Error::DimensionMismatch {
                expected: row_splits.total(),
                found: back_gather.len(),
            });
        }
        if let Some(&bad) = back_gather.iter().find(|&&b| b >= selection.len()) {
            return Err(Error::IndexOutOfRange {
                index: bad,
                len: selection.len(),
            });
        }

        let out = ClusterSelection {
            selection,
            reduced_row_splits,
            back_gather,
        };
        if self.verbose {
            debug!(
                selected = out.n_after(),
                total = out.n_before(),
                ratio = out.compression(),
                "local pooling reduction"
            );
        }
        Ok(out)
    }
}

/// Gather the rows of each tensor at `indices`.
///
/// All tensors must have at least `max(indices) + 1` rows; outputs keep each
/// input's column count. Out-of-range indices fail fast.
pub fn select_rows(indices: &[usize], tensors: &[&Array2<f32>]) -> Result<Vec<Array2<f32>>> {
    let mut outs = Vec::with_capacity(tensors.len());
    for t in tensors {
        let mut out = Array2::<f32>::zeros((indices.len(), t.ncols()));
        for (row, &i) in indices.iter().enumerate() {
            if i >= t.nrows() {
                return Err(Error::IndexOutOfRange {
                    index: i,
                    len: t.nrows(),
                });
            }
            out.row_mut(row).assign(&t.row(i));
        }
        outs.push(out);
    }
    Ok(outs)
}

/// One recorded pooling stage: its back-gather indices and the coarse row
/// count they expect.
#[derive(Debug, Clone)]
pub struct BackGatherLayer {
    back_gather: Vec<usize>,
    coarse_len: usize,
}

/// Ordered record of the pooling stages applied to a batch.
///
/// Caller-owned and batch-scoped: stages are pushed in pooling order, and
/// [`apply`](BackGatherStack::apply) inverts them newest-first to project a
/// coarse-resolution tensor back to the original `N` rows.
#[derive(Debug, Clone, Default)]
pub struct BackGatherStack {
    layers: Vec<BackGatherLayer>,
}

impl BackGatherStack {
    /// Empty stack (no pooling applied yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one pooling stage.
    pub fn push(&mut self, selection: &ClusterSelection) {
        self.layers.push(BackGatherLayer {
            back_gather: selection.back_gather.clone(),
            coarse_len: selection.n_after(),
        });
    }

    /// Number of recorded stages.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no stage has been recorded.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Project a most-pooled-resolution tensor back to the original
    /// resolution by repeated gathering, newest stage first.
    ///
    /// The tensor's row count must equal the coarse length recorded for the
    /// newest stage; every intermediate length is checked the same way.
    pub fn apply(&self, coarse: &Array2<f32>) -> Result<Array2<f32>> {
        let mut current = coarse.clone();
        for layer in self.layers.iter().rev() {
            if current.nrows() != layer.coarse_len {
                return Err(Error::DimensionMismatch {
                    expected: layer.coarse_len,
                    found: current.nrows(),
                });
            }
            current = select_rows(&layer.back_gather, &[&current])?
                .pop()
                .ok_or(Error::EmptyInput)?;
        }
        Ok(current)
    }
}
