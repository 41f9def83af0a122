//! Neighbor-graph construction over ragged batches.
//!
//! [`KnnGraph`] wraps the [`select_knn`] primitive with the two conventions
//! the network layers rely on:
//!
//! - the requested width is `k + 1`, reserving slot 0 for the point itself;
//! - `max_radius < 0` (the default) means "k nearest regardless of distance".
//!
//! Deferred row splits produce an all-zero placeholder graph of the right
//! shape so shape-inference passes run without data.

use ndarray::{s, Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::ops::select_knn;
use crate::ragged::RowSplits;

/// Fixed-width, segment-local neighbor lists with squared distances.
#[derive(Debug, Clone)]
pub struct NeighborGraph {
    /// `N x W` neighbor indices into the batch's rows.
    pub indices: Array2<usize>,
    /// `N x W` squared distances matching `indices`.
    pub sq_distances: Array2<f32>,
}

impl NeighborGraph {
    /// Number of points.
    pub fn n_points(&self) -> usize {
        self.indices.nrows()
    }

    /// Neighbor slots per point.
    pub fn width(&self) -> usize {
        self.indices.ncols()
    }

    /// Drop the self slot (column 0), as the GravNet block does before
    /// aggregation.
    pub fn strip_self(&self) -> NeighborGraph {
        NeighborGraph {
            indices: self.indices.slice(s![.., 1..]).to_owned(),
            sq_distances: self.sq_distances.slice(s![.., 1..]).to_owned(),
        }
    }
}

/// Builder for per-segment k-nearest-neighbor graphs.
#[derive(Debug, Clone)]
pub struct KnnGraph {
    /// Neighbors per point, excluding the self slot.
    k: usize,
    /// Maximum squared neighbor distance; negative disables the cutoff.
    max_radius: f32,
}

impl KnnGraph {
    /// Graph builder with `k` true neighbors per point and no radius cutoff.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_radius: -1.0,
        }
    }

    /// Set the maximum squared neighbor distance.
    pub fn with_max_radius(mut self, max_radius: f32) -> Self {
        self.max_radius = max_radius;
        self
    }

    /// Neighbors per point, excluding the self slot.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Build the `N x (k + 1)` neighbor graph for `coordinates`.
    pub fn build(
        &self,
        coordinates: ArrayView2<'_, f32>,
        row_splits: &RowSplits,
    ) -> Result<NeighborGraph> {
        if self.k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "need at least one neighbor",
            });
        }
        let (indices, sq_distances) =
            select_knn(self.k + 1, coordinates, row_splits, self.max_radius)?;
        Ok(NeighborGraph {
            indices,
            sq_distances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_width_is_k_plus_one() {
        let coords = array![[0.0], [1.0], [3.0]];
        let rs = RowSplits::single_segment(3);
        let graph = KnnGraph::new(2).build(coords.view(), &rs).unwrap();
        assert_eq!(graph.width(), 3);
        assert_eq!(graph.n_points(), 3);
        assert_eq!(graph.indices[[1, 0]], 1); // self slot
    }

    #[test]
    fn test_strip_self_drops_column_zero() {
        let coords = array![[0.0], [1.0]];
        let rs = RowSplits::single_segment(2);
        let graph = KnnGraph::new(1).build(coords.view(), &rs).unwrap();
        let stripped = graph.strip_self();
        assert_eq!(stripped.width(), 1);
        assert_eq!(stripped.indices[[0, 0]], 1);
        assert_eq!(stripped.sq_distances[[0, 0]], 1.0);
    }

    #[test]
    fn test_deferred_placeholder_graph() {
        let coords = array![[0.0], [1.0], [2.0]];
        let graph = KnnGraph::new(4)
            .build(coords.view(), &RowSplits::Deferred)
            .unwrap();
        assert_eq!(graph.indices.dim(), (3, 5));
        assert!(graph.sq_distances.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_zero_k_rejected() {
        let coords = array![[0.0]];
        let rs = RowSplits::single_segment(1);
        assert!(KnnGraph::new(0).build(coords.view(), &rs).is_err());
    }
}
