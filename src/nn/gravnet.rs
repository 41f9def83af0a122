//! The GravNet block: learned coordinates, kNN graph, one aggregation round.
//!
//! A single-resolution block that embeds raw features into a low-dimensional
//! coordinate space, builds the segment-local neighbor graph there, runs one
//! distance-weighted aggregation round, and projects the concatenated
//! residual-plus-input through an output transform. The coordinates, graph,
//! and distances are returned alongside the features so downstream pooling
//! and message-passing layers can reuse them.

use ndarray::{concatenate, Array2, Axis};
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::graph::KnnGraph;
use crate::ragged::RowSplits;

use super::message::aggregate_residual;
use super::{Activation, Dense, DISTANCE_SCALE};

/// Everything a GravNet block produces per forward pass.
#[derive(Debug, Clone)]
pub struct GravNetOutput {
    /// `N x n_filters` output features.
    pub features: Array2<f32>,
    /// `N x n_dimensions` learned coordinates the graph was built in.
    pub coordinates: Array2<f32>,
    /// `N x K` neighbor indices (self slot stripped).
    pub neighbor_indices: Array2<usize>,
    /// `N x K` squared distances matching `neighbor_indices`.
    pub sq_distances: Array2<f32>,
}

/// Ragged GravNet block.
#[derive(Debug, Clone)]
pub struct RaggedGravNet {
    n_neighbours: usize,
    input_feature_transform: Dense,
    input_spatial_transform: Dense,
    output_feature_transform: Dense,
}

impl RaggedGravNet {
    /// Block over `input_dim`-wide features with `n_neighbours` true
    /// neighbors (the self slot is handled internally).
    pub fn new(
        input_dim: usize,
        n_neighbours: usize,
        n_dimensions: usize,
        n_filters: usize,
        n_propagate: usize,
    ) -> Result<Self> {
        Self::with_rng(
            input_dim,
            n_neighbours,
            n_dimensions,
            n_filters,
            n_propagate,
            &mut rand::rng(),
        )
    }

    /// Deterministic construction for reproducible models.
    pub fn seeded(
        input_dim: usize,
        n_neighbours: usize,
        n_dimensions: usize,
        n_filters: usize,
        n_propagate: usize,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(
            input_dim,
            n_neighbours,
            n_dimensions,
            n_filters,
            n_propagate,
            &mut StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        input_dim: usize,
        n_neighbours: usize,
        n_dimensions: usize,
        n_filters: usize,
        n_propagate: usize,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        if n_neighbours == 0 {
            return Err(Error::InvalidParameter {
                name: "n_neighbours",
                message: "need at least one neighbor",
            });
        }
        Ok(Self {
            n_neighbours,
            input_feature_transform: Dense::glorot(
                input_dim,
                n_propagate,
                Activation::Relu,
                rng,
            )?,
            input_spatial_transform: Dense::glorot(
                input_dim,
                n_dimensions,
                Activation::Linear,
                rng,
            )?,
            output_feature_transform: Dense::glorot(
                2 * n_propagate + input_dim,
                n_filters,
                Activation::Tanh,
                rng,
            )?,
        })
    }

    /// Wrap explicit transforms.
    ///
    /// The output transform must accept `2 * n_propagate + input_dim`
    /// columns and the spatial transform the same input width as the
    /// feature transform.
    pub fn from_parts(
        n_neighbours: usize,
        input_feature_transform: Dense,
        input_spatial_transform: Dense,
        output_feature_transform: Dense,
    ) -> Result<Self> {
        if n_neighbours == 0 {
            return Err(Error::InvalidParameter {
                name: "n_neighbours",
                message: "need at least one neighbor",
            });
        }
        if input_spatial_transform.in_dim() != input_feature_transform.in_dim() {
            return Err(Error::DimensionMismatch {
                expected: input_feature_transform.in_dim(),
                found: input_spatial_transform.in_dim(),
            });
        }
        let expected = 2 * input_feature_transform.out_dim() + input_feature_transform.in_dim();
        if output_feature_transform.in_dim() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: output_feature_transform.in_dim(),
            });
        }
        Ok(Self {
            n_neighbours,
            input_feature_transform,
            input_spatial_transform,
            output_feature_transform,
        })
    }

    /// True neighbors per point.
    pub fn n_neighbours(&self) -> usize {
        self.n_neighbours
    }

    /// Output feature width.
    pub fn n_filters(&self) -> usize {
        self.output_feature_transform.out_dim()
    }

    /// Coordinate-space dimensionality.
    pub fn n_dimensions(&self) -> usize {
        self.input_spatial_transform.out_dim()
    }

    /// Forward pass over one ragged batch.
    pub fn forward(&self, x: &Array2<f32>, row_splits: &RowSplits) -> Result<GravNetOutput> {
        let coordinates = self.input_spatial_transform.apply(x)?;
        let graph = KnnGraph::new(self.n_neighbours)
            .build(coordinates.view(), row_splits)?
            .strip_self();

        let feat = self.input_feature_transform.apply(x)?;
        let scaled = &graph.sq_distances * DISTANCE_SCALE;
        let residual = aggregate_residual(&feat, &graph.indices, &scaled)?;

        let stacked = concatenate(Axis(1), &[residual.view(), x.view()])
            .map_err(|e| Error::Other(e.to_string()))?;
        let features = self.output_feature_transform.apply(&stacked)?;

        Ok(GravNetOutput {
            features,
            coordinates,
            neighbor_indices: graph.indices,
            sq_distances: graph.sq_distances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_forward_shapes() {
        let block = RaggedGravNet::seeded(3, 2, 4, 8, 6, 42).unwrap();
        let x = Array2::from_shape_fn((7, 3), |(i, j)| (i * 3 + j) as f32 * 0.1);
        let rs = RowSplits::known(vec![0, 4, 7]).unwrap();

        let out = block.forward(&x, &rs).unwrap();
        assert_eq!(out.features.dim(), (7, 8));
        assert_eq!(out.coordinates.dim(), (7, 4));
        assert_eq!(out.neighbor_indices.dim(), (7, 2));
        assert_eq!(out.sq_distances.dim(), (7, 2));
    }

    #[test]
    fn test_graph_respects_segments() {
        let block = RaggedGravNet::seeded(2, 3, 2, 4, 4, 7).unwrap();
        let x = Array2::from_shape_fn((6, 2), |(i, j)| ((i + 1) * (j + 2)) as f32);
        let rs = RowSplits::known(vec![0, 2, 6]).unwrap();

        let out = block.forward(&x, &rs).unwrap();
        for p in 0..2 {
            for &q in out.neighbor_indices.row(p) {
                assert!(q < 2);
            }
        }
        for p in 2..6 {
            for &q in out.neighbor_indices.row(p) {
                assert!((2..6).contains(&q));
            }
        }
    }

    #[test]
    fn test_deferred_batch_still_evaluates() {
        let block = RaggedGravNet::seeded(2, 2, 2, 3, 2, 3).unwrap();
        let x = array![[0.1, 0.2], [0.3, 0.4]];
        let out = block.forward(&x, &RowSplits::Deferred).unwrap();
        assert_eq!(out.features.dim(), (2, 3));
        assert!(out.sq_distances.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_feature_width_mismatch_fails() {
        let block = RaggedGravNet::seeded(3, 2, 2, 4, 4, 5).unwrap();
        let x = Array2::<f32>::zeros((4, 2)); // block expects width 3
        let rs = RowSplits::single_segment(4);
        assert!(block.forward(&x, &rs).is_err());
    }
}
