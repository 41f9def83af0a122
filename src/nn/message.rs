//! Iterative neighborhood aggregation ("message passing") over a fixed
//! neighbor graph.
//!
//! All three variants share one recurrence. Round `i` of `R`:
//!
//! ```text
//! feat   = transform_i(features)                       (ReLU projection)
//! agg    = accumulate(distances_i, feat, neighbors)    (N x 2F': mean ‖ max)
//! block  = agg - tile(feat, 2)                         (residual vs. self)
//! ```
//!
//! The residual block becomes the next round's input, and after `R` rounds
//! every block plus the raw input is concatenated along the feature axis, so
//! the output width is `sum(2 * n_i) + F`.
//!
//! The variants differ only in the distance tensor fed to accumulation:
//! identically zero ([`MessagePassing`]), the fixed scaled squared distances
//! ([`DistanceWeightedMessagePassing`]), or a per-round learned rescaling
//! that compounds multiplicatively ([`DynamicDistanceMessagePassing`]).

use ndarray::{concatenate, s, Array2, Axis};
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::ops::accumulate_knn;

use super::{Activation, Dense, DISTANCE_SCALE};

/// One aggregation round: neighbor statistics of `feat`, minus `feat` tiled
/// across both statistic halves.
pub(super) fn aggregate_residual(
    feat: &Array2<f32>,
    neighbor_indices: &Array2<usize>,
    distances: &Array2<f32>,
) -> Result<Array2<f32>> {
    let mut agg = accumulate_knn(distances.view(), feat.view(), neighbor_indices.view())?;
    let f = feat.ncols();
    let mut mean_half = agg.slice_mut(s![.., ..f]);
    mean_half -= feat;
    let mut max_half = agg.slice_mut(s![.., f..]);
    max_half -= feat;
    Ok(agg)
}

/// Build the ReLU transform chain: `in_0 = F`, `in_{i>0} = 2 * n_{i-1}`.
fn transform_chain(
    input_dim: usize,
    n_feature_transformation: &[usize],
    rng: &mut impl Rng,
) -> Result<Vec<Dense>> {
    if n_feature_transformation.is_empty() {
        return Err(Error::InvalidParameter {
            name: "n_feature_transformation",
            message: "need at least one round",
        });
    }
    let mut transforms = Vec::with_capacity(n_feature_transformation.len());
    let mut in_dim = input_dim;
    for &width in n_feature_transformation {
        transforms.push(Dense::glorot(in_dim, width, Activation::Relu, rng)?);
        in_dim = 2 * width;
    }
    Ok(transforms)
}

fn check_chain(transforms: &[Dense]) -> Result<()> {
    if transforms.is_empty() {
        return Err(Error::EmptyInput);
    }
    for pair in transforms.windows(2) {
        if pair[1].in_dim() != 2 * pair[0].out_dim() {
            return Err(Error::DimensionMismatch {
                expected: 2 * pair[0].out_dim(),
                found: pair[1].in_dim(),
            });
        }
    }
    Ok(())
}

/// Run the shared recurrence; `round_distances(i, features)` supplies the
/// distance tensor for round `i` given the round's input features.
fn run_rounds(
    transforms: &[Dense],
    x: &Array2<f32>,
    neighbor_indices: &Array2<usize>,
    mut round_distances: impl FnMut(usize, &Array2<f32>) -> Result<Array2<f32>>,
) -> Result<Array2<f32>> {
    let mut features = x.clone();
    let mut blocks: Vec<Array2<f32>> = Vec::with_capacity(transforms.len() + 1);
    for (i, transform) in transforms.iter().enumerate() {
        let distances = round_distances(i, &features)?;
        let feat = transform.apply(&features)?;
        features = aggregate_residual(&feat, neighbor_indices, &distances)?;
        blocks.push(features.clone());
    }
    blocks.push(x.clone());
    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    concatenate(Axis(1), &views).map_err(|e| Error::Other(e.to_string()))
}

fn chain_output_dim(transforms: &[Dense]) -> usize {
    transforms[0].in_dim() + transforms.iter().map(|t| 2 * t.out_dim()).sum::<usize>()
}

/// Plain (unweighted) message passing: uniform neighbor averaging and max.
#[derive(Debug, Clone)]
pub struct MessagePassing {
    transforms: Vec<Dense>,
}

impl MessagePassing {
    /// Rounds with output widths `n_feature_transformation`, transforms
    /// initialized from the thread RNG.
    pub fn new(input_dim: usize, n_feature_transformation: &[usize]) -> Result<Self> {
        Self::with_rng(input_dim, n_feature_transformation, &mut rand::rng())
    }

    /// Deterministic construction for reproducible models.
    pub fn seeded(
        input_dim: usize,
        n_feature_transformation: &[usize],
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(
            input_dim,
            n_feature_transformation,
            &mut StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        input_dim: usize,
        n_feature_transformation: &[usize],
        rng: &mut impl Rng,
    ) -> Result<Self> {
        Ok(Self {
            transforms: transform_chain(input_dim, n_feature_transformation, rng)?,
        })
    }

    /// Wrap explicit transforms (widths must chain as `in_{i+1} = 2 out_i`).
    pub fn from_parts(transforms: Vec<Dense>) -> Result<Self> {
        check_chain(&transforms)?;
        Ok(Self { transforms })
    }

    /// Output feature width: `sum(2 * n_i) + input_dim`.
    pub fn output_dim(&self) -> usize {
        chain_output_dim(&self.transforms)
    }

    /// Run all rounds over the neighbor graph.
    pub fn forward(
        &self,
        x: &Array2<f32>,
        neighbor_indices: &Array2<usize>,
    ) -> Result<Array2<f32>> {
        let zeros = Array2::<f32>::zeros(neighbor_indices.dim());
        run_rounds(&self.transforms, x, neighbor_indices, |_, _| Ok(zeros.clone()))
    }
}

/// Message passing weighted by the (scaled) squared neighbor distances,
/// fixed across rounds.
#[derive(Debug, Clone)]
pub struct DistanceWeightedMessagePassing {
    transforms: Vec<Dense>,
}

impl DistanceWeightedMessagePassing {
    /// See [`MessagePassing::new`].
    pub fn new(input_dim: usize, n_feature_transformation: &[usize]) -> Result<Self> {
        Ok(Self {
            transforms: transform_chain(
                input_dim,
                n_feature_transformation,
                &mut rand::rng(),
            )?,
        })
    }

    /// Deterministic construction for reproducible models.
    pub fn seeded(
        input_dim: usize,
        n_feature_transformation: &[usize],
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            transforms: transform_chain(
                input_dim,
                n_feature_transformation,
                &mut StdRng::seed_from_u64(seed),
            )?,
        })
    }

    /// Wrap explicit transforms.
    pub fn from_parts(transforms: Vec<Dense>) -> Result<Self> {
        check_chain(&transforms)?;
        Ok(Self { transforms })
    }

    /// Output feature width: `sum(2 * n_i) + input_dim`.
    pub fn output_dim(&self) -> usize {
        chain_output_dim(&self.transforms)
    }

    /// Run all rounds, weighting every round by `DISTANCE_SCALE * d²`.
    pub fn forward(
        &self,
        x: &Array2<f32>,
        neighbor_indices: &Array2<usize>,
        sq_distances: &Array2<f32>,
    ) -> Result<Array2<f32>> {
        let weighted = sq_distances * DISTANCE_SCALE;
        run_rounds(&self.transforms, x, neighbor_indices, |_, _| {
            Ok(weighted.clone())
        })
    }
}

/// Message passing with a learned per-round distance rescaling.
///
/// Each round a sigmoid gate per point scales the running squared-distance
/// tensor before accumulation, so the effective neighborhood width expands
/// or contracts round over round, compounding multiplicatively.
#[derive(Debug, Clone)]
pub struct DynamicDistanceMessagePassing {
    transforms: Vec<Dense>,
    gates: Vec<Dense>,
}

impl DynamicDistanceMessagePassing {
    /// See [`MessagePassing::new`].
    pub fn new(input_dim: usize, n_feature_transformation: &[usize]) -> Result<Self> {
        Self::with_rng(input_dim, n_feature_transformation, &mut rand::rng())
    }

    /// Deterministic construction for reproducible models.
    pub fn seeded(
        input_dim: usize,
        n_feature_transformation: &[usize],
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(
            input_dim,
            n_feature_transformation,
            &mut StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        input_dim: usize,
        n_feature_transformation: &[usize],
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let transforms = transform_chain(input_dim, n_feature_transformation, rng)?;
        // Gate i sees the raw input, concatenated after round 0 with the
        // previous round's residual block.
        let mut gates = Vec::with_capacity(n_feature_transformation.len());
        for i in 0..n_feature_transformation.len() {
            let gate_in = if i == 0 {
                input_dim
            } else {
                input_dim + 2 * n_feature_transformation[i - 1]
            };
            gates.push(Dense::glorot(gate_in, 1, Activation::Sigmoid, rng)?);
        }
        Ok(Self { transforms, gates })
    }

    /// Wrap explicit transforms and gates (one gate per round, one output
    /// column each).
    pub fn from_parts(transforms: Vec<Dense>, gates: Vec<Dense>) -> Result<Self> {
        check_chain(&transforms)?;
        if gates.len() != transforms.len() {
            return Err(Error::DimensionMismatch {
                expected: transforms.len(),
                found: gates.len(),
            });
        }
        if let Some(g) = gates.iter().find(|g| g.out_dim() != 1) {
            return Err(Error::DimensionMismatch {
                expected: 1,
                found: g.out_dim(),
            });
        }
        Ok(Self { transforms, gates })
    }

    /// Output feature width: `sum(2 * n_i) + input_dim`.
    pub fn output_dim(&self) -> usize {
        chain_output_dim(&self.transforms)
    }

    /// Run all rounds, compounding the gated distance rescaling.
    pub fn forward(
        &self,
        x: &Array2<f32>,
        neighbor_indices: &Array2<usize>,
        sq_distances: &Array2<f32>,
    ) -> Result<Array2<f32>> {
        let mut running = sq_distances.clone();
        let gates = &self.gates;
        run_rounds(&self.transforms, x, neighbor_indices, |i, features| {
            let gate = if i == 0 {
                gates[i].apply(x)?
            } else {
                let joined = concatenate(Axis(1), &[x.view(), features.view()])
                    .map_err(|e| Error::Other(e.to_string()))?;
                gates[i].apply(&joined)?
            };
            running *= &(gate * DISTANCE_SCALE);
            Ok(&running * DISTANCE_SCALE)
        })
    }
}
