//! Affine projection with a pointwise nonlinearity.

use ndarray::{Array1, Array2};
use rand::prelude::*;

use crate::error::{Error, Result};

/// Pointwise nonlinearity applied after the affine map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Identity.
    Linear,
    /// `max(0, x)`.
    Relu,
    /// Hyperbolic tangent.
    Tanh,
    /// Logistic sigmoid, bounded in `(0, 1)`.
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// A learned affine projection `y = act(x W + b)`.
#[derive(Debug, Clone)]
pub struct Dense {
    /// `in_dim x out_dim` weight matrix.
    weights: Array2<f32>,
    /// `out_dim` bias vector.
    bias: Array1<f32>,
    activation: Activation,
}

impl Dense {
    /// Glorot-uniform initialized projection.
    pub fn glorot(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dense dims",
                message: "input and output widths must be positive",
            });
        }
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let weights =
            Array2::from_shape_fn((in_dim, out_dim), |_| rng.random_range(-limit..limit));
        Ok(Self {
            weights,
            bias: Array1::zeros(out_dim),
            activation,
        })
    }

    /// Wrap explicit parameters (used by tests and deserialized models).
    pub fn from_parts(
        weights: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    ) -> Result<Self> {
        if bias.len() != weights.ncols() {
            return Err(Error::DimensionMismatch {
                expected: weights.ncols(),
                found: bias.len(),
            });
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    /// Input width.
    pub fn in_dim(&self) -> usize {
        self.weights.nrows()
    }

    /// Output width.
    pub fn out_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// Apply to an `N x in_dim` batch.
    pub fn apply(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_dim() {
            return Err(Error::DimensionMismatch {
                expected: self.in_dim(),
                found: x.ncols(),
            });
        }
        let mut y = x.dot(&self.weights);
        y += &self.bias;
        y.mapv_inplace(|v| self.activation.apply(v));
        Ok(y)
    }
}
