//! Learned transforms and neighborhood message passing.
//!
//! The layers here are plain forward evaluations: parameters are drawn once
//! at construction (or injected via `from_parts`) and applied as pure
//! functions. Training them is a consumer concern and out of scope.
//!
//! All transform dimensions are fixed up front by the constructors; there is
//! no lazy shape discovery at first call. A batch whose feature width does
//! not match a transform is a caller configuration bug and fails fast.

mod dense;
mod gravnet;
mod message;

pub use dense::{Activation, Dense};
pub use gravnet::{GravNetOutput, RaggedGravNet};
pub use message::{
    DistanceWeightedMessagePassing, DynamicDistanceMessagePassing, MessagePassing,
};

/// Fixed multiplicative sharpening applied to squared distances before they
/// enter neighbor accumulation.
pub const DISTANCE_SCALE: f32 = 10.0;
