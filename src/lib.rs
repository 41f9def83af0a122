//! # ragnet
//!
//! Graph representations over ragged point-cloud batches: segment-local kNN
//! graph construction, hierarchical priority-driven pooling with back-gather,
//! and residual neighborhood message passing.
//!
//! Batches are variable-sized point sets concatenated into one matrix and
//! partitioned by **row splits** ([`RowSplits`]) — no padding, and no index
//! ever crosses a segment boundary. On top of that data model:
//!
//! ```text
//! features + row splits
//!   └─▶ RaggedGravNet: learned coords → kNN graph → residual aggregation
//!          └─▶ MessagePassing / DistanceWeighted / DynamicDistance rounds
//! priority scores + graph + row splits
//!   └─▶ LocalPooling: sort → greedy clustering → ClusterSelection
//!          └─▶ BackGatherStack: project coarse results back to N rows
//! ```
//!
//! Everything is a pure synchronous function of its inputs; the only mutable
//! state is the caller-owned, batch-scoped [`BackGatherStack`]. The numeric
//! primitives live in [`ops`] behind fixed contracts so accelerated backends
//! can replace them.

/// Error types used across `ragnet`.
pub mod error;
pub mod graph;
pub mod nn;
pub mod ops;
pub mod pool;
pub mod ragged;

#[cfg(test)]
mod pipeline_tests;

pub use error::{Error, Result};
pub use graph::{KnnGraph, NeighborGraph};
pub use nn::{
    Activation, Dense, DistanceWeightedMessagePassing, DynamicDistanceMessagePassing,
    GravNetOutput, MessagePassing, RaggedGravNet, DISTANCE_SCALE,
};
pub use pool::{
    global_indices, hierarchy_sort, select_rows, BackGatherStack, ClusterSelection, LocalPooling,
};
pub use ragged::{RaggedBatch, RowSplits};
