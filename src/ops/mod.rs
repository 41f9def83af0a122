//! Reference implementations of the numeric primitives.
//!
//! The graph-building and pooling layers are orchestration: the per-point
//! heavy lifting sits behind three small primitive operators with fixed
//! contracts, so an accelerated backend can replace them without touching the
//! layers above.
//!
//! | Primitive | Contract |
//! |-----------|----------|
//! | [`select_knn`] | segment-local k-nearest search, self in slot 0 |
//! | [`accumulate_knn`] | deterministic `[mean, max]` statistic over listed neighbors |
//! | [`local_cluster`] | priority-ordered greedy clustering, one representative per point |
//!
//! All three are deterministic pure functions of their inputs. The versions
//! here are single-threaded CPU reference semantics (the `parallel` feature
//! fans the neighbor search out over points with rayon); any replacement must
//! match their outputs exactly.

mod accumulate;
mod cluster;
mod knn;

pub use accumulate::{accumulate_knn, collect_neighbour_average_and_max};
pub use cluster::local_cluster;
pub use knn::select_knn;
