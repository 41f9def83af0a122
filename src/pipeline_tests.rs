//! End-to-end scenarios across graph building, pooling, and aggregation.

use ndarray::{array, Array2};

use crate::graph::KnnGraph;
use crate::nn::{DistanceWeightedMessagePassing, MessagePassing, RaggedGravNet};
use crate::pool::{global_indices, select_rows, BackGatherStack, LocalPooling};
use crate::ragged::{RaggedBatch, RowSplits};

/// Two well-separated spatial clusters per segment, two segments.
fn sample_batch() -> (Array2<f32>, RowSplits) {
    let coords = array![
        // segment 0: a tight pair and a loner
        [0.0, 0.0],
        [0.1, 0.0],
        [5.0, 5.0],
        // segment 1: a tight pair
        [10.0, 0.0],
        [10.1, 0.0],
    ];
    (coords, RowSplits::known(vec![0, 3, 5]).unwrap())
}

#[test]
fn test_graph_then_pool_then_backgather() {
    let (coords, rs) = sample_batch();

    // K = 1 true neighbor; keep the self slot for clustering so each
    // representative claims itself plus its nearest mate.
    let graph = KnnGraph::new(1).build(coords.view(), &rs).unwrap();
    assert_eq!(graph.width(), 2);

    // Higher score = higher clustering priority.
    let scores = array![[1.0], [0.5], [0.8], [0.2], [0.9]];
    let sel = LocalPooling::new()
        .with_verbose(true)
        .pool(&graph.indices, &scores, &rs)
        .unwrap();

    // Point 0 claims {0,1}, 2 stands alone, 4 claims {4,3}: 5 -> 3.
    assert_eq!(sel.selection, vec![0, 2, 4]);
    assert_eq!(sel.reduced_row_splits.total(), 3);

    // Reduced batch: gather surviving rows.
    let batch = RaggedBatch::new(coords.clone(), rs.clone()).unwrap();
    let reduced = select_rows(&sel.selection, &[batch.features()]).unwrap();
    assert_eq!(reduced[0].nrows(), 3);

    // Identity survives pooling via the global index column.
    let gids = global_indices(batch.n_points());
    assert_eq!(gids.len(), 5);

    // Compute something at coarse resolution, broadcast back, re-select.
    let mut stack = BackGatherStack::new();
    stack.push(&sel);
    let coarse = array![[1.0], [2.0], [3.0]];
    let full = stack.apply(&coarse).unwrap();
    assert_eq!(full, array![[1.0], [1.0], [2.0], [3.0], [3.0]]);
    let roundtrip = select_rows(&sel.selection, &[&full]).unwrap();
    assert_eq!(roundtrip[0], coarse);
}

#[test]
fn test_two_level_pooling_composes() {
    let (coords, rs) = sample_batch();
    let graph = KnnGraph::new(1).build(coords.view(), &rs).unwrap();
    let scores = array![[1.0], [0.5], [0.8], [0.2], [0.9]];
    let pool = LocalPooling::new();

    let sel1 = pool.pool(&graph.indices, &scores, &rs).unwrap();
    let mut stack = BackGatherStack::new();
    stack.push(&sel1);

    // Second level over the reduced batch.
    let reduced_coords = select_rows(&sel1.selection, &[&coords]).unwrap().remove(0);
    let graph2 = KnnGraph::new(1)
        .build(reduced_coords.view(), &sel1.reduced_row_splits)
        .unwrap();
    let scores2 = select_rows(&sel1.selection, &[&scores]).unwrap().remove(0);
    let sel2 = pool
        .pool(&graph2.indices, &scores2, &sel1.reduced_row_splits)
        .unwrap();
    stack.push(&sel2);

    assert!(sel2.reduced_row_splits.total() <= sel1.reduced_row_splits.total());

    // A coarse tensor walks back through both levels to exactly N rows.
    let coarse = Array2::from_shape_fn((sel2.n_after(), 3), |(i, j)| (i + j) as f32);
    let full = stack.apply(&coarse).unwrap();
    assert_eq!(full.dim(), (5, 3));

    // Wrong resolution is rejected up front.
    let wrong = Array2::<f32>::zeros((sel2.n_after() + 1, 3));
    assert!(stack.apply(&wrong).is_err());
}

#[test]
fn test_gravnet_feeds_message_passing() {
    let x = Array2::from_shape_fn((6, 4), |(i, j)| ((i * 7 + j * 3) % 5) as f32 * 0.2);
    let rs = RowSplits::known(vec![0, 4, 6]).unwrap();

    let block = RaggedGravNet::seeded(4, 2, 3, 8, 6, 99).unwrap();
    let out = block.forward(&x, &rs).unwrap();
    assert_eq!(out.features.dim(), (6, 8));

    // Reuse the block's graph for further rounds over its output features.
    let mp = MessagePassing::seeded(8, &[4, 4], 100).unwrap();
    let mp_out = mp.forward(&out.features, &out.neighbor_indices).unwrap();
    assert_eq!(mp_out.dim(), (6, 2 * 4 + 2 * 4 + 8));

    let dw = DistanceWeightedMessagePassing::seeded(8, &[4], 101).unwrap();
    let dw_out = dw
        .forward(&out.features, &out.neighbor_indices, &out.sq_distances)
        .unwrap();
    assert_eq!(dw_out.dim(), (6, 2 * 4 + 8));
}

#[test]
fn test_deferred_batch_flows_through_whole_pipeline() {
    let x = Array2::<f32>::zeros((3, 4));
    let block = RaggedGravNet::seeded(4, 2, 2, 5, 3, 1).unwrap();
    let out = block.forward(&x, &RowSplits::Deferred).unwrap();
    assert_eq!(out.features.nrows(), 3);

    let scores = Array2::<f32>::zeros((3, 1));
    let sel = LocalPooling::new()
        .pool(&out.neighbor_indices, &scores, &RowSplits::Deferred)
        .unwrap();
    assert!(sel.reduced_row_splits.is_deferred());
    assert!(sel.selection.is_empty());
}
