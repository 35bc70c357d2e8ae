//! End-to-end training scenarios.
//!
//! Focused on behavior and invariants: degenerate candidate banks,
//! terminal depths, determinism, and thread invariance.

use partwise::testing;
use partwise::{NodeCell, TrainConfig, Trainer};

fn tiny_config() -> TrainConfig {
    TrainConfig::builder()
        .n_pixels(4)
        .n_uv(1)
        .uv_range(0.0)
        .n_thresholds(1)
        .threshold_range(0.0)
        .max_depth(2)
        .seed(0)
        .n_threads(1)
        .build()
}

#[test]
fn uninformative_bank_leaves_the_root_with_the_label_mix() {
    // Zero uv range and zero threshold range collapse the bank to a
    // single all-zero candidate: every feature is 0, every split is
    // degenerate, and the root becomes a leaf.
    let corpus = testing::two_frame_corpus();
    let tree = Trainer::new(tiny_config()).train_corpus(&corpus).unwrap();

    assert_eq!(tree.node(0), NodeCell::Leaf { table_row: 0 });
    assert_eq!(tree.node(1), NodeCell::Untrained);
    assert_eq!(tree.node(2), NodeCell::Untrained);
    assert!(tree.is_fully_trained());

    // Each frame contributes exactly n_pixels in-body samples: frame A is
    // all label 1 inside the body, frame B all label 2, and the
    // background label never appears.
    let hist = tree.leaf_row(0);
    assert_eq!(hist[0], 0.0);
    assert!((hist[1] - 0.5).abs() < 1e-6);
    assert!((hist[2] - 0.5).abs() < 1e-6);
}

#[test]
fn max_depth_one_produces_a_single_leaf() {
    let corpus = testing::striped_corpus();
    let config = TrainConfig::builder()
        .n_pixels(32)
        .n_uv(16)
        .n_thresholds(5)
        .max_depth(1)
        .n_threads(2)
        .build();
    let tree = Trainer::new(config).train_corpus(&corpus).unwrap();

    assert_eq!(tree.nodes().len(), 1);
    assert_eq!(tree.node(0), NodeCell::Leaf { table_row: 0 });

    let hist = tree.leaf_row(0);
    let sum: f32 = hist.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert_eq!(hist[0], 0.0);
}

#[test]
fn leaf_histograms_are_normalized_and_background_free() {
    let corpus = testing::striped_corpus();
    let config = TrainConfig::builder()
        .n_pixels(64)
        .n_uv(32)
        .n_thresholds(9)
        .max_depth(4)
        .n_threads(2)
        .build();
    let tree = Trainer::new(config).train_corpus(&corpus).unwrap();
    tree.validate().expect("trained tree is structurally sound");

    assert!(tree.n_leaf_rows() > 0);
    for row in 0..tree.n_leaf_rows() {
        let hist = tree.leaf_row(row as u32);
        let sum: f32 = hist.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "row {row} sums to {sum}");
        assert_eq!(hist[0], 0.0, "background must never be sampled");
    }
}

#[test]
fn splits_only_install_positive_gain() {
    // Indirectly observable: every split node must have two reachable
    // children and no node may split without separating pixels, so a
    // validated tree with at least one split implies positive gains.
    let corpus = testing::striped_corpus();
    let config = TrainConfig::builder()
        .n_pixels(64)
        .n_uv(32)
        .n_thresholds(9)
        .max_depth(4)
        .n_threads(2)
        .build();
    let tree = Trainer::new(config).train_corpus(&corpus).unwrap();

    let n_splits = tree
        .nodes()
        .iter()
        .filter(|n| matches!(n, NodeCell::Split { .. }))
        .count();
    assert!(n_splits > 0, "striped corpus must be separable");
    tree.validate().expect("all splits have live children");
}

#[test]
fn same_seed_same_tree_different_seed_different_tree() {
    let corpus = testing::striped_corpus();
    let config = |seed: u32| {
        TrainConfig::builder()
            .n_pixels(64)
            .n_uv(32)
            .n_thresholds(9)
            .max_depth(4)
            .seed(seed)
            .n_threads(1)
            .build()
    };

    let a = Trainer::new(config(1)).train_corpus(&corpus).unwrap();
    let b = Trainer::new(config(1)).train_corpus(&corpus).unwrap();
    let c = Trainer::new(config(2)).train_corpus(&corpus).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn chosen_splits_are_invariant_across_thread_counts() {
    let corpus = testing::striped_corpus();
    let config = |n_threads: usize| {
        TrainConfig::builder()
            .n_pixels(64)
            .n_uv(33)
            .n_thresholds(9)
            .max_depth(4)
            .n_threads(n_threads)
            .build()
    };

    let reference = Trainer::new(config(1)).train_corpus(&corpus).unwrap();
    for n_threads in [2, 4, 8] {
        let tree = Trainer::new(config(n_threads)).train_corpus(&corpus).unwrap();
        assert_eq!(reference, tree, "n_threads = {n_threads}");
    }
}
