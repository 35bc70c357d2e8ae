//! Synthetic corpora for tests.
//!
//! Tiny hand-built frame sets with known structure, shared by the unit
//! tests and the end-to-end scenarios.

use half::f16;
use ndarray::{Array2, Array3};

use crate::data::Corpus;

/// Background depth used by all synthetic corpora, meters.
pub const TEST_BG_DEPTH: f32 = 1000.0;

/// Vertical field of view used by all synthetic corpora, radians.
pub const TEST_FOV: f32 = 1.0;

/// Build a corpus from `(depth, labels)` frame pairs.
///
/// Background label is 0. Panics on malformed frames; synthetic inputs
/// are expected to be well-formed.
pub fn corpus_from_frames(frames: Vec<(Array2<f32>, Array2<u8>)>, n_labels: u8) -> Corpus {
    let (height, width) = frames[0].0.dim();
    let n = frames.len();

    let mut depth = Array3::from_elem((n, height, width), f16::from_f32(0.0));
    let mut labels = Array3::zeros((n, height, width));
    for (i, (d, l)) in frames.into_iter().enumerate() {
        depth
            .index_axis_mut(ndarray::Axis(0), i)
            .assign(&d.mapv(f16::from_f32));
        labels.index_axis_mut(ndarray::Axis(0), i).assign(&l);
    }

    Corpus::from_parts(depth, labels, TEST_FOV, n_labels, 0, TEST_BG_DEPTH)
        .expect("synthetic corpus is well-formed")
}

/// Two 4x4 frames at constant depth 1.0: frame A all label 1 except a
/// background pixel at (0,0), frame B all label 2. Three labels.
pub fn two_frame_corpus() -> Corpus {
    let depth = Array2::from_elem((4, 4), 1.0f32);

    let mut labels_a = Array2::from_elem((4, 4), 1u8);
    labels_a[(0, 0)] = 0;
    let labels_b = Array2::from_elem((4, 4), 2u8);

    corpus_from_frames(vec![(depth.clone(), labels_a), (depth, labels_b)], 3)
}

/// One 1x2 frame at constant depth 1.0 with labels `[1, 2]`.
///
/// With the feature `u=(0,0), v=(1,0)` and threshold 0 this splits
/// perfectly: the right pixel probes the background and goes left.
pub fn two_pixel_corpus() -> Corpus {
    let depth = Array2::from_elem((1, 2), 1.0f32);
    let labels = Array2::from_shape_vec((1, 2), vec![1u8, 2]).expect("static shape");
    corpus_from_frames(vec![(depth, labels)], 3)
}

/// Two 8x8 frames with column-dependent depth steps and a three-band
/// label layout. Deep enough structure for multi-level training.
pub fn striped_corpus() -> Corpus {
    let depth_a = Array2::from_shape_fn((8, 8), |(_, x)| 0.5 + x as f32 * 0.25);
    let depth_b = Array2::from_shape_fn((8, 8), |(y, _)| 0.5 + y as f32 * 0.25);

    let bands = |(y, x): (usize, usize)| -> u8 {
        match (x / 3, y / 4) {
            (0, _) => 1,
            (1, 0) => 2,
            (1, _) => 3,
            _ => 2,
        }
    };
    let labels_a = Array2::from_shape_fn((8, 8), bands);
    let labels_b = Array2::from_shape_fn((8, 8), |(y, x)| bands((x, y)));

    corpus_from_frames(vec![(depth_a, labels_a), (depth_b, labels_b)], 4)
}
