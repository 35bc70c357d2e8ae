//! Resuming training from a persisted partial tree.
//!
//! A checkpoint is an ordinary persisted tree whose unresolved nodes carry
//! the untrained sentinel. Restoring replays the recorded splits over the
//! regenerated sample set, which rebuilds the per-node pixel ownership
//! without storing any pixel data in the checkpoint itself.

use std::collections::VecDeque;

use crate::data::{Corpus, SamplePixel};
use crate::repr::{tree_len, DecisionTree, NodeCell};
use crate::training::partition::partition_pixels;
use crate::training::worker::NodeTrainData;
use crate::training::TrainError;

/// Training state reconstructed from a checkpoint.
#[derive(Debug)]
pub struct RestoredState {
    /// Node array sized for the new `max_depth`, restored splits and
    /// leaves filled in, everything else untrained.
    pub nodes: Vec<NodeCell>,
    /// Leaf histograms of the restored leaves, in BFS discovery order.
    pub histograms: Vec<Vec<f32>>,
    /// Nodes still needing training, with their pixel sets reattached.
    pub queue: VecDeque<NodeTrainData>,
}

/// Rebuild the pending queue, leaf list, and node array from a checkpoint.
///
/// `root_pixels` is the full regenerated sample set; the walk partitions
/// it down the stored splits. Restored leaf rows are renumbered in BFS
/// discovery order, which for a conforming checkpoint reproduces the
/// stored indices. A leaf sitting on the checkpoint's frontier depth is
/// re-enqueued for training when `max_depth` extends beyond the persisted
/// depth; its subtree is regrown rather than kept.
pub fn restore_training_state(
    checkpoint: &DecisionTree,
    corpus: &Corpus,
    max_depth: usize,
    root_pixels: Vec<SamplePixel>,
) -> Result<RestoredState, TrainError> {
    if checkpoint.n_labels() != corpus.n_labels() {
        return Err(TrainError::CheckpointLabels {
            found: checkpoint.n_labels(),
            expected: corpus.n_labels(),
        });
    }
    if (checkpoint.fov() - corpus.fov()).abs() > 1e-6 {
        return Err(TrainError::CheckpointFov {
            found: checkpoint.fov(),
            expected: corpus.fov(),
        });
    }
    let ckpt_depth = checkpoint.depth() as usize;
    if ckpt_depth > max_depth {
        return Err(TrainError::CheckpointTooDeep {
            checkpoint: checkpoint.depth(),
            max_depth,
        });
    }

    let mut nodes = vec![NodeCell::Untrained; tree_len(max_depth)];
    let mut histograms: Vec<Vec<f32>> = Vec::new();
    let mut queue = VecDeque::new();

    let mut walk = VecDeque::from([NodeTrainData {
        id: 0,
        depth: 0,
        pixels: root_pixels,
    }]);

    while let Some(data) = walk.pop_front() {
        let deepening_frontier = data.depth + 1 == ckpt_depth && max_depth > ckpt_depth;

        match checkpoint.node(data.id) {
            NodeCell::Leaf { table_row } if !deepening_frontier => {
                let new_row = histograms.len() as u32;
                histograms.push(checkpoint.leaf_row(table_row).to_vec());
                nodes[data.id] = NodeCell::Leaf { table_row: new_row };
            }
            NodeCell::Leaf { .. } | NodeCell::Untrained => {
                queue.push_back(data);
            }
            NodeCell::Split { uv, t } => {
                let (left, right) = partition_pixels(corpus, &data.pixels, uv, t);
                nodes[data.id] = NodeCell::Split { uv, t };

                let id = 2 * data.id + 1;
                let depth = data.depth + 1;
                walk.push_back(NodeTrainData {
                    id,
                    depth,
                    pixels: left,
                });
                walk.push_back(NodeTrainData {
                    id: id + 1,
                    depth,
                    pixels: right,
                });
            }
        }
    }

    if queue.is_empty() {
        return Err(TrainError::AlreadyTrained);
    }

    Ok(RestoredState {
        nodes,
        histograms,
        queue,
    })
}
