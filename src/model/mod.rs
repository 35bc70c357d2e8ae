//! High-level training entry points.
//!
//! [`Trainer`] wires the pieces together: configuration validation, corpus
//! loading, candidate and sample generation, optional checkpoint restore,
//! the growth loop, and persistence of the result.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array2;

use crate::data::{Corpus, CorpusLoader};
use crate::io::{load_tree, save_tree};
use crate::repr::{tree_len, DecisionTree, NodeCell};
use crate::training::checkpoint::restore_training_state;
use crate::training::grower::{grow_tree, GrowerParams, GrowthResult};
use crate::training::logger::TrainingLogger;
use crate::training::worker::NodeTrainData;
use crate::training::{generate_sample_points, CandidateBank, TrainConfig, TrainError};

/// Shared cancellation flag.
///
/// Cloneable and safe to trigger from a signal handler thread; training
/// checks it inside the pixel and candidate loops and stops dispatching
/// new nodes once set. Triggering is not an error: the partial tree is
/// still persisted with its untrained frontier marked.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Trains one decision tree from a corpus of (depth, label) frames.
pub struct Trainer {
    config: TrainConfig,
    interrupt: InterruptHandle,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            interrupt: InterruptHandle::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Handle for cancelling this trainer from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Load the corpus through `loader` and train.
    ///
    /// Requires `data_dir`, `index_name`, and `out_file` to be configured;
    /// the result is persisted to `out_file` (`.rdt` binary, JSON
    /// otherwise).
    pub fn train<L: CorpusLoader>(&self, loader: &L) -> Result<DecisionTree, TrainError> {
        self.config.validate_paths()?;
        let data_dir = self.config.data_dir.as_deref().expect("validated above");
        let index_name = self.config.index_name.as_deref().expect("validated above");

        let corpus = loader.load(data_dir, index_name)?;
        self.train_corpus(&corpus)
    }

    /// Train on an already-loaded corpus.
    ///
    /// When `out_file` is configured the tree is persisted there, and with
    /// `reload` set an existing readable tree at that path is continued
    /// instead of trained from scratch.
    pub fn train_corpus(&self, corpus: &Corpus) -> Result<DecisionTree, TrainError> {
        self.config.validate()?;
        let config = &self.config;
        let mut logger = TrainingLogger::new(config.verbosity());

        logger.preparing_metadata();
        let bank = CandidateBank::generate(
            config.n_uv,
            config.uv_range,
            corpus.pixels_per_meter(),
            config.n_thresholds,
            config.threshold_range,
            config.seed,
        );
        let pixels = generate_sample_points(corpus, config.n_pixels, config.seed)?;

        // An unreadable out_file under `reload` falls back to fresh
        // training; a readable but incompatible one is a hard error.
        let checkpoint = match &config.out_file {
            Some(path) if config.reload => load_tree(path).ok(),
            _ => None,
        };

        let (queue, nodes, histograms) = match checkpoint {
            Some(checkpoint) => {
                logger.restoring_checkpoint();
                let restored =
                    restore_training_state(&checkpoint, corpus, config.max_depth, pixels)?;
                (restored.queue, restored.nodes, restored.histograms)
            }
            None => {
                let queue = VecDeque::from([NodeTrainData {
                    id: 0,
                    depth: 0,
                    pixels,
                }]);
                let nodes = vec![NodeCell::Untrained; tree_len(config.max_depth)];
                (queue, nodes, Vec::new())
            }
        };

        let result = grow_tree(
            corpus,
            &bank,
            &GrowerParams {
                max_depth: config.max_depth,
                n_threads: config.resolved_threads(),
            },
            self.interrupt.flag(),
            queue,
            nodes,
            histograms,
            &mut logger,
        )?;
        let interrupted = result.interrupted;

        let tree = assemble_tree(config, corpus, result);

        if let Some(path) = &config.out_file {
            logger.writing_output(path);
            save_tree(&tree, path)?;
        }
        logger.finished(interrupted);

        Ok(tree)
    }
}

/// Pack a growth result into the immutable tree representation.
fn assemble_tree(config: &TrainConfig, corpus: &Corpus, result: GrowthResult) -> DecisionTree {
    let n_labels = corpus.n_labels() as usize;
    let n_rows = result.histograms.len();
    let mut flat = Vec::with_capacity(n_rows * n_labels);
    for row in &result.histograms {
        flat.extend_from_slice(row);
    }
    let leaf_table = Array2::from_shape_vec((n_rows, n_labels), flat)
        .expect("histogram rows all have n_labels entries");

    DecisionTree::from_parts(
        config.max_depth as u8,
        corpus.fov(),
        corpus.n_labels(),
        corpus.bg_label(),
        result.nodes,
        leaf_table,
    )
}
