//! Tree training: histograms, sampling, the worker pool, and growth.
//!
//! The training core is a breadth-first, level-synchronous greedy grower:
//! a controller drains a FIFO of pending nodes, and for each node a pool
//! of long-lived workers evaluates the full candidate bank split across
//! the uv axis, synchronized by a two-barrier handshake.

pub mod candidates;
pub mod checkpoint;
pub mod config;
pub mod grower;
pub mod histogram;
pub mod logger;
pub mod partition;
pub mod sampling;
pub mod worker;

pub use candidates::CandidateBank;
pub use checkpoint::{restore_training_state, RestoredState};
pub use config::{ConfigError, TrainConfig, MAX_SUPPORTED_DEPTH};
pub use grower::{grow_tree, GrowerParams, GrowthResult};
pub use histogram::{information_gain, normalize_histogram, shannon_entropy, HistogramSums};
pub use logger::{TrainingLogger, Verbosity};
pub use partition::partition_pixels;
pub use sampling::generate_sample_points;
pub use worker::NodeTrainData;

use crate::data::CorpusError;

/// Errors surfaced by training entry points.
///
/// A user interrupt is not an error: training stops cleanly and the
/// partial tree is persisted with its untrained frontier marked.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("checkpoint has {found} labels, expected {expected}")]
    CheckpointLabels { found: u8, expected: u8 },

    #[error("checkpoint has FOV {found:.2}, expected {expected:.2}")]
    CheckpointFov { found: f32, expected: f32 },

    #[error("can't train with a lower depth than checkpoint ({max_depth} < {checkpoint})")]
    CheckpointTooDeep { checkpoint: u8, max_depth: usize },

    #[error("tree already fully trained")]
    AlreadyTrained,

    #[error("error creating thread: {0}")]
    ThreadSpawn(std::io::Error),

    #[error(transparent)]
    TreeIo(#[from] crate::io::TreeIoError),
}
