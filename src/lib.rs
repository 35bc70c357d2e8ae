//! partwise: randomized decision forests for per-pixel body-part
//! classification on depth images.
//!
//! Given a corpus of (depth, label) frame pairs, the trainer grows a
//! binary decision tree over depth-gradient features, breadth-first and
//! level-synchronously, evaluating millions of candidate (feature,
//! threshold) pairs per node across a barrier-synchronized worker pool.
//! Inference descends the trained forest per pixel and emits a
//! probability map over body-part labels.
//!
//! # Key Types
//!
//! - [`Trainer`] / [`TrainConfig`] - Training with configuration builder
//! - [`Corpus`] / [`CorpusLoader`] - Training data handling
//! - [`DecisionTree`] / [`Forest`] - Trained model representation
//! - [`infer_labels`] - Per-pixel probability maps
//!
//! # Training
//!
//! Configure with `TrainConfig::builder()`, then `Trainer::train` (with a
//! corpus loader) or `Trainer::train_corpus` (with a ready corpus).
//! Training can be interrupted through [`InterruptHandle`] and resumed
//! later from the persisted partial tree via the `reload` property.
//!
//! # Persistence
//!
//! Trees round-trip through a JSON document and a binary `.rdt` codec;
//! see the [`io`] module for both schemas.

pub mod data;
pub mod feature;
pub mod inference;
pub mod io;
pub mod model;
pub mod repr;
pub mod testing;
pub mod training;
pub mod utils;

// High-level entry points
pub use model::{InterruptHandle, Trainer};

// Configuration (most users want these)
pub use training::{ConfigError, TrainConfig, TrainError, Verbosity};

// Data types
pub use data::{Corpus, CorpusError, CorpusLoader, DepthPixel, SamplePixel};

// Model representation
pub use repr::{DecisionTree, Forest, NodeCell};

// Feature semantics shared by training and inference
pub use feature::UvPair;

// Inference
pub use inference::{infer_labels, InferParams};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
