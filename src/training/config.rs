//! Training configuration.

use std::path::PathBuf;

use bon::Builder;

use crate::training::logger::Verbosity;

/// Deepest tree the flat BFS layout supports.
pub const MAX_SUPPORTED_DEPTH: usize = 30;

/// Errors raised while validating a configuration. Surfaced before any
/// work happens, so a bad config has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("data directory not specified")]
    MissingDataDir,

    #[error("index name not specified")]
    MissingIndexName,

    #[error("output filename not specified")]
    MissingOutFile,

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("{field} must be non-negative")]
    NegativeRange { field: &'static str },

    #[error("max_depth must be between 1 and {max}, got {value}")]
    DepthOutOfRange { value: usize, max: usize },
}

/// All runtime-settable training properties.
///
/// Every field can be set before training starts and is frozen afterwards.
/// `n_threads = 0` means one worker per available hardware thread.
#[derive(Debug, Clone, Builder)]
pub struct TrainConfig {
    /// Location of training data.
    pub data_dir: Option<PathBuf>,
    /// Name of the frame index to load.
    pub index_name: Option<String>,
    /// Filename of the tree (`.json` or `.rdt`) to write.
    pub out_file: Option<PathBuf>,
    /// Reload and continue training a pre-existing tree.
    #[builder(default)]
    pub reload: bool,
    /// Number of pixels to sample per image.
    #[builder(default = 2000)]
    pub n_pixels: usize,
    /// Number of thresholds to test.
    #[builder(default = 50)]
    pub n_thresholds: usize,
    /// Range of thresholds to test.
    #[builder(default = 1.29)]
    pub threshold_range: f32,
    /// Number of UV combinations to test.
    #[builder(default = 2000)]
    pub n_uv: usize,
    /// Range of UV combinations to generate, meters.
    #[builder(default = 1.29)]
    pub uv_range: f32,
    /// Depth to train the tree to.
    #[builder(default = 20)]
    pub max_depth: usize,
    /// Seed for both PRNG streams.
    #[builder(default = 0)]
    pub seed: u32,
    /// Verbose logging output.
    #[builder(default)]
    pub verbose: bool,
    /// Worker threads to spawn; 0 = hardware parallelism.
    #[builder(default = 0)]
    pub n_threads: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TrainConfig {
    /// Check the numeric hyperparameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("n_pixels", self.n_pixels),
            ("n_thresholds", self.n_thresholds),
            ("n_uv", self.n_uv),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCount { field });
            }
        }
        for (field, value) in [
            ("threshold_range", self.threshold_range),
            ("uv_range", self.uv_range),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeRange { field });
            }
        }
        if self.max_depth == 0 || self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ConfigError::DepthOutOfRange {
                value: self.max_depth,
                max: MAX_SUPPORTED_DEPTH,
            });
        }
        Ok(())
    }

    /// Check the fields the file-based entry point needs.
    pub fn validate_paths(&self) -> Result<(), ConfigError> {
        if self.data_dir.is_none() {
            return Err(ConfigError::MissingDataDir);
        }
        if self.index_name.is_none() {
            return Err(ConfigError::MissingIndexName);
        }
        if self.out_file.is_none() {
            return Err(ConfigError::MissingOutFile);
        }
        Ok(())
    }

    /// Worker count with `0` resolved to the hardware parallelism.
    pub fn resolved_threads(&self) -> usize {
        if self.n_threads > 0 {
            self.n_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Logging level implied by the `verbose` property.
    pub fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TrainConfig::default();
        assert!(!config.reload);
        assert_eq!(config.n_pixels, 2000);
        assert_eq!(config.n_thresholds, 50);
        assert!((config.threshold_range - 1.29).abs() < 1e-6);
        assert_eq!(config.n_uv, 2000);
        assert!((config.uv_range - 1.29).abs() < 1e-6);
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.seed, 0);
        assert!(!config.verbose);
        assert!(config.resolved_threads() >= 1);
    }

    #[test]
    fn validate_rejects_zero_counts_and_bad_depth() {
        let config = TrainConfig::builder().n_pixels(0).build();
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCount { field: "n_pixels" })
        );

        let config = TrainConfig::builder().max_depth(31).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DepthOutOfRange { value: 31, .. })
        ));
    }

    #[test]
    fn validate_paths_reports_first_missing_field() {
        let config = TrainConfig::default();
        assert_eq!(config.validate_paths(), Err(ConfigError::MissingDataDir));

        let config = TrainConfig::builder()
            .data_dir(PathBuf::from("/data"))
            .index_name("train".to_string())
            .build();
        assert_eq!(config.validate_paths(), Err(ConfigError::MissingOutFile));
    }
}
