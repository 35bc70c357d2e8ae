//! The candidate bank: uv offset pairs and split thresholds.
//!
//! Generated once per training run and immutable afterwards; every node
//! evaluates the same bank.

use crate::feature::UvPair;
use rand::Rng;
use rand_mt::Mt19937GenRand32;

/// The fixed set of (uv, threshold) candidates tested at every node.
#[derive(Debug, Clone)]
pub struct CandidateBank {
    uvs: Vec<UvPair>,
    thresholds: Vec<f32>,
}

impl CandidateBank {
    /// Generate the bank.
    ///
    /// `uv_range` is in meters and is scaled by `pixels_per_meter` before
    /// sampling; offsets are drawn uniformly on `[-range/2, +range/2]`
    /// from a Mersenne-Twister generator freshly reseeded with `seed`,
    /// independent of the sample-point generator. Thresholds carry no
    /// randomness: they are evenly spaced over
    /// `[-threshold_range/2, +threshold_range/2]` inclusive.
    pub fn generate(
        n_uv: usize,
        uv_range: f32,
        pixels_per_meter: f32,
        n_thresholds: usize,
        threshold_range: f32,
        seed: u32,
    ) -> Self {
        let mut rng = Mt19937GenRand32::new(seed);
        let range = uv_range * pixels_per_meter;

        let mut draw = move || rng.gen::<f32>() * range - range / 2.0;
        let uvs = (0..n_uv)
            .map(|_| UvPair::new([draw(), draw()], [draw(), draw()]))
            .collect();

        let thresholds = (0..n_thresholds)
            .map(|i| {
                if n_thresholds > 1 {
                    -threshold_range / 2.0
                        + i as f32 * threshold_range / (n_thresholds - 1) as f32
                } else {
                    -threshold_range / 2.0
                }
            })
            .collect();

        Self { uvs, thresholds }
    }

    /// Build a bank from explicit candidates, bypassing generation.
    pub fn from_parts(uvs: Vec<UvPair>, thresholds: Vec<f32>) -> Self {
        Self { uvs, thresholds }
    }

    #[inline]
    pub fn n_uv(&self) -> usize {
        self.uvs.len()
    }

    #[inline]
    pub fn n_thresholds(&self) -> usize {
        self.thresholds.len()
    }

    #[inline]
    pub fn uvs(&self) -> &[UvPair] {
        &self.uvs
    }

    #[inline]
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    #[inline]
    pub fn uv(&self, index: usize) -> UvPair {
        self.uvs[index]
    }

    #[inline]
    pub fn threshold(&self, index: usize) -> f32 {
        self.thresholds[index]
    }
}
