//! Label histograms, entropy, and information gain.

/// Totals produced by normalizing a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistogramSums {
    /// Total pixel count across all bins.
    pub total: u32,
    /// Number of bins with a non-zero count.
    pub n_nonzero: u32,
}

/// Normalize integer label counts into `normalized`.
///
/// When the histogram is empty the output is all zeros rather than NaN.
/// Returns both the pixel total (weights the gain computation) and the
/// non-zero bin count (a single-label node cannot be split).
pub fn normalize_histogram(histogram: &[u32], normalized: &mut [f32]) -> HistogramSums {
    debug_assert_eq!(histogram.len(), normalized.len());

    let mut sums = HistogramSums::default();
    for &count in histogram {
        if count > 0 {
            sums.total += count;
            sums.n_nonzero += 1;
        }
    }

    if sums.total > 0 {
        let total = sums.total as f32;
        for (out, &count) in normalized.iter_mut().zip(histogram) {
            *out = count as f32 / total;
        }
    } else {
        normalized.fill(0.0);
    }

    sums
}

/// Shannon entropy of a normalized histogram, bits.
///
/// Bins at 0 or 1 are skipped: `0·log2(0)` is defined as 0 and a pure
/// distribution must come out exactly 0 rather than `-1·log2(1)` noise.
pub fn shannon_entropy(normalized: &[f32]) -> f32 {
    let mut entropy = 0.0f32;
    for &value in normalized {
        if value > 0.0 && value < 1.0 {
            entropy += -value * value.log2();
        }
    }
    entropy
}

/// Information gain of a split with the given child entropies and counts.
#[inline]
pub fn information_gain(
    entropy: f32,
    n_pixels: u32,
    l_entropy: f32,
    l_n_pixels: u32,
    r_entropy: f32,
    r_n_pixels: u32,
) -> f32 {
    let n = n_pixels as f32;
    entropy - ((l_n_pixels as f32 / n * l_entropy) + (r_n_pixels as f32 / n * r_entropy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn normalize_sums_to_one() {
        let histogram = [3u32, 0, 5, 8];
        let mut normalized = [0.0f32; 4];
        let sums = normalize_histogram(&histogram, &mut normalized);
        assert_eq!(sums, HistogramSums { total: 16, n_nonzero: 3 });
        assert_abs_diff_eq!(normalized.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(normalized[0], 3.0 / 16.0, epsilon = 1e-6);
    }

    #[test]
    fn normalize_empty_is_all_zero() {
        let histogram = [0u32; 4];
        let mut normalized = [0.5f32; 4];
        let sums = normalize_histogram(&histogram, &mut normalized);
        assert_eq!(sums, HistogramSums::default());
        assert_eq!(normalized, [0.0; 4]);
    }

    #[test]
    fn entropy_zero_iff_pure() {
        let mut normalized = [0.0f32; 4];
        normalize_histogram(&[0, 7, 0, 0], &mut normalized);
        assert_eq!(shannon_entropy(&normalized), 0.0);

        normalize_histogram(&[1, 7, 0, 0], &mut normalized);
        assert!(shannon_entropy(&normalized) > 0.0);
    }

    #[test]
    fn entropy_of_uniform_is_log2_n() {
        let mut normalized = [0.0f32; 8];
        normalize_histogram(&[5; 8], &mut normalized);
        assert_abs_diff_eq!(shannon_entropy(&normalized), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn gain_is_positive_for_separating_split() {
        // Parent: 4+4 of two labels, children pure.
        let mut parent = [0.0f32; 2];
        normalize_histogram(&[4, 4], &mut parent);
        let e_parent = shannon_entropy(&parent);
        let gain = information_gain(e_parent, 8, 0.0, 4, 0.0, 4);
        assert_abs_diff_eq!(gain, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn gain_is_zero_for_uninformative_split() {
        let mut parent = [0.0f32; 2];
        normalize_histogram(&[4, 4], &mut parent);
        let e = shannon_entropy(&parent);
        let gain = information_gain(e, 8, e, 4, e, 4);
        assert_abs_diff_eq!(gain, 0.0, epsilon = 1e-6);
    }
}
