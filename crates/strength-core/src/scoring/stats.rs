// Pool statistics and Z/T-score conversion.

use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of a reference population.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub mean: f64,
    pub stdev: f64,
    pub count: usize,
}

impl PoolStats {
    /// True when a Z-score is undefined for this population: empty, a single
    /// value, no spread, or values so large the sums overflowed.
    pub fn is_degenerate(&self) -> bool {
        self.count == 0
            || !self.mean.is_finite()
            || !self.stdev.is_finite()
            || self.stdev < STDEV_EPSILON
    }
}

/// Threshold below which standard deviation is treated as zero.
///
/// A constant population can produce a standard deviation of ~1e-17 through
/// rounding in the mean, which must still count as zero spread.
pub const STDEV_EPSILON: f64 = 1e-9;

/// Compute mean and standard deviation for a slice of values.
///
/// Returns `PoolStats { mean: 0.0, stdev: 0.0, count: 0 }` for an empty slice.
/// Uses the population standard deviation (N denominator).
pub fn compute_pool_stats(values: &[f64]) -> PoolStats {
    if values.is_empty() {
        return PoolStats::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    PoolStats {
        mean,
        stdev: variance.sqrt(),
        count: values.len(),
    }
}

/// Compute a z-score given a value and pool stats.
///
/// Returns exactly 0.0 for a degenerate population, and never a non-finite
/// score.
pub fn compute_zscore(value: f64, stats: &PoolStats) -> f64 {
    if stats.is_degenerate() {
        return 0.0;
    }
    let z = (value - stats.mean) / stats.stdev;
    if z.is_finite() {
        z
    } else {
        0.0
    }
}

/// T-score: the Z-score rescaled to mean 50 and standard deviation 10.
pub fn t_score_from_z(z: f64) -> f64 {
    z * 10.0 + 50.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
