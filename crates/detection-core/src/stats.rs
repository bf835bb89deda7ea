//! Statistical primitives shared by the detectors.
//!
//! All detectors derive their thresholds from the data's own distribution
//! rather than fixed per-metric bounds, so a naturally noisy metric does not
//! constantly trigger and a flat one is not held to thresholds designed for
//! volatile series.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;
use statrs::statistics::Statistics;
use std::f64::consts::SQRT_2;

/// Minimum history length before a detector may trust its estimates.
/// Below this the calling detector is skipped, not failed.
pub const MIN_SAMPLES: usize = 10;

/// Mean, sample standard deviation, and median of a series
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
}

/// Compute summary statistics over a series.
/// Empty input yields all zeros; a single sample yields zero std-dev.
pub fn summary(values: &[f64]) -> SummaryStats {
    if values.is_empty() {
        return SummaryStats::default();
    }
    let mean = values.mean();
    let std_dev = if values.len() < 2 { 0.0 } else { values.std_dev() };
    SummaryStats {
        mean,
        std_dev,
        median: median(values),
    }
}

/// Median with midpoint interpolation for even-length series
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Z-score of `current` against a known mean and standard deviation.
/// Zero std-dev means no spread, treated as no deviation rather than
/// a division error.
pub fn z_score(current: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= f64::EPSILON {
        return 0.0;
    }
    (current - mean) / std_dev
}

/// Map |z| to a two-sided significance percentage, 0-99.
/// Uses the normal CDF: significance = (2 * phi(|z|) - 1) * 100, capped
/// so that even extreme deviations never claim certainty.
pub fn significance(z: f64) -> f64 {
    (erf(z.abs() / SQRT_2) * 100.0).min(99.0)
}
