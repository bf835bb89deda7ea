use detection_core::{
    AlertType, AnomalyDetector, DetectionConfig, DetectionError, DetectorKind, EntitySnapshot,
    MetricCategory, MetricScope, RawFinding,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum samples before a fitted trend is worth interpreting
pub const MIN_TREND_SAMPLES: usize = 14;

/// Slope deadband; anything inside is classified as stable
pub const SLOPE_DEADBAND: f64 = 0.1;

/// R-squared below which a trend is considered unreliable and never flagged
pub const MIN_R_SQUARED: f64 = 0.5;

/// Direction of a fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Ordinary-least-squares fit over index-vs-value
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendEstimate {
    /// Units per sample
    pub slope: f64,
    /// Goodness of fit, clamped to [0, 1]
    pub r_squared: f64,
    pub direction: TrendDirection,
    pub sample_size: usize,
}

/// Fit a linear trend over an ordered series.
/// Fewer than `MIN_TREND_SAMPLES` points is an insufficient-data condition.
pub fn estimate(values: &[f64]) -> Result<TrendEstimate, DetectionError> {
    let n = values.len();
    if n < MIN_TREND_SAMPLES {
        return Err(DetectionError::InsufficientData(format!(
            "trend fit needs {} samples, got {}",
            MIN_TREND_SAMPLES, n
        )));
    }

    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / nf;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        ss_xy += dx * (y - mean_y);
        ss_xx += dx * dx;
    }
    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = values.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let fitted = intercept + slope * i as f64;
            (y - fitted).powi(2)
        })
        .sum();

    // A flat series is trivially well-explained by its own flat line
    let r_squared = if ss_tot <= f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    let direction = if slope > SLOPE_DEADBAND {
        TrendDirection::Increasing
    } else if slope < -SLOPE_DEADBAND {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Ok(TrendEstimate {
        slope,
        r_squared,
        direction,
        sample_size: n,
    })
}

/// Flags metrics whose fitted trend departs from the externally supplied
/// expected trend by more than a weight-scaled tolerance.
///
/// Unreliable fits (R-squared at or below 0.5) never fire regardless of
/// the slope gap. Declining performance metrics surface under their own
/// alert type so downstream consumers can route them to coaching staff.
pub struct TrendBreakDetector;

impl TrendBreakDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TrendBreakDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for TrendBreakDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Trend
    }

    fn detect(
        &self,
        snapshot: &EntitySnapshot,
        config: &DetectionConfig,
    ) -> Result<Vec<RawFinding>, DetectionError> {
        let mut findings = Vec::new();
        let mut evaluated = 0usize;

        for metric in &config.metrics {
            let series = snapshot.series(metric.name);
            let fit = match estimate(&series) {
                Ok(fit) => fit,
                Err(DetectionError::InsufficientData(_)) => {
                    debug!(
                        metric = metric.name.as_str(),
                        samples = series.len(),
                        "skipping metric, history below trend minimum"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            evaluated += 1;

            if fit.r_squared <= MIN_R_SQUARED {
                continue;
            }

            let weight = metric.effective_weight(snapshot.context.season_phase);
            let expected = metric.thresholds.expected_slope;
            // Heavier metrics get a tighter tolerance
            let tolerance = metric.thresholds.slope_tolerance * (1.5 - weight);
            let gap = fit.slope - expected;
            if gap.abs() <= tolerance {
                continue;
            }

            let alert_type = if metric.category == MetricCategory::Performance
                && fit.direction == TrendDirection::Decreasing
            {
                AlertType::PerformanceDecline
            } else {
                AlertType::TrendBreak
            };

            // Gap expressed so that the firing tolerance lands at the
            // medium-severity boundary
            let z = 2.0 * gap.abs() / tolerance;
            findings.push(RawFinding {
                detector: DetectorKind::Trend,
                alert_type,
                scope: MetricScope::Metric(metric.name),
                category: metric.category,
                metric_weight: weight,
                current: fit.slope,
                expected,
                deviation: gap,
                z,
                reliability: fit.r_squared,
                severity_floor: None,
                summary: format!(
                    "{} trend is {} at {:.2}/sample vs expected {:.2} (R2 {:.2})",
                    metric.name.as_str(),
                    fit.direction.as_str(),
                    fit.slope,
                    expected,
                    fit.r_squared
                ),
            });
        }

        if evaluated == 0 {
            return Err(DetectionError::InsufficientData(format!(
                "no metric series reached {} samples",
                MIN_TREND_SAMPLES
            )));
        }

        Ok(findings)
    }
}
