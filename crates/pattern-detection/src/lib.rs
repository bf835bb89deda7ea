use std::sync::Arc;

use detection_core::stats;
use detection_core::{
    AlertType, AnomalyDetector, DetectionConfig, DetectionError, DetectorKind, EntitySnapshot,
    MetricScope, PatternScorer, RawFinding,
};
use tracing::debug;

/// Length of the short pattern window
pub const PATTERN_WINDOW: usize = 7;

/// Minimum history length: enough rolling windows to form a score
/// distribution worth comparing against
pub const MIN_PATTERN_SAMPLES: usize = 16;

/// Deviation threshold in standard deviations of the historical
/// score distribution
pub const PATTERN_Z_THRESHOLD: f64 = 2.0;

/// Default scoring strategy: mean absolute sample-to-sample swing.
///
/// High scores mean erratic day-to-day movement, low scores a smooth
/// progression. Stands in for richer domain scorers injected by callers.
pub struct SwingConsistencyScorer;

impl PatternScorer for SwingConsistencyScorer {
    fn name(&self) -> &'static str {
        "swing_consistency"
    }

    fn score(&self, window: &[f64]) -> f64 {
        if window.len() < 2 {
            return 0.0;
        }
        let total: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        total / (window.len() - 1) as f64
    }
}

/// Compares the most recent short-window pattern score against the
/// distribution of the same score over the metric's history.
pub struct PatternDeviationDetector {
    scorer: Arc<dyn PatternScorer>,
}

impl PatternDeviationDetector {
    pub fn new(scorer: Arc<dyn PatternScorer>) -> Self {
        Self { scorer }
    }
}

impl Default for PatternDeviationDetector {
    fn default() -> Self {
        Self::new(Arc::new(SwingConsistencyScorer))
    }
}

impl AnomalyDetector for PatternDeviationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Pattern
    }

    fn detect(
        &self,
        snapshot: &EntitySnapshot,
        config: &DetectionConfig,
    ) -> Result<Vec<RawFinding>, DetectionError> {
        let mut findings = Vec::new();
        let mut evaluated = 0usize;

        for metric in &config.metrics {
            let mut series = snapshot.series(metric.name);
            if let Some(current) = snapshot.current_value(metric.name) {
                series.push(current);
            }
            if series.len() < MIN_PATTERN_SAMPLES {
                debug!(
                    metric = metric.name.as_str(),
                    samples = series.len(),
                    "skipping metric, history below pattern minimum"
                );
                continue;
            }
            evaluated += 1;

            // Baseline: scores of every closed window before the current one
            let split = series.len() - PATTERN_WINDOW;
            let baseline: Vec<f64> = series[..split]
                .windows(PATTERN_WINDOW)
                .map(|w| self.scorer.score(w))
                .collect();
            let current_score = self.scorer.score(&series[split..]);

            let summary = stats::summary(&baseline);
            if summary.std_dev <= f64::EPSILON {
                // Perfectly uniform historical pattern; nothing to compare against
                continue;
            }

            let z = stats::z_score(current_score, summary.mean, summary.std_dev);
            if z.abs() <= PATTERN_Z_THRESHOLD {
                continue;
            }

            let weight = metric.effective_weight(snapshot.context.season_phase);
            findings.push(RawFinding {
                detector: DetectorKind::Pattern,
                alert_type: AlertType::PatternDeviation,
                scope: MetricScope::Metric(metric.name),
                category: metric.category,
                metric_weight: weight,
                current: current_score,
                expected: summary.mean,
                deviation: current_score - summary.mean,
                z,
                reliability: 1.0,
                severity_floor: None,
                summary: format!(
                    "{} {}-day pattern ({}) scores {:.2} vs typical {:.2}",
                    metric.name.as_str(),
                    PATTERN_WINDOW,
                    self.scorer.name(),
                    current_score,
                    summary.mean
                ),
            });
        }

        if evaluated == 0 {
            return Err(DetectionError::InsufficientData(format!(
                "no metric series reached {} samples",
                MIN_PATTERN_SAMPLES
            )));
        }

        Ok(findings)
    }
}
