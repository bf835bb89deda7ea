use detection_core::stats;
use detection_core::{
    AlertSeverity, AnomalyDetector, DetectionConfig, DetectionError, DetectorKind, EntitySnapshot,
    MetricName, MetricScope, RawFinding,
};
use nalgebra::DVector;
use tracing::debug;

pub mod cluster;

pub use cluster::{ClusterDistanceDetector, NearestCenterModel};

/// Normalized group distance above which an alert fires
pub const GROUP_SCORE_FLAG: f64 = 70.0;

/// Normalized group distance above which severity is floored at High
pub const GROUP_SCORE_ESCALATE: f64 = 85.0;

/// Evaluates predefined metric groups jointly: per-metric z-scores form a
/// vector whose RMS length is scaled onto 0-100.
///
/// A single metric drifting moderately in several group members at once
/// can fire here while staying under every univariate threshold.
pub struct GroupDistanceDetector;

impl GroupDistanceDetector {
    pub fn new() -> Self {
        Self
    }

    /// Normalized distance score for one group, 0-100, with the RMS
    /// z-score it was derived from. None when any member metric lacks
    /// history or a current value.
    fn group_score(snapshot: &EntitySnapshot, metrics: &[MetricName]) -> Option<(f64, f64)> {
        let mut zs = Vec::with_capacity(metrics.len());
        for &name in metrics {
            let series = snapshot.series(name);
            if series.len() < stats::MIN_SAMPLES {
                return None;
            }
            let current = snapshot.current_value(name)?;
            let summary = stats::summary(&series);
            zs.push(stats::z_score(current, summary.mean, summary.std_dev));
        }

        let n = zs.len() as f64;
        let rms = DVector::from_vec(zs).norm() / n.sqrt();
        Some(((rms * 25.0).min(100.0), rms))
    }
}

impl Default for GroupDistanceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for GroupDistanceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Multivariate
    }

    fn detect(
        &self,
        snapshot: &EntitySnapshot,
        config: &DetectionConfig,
    ) -> Result<Vec<RawFinding>, DetectionError> {
        if config.groups.is_empty() {
            return Err(DetectionError::InsufficientData(
                "no metric groups configured".to_string(),
            ));
        }

        let mut findings = Vec::new();
        let mut evaluated = 0usize;

        for group in &config.groups {
            let Some((score, rms)) = Self::group_score(snapshot, &group.metrics) else {
                debug!(group = %group.name, "skipping group, incomplete member data");
                continue;
            };
            evaluated += 1;

            if score <= GROUP_SCORE_FLAG {
                continue;
            }

            let severity_floor = if score > GROUP_SCORE_ESCALATE {
                Some(AlertSeverity::High)
            } else {
                None
            };

            // Urgency weighting follows the group's leading metric
            let category = group.metrics[0].category();
            findings.push(RawFinding {
                detector: DetectorKind::Multivariate,
                alert_type: group.alert_type,
                scope: MetricScope::Group(group.name.clone()),
                category,
                metric_weight: group.weight,
                current: score,
                expected: 0.0,
                deviation: rms,
                z: rms,
                reliability: 1.0,
                severity_floor,
                summary: format!(
                    "group {} distance score {:.0}/100 across {} metrics",
                    group.name,
                    score,
                    group.metrics.len()
                ),
            });
        }

        if evaluated == 0 {
            return Err(DetectionError::InsufficientData(
                "no group had complete member data".to_string(),
            ));
        }

        Ok(findings)
    }
}
