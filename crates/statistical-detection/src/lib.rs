use detection_core::stats;
use detection_core::{
    AlertType, AnomalyDetector, DetectionConfig, DetectionError, DetectorKind, EntitySnapshot,
    MetricScope, RawFinding,
};
use tracing::debug;

/// Flags single metrics whose current value sits too many standard
/// deviations from the historical mean.
///
/// Each monitored metric is evaluated independently; a metric with a short
/// history is skipped without affecting the others. A zero-variance history
/// can never produce an outlier (z-score is defined as zero there).
pub struct StatisticalOutlierDetector;

impl StatisticalOutlierDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatisticalOutlierDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for StatisticalOutlierDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Statistical
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
            if series.len() < stats::MIN_SAMPLES {
                debug!(
                    metric = metric.name.as_str(),
                    samples = series.len(),
                    "skipping metric, history below minimum"
                );
                continue;
            }
            let Some(current) = snapshot.current_value(metric.name) else {
                debug!(
                    metric = metric.name.as_str(),
                    "skipping metric, no current value"
                );
                continue;
            };
            evaluated += 1;

            let summary = stats::summary(&series);
            let z = stats::z_score(current, summary.mean, summary.std_dev);
            let threshold = config.z_threshold(metric);
            if z.abs() < threshold {
                continue;
            }

            let weight = metric.effective_weight(snapshot.context.season_phase);
            findings.push(RawFinding {
                detector: DetectorKind::Statistical,
                alert_type: AlertType::StatisticalOutlier,
                scope: MetricScope::Metric(metric.name),
                category: metric.category,
                metric_weight: weight,
                current,
                expected: summary.mean,
                deviation: current - summary.mean,
                z,
                reliability: 1.0,
                severity_floor: None,
                summary: format!(
                    "{} at {:.1} is {:.1} standard deviations from its {:.1} mean",
                    metric.name.as_str(),
                    current,
                    z.abs(),
                    summary.mean
                ),
            });
        }

        if evaluated == 0 {
            return Err(DetectionError::InsufficientData(format!(
                "no metric series reached {} samples",
                stats::MIN_SAMPLES
            )));
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use detection_core::{
        DetectionContext, EntityRef, EntityType, MetricName, MetricSample,
    };

    fn snapshot_for(metric: MetricName, history: &[f64], current: f64) -> EntitySnapshot {
        let start = Utc::now() - Duration::days(history.len() as i64);
        let samples = history
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                MetricSample::new(start + Duration::days(i as i64)).with_value(metric, v)
            })
            .collect();

        EntitySnapshot {
            entity: EntityRef::new(EntityType::Player, "p1"),
            history: samples,
            current: MetricSample::new(Utc::now()).with_value(metric, current),
            context: DetectionContext::default(),
            cluster_centers: None,
        }
    }

    #[test]
    fn test_short_history_skips_detector() {
        let snapshot = snapshot_for(MetricName::Fatigue, &[40.0, 42.0, 41.0, 39.0, 40.0], 90.0);
        let config = DetectionConfig::standard();

        let result = StatisticalOutlierDetector::new().detect(&snapshot, &config);
        assert!(matches!(result, Err(DetectionError::InsufficientData(_))));
    }

    #[test]
    fn test_constant_history_never_fires() {
        let history = vec![80.0; 30];
        let snapshot = snapshot_for(MetricName::PerformanceScore, &history, 80.0);
        let config = DetectionConfig::standard();

        let findings = StatisticalOutlierDetector::new()
            .detect(&snapshot, &config)
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_strong_outlier_fires() {
        // Mean 80, sample std-dev ~4.07; current 95 gives z ~3.7
        let mut history = vec![76.0; 15];
        history.extend(vec![84.0; 15]);
        let snapshot = snapshot_for(MetricName::PerformanceScore, &history, 95.0);
        let config = DetectionConfig::standard();

        let findings = StatisticalOutlierDetector::new()
            .detect(&snapshot, &config)
            .unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.alert_type, AlertType::StatisticalOutlier);
        assert_eq!(
            finding.scope,
            MetricScope::Metric(MetricName::PerformanceScore)
        );
        assert!(finding.z > 3.0);
        assert!((finding.expected - 80.0).abs() < 1e-9);
        assert!((finding.deviation - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_value_within_threshold_is_quiet() {
        let mut history = vec![76.0; 15];
        history.extend(vec![84.0; 15]);
        let snapshot = snapshot_for(MetricName::PerformanceScore, &history, 83.0);
        let config = DetectionConfig::standard();

        let findings = StatisticalOutlierDetector::new()
            .detect(&snapshot, &config)
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let mut history = vec![50.0; 20];
        history.extend(vec![60.0; 10]);
        let snapshot = snapshot_for(MetricName::TrainingLoad, &history, 95.0);
        let config = DetectionConfig::standard();

        let detector = StatisticalOutlierDetector::new();
        let first = detector.detect(&snapshot, &config).unwrap();
        let second = detector.detect(&snapshot, &config).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.scope, b.scope);
            assert_eq!(a.z, b.z);
        }
    }
}
