//! Expands raw detector findings into fully populated alerts.
//!
//! The mapping is deterministic: scoring formulas live in `scoring`,
//! cause/recommendation/impact content in their own modules, and the only
//! I/O is the historical-comparison lookup, which degrades gracefully.

use std::sync::Arc;

use chrono::Utc;
use detection_core::stats;
use detection_core::{
    Alert, AlertStatus, AnomalyData, DetectionConfig, DetectionContext, EntityRef,
    HistoricalAlertStore, HistoricalComparison, RawFinding,
};
use tracing::warn;

pub mod causes;
pub mod impact;
pub mod recommendations;
pub mod scoring;

pub struct AlertFactory {
    alert_store: Arc<dyn HistoricalAlertStore>,
}

impl AlertFactory {
    pub fn new(alert_store: Arc<dyn HistoricalAlertStore>) -> Self {
        Self { alert_store }
    }

    /// Build one alert from one finding.
    ///
    /// Ids are deterministic (entity, scope, type) so identical inputs
    /// produce identical alert lists and the id doubles as a stable
    /// reference for dedup and related-alert links.
    pub async fn build(
        &self,
        finding: &RawFinding,
        entity: &EntityRef,
        context: &DetectionContext,
        config: &DetectionConfig,
    ) -> Alert {
        let severity = scoring::apply_floor(
            scoring::severity_tier(finding.z, finding.metric_weight),
            finding.severity_floor,
        );
        let reliability = finding.reliability * config.detector_weight(finding.detector);
        let mut confidence = scoring::confidence(finding.z, reliability);

        let historical_comparison = match self
            .alert_store
            .similar_alerts(&finding.scope, finding.deviation)
            .await
        {
            Ok(comparison) => comparison,
            Err(e) => {
                warn!(
                    scope = %finding.scope.label(),
                    error = %e,
                    "historical comparison unavailable, substituting empty"
                );
                confidence = (confidence - 5.0).max(0.0);
                HistoricalComparison::default()
            }
        };

        let false_positive_probability = scoring::false_positive_probability(confidence);
        let urgency = scoring::urgency(finding.z, finding.category);
        let possible_causes = causes::match_causes(finding, context);
        let recommendations =
            recommendations::build_recommendations(finding, severity, &possible_causes);
        let impact = impact::assess(severity, finding.category);

        Alert {
            id: format!(
                "{}:{}:{}",
                entity.key(),
                finding.scope.label(),
                finding.alert_type.as_str()
            ),
            entity: entity.clone(),
            alert_type: finding.alert_type,
            severity,
            confidence,
            false_positive_probability,
            urgency,
            anomaly: AnomalyData {
                scope: finding.scope.clone(),
                current: finding.current,
                expected: finding.expected,
                deviation: finding.deviation,
                significance: stats::significance(finding.z),
                score: finding.z,
            },
            possible_causes,
            recommendations,
            impact,
            historical_comparison,
            related_alerts: Vec::new(),
            status: AlertStatus::New,
            resolution_note: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use detection_core::{
        AlertRecord, AlertSeverity, AlertType, DetectionError, DetectorKind, EntityType,
        MetricCategory, MetricName, MetricScope, Timeframe,
    };

    struct StubStore {
        fail: bool,
    }

    #[async_trait]
    impl HistoricalAlertStore for StubStore {
        async fn similar_alerts(
            &self,
            _scope: &MetricScope,
            _deviation: f64,
        ) -> Result<HistoricalComparison, DetectionError> {
            if self.fail {
                return Err(DetectionError::DataSourceUnavailable(
                    "store offline".to_string(),
                ));
            }
            Ok(HistoricalComparison {
                similar_alert_count: 3,
                occurrences_last_90_days: 2,
                typical_resolution: Some("load adjustment".to_string()),
                typical_time_to_resolution_hours: Some(36.0),
            })
        }

        async fn recent_alert_count(
            &self,
            _entity: &EntityRef,
            _scope: &MetricScope,
            _since: DateTime<Utc>,
        ) -> Result<usize, DetectionError> {
            Ok(0)
        }

        async fn alerts_within(
            &self,
            _timeframe: Timeframe,
        ) -> Result<Vec<AlertRecord>, DetectionError> {
            Ok(Vec::new())
        }
    }

    fn outlier_finding(z: f64, weight: f64) -> RawFinding {
        RawFinding {
            detector: DetectorKind::Statistical,
            alert_type: AlertType::StatisticalOutlier,
            scope: MetricScope::Metric(MetricName::PerformanceScore),
            category: MetricCategory::Performance,
            metric_weight: weight,
            current: 95.0,
            expected: 80.0,
            deviation: 15.0,
            z,
            reliability: 1.0,
            severity_floor: None,
            summary: "performance_score outlier".to_string(),
        }
    }

    fn player() -> EntityRef {
        EntityRef::new(EntityType::Player, "p1")
    }

    #[tokio::test]
    async fn test_strong_outlier_becomes_high_confidence_alert() {
        let factory = AlertFactory::new(Arc::new(StubStore { fail: false }));
        let alert = factory
            .build(
                &outlier_finding(3.6, 1.0),
                &player(),
                &DetectionContext::default(),
                &DetectionConfig::standard(),
            )
            .await;

        assert_eq!(alert.alert_type, AlertType::StatisticalOutlier);
        assert!(alert.severity >= AlertSeverity::High);
        assert!(alert.confidence >= 80.0);
        assert!(alert.false_positive_probability <= 20.0);
        assert_eq!(alert.status, AlertStatus::New);
        assert!(!alert.possible_causes.is_empty());
        assert!(!alert.recommendations.is_empty());
        assert_eq!(alert.historical_comparison.similar_alert_count, 3);
        assert_eq!(alert.id, "player:p1:performance_score:statistical_outlier");
    }

    #[tokio::test]
    async fn test_store_failure_degrades_not_fails() {
        let ok_factory = AlertFactory::new(Arc::new(StubStore { fail: false }));
        let failing_factory = AlertFactory::new(Arc::new(StubStore { fail: true }));

        let finding = outlier_finding(3.0, 1.0);
        let ctx = DetectionContext::default();
        let config = DetectionConfig::standard();

        let healthy = ok_factory.build(&finding, &player(), &ctx, &config).await;
        let degraded = failing_factory.build(&finding, &player(), &ctx, &config).await;

        assert_eq!(degraded.historical_comparison.similar_alert_count, 0);
        assert!((healthy.confidence - degraded.confidence - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_scores_bounded_across_z_sweep() {
        let factory = AlertFactory::new(Arc::new(StubStore { fail: false }));
        for step in 0..60 {
            let z = step as f64 * 0.25;
            let alert = factory
                .build(
                    &outlier_finding(z, 0.8),
                    &player(),
                    &DetectionContext::default(),
                    &DetectionConfig::standard(),
                )
                .await;
            assert!((0.0..=100.0).contains(&alert.confidence));
            assert!((0.0..=100.0).contains(&alert.false_positive_probability));
            assert!((0.0..=100.0).contains(&alert.urgency));
            assert!((0.0..=99.0).contains(&alert.anomaly.significance));
        }
    }

    #[tokio::test]
    async fn test_severity_floor_respected() {
        let factory = AlertFactory::new(Arc::new(StubStore { fail: false }));
        let mut finding = outlier_finding(1.0, 0.5);
        finding.severity_floor = Some(AlertSeverity::High);

        let alert = factory
            .build(
                &finding,
                &player(),
                &DetectionContext::default(),
                &DetectionConfig::standard(),
            )
            .await;
        assert_eq!(alert.severity, AlertSeverity::High);
    }
}
