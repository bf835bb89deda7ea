use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::DetectionError;
use crate::types::{AlertType, DetectorKind, MetricCategory, MetricName, MetricScope, SeasonPhase};

/// Detection sensitivity preset, mapped to a base z-score threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLevel {
    /// Fewer alerts, only strong deviations
    Low,
    #[default]
    Standard,
    /// More alerts, earlier warnings
    High,
}

impl SensitivityLevel {
    pub fn base_z_threshold(&self) -> f64 {
        match self {
            SensitivityLevel::Low => 3.0,
            SensitivityLevel::Standard => 2.5,
            SensitivityLevel::High => 2.0,
        }
    }
}

/// Per-metric detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricThresholds {
    /// Overrides the sensitivity-derived z threshold when set
    pub z_override: Option<f64>,
    /// Externally supplied expected trend slope (units per sample)
    pub expected_slope: f64,
    /// Base tolerance for slope deviation before a trend break fires
    pub slope_tolerance: f64,
}

impl Default for MetricThresholds {
    fn default() -> Self {
        Self {
            z_override: None,
            expected_slope: 0.0,
            slope_tolerance: 0.5,
        }
    }
}

/// Context-sensitive weight adjustment for one season phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRule {
    pub phase: SeasonPhase,
    pub weight_multiplier: f64,
}

/// One metric under continuous monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredMetric {
    pub name: MetricName,
    pub category: MetricCategory,
    /// Importance weight, 0-1
    pub weight: f64,
    pub thresholds: MetricThresholds,
    pub context_rules: Vec<ContextRule>,
}

impl MonitoredMetric {
    pub fn new(name: MetricName, weight: f64) -> Self {
        Self {
            name,
            category: name.category(),
            weight,
            thresholds: MetricThresholds::default(),
            context_rules: Vec::new(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MetricThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_context_rule(mut self, phase: SeasonPhase, multiplier: f64) -> Self {
        self.context_rules.push(ContextRule {
            phase,
            weight_multiplier: multiplier,
        });
        self
    }

    /// Weight after applying any context rule for the current phase,
    /// clamped back into 0-1
    pub fn effective_weight(&self, phase: SeasonPhase) -> f64 {
        let mut weight = self.weight;
        for rule in &self.context_rules {
            if rule.phase == phase {
                weight *= rule.weight_multiplier;
            }
        }
        weight.clamp(0.0, 1.0)
    }
}

/// A named set of metrics evaluated jointly by the multivariate detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricGroup {
    pub name: String,
    pub metrics: Vec<MetricName>,
    /// Alert type surfaced when this group deviates
    pub alert_type: AlertType,
    /// Importance weight, 0-1
    pub weight: f64,
}

impl MetricGroup {
    pub fn new(name: impl Into<String>, metrics: Vec<MetricName>) -> Self {
        Self {
            name: name.into(),
            metrics,
            alert_type: AlertType::MultiVariateAnomaly,
            weight: 0.8,
        }
    }

    pub fn with_alert_type(mut self, alert_type: AlertType) -> Self {
        self.alert_type = alert_type;
        self
    }
}

/// Pipeline filtering and bounding thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Alerts below this confidence are dropped
    pub min_confidence: f64,
    /// Alerts above this false-positive probability are dropped
    pub max_false_positive: f64,
    /// Output cap per run
    pub max_alerts: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 60.0,
            max_false_positive: 40.0,
            max_alerts: 10,
        }
    }
}

/// Suppresses alerts whose scope saw a similar stored alert recently.
/// `None` fields match any scope or type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub scope: Option<MetricScope>,
    pub alert_type: Option<AlertType>,
    /// Lookback window for "recent similar alert"
    pub lookback_hours: i64,
}

impl SuppressionRule {
    pub fn any_recent(lookback_hours: i64) -> Self {
        Self {
            scope: None,
            alert_type: None,
            lookback_hours,
        }
    }

    pub fn applies_to(&self, scope: &MetricScope, alert_type: AlertType) -> bool {
        let scope_match = self.scope.as_ref().map(|s| s == scope).unwrap_or(true);
        let type_match = self.alert_type.map(|t| t == alert_type).unwrap_or(true);
        scope_match && type_match
    }
}

/// Immutable configuration for a detection run.
/// Built once, validated, then shared; never mutated mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub sensitivity: SensitivityLevel,
    pub enabled_detectors: Vec<DetectorKind>,
    /// Per-detector confidence scaling, 0-1; missing entries default to 1.0
    pub detector_weights: BTreeMap<DetectorKind, f64>,
    pub metrics: Vec<MonitoredMetric>,
    pub groups: Vec<MetricGroup>,
    pub alert_thresholds: AlertThresholds,
    pub suppression_rules: Vec<SuppressionRule>,
    /// Euclidean distance beyond which a cluster assignment is anomalous
    pub cluster_distance_threshold: f64,
    /// Collaborator fetch timeout
    pub fetch_timeout_secs: u64,
    /// Default history window when the caller does not pass one
    pub history_window_days: i64,
}

impl DetectionConfig {
    /// Standard configuration covering the full monitored metric set
    pub fn standard() -> Self {
        let metrics = vec![
            MonitoredMetric::new(MetricName::PerformanceScore, 0.9),
            MonitoredMetric::new(MetricName::SprintSpeed, 0.7),
            MonitoredMetric::new(MetricName::TrainingLoad, 0.8),
            MonitoredMetric::new(MetricName::SessionRpe, 0.6),
            MonitoredMetric::new(MetricName::Fatigue, 0.8),
            MonitoredMetric::new(MetricName::SleepQuality, 0.7),
            MonitoredMetric::new(MetricName::HrvScore, 0.8),
            MonitoredMetric::new(MetricName::RestingHeartRate, 0.7),
            MonitoredMetric::new(MetricName::MuscleSoreness, 0.9),
            MonitoredMetric::new(MetricName::StressLevel, 0.6),
            MonitoredMetric::new(MetricName::Mood, 0.5),
            MonitoredMetric::new(MetricName::InjuryRiskScore, 1.0),
        ];

        let groups = vec![
            MetricGroup::new(
                "overtraining",
                vec![
                    MetricName::TrainingLoad,
                    MetricName::Fatigue,
                    MetricName::SleepQuality,
                ],
            )
            .with_alert_type(AlertType::OvertrainingRisk),
            MetricGroup::new(
                "performance_wellness",
                vec![
                    MetricName::PerformanceScore,
                    MetricName::Fatigue,
                    MetricName::StressLevel,
                ],
            ),
            MetricGroup::new(
                "injury_risk",
                vec![
                    MetricName::MuscleSoreness,
                    MetricName::TrainingLoad,
                    MetricName::InjuryRiskScore,
                ],
            )
            .with_alert_type(AlertType::InjuryRisk),
        ];

        Self {
            sensitivity: SensitivityLevel::Standard,
            enabled_detectors: DetectorKind::ALL.to_vec(),
            detector_weights: BTreeMap::new(),
            metrics,
            groups,
            alert_thresholds: AlertThresholds::default(),
            suppression_rules: Vec::new(),
            cluster_distance_threshold: 3.0,
            fetch_timeout_secs: 5,
            history_window_days: 30,
        }
    }

    /// Reject invalid configuration before any run starts
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.metrics.is_empty() {
            return Err(DetectionError::ConfigurationError(
                "no monitored metrics configured".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for metric in &self.metrics {
            if !(0.0..=1.0).contains(&metric.weight) {
                return Err(DetectionError::ConfigurationError(format!(
                    "weight {} for metric {} outside [0, 1]",
                    metric.weight,
                    metric.name.as_str()
                )));
            }
            if !seen.insert(metric.name) {
                return Err(DetectionError::ConfigurationError(format!(
                    "metric {} configured twice",
                    metric.name.as_str()
                )));
            }
            if metric.thresholds.slope_tolerance <= 0.0 {
                return Err(DetectionError::ConfigurationError(format!(
                    "slope tolerance for {} must be positive",
                    metric.name.as_str()
                )));
            }
        }

        let mut group_names = BTreeSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(DetectionError::ConfigurationError(
                    "metric group with empty name".to_string(),
                ));
            }
            if !group_names.insert(group.name.clone()) {
                return Err(DetectionError::ConfigurationError(format!(
                    "metric group {} configured twice",
                    group.name
                )));
            }
            if group.metrics.is_empty() {
                return Err(DetectionError::ConfigurationError(format!(
                    "metric group {} has no metrics",
                    group.name
                )));
            }
            if !(0.0..=1.0).contains(&group.weight) {
                return Err(DetectionError::ConfigurationError(format!(
                    "weight {} for group {} outside [0, 1]",
                    group.weight, group.name
                )));
            }
            for name in &group.metrics {
                if !seen.contains(name) {
                    return Err(DetectionError::ConfigurationError(format!(
                        "group {} references unmonitored metric {}",
                        group.name,
                        name.as_str()
                    )));
                }
            }
        }

        for (kind, weight) in &self.detector_weights {
            if !(0.0..=1.0).contains(weight) {
                return Err(DetectionError::ConfigurationError(format!(
                    "weight {} for detector {} outside [0, 1]",
                    weight,
                    kind.as_str()
                )));
            }
        }

        let t = &self.alert_thresholds;
        if !(0.0..=100.0).contains(&t.min_confidence)
            || !(0.0..=100.0).contains(&t.max_false_positive)
        {
            return Err(DetectionError::ConfigurationError(
                "alert thresholds outside [0, 100]".to_string(),
            ));
        }
        if t.max_alerts == 0 {
            return Err(DetectionError::ConfigurationError(
                "max_alerts must be at least 1".to_string(),
            ));
        }

        for rule in &self.suppression_rules {
            if rule.lookback_hours <= 0 {
                return Err(DetectionError::ConfigurationError(
                    "suppression lookback must be positive".to_string(),
                ));
            }
        }

        if self.cluster_distance_threshold <= 0.0 {
            return Err(DetectionError::ConfigurationError(
                "cluster distance threshold must be positive".to_string(),
            ));
        }
        if self.history_window_days < 1 {
            return Err(DetectionError::ConfigurationError(
                "history window must be at least one day".to_string(),
            ));
        }

        Ok(())
    }

    pub fn metric(&self, name: MetricName) -> Option<&MonitoredMetric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn detector_enabled(&self, kind: DetectorKind) -> bool {
        self.enabled_detectors.contains(&kind)
    }

    /// Confidence scaling for a detector, 1.0 when not configured
    pub fn detector_weight(&self, kind: DetectorKind) -> f64 {
        self.detector_weights.get(&kind).copied().unwrap_or(1.0)
    }

    /// Z threshold for one metric: per-metric override or sensitivity base
    pub fn z_threshold(&self, metric: &MonitoredMetric) -> f64 {
        metric
            .thresholds
            .z_override
            .unwrap_or_else(|| self.sensitivity.base_z_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_config_is_valid() {
        assert!(DetectionConfig::standard().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let mut config = DetectionConfig::standard();
        config.metrics[0].weight = 1.4;
        assert!(matches!(
            config.validate(),
            Err(DetectionError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_rejects_empty_metric_set() {
        let mut config = DetectionConfig::standard();
        config.metrics.clear();
        config.groups.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_metric() {
        let mut config = DetectionConfig::standard();
        config
            .metrics
            .push(MonitoredMetric::new(MetricName::Fatigue, 0.5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_group_with_unmonitored_metric() {
        let mut config = DetectionConfig::standard();
        config.metrics.retain(|m| m.name != MetricName::SleepQuality);
        // "overtraining" group still references sleep_quality
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_weight_clamped() {
        let metric = MonitoredMetric::new(MetricName::InjuryRiskScore, 0.9)
            .with_context_rule(SeasonPhase::HighStakes, 1.5);
        assert_eq!(metric.effective_weight(SeasonPhase::HighStakes), 1.0);
        assert_eq!(metric.effective_weight(SeasonPhase::InSeason), 0.9);
    }

    #[test]
    fn test_suppression_rule_matching() {
        let rule = SuppressionRule {
            scope: Some(MetricScope::Metric(MetricName::Fatigue)),
            alert_type: None,
            lookback_hours: 24,
        };
        assert!(rule.applies_to(
            &MetricScope::Metric(MetricName::Fatigue),
            AlertType::StatisticalOutlier
        ));
        assert!(!rule.applies_to(
            &MetricScope::Metric(MetricName::Mood),
            AlertType::StatisticalOutlier
        ));

        let any = SuppressionRule::any_recent(24);
        assert!(any.applies_to(&MetricScope::Group("overtraining".into()), AlertType::OvertrainingRisk));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = DetectionConfig::standard();
        let json = serde_json::to_string(&config).unwrap();
        let back: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert!(back.validate().is_ok());
        assert_eq!(back.metrics.len(), config.metrics.len());
        assert_eq!(back.groups.len(), config.groups.len());
    }

    #[test]
    fn test_sensitivity_thresholds() {
        assert_eq!(SensitivityLevel::Low.base_z_threshold(), 3.0);
        assert_eq!(SensitivityLevel::Standard.base_z_threshold(), 2.5);
        assert_eq!(SensitivityLevel::High.base_z_threshold(), 2.0);
    }
}
