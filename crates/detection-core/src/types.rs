use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DetectionError;

/// Kind of entity being monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Player,
    Team,
    Workout,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Player => "player",
            EntityType::Team => "team",
            EntityType::Workout => "workout",
        }
    }
}

/// Identity of one monitored entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
        }
    }

    /// Stable key used in alert ids and dedup keys
    pub fn key(&self) -> String {
        format!("{}:{}", self.entity_type.as_str(), self.entity_id)
    }
}

/// Closed set of metric names accepted by the engine.
/// Free-form metric keys are rejected at the config boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    PerformanceScore,
    SprintSpeed,
    TrainingLoad,
    SessionRpe,
    Fatigue,
    SleepQuality,
    HrvScore,
    RestingHeartRate,
    MuscleSoreness,
    StressLevel,
    Mood,
    InjuryRiskScore,
}

impl MetricName {
    pub const ALL: [MetricName; 12] = [
        MetricName::PerformanceScore,
        MetricName::SprintSpeed,
        MetricName::TrainingLoad,
        MetricName::SessionRpe,
        MetricName::Fatigue,
        MetricName::SleepQuality,
        MetricName::HrvScore,
        MetricName::RestingHeartRate,
        MetricName::MuscleSoreness,
        MetricName::StressLevel,
        MetricName::Mood,
        MetricName::InjuryRiskScore,
    ];

    /// Fixed category for each metric
    pub fn category(&self) -> MetricCategory {
        match self {
            MetricName::PerformanceScore | MetricName::SprintSpeed => MetricCategory::Performance,
            MetricName::TrainingLoad | MetricName::SessionRpe | MetricName::Fatigue => {
                MetricCategory::Load
            }
            MetricName::SleepQuality | MetricName::HrvScore | MetricName::RestingHeartRate => {
                MetricCategory::Recovery
            }
            MetricName::StressLevel | MetricName::Mood => MetricCategory::Wellness,
            MetricName::MuscleSoreness | MetricName::InjuryRiskScore => MetricCategory::Injury,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PerformanceScore => "performance_score",
            MetricName::SprintSpeed => "sprint_speed",
            MetricName::TrainingLoad => "training_load",
            MetricName::SessionRpe => "session_rpe",
            MetricName::Fatigue => "fatigue",
            MetricName::SleepQuality => "sleep_quality",
            MetricName::HrvScore => "hrv_score",
            MetricName::RestingHeartRate => "resting_heart_rate",
            MetricName::MuscleSoreness => "muscle_soreness",
            MetricName::StressLevel => "stress_level",
            MetricName::Mood => "mood",
            MetricName::InjuryRiskScore => "injury_risk_score",
        }
    }
}

/// Metric category, drives urgency weighting and cause matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Performance,
    Load,
    Recovery,
    Wellness,
    Injury,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Performance => "performance",
            MetricCategory::Load => "load",
            MetricCategory::Recovery => "recovery",
            MetricCategory::Wellness => "wellness",
            MetricCategory::Injury => "injury",
        }
    }

    /// Multiplier applied to raw urgency for this category
    pub fn urgency_factor(&self) -> f64 {
        match self {
            MetricCategory::Injury => 1.3,
            MetricCategory::Performance => 1.1,
            MetricCategory::Wellness => 0.9,
            MetricCategory::Load | MetricCategory::Recovery => 1.0,
        }
    }
}

/// One dated snapshot of metric values for an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub recorded_at: DateTime<Utc>,
    pub values: BTreeMap<MetricName, f64>,
}

impl MetricSample {
    pub fn new(recorded_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, name: MetricName, value: f64) -> Self {
        self.values.insert(name, value);
        self
    }

    pub fn value(&self, name: MetricName) -> Option<f64> {
        self.values.get(&name).copied()
    }
}

/// Phase of the competitive season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonPhase {
    Preseason,
    #[default]
    InSeason,
    /// Playoffs, finals, qualification windows
    HighStakes,
    OffSeason,
}

/// A noteworthy recent event (match, travel leg, illness report)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentEvent {
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Environmental context for the detection window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentalFactors {
    pub travel_hours_last_week: f64,
    pub ambient_temperature_c: Option<f64>,
    pub altitude_m: Option<f64>,
}

/// Workload context for the detection window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadContext {
    pub sessions_last_7_days: u32,
    pub matches_last_14_days: u32,
    pub acute_chronic_ratio: Option<f64>,
}

/// Read-only context supplied per detection run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionContext {
    pub season_phase: SeasonPhase,
    pub recent_events: Vec<RecentEvent>,
    pub environment: EnvironmentalFactors,
    pub workload: WorkloadContext,
}

impl DetectionContext {
    /// Substituted when the context provider is unavailable.
    /// In-season, no events, neutral environment and workload.
    pub fn fallback() -> Self {
        Self::default()
    }
}

/// What an alert is about: a single metric or a named metric group
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricScope {
    Metric(MetricName),
    Group(String),
}

impl MetricScope {
    pub fn label(&self) -> String {
        match self {
            MetricScope::Metric(name) => name.as_str().to_string(),
            MetricScope::Group(name) => name.clone(),
        }
    }
}

/// Alert classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    StatisticalOutlier,
    PatternDeviation,
    TrendBreak,
    MultiVariateAnomaly,
    ClusterAnomaly,
    OvertrainingRisk,
    InjuryRisk,
    PerformanceDecline,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::StatisticalOutlier => "statistical_outlier",
            AlertType::PatternDeviation => "pattern_deviation",
            AlertType::TrendBreak => "trend_break",
            AlertType::MultiVariateAnomaly => "multi_variate_anomaly",
            AlertType::ClusterAnomaly => "cluster_anomaly",
            AlertType::OvertrainingRisk => "overtraining_risk",
            AlertType::InjuryRisk => "injury_risk",
            AlertType::PerformanceDecline => "performance_decline",
        }
    }
}

/// Alert severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// Alert lifecycle status.
///
/// Legal transitions: New -> Investigating -> {Resolved | FalsePositive},
/// plus an explicit reopen from either terminal state back to New.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Resolved => "resolved",
            AlertStatus::FalsePositive => "false_positive",
        }
    }

    /// Validate a transition, returning the new status or an error
    pub fn transition(self, to: AlertStatus) -> Result<AlertStatus, DetectionError> {
        let legal = matches!(
            (self, to),
            (AlertStatus::New, AlertStatus::Investigating)
                | (AlertStatus::Investigating, AlertStatus::Resolved)
                | (AlertStatus::Investigating, AlertStatus::FalsePositive)
                | (AlertStatus::Resolved, AlertStatus::New)
                | (AlertStatus::FalsePositive, AlertStatus::New)
        );
        if legal {
            Ok(to)
        } else {
            Err(DetectionError::InvalidTransition { from: self, to })
        }
    }
}

/// The numbers behind an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyData {
    pub scope: MetricScope,
    pub current: f64,
    pub expected: f64,
    pub deviation: f64,
    /// Statistical significance of the deviation, 0-99
    pub significance: f64,
    /// Detector-specific score (z-score, distance score, pattern score)
    pub score: f64,
}

/// Cause taxonomy used by the cause-matching rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCategory {
    Training,
    Recovery,
    Environmental,
}

/// One candidate explanation with an estimated probability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossibleCause {
    pub description: String,
    pub category: CauseCategory,
    /// 0.0 to 1.0
    pub probability: f64,
}

/// Priority of a recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Urgent,
    High,
    Medium,
    Low,
}

impl RecommendationPriority {
    /// Sort weight, larger first
    pub fn weight(&self) -> u8 {
        match self {
            RecommendationPriority::Urgent => 4,
            RecommendationPriority::High => 3,
            RecommendationPriority::Medium => 2,
            RecommendationPriority::Low => 1,
        }
    }
}

/// One recommended action attached to an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub priority: RecommendationPriority,
}

/// Quantified impact over one horizon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// Expected performance change, percent (negative = decline)
    pub performance_delta_pct: f64,
    /// Expected injury-risk change, percent
    pub injury_risk_delta_pct: f64,
    /// Expected availability, percent of sessions/matches
    pub availability_pct: f64,
    /// Rough cost of inaction, arbitrary budget units
    pub estimated_cost: f64,
}

/// Impact projected across the standard three horizons
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub immediate: ImpactEstimate,
    pub short_term: ImpactEstimate,
    pub long_term: ImpactEstimate,
}

/// Summary of similar past alerts, supplied by the alert store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalComparison {
    pub similar_alert_count: u32,
    pub occurrences_last_90_days: u32,
    pub typical_resolution: Option<String>,
    pub typical_time_to_resolution_hours: Option<f64>,
}

/// One emitted anomaly finding with full context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub entity: EntityRef,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    /// 0-100
    pub confidence: f64,
    /// 0-100
    pub false_positive_probability: f64,
    /// 0-100, drives output ordering
    pub urgency: f64,
    pub anomaly: AnomalyData,
    pub possible_causes: Vec<PossibleCause>,
    pub recommendations: Vec<Recommendation>,
    pub impact: ImpactAssessment,
    pub historical_comparison: HistoricalComparison,
    /// Ids of related alerts from the same run
    pub related_alerts: Vec<String>,
    pub status: AlertStatus,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Key used to collapse duplicate findings within one run
    pub fn dedup_key(&self) -> (MetricScope, String) {
        (self.anomaly.scope.clone(), self.entity.key())
    }

    /// Move the alert through its lifecycle, rejecting illegal transitions
    pub fn set_status(&mut self, to: AlertStatus) -> Result<(), DetectionError> {
        self.status = self.status.transition(to)?;
        if to == AlertStatus::New {
            self.resolution_note = None;
        }
        Ok(())
    }
}

/// The five detector families
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Statistical,
    Trend,
    Pattern,
    Multivariate,
    Cluster,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 5] = [
        DetectorKind::Statistical,
        DetectorKind::Trend,
        DetectorKind::Pattern,
        DetectorKind::Multivariate,
        DetectorKind::Cluster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Statistical => "statistical",
            DetectorKind::Trend => "trend",
            DetectorKind::Pattern => "pattern",
            DetectorKind::Multivariate => "multivariate",
            DetectorKind::Cluster => "cluster",
        }
    }
}

/// Raw detector output, before alert expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub detector: DetectorKind,
    pub alert_type: AlertType,
    pub scope: MetricScope,
    pub category: MetricCategory,
    /// Importance weight of the metric or group, 0-1
    pub metric_weight: f64,
    pub current: f64,
    pub expected: f64,
    pub deviation: f64,
    /// Deviation strength in standard-deviation units
    pub z: f64,
    /// Detector reliability scaling for confidence (R-squared for trends)
    pub reliability: f64,
    /// Detector-imposed minimum severity, applied after the z-based tier
    pub severity_floor: Option<AlertSeverity>,
    pub summary: String,
}

/// One cluster center, coordinates aligned to the owning set's metric order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCenter {
    pub label: String,
    pub coordinates: Vec<f64>,
}

/// Externally supplied, versioned cluster-center artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCenterSet {
    pub version: String,
    pub metrics: Vec<MetricName>,
    pub centers: Vec<ClusterCenter>,
}

/// Result of assigning a snapshot to its nearest cluster center
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub center_label: String,
    pub distance: f64,
}

/// Everything a detector sees for one entity and window
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub entity: EntityRef,
    /// Ordered by recorded_at, oldest first
    pub history: Vec<MetricSample>,
    pub current: MetricSample,
    pub context: DetectionContext,
    pub cluster_centers: Option<ClusterCenterSet>,
}

impl EntitySnapshot {
    /// Historical values for one metric, in date order.
    /// Samples without the metric are skipped.
    pub fn series(&self, name: MetricName) -> Vec<f64> {
        self.history.iter().filter_map(|s| s.value(name)).collect()
    }

    pub fn current_value(&self, name: MetricName) -> Option<f64> {
        self.current.value(name)
    }
}

/// How a detector finished when it produced no usable result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    /// Not enough data or no applicable input; expected condition
    Skipped,
    /// The detector errored; other detectors were unaffected
    Failed,
}

/// Non-fatal per-detector diagnostic surfaced on the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorDiagnostic {
    pub detector: DetectorKind,
    pub outcome: DiagnosticOutcome,
    pub detail: String,
}

/// Output of one detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub entity: EntityRef,
    /// Ordered by urgency desc, confidence desc
    pub alerts: Vec<Alert>,
    pub diagnostics: Vec<DetectorDiagnostic>,
    pub generated_at: DateTime<Utc>,
}

/// Per-entity outcome of a batch run; one entity failing never
/// fails the batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub entity: EntityRef,
    pub report: Option<DetectionReport>,
    pub error: Option<String>,
}

/// Stored alert summary used for suppression lookbacks and rollups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Rollup timeframe for alert analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Week,
    Month,
    Quarter,
    Season,
}

impl Timeframe {
    pub fn to_days(&self) -> i64 {
        match self {
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Quarter => 90,
            Timeframe::Season => 270,
        }
    }
}
