use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::types::{
    AlertRecord, ClusterAssignment, ClusterCenterSet, DetectionContext, DetectorKind, EntityRef,
    EntitySnapshot, HistoricalComparison, MetricSample, MetricScope, RawFinding, Timeframe,
};

/// Source of ordered historical metric snapshots
#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    /// Snapshots within the window, ordered by date ascending
    async fn history(
        &self,
        entity: &EntityRef,
        window: Duration,
    ) -> Result<Vec<MetricSample>, DetectionError>;
}

/// Source of the latest metric snapshot
#[async_trait]
pub trait CurrentDataProvider: Send + Sync {
    async fn latest(&self, entity: &EntityRef) -> Result<MetricSample, DetectionError>;
}

/// Builds the read-only detection context for an entity
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn build(&self, entity: &EntityRef) -> Result<DetectionContext, DetectionError>;
}

/// Lookup over previously emitted alerts
#[async_trait]
pub trait HistoricalAlertStore: Send + Sync {
    /// Similar past alerts for a scope and deviation magnitude
    async fn similar_alerts(
        &self,
        scope: &MetricScope,
        deviation: f64,
    ) -> Result<HistoricalComparison, DetectionError>;

    /// Stored alerts for this entity and scope since the given instant.
    /// Feeds the suppression lookback.
    async fn recent_alert_count(
        &self,
        entity: &EntityRef,
        scope: &MetricScope,
        since: DateTime<Utc>,
    ) -> Result<usize, DetectionError>;

    /// All stored alert records within the timeframe. Feeds rollups.
    async fn alerts_within(
        &self,
        timeframe: Timeframe,
    ) -> Result<Vec<AlertRecord>, DetectionError>;
}

/// Optional source of the externally computed cluster-center artifact
#[async_trait]
pub trait ClusterCenterProvider: Send + Sync {
    async fn current(&self) -> Result<ClusterCenterSet, DetectionError>;
}

/// Pluggable short-window pattern scoring strategy
pub trait PatternScorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score one window of consecutive samples
    fn score(&self, window: &[f64]) -> f64;
}

/// Pluggable cluster-assignment strategy over an external center set
pub trait ClusterModel: Send + Sync {
    /// Assign a point to its nearest center; None when the set is empty
    /// or dimensions do not line up
    fn assign(&self, point: &[f64], centers: &ClusterCenterSet) -> Option<ClusterAssignment>;
}

/// One of the five anomaly detectors.
///
/// Detectors are pure over the snapshot: same input, same findings.
/// Returning `InsufficientData` means the detector is skipped, not failed.
pub trait AnomalyDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    fn detect(
        &self,
        snapshot: &EntitySnapshot,
        config: &DetectionConfig,
    ) -> Result<Vec<RawFinding>, DetectionError>;
}
