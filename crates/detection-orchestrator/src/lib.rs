//! The detection engine: fetches snapshot data from collaborators, runs
//! the detector set in stable registration order, and feeds findings
//! through the alert factory and pipeline.
//!
//! One engine instance is safe to share across concurrent callers; the
//! only state beyond the immutable config is a pair of TTL caches.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use alert_factory::AlertFactory;
use alert_pipeline::AlertPipeline;
use detection_analytics::AnomalyTrend;
use detection_core::{
    AnomalyDetector, ClusterCenterProvider, ClusterCenterSet, ContextProvider, CurrentDataProvider,
    DetectionConfig, DetectionContext, DetectionError, DetectionReport, DetectorDiagnostic,
    DiagnosticOutcome, EntityOutcome, EntityRef, EntitySnapshot, HistoricalAlertStore,
    HistoricalDataProvider, MetricSample, Timeframe,
};
use multivariate_detection::{ClusterDistanceDetector, GroupDistanceDetector};
use pattern_detection::PatternDeviationDetector;
use statistical_detection::StatisticalOutlierDetector;
use trend_detection::TrendBreakDetector;

const CACHE_TTL_SECS: i64 = 300; // 5 minutes

const CENTERS_CACHE_KEY: &str = "centers";

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn fresh(&self) -> bool {
        (Utc::now() - self.cached_at).num_seconds() < CACHE_TTL_SECS
    }
}

pub struct DetectionEngine {
    config: DetectionConfig,
    historical_data: Arc<dyn HistoricalDataProvider>,
    current_data: Arc<dyn CurrentDataProvider>,
    context_provider: Arc<dyn ContextProvider>,
    alert_store: Arc<dyn HistoricalAlertStore>,
    center_provider: Option<Arc<dyn ClusterCenterProvider>>,
    /// Registration order fixes the finding merge order
    detectors: Vec<Box<dyn AnomalyDetector>>,
    factory: AlertFactory,
    pipeline: AlertPipeline,
    /// Cache history per (entity, window) to spare repeat fetches
    history_cache: DashMap<String, CacheEntry<Vec<MetricSample>>>,
    /// Cache the cluster-center artifact; it changes rarely
    centers_cache: DashMap<String, CacheEntry<ClusterCenterSet>>,
}

impl DetectionEngine {
    /// Build an engine over the given collaborators with the default
    /// detector set. Rejects an invalid config before any run starts.
    pub fn new(
        config: DetectionConfig,
        historical_data: Arc<dyn HistoricalDataProvider>,
        current_data: Arc<dyn CurrentDataProvider>,
        context_provider: Arc<dyn ContextProvider>,
        alert_store: Arc<dyn HistoricalAlertStore>,
        center_provider: Option<Arc<dyn ClusterCenterProvider>>,
    ) -> Result<Self, DetectionError> {
        config.validate()?;

        let defaults: Vec<Box<dyn AnomalyDetector>> = vec![
            Box::new(StatisticalOutlierDetector::new()),
            Box::new(TrendBreakDetector::new()),
            Box::new(PatternDeviationDetector::default()),
            Box::new(GroupDistanceDetector::new()),
            Box::new(ClusterDistanceDetector::default()),
        ];
        let detectors = defaults
            .into_iter()
            .filter(|d| config.detector_enabled(d.kind()))
            .collect();

        Ok(Self {
            factory: AlertFactory::new(alert_store.clone()),
            pipeline: AlertPipeline::new(alert_store.clone()),
            config,
            historical_data,
            current_data,
            context_provider,
            alert_store,
            center_provider,
            detectors,
            history_cache: DashMap::new(),
            centers_cache: DashMap::new(),
        })
    }

    /// Replace the detector set, e.g. to inject custom pattern or
    /// cluster strategies. Order given here is the merge order.
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn AnomalyDetector>>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run all detectors for one entity and window, returning the
    /// filtered, deduplicated, prioritized alert list plus per-detector
    /// diagnostics.
    pub async fn detect(
        &self,
        entity: &EntityRef,
        window: Option<Duration>,
    ) -> Result<DetectionReport, DetectionError> {
        let window = window.unwrap_or_else(|| Duration::days(self.config.history_window_days));
        let fetch_timeout = StdDuration::from_secs(self.config.fetch_timeout_secs);
        info!(
            entity = %entity.key(),
            window_days = window.num_days(),
            "starting detection run"
        );

        let (history_result, current_result, context_result, centers) = tokio::join!(
            self.fetch_history(entity, window, fetch_timeout),
            self.fetch_current(entity, fetch_timeout),
            self.fetch_context(entity, fetch_timeout),
            self.fetch_centers(fetch_timeout),
        );

        // Without a current snapshot there is nothing to evaluate
        let current = current_result?;

        // A missing history degrades to the insufficient-data skip policy
        let history = match history_result {
            Ok(samples) => samples,
            Err(e) => {
                warn!(entity = %entity.key(), error = %e, "history unavailable, detectors will skip");
                Vec::new()
            }
        };

        let context = match context_result {
            Ok(context) => context,
            Err(e) => {
                warn!(entity = %entity.key(), error = %e, "context unavailable, using fallback");
                DetectionContext::fallback()
            }
        };

        let snapshot = EntitySnapshot {
            entity: entity.clone(),
            history,
            current,
            context,
            cluster_centers: centers,
        };

        let mut findings = Vec::new();
        let mut diagnostics = Vec::new();
        for detector in &self.detectors {
            match detector.detect(&snapshot, &self.config) {
                Ok(mut batch) => {
                    debug!(
                        detector = detector.kind().as_str(),
                        findings = batch.len(),
                        "detector finished"
                    );
                    findings.append(&mut batch);
                }
                Err(DetectionError::InsufficientData(detail)) => {
                    debug!(detector = detector.kind().as_str(), detail = %detail, "detector skipped");
                    diagnostics.push(DetectorDiagnostic {
                        detector: detector.kind(),
                        outcome: DiagnosticOutcome::Skipped,
                        detail,
                    });
                }
                Err(e) => {
                    warn!(
                        detector = detector.kind().as_str(),
                        error = %e,
                        "detector failed, continuing with the rest"
                    );
                    diagnostics.push(DetectorDiagnostic {
                        detector: detector.kind(),
                        outcome: DiagnosticOutcome::Failed,
                        detail: e.to_string(),
                    });
                }
            }
        }

        let mut alerts = Vec::with_capacity(findings.len());
        for finding in &findings {
            alerts.push(
                self.factory
                    .build(finding, entity, &snapshot.context, &self.config)
                    .await,
            );
        }

        let alerts = self
            .pipeline
            .process(alerts, &self.config, &snapshot.context)
            .await;

        info!(
            entity = %entity.key(),
            alerts = alerts.len(),
            skipped = diagnostics.len(),
            "detection run complete"
        );

        Ok(DetectionReport {
            entity: entity.clone(),
            alerts,
            diagnostics,
            generated_at: Utc::now(),
        })
    }

    /// Detect across many entities concurrently. One entity's failure
    /// yields an error record for it and leaves the rest untouched.
    pub async fn detect_batch(
        &self,
        entities: &[EntityRef],
        window: Option<Duration>,
    ) -> Vec<EntityOutcome> {
        let runs = entities.iter().map(|entity| async move {
            match self.detect(entity, window).await {
                Ok(report) => EntityOutcome {
                    entity: entity.clone(),
                    report: Some(report),
                    error: None,
                },
                Err(e) => {
                    warn!(entity = %entity.key(), error = %e, "entity failed in batch");
                    EntityOutcome {
                        entity: entity.clone(),
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        });
        join_all(runs).await
    }

    /// Read-only rollup over stored alerts for a timeframe
    pub async fn trends(&self, timeframe: Timeframe) -> Result<AnomalyTrend, DetectionError> {
        let records = self.alert_store.alerts_within(timeframe).await?;
        Ok(detection_analytics::rollup(timeframe, &records))
    }

    /// Get history for an entity and window (cached, 5-min TTL)
    async fn fetch_history(
        &self,
        entity: &EntityRef,
        window: Duration,
        fetch_timeout: StdDuration,
    ) -> Result<Vec<MetricSample>, DetectionError> {
        let cache_key = format!("{}:{}", entity.key(), window.num_days());
        if let Some(entry) = self.history_cache.get(&cache_key) {
            if entry.fresh() {
                return Ok(entry.data.clone());
            }
        }

        match timeout(fetch_timeout, self.historical_data.history(entity, window)).await {
            Ok(Ok(samples)) => {
                self.history_cache.insert(
                    cache_key,
                    CacheEntry {
                        data: samples.clone(),
                        cached_at: Utc::now(),
                    },
                );
                Ok(samples)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DetectionError::DataSourceUnavailable(format!(
                "historical fetch for {} timed out after {:?}",
                entity.key(),
                fetch_timeout
            ))),
        }
    }

    async fn fetch_current(
        &self,
        entity: &EntityRef,
        fetch_timeout: StdDuration,
    ) -> Result<MetricSample, DetectionError> {
        match timeout(fetch_timeout, self.current_data.latest(entity)).await {
            Ok(result) => result,
            Err(_) => Err(DetectionError::DataSourceUnavailable(format!(
                "current fetch for {} timed out after {:?}",
                entity.key(),
                fetch_timeout
            ))),
        }
    }

    async fn fetch_context(
        &self,
        entity: &EntityRef,
        fetch_timeout: StdDuration,
    ) -> Result<DetectionContext, DetectionError> {
        match timeout(fetch_timeout, self.context_provider.build(entity)).await {
            Ok(result) => result,
            Err(_) => Err(DetectionError::MalformedContext(format!(
                "context build for {} timed out after {:?}",
                entity.key(),
                fetch_timeout
            ))),
        }
    }

    /// Cluster centers are optional; any failure just means the cluster
    /// detector skips this run
    async fn fetch_centers(&self, fetch_timeout: StdDuration) -> Option<ClusterCenterSet> {
        let provider = self.center_provider.as_ref()?;
        if let Some(entry) = self.centers_cache.get(CENTERS_CACHE_KEY) {
            if entry.fresh() {
                return Some(entry.data.clone());
            }
        }

        match timeout(fetch_timeout, provider.current()).await {
            Ok(Ok(centers)) => {
                self.centers_cache.insert(
                    CENTERS_CACHE_KEY.to_string(),
                    CacheEntry {
                        data: centers.clone(),
                        cached_at: Utc::now(),
                    },
                );
                Some(centers)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "cluster centers unavailable");
                None
            }
            Err(_) => {
                warn!("cluster center fetch timed out");
                None
            }
        }
    }
}
