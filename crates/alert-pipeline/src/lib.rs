//! Reconciles the raw alert set into the final ordered output:
//! filter, deduplicate, prioritize, enrich, bound.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use detection_core::{
    Alert, DetectionConfig, DetectionContext, HistoricalAlertStore, MetricScope, SeasonPhase,
};
use tracing::{debug, warn};

/// Urgency multiplier applied when the season phase is high stakes
const HIGH_STAKES_URGENCY_FACTOR: f64 = 1.2;

pub struct AlertPipeline {
    alert_store: Arc<dyn HistoricalAlertStore>,
}

impl AlertPipeline {
    pub fn new(alert_store: Arc<dyn HistoricalAlertStore>) -> Self {
        Self { alert_store }
    }

    /// Run the full pipeline over one run's alerts.
    ///
    /// The output order is total: urgency desc, confidence desc, id asc,
    /// so identical inputs always produce the identical list.
    pub async fn process(
        &self,
        alerts: Vec<Alert>,
        config: &DetectionConfig,
        context: &DetectionContext,
    ) -> Vec<Alert> {
        let thresholds = &config.alert_thresholds;

        // 1. Filter: confidence, false-positive, suppression
        let mut kept = Vec::with_capacity(alerts.len());
        for alert in alerts {
            if alert.confidence < thresholds.min_confidence {
                debug!(id = %alert.id, confidence = alert.confidence, "dropped: low confidence");
                continue;
            }
            if alert.false_positive_probability > thresholds.max_false_positive {
                debug!(
                    id = %alert.id,
                    fpp = alert.false_positive_probability,
                    "dropped: false-positive probability too high"
                );
                continue;
            }
            if self.suppressed(&alert, config).await {
                continue;
            }
            kept.push(alert);
        }

        // 2. Deduplicate: one alert per (scope, entity) key
        let mut by_key: BTreeMap<(MetricScope, String), Alert> = BTreeMap::new();
        for alert in kept {
            let key = alert.dedup_key();
            match by_key.get(&key) {
                Some(existing) if !outranks(&alert, existing) => {
                    debug!(id = %alert.id, "dropped: duplicate of stronger alert");
                }
                _ => {
                    by_key.insert(key, alert);
                }
            }
        }
        let mut alerts: Vec<Alert> = by_key.into_values().collect();

        // 3. Context adjustment, ahead of the sort so ordering reflects it
        if context.season_phase == SeasonPhase::HighStakes {
            for alert in &mut alerts {
                alert.urgency = (alert.urgency * HIGH_STAKES_URGENCY_FACTOR).min(100.0);
            }
        }

        // 4. Prioritize
        alerts.sort_by(|a, b| {
            b.urgency
                .partial_cmp(&a.urgency)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.id.cmp(&b.id))
        });

        // 5. Enrich: cross-link alerts for the same entity
        let index: Vec<(String, String, MetricScope)> = alerts
            .iter()
            .map(|a| (a.id.clone(), a.entity.key(), a.anomaly.scope.clone()))
            .collect();
        for alert in &mut alerts {
            alert.related_alerts = index
                .iter()
                .filter(|(id, entity_key, scope)| {
                    *entity_key == alert.entity.key()
                        && *scope != alert.anomaly.scope
                        && *id != alert.id
                })
                .map(|(id, _, _)| id.clone())
                .collect();
        }

        // 6. Bound
        if alerts.len() > thresholds.max_alerts {
            debug!(
                dropped = alerts.len() - thresholds.max_alerts,
                "truncating alert list to configured cap"
            );
            alerts.truncate(thresholds.max_alerts);
        }

        alerts
    }

    /// An alert is suppressed when any matching rule finds a stored alert
    /// for the same entity and scope inside its lookback window. A store
    /// failure skips the rule rather than suppressing or failing the run.
    async fn suppressed(&self, alert: &Alert, config: &DetectionConfig) -> bool {
        for rule in &config.suppression_rules {
            if !rule.applies_to(&alert.anomaly.scope, alert.alert_type) {
                continue;
            }
            let since = Utc::now() - Duration::hours(rule.lookback_hours);
            match self
                .alert_store
                .recent_alert_count(&alert.entity, &alert.anomaly.scope, since)
                .await
            {
                Ok(count) if count > 0 => {
                    debug!(
                        id = %alert.id,
                        count,
                        lookback_hours = rule.lookback_hours,
                        "dropped: suppressed by recent similar alert"
                    );
                    return true;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(id = %alert.id, error = %e, "suppression lookback unavailable, rule skipped");
                }
            }
        }
        false
    }
}

/// Dedup tie-break: higher urgency wins, then higher confidence,
/// then the lexically smaller id for determinism
fn outranks(candidate: &Alert, incumbent: &Alert) -> bool {
    if candidate.urgency != incumbent.urgency {
        return candidate.urgency > incumbent.urgency;
    }
    if candidate.confidence != incumbent.confidence {
        return candidate.confidence > incumbent.confidence;
    }
    candidate.id < incumbent.id
}
