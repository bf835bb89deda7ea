use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use detection_core::{AlertSeverity, AlertType, Timeframe};

/// Read-only rollup over stored alerts for one timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyTrend {
    pub timeframe: Timeframe,
    pub total_alerts: u32,
    pub by_severity: BTreeMap<AlertSeverity, u32>,
    pub by_type: BTreeMap<AlertType, u32>,
    /// Fraction of alerts resolved, 0-1
    pub resolution_rate: f64,
    /// Fraction of alerts closed as false positives, 0-1
    pub false_positive_rate: f64,
    pub avg_time_to_resolution_hours: Option<f64>,
    pub alerts_per_day: f64,
}

impl AnomalyTrend {
    pub fn empty(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            total_alerts: 0,
            by_severity: BTreeMap::new(),
            by_type: BTreeMap::new(),
            resolution_rate: 0.0,
            false_positive_rate: 0.0,
            avg_time_to_resolution_hours: None,
            alerts_per_day: 0.0,
        }
    }
}
