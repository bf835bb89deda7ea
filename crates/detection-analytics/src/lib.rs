//! Rollups over stored alert records: volumes, resolution behavior,
//! and false-positive rates per timeframe.

use detection_core::{AlertRecord, AlertStatus, Timeframe};

pub mod models;

pub use models::AnomalyTrend;

/// Aggregate stored records into an `AnomalyTrend` for the timeframe
pub fn rollup(timeframe: Timeframe, records: &[AlertRecord]) -> AnomalyTrend {
    if records.is_empty() {
        return AnomalyTrend::empty(timeframe);
    }

    let mut trend = AnomalyTrend::empty(timeframe);
    trend.total_alerts = records.len() as u32;

    let mut resolved = 0u32;
    let mut false_positives = 0u32;
    let mut resolution_hours = Vec::new();

    for record in records {
        *trend.by_severity.entry(record.severity).or_insert(0) += 1;
        *trend.by_type.entry(record.alert_type).or_insert(0) += 1;

        match record.status {
            AlertStatus::Resolved => resolved += 1,
            AlertStatus::FalsePositive => false_positives += 1,
            _ => {}
        }

        if let Some(resolved_at) = record.resolved_at {
            let hours = (resolved_at - record.created_at).num_minutes() as f64 / 60.0;
            if hours >= 0.0 {
                resolution_hours.push(hours);
            }
        }
    }

    let total = records.len() as f64;
    trend.resolution_rate = resolved as f64 / total;
    trend.false_positive_rate = false_positives as f64 / total;
    trend.avg_time_to_resolution_hours = if resolution_hours.is_empty() {
        None
    } else {
        Some(resolution_hours.iter().sum::<f64>() / resolution_hours.len() as f64)
    };
    trend.alerts_per_day = total / timeframe.to_days() as f64;

    trend
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use detection_core::{AlertSeverity, AlertType};

    fn record(
        status: AlertStatus,
        severity: AlertSeverity,
        resolution_hours: Option<i64>,
    ) -> AlertRecord {
        let created_at = Utc::now() - Duration::days(3);
        AlertRecord {
            alert_type: AlertType::StatisticalOutlier,
            severity,
            status,
            created_at,
            resolved_at: resolution_hours.map(|h| created_at + Duration::hours(h)),
        }
    }

    #[test]
    fn test_empty_store_yields_zeroed_rollup() {
        let trend = rollup(Timeframe::Month, &[]);
        assert_eq!(trend.total_alerts, 0);
        assert_eq!(trend.resolution_rate, 0.0);
        assert_eq!(trend.false_positive_rate, 0.0);
        assert!(trend.avg_time_to_resolution_hours.is_none());
    }

    #[test]
    fn test_rates_and_latency() {
        let records = vec![
            record(AlertStatus::Resolved, AlertSeverity::High, Some(24)),
            record(AlertStatus::Resolved, AlertSeverity::Medium, Some(48)),
            record(AlertStatus::FalsePositive, AlertSeverity::Low, Some(12)),
            record(AlertStatus::New, AlertSeverity::Critical, None),
        ];
        let trend = rollup(Timeframe::Week, &records);

        assert_eq!(trend.total_alerts, 4);
        assert!((trend.resolution_rate - 0.5).abs() < 1e-9);
        assert!((trend.false_positive_rate - 0.25).abs() < 1e-9);
        assert!((trend.avg_time_to_resolution_hours.unwrap() - 28.0).abs() < 1e-9);
        assert!((trend.alerts_per_day - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_counts_by_severity_and_type() {
        let records = vec![
            record(AlertStatus::New, AlertSeverity::High, None),
            record(AlertStatus::New, AlertSeverity::High, None),
            record(AlertStatus::New, AlertSeverity::Low, None),
        ];
        let trend = rollup(Timeframe::Month, &records);
        assert_eq!(trend.by_severity[&AlertSeverity::High], 2);
        assert_eq!(trend.by_severity[&AlertSeverity::Low], 1);
        assert_eq!(trend.by_type[&AlertType::StatisticalOutlier], 3);
    }
}
