use detection_core::{
    AlertSeverity, AlertType, AnomalyDetector, ClusterAssignment, ClusterCenterSet, ClusterModel,
    DetectionConfig, DetectionError, DetectorKind, EntitySnapshot, MetricScope, RawFinding,
};
use nalgebra::DVector;
use std::sync::Arc;
use tracing::debug;

/// Dedup scope for cluster findings; one per entity per run
const CLUSTER_SCOPE: &str = "cluster_profile";

/// Straight nearest-center assignment by Euclidean distance
pub struct NearestCenterModel;

impl ClusterModel for NearestCenterModel {
    fn assign(&self, point: &[f64], centers: &ClusterCenterSet) -> Option<ClusterAssignment> {
        if point.len() != centers.metrics.len() {
            return None;
        }
        let p = DVector::from_column_slice(point);

        centers
            .centers
            .iter()
            .filter(|c| c.coordinates.len() == point.len())
            .map(|c| {
                let center = DVector::from_column_slice(&c.coordinates);
                ClusterAssignment {
                    center_label: c.label.clone(),
                    distance: (&p - center).norm(),
                }
            })
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Flags snapshots that sit too far from every known cluster center.
///
/// Centers are an externally computed, versioned artifact; without one the
/// detector is skipped. Distances beyond twice the configured threshold
/// floor severity at High.
pub struct ClusterDistanceDetector {
    model: Arc<dyn ClusterModel>,
}

impl ClusterDistanceDetector {
    pub fn new(model: Arc<dyn ClusterModel>) -> Self {
        Self { model }
    }
}

impl Default for ClusterDistanceDetector {
    fn default() -> Self {
        Self::new(Arc::new(NearestCenterModel))
    }
}

impl AnomalyDetector for ClusterDistanceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Cluster
    }

    fn detect(
        &self,
        snapshot: &EntitySnapshot,
        config: &DetectionConfig,
    ) -> Result<Vec<RawFinding>, DetectionError> {
        let Some(centers) = snapshot.cluster_centers.as_ref() else {
            return Err(DetectionError::InsufficientData(
                "no cluster centers supplied".to_string(),
            ));
        };
        if centers.centers.is_empty() {
            return Err(DetectionError::InsufficientData(format!(
                "cluster center set {} is empty",
                centers.version
            )));
        }

        let mut point = Vec::with_capacity(centers.metrics.len());
        for &name in &centers.metrics {
            match snapshot.current_value(name) {
                Some(v) => point.push(v),
                None => {
                    return Err(DetectionError::InsufficientData(format!(
                        "current snapshot missing {} required by center set {}",
                        name.as_str(),
                        centers.version
                    )));
                }
            }
        }

        let Some(assignment) = self.model.assign(&point, centers) else {
            return Err(DetectionError::CalculationError(format!(
                "cluster model produced no assignment against center set {}",
                centers.version
            )));
        };

        let threshold = config.cluster_distance_threshold;
        debug!(
            center = %assignment.center_label,
            distance = assignment.distance,
            threshold,
            "cluster assignment"
        );
        if assignment.distance <= threshold {
            return Ok(Vec::new());
        }

        let severity_floor = if assignment.distance > 2.0 * threshold {
            Some(AlertSeverity::High)
        } else {
            None
        };

        // Distance at the threshold maps to the medium-severity boundary
        let z = 2.0 * assignment.distance / threshold;
        let category = centers.metrics[0].category();
        Ok(vec![RawFinding {
            detector: DetectorKind::Cluster,
            alert_type: AlertType::ClusterAnomaly,
            scope: MetricScope::Group(CLUSTER_SCOPE.to_string()),
            category,
            metric_weight: 1.0,
            current: assignment.distance,
            expected: threshold,
            deviation: assignment.distance - threshold,
            z,
            reliability: 1.0,
            severity_floor,
            summary: format!(
                "snapshot sits {:.2} from nearest profile {} (threshold {:.2}, centers {})",
                assignment.distance, assignment.center_label, threshold, centers.version
            ),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use detection_core::{
        ClusterCenter, DetectionContext, EntityRef, EntityType, MetricName, MetricSample,
    };

    fn centers() -> ClusterCenterSet {
        ClusterCenterSet {
            version: "2026-07".to_string(),
            metrics: vec![
                MetricName::PerformanceScore,
                MetricName::Fatigue,
                MetricName::SleepQuality,
            ],
            centers: vec![
                ClusterCenter {
                    label: "fresh".to_string(),
                    coordinates: vec![85.0, 30.0, 80.0],
                },
                ClusterCenter {
                    label: "loaded".to_string(),
                    coordinates: vec![70.0, 60.0, 65.0],
                },
            ],
        }
    }

    fn snapshot_at(perf: f64, fatigue: f64, sleep: f64) -> EntitySnapshot {
        EntitySnapshot {
            entity: EntityRef::new(EntityType::Player, "p1"),
            history: Vec::new(),
            current: MetricSample::new(Utc::now())
                .with_value(MetricName::PerformanceScore, perf)
                .with_value(MetricName::Fatigue, fatigue)
                .with_value(MetricName::SleepQuality, sleep),
            context: DetectionContext::default(),
            cluster_centers: Some(centers()),
        }
    }

    #[test]
    fn test_nearest_center_assignment() {
        let model = NearestCenterModel;
        let assignment = model.assign(&[84.0, 31.0, 79.0], &centers()).unwrap();
        assert_eq!(assignment.center_label, "fresh");
        assert!(assignment.distance < 2.0);
    }

    #[test]
    fn test_dimension_mismatch_yields_none() {
        let model = NearestCenterModel;
        assert!(model.assign(&[1.0, 2.0], &centers()).is_none());
    }

    #[test]
    fn test_point_near_center_is_quiet() {
        let config = DetectionConfig::standard();
        let snapshot = snapshot_at(84.0, 31.0, 79.0);

        let findings = ClusterDistanceDetector::default()
            .detect(&snapshot, &config)
            .unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_distant_point_fires() {
        let config = DetectionConfig::standard();
        // ~4.3 from "fresh", further from "loaded"; threshold is 3.0
        let snapshot = snapshot_at(88.0, 28.0, 82.0);

        let findings = ClusterDistanceDetector::default()
            .detect(&snapshot, &config)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].alert_type, AlertType::ClusterAnomaly);
        assert!(findings[0].severity_floor.is_none());
    }

    #[test]
    fn test_far_point_floors_severity() {
        let config = DetectionConfig::standard();
        // Far from both centers: distance > 2x threshold
        let snapshot = snapshot_at(40.0, 95.0, 20.0);

        let findings = ClusterDistanceDetector::default()
            .detect(&snapshot, &config)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity_floor, Some(AlertSeverity::High));
        assert!(findings[0].z > 4.0);
    }

    #[test]
    fn test_missing_centers_skips_detector() {
        let config = DetectionConfig::standard();
        let mut snapshot = snapshot_at(84.0, 31.0, 79.0);
        snapshot.cluster_centers = None;

        let result = ClusterDistanceDetector::default().detect(&snapshot, &config);
        assert!(matches!(result, Err(DetectionError::InsufficientData(_))));
    }
}
