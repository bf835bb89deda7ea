//! Cause-matching rules: metric category and deviation direction select
//! candidate explanations; context sharpens their probabilities.

use detection_core::{
    CauseCategory, DetectionContext, MetricCategory, PossibleCause, RawFinding,
};

fn cause(description: &str, category: CauseCategory, probability: f64) -> PossibleCause {
    PossibleCause {
        description: description.to_string(),
        category,
        probability,
    }
}

/// Candidate causes for a finding, sorted by probability descending
pub fn match_causes(finding: &RawFinding, context: &DetectionContext) -> Vec<PossibleCause> {
    let rising = finding.deviation >= 0.0;
    let mut causes = Vec::new();

    match finding.category {
        MetricCategory::Load => {
            if rising {
                let mut schedule_p = 0.45;
                if context.workload.matches_last_14_days >= 4 {
                    schedule_p = 0.6;
                }
                causes.push(cause(
                    "Sudden increase in training volume",
                    CauseCategory::Training,
                    0.6,
                ));
                causes.push(cause(
                    "Congested match schedule",
                    CauseCategory::Training,
                    schedule_p,
                ));
            } else {
                causes.push(cause(
                    "Deload week or reduced session availability",
                    CauseCategory::Training,
                    0.5,
                ));
            }
        }
        MetricCategory::Recovery => {
            causes.push(cause(
                "Accumulated sleep deficit",
                CauseCategory::Recovery,
                0.6,
            ));
            causes.push(cause(
                "Incomplete recovery between sessions",
                CauseCategory::Recovery,
                0.55,
            ));
        }
        MetricCategory::Wellness => {
            causes.push(cause(
                "Elevated off-field stress",
                CauseCategory::Recovery,
                0.5,
            ));
            causes.push(cause(
                "Monotony of the current training block",
                CauseCategory::Training,
                0.35,
            ));
        }
        MetricCategory::Injury => {
            causes.push(cause(
                "Accumulated tissue fatigue from repeated high loads",
                CauseCategory::Training,
                0.55,
            ));
            causes.push(cause(
                "Insufficient recovery window after recent matches",
                CauseCategory::Recovery,
                0.5,
            ));
        }
        MetricCategory::Performance => {
            if rising {
                causes.push(cause(
                    "Positive adaptation to the current block",
                    CauseCategory::Training,
                    0.45,
                ));
            } else {
                causes.push(cause(
                    "Fatigue carry-over from recent load",
                    CauseCategory::Training,
                    0.5,
                ));
                causes.push(cause(
                    "Reduced readiness or motivation",
                    CauseCategory::Recovery,
                    0.35,
                ));
            }
        }
    }

    let env = &context.environment;
    if env.travel_hours_last_week > 8.0 {
        causes.push(cause(
            "Long-haul travel disrupting circadian rhythm",
            CauseCategory::Environmental,
            0.5,
        ));
    }
    if env.ambient_temperature_c.map(|t| t > 28.0).unwrap_or(false) {
        causes.push(cause(
            "Heat stress during recent sessions",
            CauseCategory::Environmental,
            0.45,
        ));
    }
    if env.altitude_m.map(|a| a > 1500.0).unwrap_or(false) {
        causes.push(cause(
            "Ongoing altitude acclimatization",
            CauseCategory::Environmental,
            0.4,
        ));
    }

    if causes.is_empty() {
        causes.push(cause(
            "Atypical variation without an obvious driver",
            CauseCategory::Training,
            0.3,
        ));
    }

    causes.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    causes
}

#[cfg(test)]
mod tests {
    use super::*;
    use detection_core::{
        AlertType, DetectorKind, EnvironmentalFactors, MetricName, MetricScope, WorkloadContext,
    };

    fn finding(category: MetricCategory, deviation: f64) -> RawFinding {
        RawFinding {
            detector: DetectorKind::Statistical,
            alert_type: AlertType::StatisticalOutlier,
            scope: MetricScope::Metric(MetricName::TrainingLoad),
            category,
            metric_weight: 0.8,
            current: 0.0,
            expected: 0.0,
            deviation,
            z: 3.0,
            reliability: 1.0,
            severity_floor: None,
            summary: String::new(),
        }
    }

    #[test]
    fn test_causes_sorted_by_probability() {
        let causes = match_causes(&finding(MetricCategory::Load, 20.0), &DetectionContext::default());
        assert!(!causes.is_empty());
        for pair in causes.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[test]
    fn test_congested_schedule_boosts_probability() {
        let calm = match_causes(&finding(MetricCategory::Load, 20.0), &DetectionContext::default());
        let congested_ctx = DetectionContext {
            workload: WorkloadContext {
                matches_last_14_days: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let congested = match_causes(&finding(MetricCategory::Load, 20.0), &congested_ctx);

        let p = |cs: &[PossibleCause]| {
            cs.iter()
                .find(|c| c.description.contains("Congested"))
                .map(|c| c.probability)
                .unwrap()
        };
        assert!(p(&congested) > p(&calm));
    }

    #[test]
    fn test_environmental_causes_from_context() {
        let ctx = DetectionContext {
            environment: EnvironmentalFactors {
                travel_hours_last_week: 14.0,
                ambient_temperature_c: Some(31.0),
                altitude_m: None,
            },
            ..Default::default()
        };
        let causes = match_causes(&finding(MetricCategory::Recovery, -10.0), &ctx);
        assert!(causes
            .iter()
            .any(|c| c.category == CauseCategory::Environmental));
    }

    #[test]
    fn test_direction_changes_performance_causes() {
        let up = match_causes(&finding(MetricCategory::Performance, 5.0), &DetectionContext::default());
        let down = match_causes(&finding(MetricCategory::Performance, -5.0), &DetectionContext::default());
        assert!(up.iter().any(|c| c.description.contains("adaptation")));
        assert!(down.iter().any(|c| c.description.contains("Fatigue")));
    }
}
