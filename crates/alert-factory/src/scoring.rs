//! Severity, confidence, false-positive, and urgency formulas.
//!
//! Kept as free functions with fixed breakpoints so they can be retuned
//! without touching alert assembly or orchestration.

use detection_core::{AlertSeverity, MetricCategory};

/// Severity from the weighted z-score: critical > 4, high > 3, medium > 2
pub fn severity_tier(z: f64, metric_weight: f64) -> AlertSeverity {
    let weighted = z.abs() * metric_weight;
    if weighted > 4.0 {
        AlertSeverity::Critical
    } else if weighted > 3.0 {
        AlertSeverity::High
    } else if weighted > 2.0 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

/// Apply a detector-imposed floor; floors only ever raise the tier
pub fn apply_floor(tier: AlertSeverity, floor: Option<AlertSeverity>) -> AlertSeverity {
    match floor {
        Some(f) if f > tier => f,
        _ => tier,
    }
}

/// Confidence: clamp(50 + z*10, 20, 95), scaled by detector reliability
pub fn confidence(z: f64, reliability: f64) -> f64 {
    (50.0 + z.abs() * 10.0).clamp(20.0, 95.0) * reliability.clamp(0.0, 1.0)
}

/// False-positive probability, inversely related to confidence, floor 5
pub fn false_positive_probability(confidence: f64) -> f64 {
    (100.0 - confidence).clamp(5.0, 95.0)
}

/// Urgency: min(100, z*25) scaled by the category factor, capped at 100
pub fn urgency(z: f64, category: MetricCategory) -> f64 {
    ((z.abs() * 25.0).min(100.0) * category.urgency_factor()).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_breakpoints() {
        assert_eq!(severity_tier(1.9, 1.0), AlertSeverity::Low);
        assert_eq!(severity_tier(2.1, 1.0), AlertSeverity::Medium);
        assert_eq!(severity_tier(3.1, 1.0), AlertSeverity::High);
        assert_eq!(severity_tier(4.1, 1.0), AlertSeverity::Critical);
        // Weight scales the z before the breakpoints apply
        assert_eq!(severity_tier(4.1, 0.5), AlertSeverity::Medium);
    }

    #[test]
    fn test_severity_monotonic_in_z() {
        for weight in [0.3, 0.7, 1.0] {
            let mut last = AlertSeverity::Low;
            for step in 0..80 {
                let z = step as f64 * 0.1;
                let tier = severity_tier(z, weight);
                assert!(tier >= last, "severity regressed at z={z} weight={weight}");
                last = tier;
            }
        }
    }

    #[test]
    fn test_floor_only_raises() {
        assert_eq!(
            apply_floor(AlertSeverity::Low, Some(AlertSeverity::High)),
            AlertSeverity::High
        );
        assert_eq!(
            apply_floor(AlertSeverity::Critical, Some(AlertSeverity::High)),
            AlertSeverity::Critical
        );
        assert_eq!(apply_floor(AlertSeverity::Medium, None), AlertSeverity::Medium);
    }

    #[test]
    fn test_confidence_formula() {
        assert_eq!(confidence(0.0, 1.0), 50.0);
        assert_eq!(confidence(3.0, 1.0), 80.0);
        // Clamped at both ends before reliability scaling
        assert_eq!(confidence(10.0, 1.0), 95.0);
        assert_eq!(confidence(-10.0, 1.0), 95.0);
        // Trend reliability shaves confidence proportionally
        assert!((confidence(3.0, 0.8) - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_false_positive_floor() {
        assert_eq!(false_positive_probability(95.0), 5.0);
        assert_eq!(false_positive_probability(98.0), 5.0);
        assert_eq!(false_positive_probability(30.0), 70.0);
    }

    #[test]
    fn test_urgency_category_factors() {
        // Injury deviations outrank identical performance deviations
        let injury = urgency(3.0, MetricCategory::Injury);
        let load = urgency(3.0, MetricCategory::Load);
        let wellness = urgency(3.0, MetricCategory::Wellness);
        assert!(injury > load && load > wellness);
        assert_eq!(urgency(5.0, MetricCategory::Injury), 100.0);
    }

    #[test]
    fn test_all_scores_bounded() {
        for step in -100..=100 {
            let z = step as f64 * 0.1;
            for category in [
                MetricCategory::Performance,
                MetricCategory::Load,
                MetricCategory::Recovery,
                MetricCategory::Wellness,
                MetricCategory::Injury,
            ] {
                for reliability in [0.0, 0.4, 1.0] {
                    let c = confidence(z, reliability);
                    assert!((0.0..=100.0).contains(&c));
                    let f = false_positive_probability(c);
                    assert!((0.0..=100.0).contains(&f));
                    let u = urgency(z, category);
                    assert!((0.0..=100.0).contains(&u));
                }
            }
        }
    }
}
