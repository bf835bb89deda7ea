//! Quantified impact projections per severity tier and metric category.

use detection_core::{AlertSeverity, ImpactAssessment, ImpactEstimate, MetricCategory};

/// Base immediate-horizon numbers per severity tier
fn immediate_base(severity: AlertSeverity) -> ImpactEstimate {
    match severity {
        AlertSeverity::Low => ImpactEstimate {
            performance_delta_pct: -1.0,
            injury_risk_delta_pct: 1.0,
            availability_pct: 100.0,
            estimated_cost: 0.0,
        },
        AlertSeverity::Medium => ImpactEstimate {
            performance_delta_pct: -3.0,
            injury_risk_delta_pct: 4.0,
            availability_pct: 95.0,
            estimated_cost: 500.0,
        },
        AlertSeverity::High => ImpactEstimate {
            performance_delta_pct: -6.0,
            injury_risk_delta_pct: 8.0,
            availability_pct: 85.0,
            estimated_cost: 2000.0,
        },
        AlertSeverity::Critical => ImpactEstimate {
            performance_delta_pct: -10.0,
            injury_risk_delta_pct: 15.0,
            availability_pct: 70.0,
            estimated_cost: 8000.0,
        },
    }
}

/// Risk amplification for injury-adjacent findings
fn category_factor(category: MetricCategory) -> f64 {
    match category {
        MetricCategory::Injury => 1.25,
        MetricCategory::Load => 1.1,
        _ => 1.0,
    }
}

/// Project impact across the three horizons.
///
/// Short term assumes the deviation persists unaddressed for a week;
/// long term assumes intervention, tapering back toward baseline except
/// for injury findings where unresolved risk compounds.
pub fn assess(severity: AlertSeverity, category: MetricCategory) -> ImpactAssessment {
    let factor = category_factor(category);
    let immediate = immediate_base(severity);

    let short_term = ImpactEstimate {
        performance_delta_pct: immediate.performance_delta_pct * 1.5,
        injury_risk_delta_pct: immediate.injury_risk_delta_pct * 1.5 * factor,
        availability_pct: (immediate.availability_pct - 5.0).max(0.0),
        estimated_cost: immediate.estimated_cost * 2.0,
    };

    let long_risk = if category == MetricCategory::Injury {
        immediate.injury_risk_delta_pct * 2.0
    } else {
        immediate.injury_risk_delta_pct * 0.5
    };
    let long_term = ImpactEstimate {
        performance_delta_pct: immediate.performance_delta_pct * 0.5,
        injury_risk_delta_pct: long_risk * factor,
        availability_pct: (immediate.availability_pct + 10.0).min(100.0),
        estimated_cost: immediate.estimated_cost * 1.5,
    };

    ImpactAssessment {
        immediate: ImpactEstimate {
            injury_risk_delta_pct: immediate.injury_risk_delta_pct * factor,
            ..immediate
        },
        short_term,
        long_term,
    }
}
