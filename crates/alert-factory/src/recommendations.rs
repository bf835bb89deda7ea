//! Recommendation generation: one action per matched cause plus
//! severity-driven escalations, ordered by priority.

use detection_core::{
    AlertSeverity, CauseCategory, MetricCategory, PossibleCause, RawFinding, Recommendation,
    RecommendationPriority,
};

fn priority_for(severity: AlertSeverity, base: RecommendationPriority) -> RecommendationPriority {
    // Severe alerts promote their actions one step
    match (severity, base) {
        (AlertSeverity::Critical, _) => RecommendationPriority::Urgent,
        (AlertSeverity::High, RecommendationPriority::Medium) => RecommendationPriority::High,
        (AlertSeverity::High, RecommendationPriority::Low) => RecommendationPriority::Medium,
        (_, base) => base,
    }
}

/// Actions for an alert, sorted by priority weight descending.
/// Duplicate actions from overlapping causes collapse to the
/// highest-priority instance.
pub fn build_recommendations(
    finding: &RawFinding,
    severity: AlertSeverity,
    causes: &[PossibleCause],
) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = Vec::new();

    for cause in causes {
        let (action, base) = match cause.category {
            CauseCategory::Training => (
                "Reduce training load for the next microcycle and re-test",
                RecommendationPriority::High,
            ),
            CauseCategory::Recovery => (
                "Prioritize sleep and schedule an extra recovery day",
                RecommendationPriority::Medium,
            ),
            CauseCategory::Environmental => (
                "Adjust travel and acclimatization protocols before the next session",
                RecommendationPriority::Medium,
            ),
        };
        recs.push(Recommendation {
            action: action.to_string(),
            priority: priority_for(severity, base),
        });
    }

    if finding.category == MetricCategory::Injury && severity >= AlertSeverity::High {
        recs.push(Recommendation {
            action: "Screen with medical staff before the next full-intensity session".to_string(),
            priority: RecommendationPriority::Urgent,
        });
    }
    if severity == AlertSeverity::Critical {
        recs.push(Recommendation {
            action: "Hold the athlete from the next session pending review".to_string(),
            priority: RecommendationPriority::Urgent,
        });
    }
    recs.push(Recommendation {
        action: format!(
            "Re-measure {} within 48 hours to confirm the deviation",
            finding.scope.label()
        ),
        priority: priority_for(severity, RecommendationPriority::Low),
    });

    // Highest priority first; collapse duplicate actions keeping the
    // stronger priority
    recs.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));
    let mut seen = std::collections::BTreeSet::new();
    recs.retain(|r| seen.insert(r.action.clone()));
    recs
}
