//! Rule-based insight ranking over a feature vector.
//!
//! Each rule looks at one observed feature and, when its predicate holds,
//! contributes a message weighted by the feature's magnitude. Matches are
//! ranked by descending absolute magnitude; equal magnitudes keep rule order.

use crate::core::features::FeatureVector;
use std::cmp::Ordering;

/// Message returned when no rule matches.
pub const NO_TRIGGERS_MESSAGE: &str = "No acute triggers detected; continue monitoring baseline.";

/// One insight rule.
#[derive(Debug, Clone, Copy)]
pub struct InsightRule {
    /// Feature the rule reads
    pub feature: &'static str,
    /// Value assumed when the feature was not observed
    pub default: f64,
    pub predicate: fn(f64) -> bool,
    pub message: &'static str,
}

impl InsightRule {
    /// Triggering magnitude if the rule matches `vector`.
    pub fn evaluate(&self, vector: &FeatureVector) -> Option<f64> {
        let value = vector.observed(self.feature).unwrap_or(self.default);
        (self.predicate)(value).then_some(value)
    }
}

/// Insight rules in evaluation order.
pub const INSIGHT_RULES: [InsightRule; 5] = [
    InsightRule {
        feature: "screen_time_minutes_sum_120m",
        default: 0.0,
        predicate: |v| v > 90.0,
        message: "Screen time spike",
    },
    InsightRule {
        feature: "barometric_pressure_hpa_mean_180m",
        default: 1013.0,
        predicate: |v| v < 1005.0,
        message: "Low pressure system detected",
    },
    InsightRule {
        feature: "sleep_debt_hours_max_360m",
        default: 0.0,
        predicate: |v| v > 2.5,
        message: "Elevated sleep debt",
    },
    InsightRule {
        feature: "ambient_noise_db_mean_30m",
        default: 0.0,
        predicate: |v| v > 65.0,
        message: "High ambient noise",
    },
    InsightRule {
        feature: "uv_index",
        default: 0.0,
        predicate: |v| v > 8.0,
        message: "Extreme UV exposure",
    },
];

/// Rank matching insights for `vector`, keeping at most `max_insights`.
pub fn rank_insights(vector: &FeatureVector, max_insights: usize) -> Vec<String> {
    rank_with_rules(&INSIGHT_RULES, vector, max_insights)
}

fn rank_with_rules(
    rules: &[InsightRule],
    vector: &FeatureVector,
    max_insights: usize,
) -> Vec<String> {
    let mut matched: Vec<(&'static str, f64)> = rules
        .iter()
        .filter_map(|rule| rule.evaluate(vector).map(|m| (rule.message, m)))
        .collect();

    if matched.is_empty() {
        return vec![NO_TRIGGERS_MESSAGE.to_string()];
    }

    // sort_by is stable
    matched.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(Ordering::Equal));
    matched
        .into_iter()
        .take(max_insights)
        .map(|(message, _)| message.to_string())
        .collect()
}
