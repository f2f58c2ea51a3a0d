//! Coaching recommendations keyed on risk level.

use crate::core::prediction::RiskLevel;

const HIGH_RISK: [&str; 3] = [
    "Schedule a short break in the next 30 minutes and hydrate.",
    "Dim your screen brightness and move to a quiet space if possible.",
    "Prepare your acute medication plan and notify your support contact.",
];

const MEDIUM_RISK: [&str; 3] = [
    "Log current triggers (sleep, stress) to refine the model.",
    "Do a 5-minute breathing exercise and reduce screen exposure.",
    "Check your calendar to see if you can stagger intense meetings.",
];

const LOW_RISK: [&str; 3] = [
    "You're in the safe zone; maintain hydration and posture routines.",
    "Plan tomorrow's sleep and screen hygiene to keep your baseline stable.",
    "If anything feels off, add a quick journal entry for your coach.",
];

/// Recommendations for a risk level, most urgent first.
pub fn recommendations(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::High => &HIGH_RISK,
        RiskLevel::Medium => &MEDIUM_RISK,
        RiskLevel::Low => &LOW_RISK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_level_has_three_recommendations() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(recommendations(level).len(), 3);
        }
        assert!(recommendations(RiskLevel::High)[0].contains("break"));
    }
}
