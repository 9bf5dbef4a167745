//! Threat classification.
//!
//! Two policies exist. [`ThreatPolicy::WeightedScore`] is the canonical one and
//! the default; [`ThreatPolicy::ThresholdLadder`] is a lighter-weight variant.
//! An engine uses exactly one of them for every classification it performs.

use serde::{Deserialize, Serialize};

use crate::target::{Target, ThreatLevel};

/// Confidence above which a close-range detection is escalated to `Critical`.
pub const ESCALATION_CONFIDENCE: f64 = 0.9;

/// Range of the innermost distance band.
pub const ESCALATION_RANGE: f64 = 10.0;

/// Selects how a target's attributes map to a [`ThreatLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatPolicy {
    /// Additive weighted score over velocity, size, range and confidence.
    #[default]
    WeightedScore,

    /// Range/speed ladder: close and fast is critical, close is high,
    /// fast is medium.
    ThresholdLadder,
}

impl ThreatPolicy {
    /// Classify a target. Pure function of its attributes.
    pub fn classify(&self, target: &Target) -> ThreatLevel {
        self.classify_attributes(target.velocity, target.size, target.range(), target.confidence)
    }

    /// Classify from raw attributes.
    pub fn classify_attributes(
        &self,
        velocity: f64,
        size: f64,
        distance: f64,
        confidence: f64,
    ) -> ThreatLevel {
        match self {
            ThreatPolicy::WeightedScore => {
                if confidence > ESCALATION_CONFIDENCE && distance < ESCALATION_RANGE {
                    return ThreatLevel::Critical;
                }
                level_for_score(weighted_score(velocity, size, distance, confidence))
            }
            ThreatPolicy::ThresholdLadder => ladder_level(velocity, distance),
        }
    }
}

// ============================================================================
// WEIGHTED SCORE
// ============================================================================

/// Velocity contribution (already weighted by 0.4).
fn velocity_factor(velocity: f64) -> f64 {
    match velocity {
        v if v > 50.0 => 0.4,
        v if v > 20.0 => 0.3,
        v if v > 10.0 => 0.2,
        _ => 0.1,
    }
}

/// Size contribution (already weighted by 0.2).
fn size_factor(size: f64) -> f64 {
    match size {
        s if s > 5.0 => 0.2,
        s if s > 2.0 => 0.15,
        s if s > 1.0 => 0.1,
        _ => 0.05,
    }
}

/// Range contribution (already weighted by 0.25). Closer is worse.
fn distance_factor(distance: f64) -> f64 {
    match distance {
        d if d < 10.0 => 0.25,
        d if d < 50.0 => 0.2,
        d if d < 100.0 => 0.15,
        _ => 0.05,
    }
}

/// Additive threat score in `[0.2, 1.0]` for confidences in `[0, 1]`.
pub fn weighted_score(velocity: f64, size: f64, distance: f64, confidence: f64) -> f64 {
    velocity_factor(velocity) + size_factor(size) + distance_factor(distance) + 0.15 * confidence
}

/// Map a weighted score onto a level.
pub fn level_for_score(score: f64) -> ThreatLevel {
    match score {
        s if s >= 0.8 => ThreatLevel::Critical,
        s if s >= 0.6 => ThreatLevel::High,
        s if s >= 0.4 => ThreatLevel::Medium,
        _ => ThreatLevel::Low,
    }
}

// ============================================================================
// THRESHOLD LADDER
// ============================================================================

fn ladder_level(velocity: f64, distance: f64) -> ThreatLevel {
    let speed = velocity.abs();
    if distance < 500.0 && speed > 100.0 {
        ThreatLevel::Critical
    } else if distance < 1000.0 {
        ThreatLevel::High
    } else if speed > 50.0 {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_score_bands() {
        // slow, small, far, no confidence
        assert_relative_eq!(weighted_score(0.0, 0.0, 500.0, 0.0), 0.2, epsilon = 1e-12);
        // fast, large, close, fully confident
        assert_relative_eq!(weighted_score(60.0, 6.0, 1.0, 1.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_score(0.8), ThreatLevel::Critical);
        assert_eq!(level_for_score(0.79), ThreatLevel::High);
        assert_eq!(level_for_score(0.6), ThreatLevel::High);
        assert_eq!(level_for_score(0.4), ThreatLevel::Medium);
        assert_eq!(level_for_score(0.39), ThreatLevel::Low);
    }

    #[test]
    fn test_close_range_escalation() {
        let policy = ThreatPolicy::WeightedScore;
        // Radar reading [0, 0, 0, 0.9]: velocity 0, size 1.8, range 0, confidence 1.0
        assert_eq!(policy.classify_attributes(0.0, 1.8, 0.0, 1.0), ThreatLevel::Critical);
        // Same target just outside the innermost band falls back to the score
        assert_eq!(policy.classify_attributes(0.0, 1.8, 10.0, 1.0), ThreatLevel::Medium);
        // Confidence at the boundary is not escalated: 0.1 + 0.1 + 0.25 + 0.135
        assert_eq!(policy.classify_attributes(0.0, 1.8, 0.0, 0.9), ThreatLevel::Medium);
    }

    #[test]
    fn test_ladder() {
        let policy = ThreatPolicy::ThresholdLadder;
        assert_eq!(policy.classify_attributes(150.0, 1.0, 100.0, 0.5), ThreatLevel::Critical);
        assert_eq!(policy.classify_attributes(10.0, 1.0, 800.0, 0.5), ThreatLevel::High);
        assert_eq!(policy.classify_attributes(60.0, 1.0, 2000.0, 0.5), ThreatLevel::Medium);
        assert_eq!(policy.classify_attributes(10.0, 1.0, 2000.0, 0.5), ThreatLevel::Low);
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_velocity(
            v in 0.0f64..200.0,
            dv in 0.0f64..200.0,
            size in 0.0f64..10.0,
            dist in 0.0f64..2000.0,
            conf in 0.0f64..=1.0,
        ) {
            for policy in [ThreatPolicy::WeightedScore, ThreatPolicy::ThresholdLadder] {
                let before = policy.classify_attributes(v, size, dist, conf);
                let after = policy.classify_attributes(v + dv, size, dist, conf);
                prop_assert!(after >= before);
            }
        }

        #[test]
        fn prop_monotonic_in_confidence(
            v in 0.0f64..200.0,
            size in 0.0f64..10.0,
            dist in 0.0f64..2000.0,
            conf in 0.0f64..=1.0,
            dc in 0.0f64..=1.0,
        ) {
            let raised = (conf + dc).min(1.0);
            for policy in [ThreatPolicy::WeightedScore, ThreatPolicy::ThresholdLadder] {
                let before = policy.classify_attributes(v, size, dist, conf);
                let after = policy.classify_attributes(v, size, dist, raised);
                prop_assert!(after >= before);
            }
        }
    }
}
