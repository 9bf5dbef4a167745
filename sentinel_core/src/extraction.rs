//! Per-modality reading validation and candidate extraction.
//!
//! Each reading is a flat slice of `f64` whose layout depends on the modality
//! (see [`Modality::reading_len`]). Converting a reading is a pure function;
//! id assignment and bookkeeping happen in the engine.

use nalgebra::Vector3;
use std::time::SystemTime;

use crate::target::{Modality, Target, ThreatLevel};

/// Thermal activation temperature.
pub const THERMAL_ACTIVATION_TEMP: f64 = 25.0;

/// Optical activation threshold on `brightness * contrast`.
pub const OPTICAL_ACTIVATION: f64 = 0.2;

/// Minimum size for a candidate to count as a real object.
pub const MIN_TARGET_SIZE: f64 = 0.1;

/// A detection that passed validation but has no id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub modality: Modality,
    pub position: Vector3<f64>,
    pub velocity: f64,
    pub size: f64,
    pub confidence: f64,
}

impl Candidate {
    /// Promote the candidate to a [`Target`].
    pub fn into_target(
        self,
        id: u64,
        threat_level: ThreatLevel,
        detection_time: SystemTime,
    ) -> Target {
        Target {
            id,
            position: self.position,
            velocity: self.velocity,
            size: self.size,
            confidence: self.confidence,
            modality: self.modality,
            threat_level,
            detection_time,
            description: self.modality.tag().to_string(),
        }
    }

    /// Range from the sensor origin.
    pub fn range(&self) -> f64 {
        self.position.norm()
    }
}

/// What happened to a single reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingOutcome {
    /// Shorter than the modality's layout.
    Malformed,
    /// Activation predicate failed (noise).
    BelowActivation,
    /// Activated but failed [`is_valid_target`].
    Rejected,
    Accepted(Candidate),
}

impl ReadingOutcome {
    pub fn into_candidate(self) -> Option<Candidate> {
        match self {
            ReadingOutcome::Accepted(c) => Some(c),
            _ => None,
        }
    }
}

/// Validity gate applied after derivation.
#[inline]
pub fn is_valid_target(confidence: f64, size: f64, noise_threshold: f64) -> bool {
    confidence > noise_threshold && size > MIN_TARGET_SIZE
}

/// Convert one reading into a candidate, or `None` if it is skipped.
pub fn extract_candidate(
    modality: Modality,
    reading: &[f64],
    noise_threshold: f64,
) -> Option<Candidate> {
    classify_reading(modality, reading, noise_threshold).into_candidate()
}

/// Convert one reading, reporting why it was skipped.
pub fn classify_reading(
    modality: Modality,
    reading: &[f64],
    noise_threshold: f64,
) -> ReadingOutcome {
    if modality == Modality::Fused || reading.len() < modality.reading_len() {
        return ReadingOutcome::Malformed;
    }

    let (x, y, z) = (reading[0], reading[1], reading[2]);
    let distance_xy = (x * x + y * y).sqrt();

    let derived = match modality {
        Modality::Radar => {
            let signal_strength = reading[3];
            if !(signal_strength > noise_threshold) {
                return ReadingOutcome::BelowActivation;
            }
            (
                distance_xy * 0.1,
                signal_strength * 2.0,
                (signal_strength * 1.5).min(1.0),
            )
        }
        Modality::Thermal => {
            let temperature = reading[3];
            if !(temperature > THERMAL_ACTIVATION_TEMP) {
                return ReadingOutcome::BelowActivation;
            }
            (
                distance_xy * 0.05,
                ((temperature - 20.0) * 0.3).max(0.5),
                ((temperature - 20.0) / 20.0).min(1.0),
            )
        }
        Modality::Optical => {
            let (brightness, contrast) = (reading[3], reading[4]);
            if !(brightness * contrast > OPTICAL_ACTIVATION) {
                return ReadingOutcome::BelowActivation;
            }
            (
                distance_xy * 0.08,
                brightness * 3.0,
                (brightness * contrast * 2.0).min(1.0),
            )
        }
        Modality::Fused => return ReadingOutcome::Malformed,
    };
    let (velocity, size, confidence) = derived;

    let finite = [x, y, z, velocity, size, confidence].iter().all(|v| v.is_finite());
    if !finite || !is_valid_target(confidence, size, noise_threshold) {
        return ReadingOutcome::Rejected;
    }

    ReadingOutcome::Accepted(Candidate {
        modality,
        position: Vector3::new(x, y, z),
        velocity,
        size,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const NOISE: f64 = 0.3;

    #[test]
    fn test_radar_origin_scenario() {
        let c = extract_candidate(Modality::Radar, &[0.0, 0.0, 0.0, 0.9], NOISE).unwrap();
        assert_relative_eq!(c.range(), 0.0);
        assert_relative_eq!(c.velocity, 0.0);
        assert_relative_eq!(c.confidence, 1.0);
        assert_relative_eq!(c.size, 1.8, epsilon = 1e-12);
    }

    #[test]
    fn test_radar_below_noise_is_skipped() {
        let outcome = classify_reading(Modality::Radar, &[1.0, 1.0, 0.0, 0.3], NOISE);
        assert_eq!(outcome, ReadingOutcome::BelowActivation);
    }

    #[test]
    fn test_short_reading_is_malformed() {
        assert_eq!(
            classify_reading(Modality::Radar, &[1.0, 2.0, 3.0], NOISE),
            ReadingOutcome::Malformed
        );
        assert_eq!(
            classify_reading(Modality::Optical, &[1.0, 2.0, 3.0, 0.9], NOISE),
            ReadingOutcome::Malformed
        );
    }

    #[test]
    fn test_extra_trailing_values_are_ignored() {
        // Simulated radar rows carry a trailing velocity column
        let c = extract_candidate(Modality::Radar, &[3.0, 4.0, 0.0, 0.5, 120.0], NOISE).unwrap();
        assert_relative_eq!(c.velocity, 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.confidence, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_thermal_derivation() {
        let c = extract_candidate(Modality::Thermal, &[30.0, 40.0, 2.0, 32.0], NOISE).unwrap();
        assert_relative_eq!(c.velocity, 2.5, epsilon = 1e-12);
        assert_relative_eq!(c.size, 3.6, epsilon = 1e-12);
        assert_relative_eq!(c.confidence, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_thermal_activation_and_validity() {
        // Not hot enough to activate
        assert_eq!(
            classify_reading(Modality::Thermal, &[0.0, 0.0, 0.0, 25.0], NOISE),
            ReadingOutcome::BelowActivation
        );
        // Activates but confidence 0.26 <= 0.3
        assert_eq!(
            classify_reading(Modality::Thermal, &[0.0, 0.0, 0.0, 25.2], NOISE),
            ReadingOutcome::Rejected
        );
    }

    #[test]
    fn test_optical_derivation() {
        let c = extract_candidate(Modality::Optical, &[6.0, 8.0, 0.0, 0.8, 0.5], NOISE).unwrap();
        assert_relative_eq!(c.velocity, 0.8, epsilon = 1e-12);
        assert_relative_eq!(c.size, 2.4, epsilon = 1e-12);
        assert_relative_eq!(c.confidence, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_optical_gate() {
        assert_eq!(
            classify_reading(Modality::Optical, &[0.0, 0.0, 0.0, 0.4, 0.5], NOISE),
            ReadingOutcome::BelowActivation
        );
    }

    #[test]
    fn test_non_finite_reading_is_rejected() {
        assert_eq!(
            classify_reading(Modality::Radar, &[f64::NAN, 0.0, 0.0, 0.9], NOISE),
            ReadingOutcome::Rejected
        );
        assert_eq!(
            classify_reading(Modality::Radar, &[0.0, 0.0, 0.0, f64::NAN], NOISE),
            ReadingOutcome::BelowActivation
        );
    }

    #[test]
    fn test_is_valid_target() {
        assert!(is_valid_target(0.31, 0.2, NOISE));
        assert!(!is_valid_target(0.3, 0.2, NOISE));
        assert!(!is_valid_target(0.9, 0.1, NOISE));
    }

    proptest! {
        #[test]
        fn prop_radar_confidence_formula(
            x in -100.0f64..100.0,
            y in -100.0f64..100.0,
            z in -10.0f64..10.0,
            signal in 0.0f64..2.0,
        ) {
            let result = extract_candidate(Modality::Radar, &[x, y, z, signal], NOISE);
            if signal > NOISE && signal * 2.0 > MIN_TARGET_SIZE {
                let c = result.unwrap();
                prop_assert_eq!(c.confidence, (signal * 1.5).min(1.0));
            } else {
                prop_assert!(result.is_none());
            }
        }
    }
}
