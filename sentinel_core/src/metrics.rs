//! Extraction metrics and track statistics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::target::{Target, ThreatLevel};

/// Confidence above which a track counts as high-confidence.
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// Speed above which a track counts as a fast mover.
pub const FAST_MOVER_SPEED: f64 = 5.0;

/// Snapshot of the most recent extraction (or scan). Replaced, never
/// accumulated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetrics {
    /// Wall-clock time spent producing the snapshot
    pub processing_time: Duration,

    /// Candidates that survived validation
    pub targets_detected: usize,

    /// Mean confidence of the candidates, 0.0 when there are none
    pub average_confidence: f64,

    /// Readings that activated but failed the validity gate
    pub false_positives: usize,

    /// Readings too short for their modality's layout
    pub missed_targets: usize,
}

impl DetectionMetrics {
    /// Build a snapshot for one extraction.
    pub fn from_extraction(
        processing_time: Duration,
        targets: &[Target],
        false_positives: usize,
        missed_targets: usize,
    ) -> Self {
        Self {
            processing_time,
            targets_detected: targets.len(),
            average_confidence: mean_confidence(targets),
            false_positives,
            missed_targets,
        }
    }

    /// Combine per-modality snapshots into one scan snapshot.
    ///
    /// Counts add up; the average is weighted by each part's target count.
    pub fn combine(parts: &[DetectionMetrics], processing_time: Duration) -> Self {
        let targets_detected: usize = parts.iter().map(|m| m.targets_detected).sum();
        let weighted: f64 = parts
            .iter()
            .map(|m| m.average_confidence * m.targets_detected as f64)
            .sum();

        Self {
            processing_time,
            targets_detected,
            average_confidence: if targets_detected > 0 {
                weighted / targets_detected as f64
            } else {
                0.0
            },
            false_positives: parts.iter().map(|m| m.false_positives).sum(),
            missed_targets: parts.iter().map(|m| m.missed_targets).sum(),
        }
    }
}

fn mean_confidence(targets: &[Target]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    targets.iter().map(|t| t.confidence).sum::<f64>() / targets.len() as f64
}

/// Per-level track counts plus the summary counters printed after a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatStats {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub high_confidence: usize,
    pub fast_movers: usize,
}

impl ThreatStats {
    pub fn from_targets(targets: &[Target]) -> Self {
        let mut stats = Self::default();
        for target in targets {
            match target.threat_level {
                ThreatLevel::Critical => stats.critical += 1,
                ThreatLevel::High => stats.high += 1,
                ThreatLevel::Medium => stats.medium += 1,
                ThreatLevel::Low => stats.low += 1,
            }
            if target.confidence > HIGH_CONFIDENCE {
                stats.high_confidence += 1;
            }
            if target.velocity > FAST_MOVER_SPEED {
                stats.fast_movers += 1;
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Modality;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::time::SystemTime;

    fn target(level: ThreatLevel, confidence: f64, velocity: f64) -> Target {
        Target {
            id: 1,
            position: Vector3::zeros(),
            velocity,
            size: 1.0,
            confidence,
            modality: Modality::Optical,
            threat_level: level,
            detection_time: SystemTime::UNIX_EPOCH,
            description: "optical".to_string(),
        }
    }

    #[test]
    fn test_empty_extraction_snapshot() {
        let m = DetectionMetrics::from_extraction(Duration::ZERO, &[], 0, 0);
        assert_eq!(m.targets_detected, 0);
        assert_eq!(m.average_confidence, 0.0);
        assert_eq!(m, DetectionMetrics::default());
    }

    #[test]
    fn test_average_confidence() {
        let targets = vec![
            target(ThreatLevel::Low, 0.4, 0.0),
            target(ThreatLevel::Low, 0.8, 0.0),
        ];
        let m = DetectionMetrics::from_extraction(Duration::from_millis(3), &targets, 1, 2);
        assert_relative_eq!(m.average_confidence, 0.6, epsilon = 1e-12);
        assert_eq!(m.false_positives, 1);
        assert_eq!(m.missed_targets, 2);
    }

    #[test]
    fn test_combine_weights_by_count() {
        let a = DetectionMetrics {
            targets_detected: 3,
            average_confidence: 0.5,
            false_positives: 1,
            ..Default::default()
        };
        let b = DetectionMetrics {
            targets_detected: 1,
            average_confidence: 0.9,
            missed_targets: 4,
            ..Default::default()
        };
        let empty = DetectionMetrics::default();

        let m = DetectionMetrics::combine(&[a, b, empty], Duration::from_millis(5));
        assert_eq!(m.targets_detected, 4);
        assert_relative_eq!(m.average_confidence, 0.6, epsilon = 1e-12);
        assert_eq!(m.false_positives, 1);
        assert_eq!(m.missed_targets, 4);
        assert_eq!(m.processing_time, Duration::from_millis(5));
    }

    #[test]
    fn test_threat_stats() {
        let targets = vec![
            target(ThreatLevel::Critical, 0.95, 12.0),
            target(ThreatLevel::High, 0.7, 5.0),
            target(ThreatLevel::Low, 0.2, 0.0),
            target(ThreatLevel::Low, 0.75, 6.0),
        ];
        let stats = ThreatStats::from_targets(&targets);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.medium, 0);
        assert_eq!(stats.low, 2);
        assert_eq!(stats.high_confidence, 2);
        assert_eq!(stats.fast_movers, 2);
        assert_eq!(stats.total(), 4);
    }
}
