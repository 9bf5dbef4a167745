//! The fusion engine: greedy cross-modality merge over a spatial hash.
//!
//! Processing order is fixed:
//! 1. Radar candidates seed the grid as standalone entries
//! 2. Thermal candidates merge into the first compatible entry in range
//! 3. Optical candidates do the same against the list as it stands
//!
//! The result depends on this order. Permuting the modality lists changes
//! which entries absorb which candidates; the merge is neither globally
//! optimal nor commutative.

use tracing::debug;

use crate::spatial::{CellKey, SpatialHashGrid};
use crate::target::{Modality, Target};

/// Confidence ceiling after merging a thermal candidate.
pub const THERMAL_CONFIDENCE_CAP: f64 = 0.9;

/// Confidence ceiling after merging an optical candidate.
pub const OPTICAL_CONFIDENCE_CAP: f64 = 0.95;

/// Share of the incoming confidence added on merge.
pub const CONFIDENCE_GAIN: f64 = 0.3;

/// Whether an incoming candidate may merge into an existing entry.
///
/// Candidates never merge with entries of their own modality; fused entries
/// accept any modality.
fn compatible(existing: Modality, incoming: Modality) -> bool {
    existing == Modality::Fused || existing != incoming
}

/// Blend weight of a detection.
#[inline]
fn fusion_weight(target: &Target) -> f64 {
    target.confidence * target.modality.reliability()
}

/// Fold `incoming` into `existing`.
///
/// Position, size and velocity become the weighted average of both sides.
/// The surviving entry keeps its id, takes the higher threat level and is
/// marked `Fused`.
pub fn merge_into(existing: &mut Target, incoming: &Target, confidence_cap: f64) {
    let w_existing = fusion_weight(existing);
    let w_incoming = fusion_weight(incoming);
    let total = w_existing + w_incoming;

    // Interpolate rather than sum weighted terms so values near f64::MAX
    // stay finite.
    if total > f64::EPSILON {
        let t = w_incoming / total;
        existing.position += (incoming.position - existing.position) * t;
        existing.size += (incoming.size - existing.size) * t;
        existing.velocity += (incoming.velocity - existing.velocity) * t;
    }

    existing.confidence =
        (existing.confidence + incoming.confidence * CONFIDENCE_GAIN).min(confidence_cap);
    existing.threat_level = existing.threat_level.max(incoming.threat_level);
    existing.modality = Modality::Fused;
    existing.description.push('+');
    existing.description.push_str(incoming.modality.tag());
}

/// Working set for one fusion call.
struct FusionGrid {
    grid: SpatialHashGrid,
    entries: Vec<Target>,
    cells: Vec<CellKey>,
    threshold: f64,
}

impl FusionGrid {
    fn new(threshold: f64, capacity: usize) -> Self {
        Self {
            grid: SpatialHashGrid::new(threshold),
            entries: Vec::with_capacity(capacity),
            cells: Vec::with_capacity(capacity),
            threshold,
        }
    }

    fn insert(&mut self, target: Target) {
        let index = self.entries.len();
        let cell = self.grid.insert(index, &target.position);
        self.entries.push(target);
        self.cells.push(cell);
    }

    /// First compatible entry within the threshold, in grid scan order.
    fn find_match(&self, incoming: &Target) -> Option<usize> {
        self.grid
            .query_nearby(&incoming.position)
            .into_iter()
            .find(|&index| {
                let existing = &self.entries[index];
                compatible(existing.modality, incoming.modality)
                    && existing.distance_to(incoming) <= self.threshold
            })
    }

    /// Merge or insert each candidate. Returns the number of merges.
    fn absorb(&mut self, candidates: &[Target], confidence_cap: f64) -> usize {
        let mut merges = 0;
        for incoming in candidates {
            match self.find_match(incoming) {
                Some(index) => {
                    merge_into(&mut self.entries[index], incoming, confidence_cap);
                    let position = self.entries[index].position;
                    self.cells[index] = self.grid.reindex(index, self.cells[index], &position);
                    merges += 1;
                }
                None => self.insert(incoming.clone()),
            }
        }
        merges
    }
}

/// Fuse three candidate lists into one deduplicated track list.
///
/// `fusion_threshold` is both the merge distance and the grid cell edge.
/// Non-positive thresholds disable merging: every candidate passes through.
pub fn fuse(
    radar: &[Target],
    thermal: &[Target],
    optical: &[Target],
    fusion_threshold: f64,
) -> Vec<Target> {
    let total = radar.len() + thermal.len() + optical.len();
    if !(fusion_threshold > 0.0) || !fusion_threshold.is_finite() {
        let mut passthrough = Vec::with_capacity(total);
        passthrough.extend_from_slice(radar);
        passthrough.extend_from_slice(thermal);
        passthrough.extend_from_slice(optical);
        return passthrough;
    }

    let mut grid = FusionGrid::new(fusion_threshold, total);

    for target in radar {
        grid.insert(target.clone());
    }
    let thermal_merges = grid.absorb(thermal, THERMAL_CONFIDENCE_CAP);
    let optical_merges = grid.absorb(optical, OPTICAL_CONFIDENCE_CAP);

    let stats = grid.grid.stats();
    debug!(
        radar = radar.len(),
        thermal = thermal.len(),
        optical = optical.len(),
        thermal_merges,
        optical_merges,
        fused = grid.entries.len(),
        cells = stats.total_cells,
        avg_per_cell = stats.avg_per_cell,
        "fusion pass complete"
    );

    grid.entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ThreatLevel;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::time::SystemTime;

    fn target(id: u64, modality: Modality, pos: [f64; 3], confidence: f64) -> Target {
        Target {
            id,
            position: Vector3::new(pos[0], pos[1], pos[2]),
            velocity: 1.0,
            size: 1.0,
            confidence,
            modality,
            threat_level: ThreatLevel::Low,
            detection_time: SystemTime::UNIX_EPOCH,
            description: modality.tag().to_string(),
        }
    }

    #[test]
    fn test_radar_thermal_merge_scenario() {
        let radar = vec![target(1, Modality::Radar, [0.0, 0.0, 0.0], 0.8)];
        let thermal = vec![target(2, Modality::Thermal, [3.0, 0.0, 0.0], 0.6)];

        let fused = fuse(&radar, &thermal, &[], 5.0);
        assert_eq!(fused.len(), 1);

        let track = &fused[0];
        assert_eq!(track.id, 1);
        assert_eq!(track.modality, Modality::Fused);
        assert_relative_eq!(track.confidence, 0.9, epsilon = 1e-12);

        // Weights 0.96 (radar) vs 0.54 (thermal): pulled toward radar
        let expected_x = 3.0 * 0.54 / (0.96 + 0.54);
        assert_relative_eq!(track.position.x, expected_x, epsilon = 1e-12);
        assert!(track.position.x < 1.5);
        assert_eq!(track.description, "radar+thermal");
    }

    #[test]
    fn test_far_candidates_stay_separate() {
        let radar = vec![target(1, Modality::Radar, [0.0, 0.0, 0.0], 0.8)];
        let thermal = vec![target(2, Modality::Thermal, [5.5, 0.0, 0.0], 0.6)];

        let fused = fuse(&radar, &thermal, &[], 5.0);
        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|t| t.modality != Modality::Fused));
    }

    #[test]
    fn test_same_modality_never_merges() {
        let thermal = vec![
            target(1, Modality::Thermal, [0.0, 0.0, 0.0], 0.6),
            target(2, Modality::Thermal, [1.0, 0.0, 0.0], 0.6),
        ];
        let fused = fuse(&[], &thermal, &[], 5.0);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_optical_merges_into_fused_with_higher_cap() {
        let radar = vec![target(1, Modality::Radar, [0.0, 0.0, 0.0], 0.8)];
        let thermal = vec![target(2, Modality::Thermal, [1.0, 0.0, 0.0], 0.6)];
        let optical = vec![target(3, Modality::Optical, [0.5, 0.5, 0.0], 0.9)];

        let fused = fuse(&radar, &thermal, &optical, 5.0);
        assert_eq!(fused.len(), 1);
        // 0.9 + 0.9 * 0.3 capped at the optical ceiling
        assert_relative_eq!(fused[0].confidence, OPTICAL_CONFIDENCE_CAP, epsilon = 1e-12);
        assert_eq!(fused[0].description, "radar+thermal+optical");
    }

    #[test]
    fn test_optical_can_merge_with_unmatched_thermal() {
        let thermal = vec![target(2, Modality::Thermal, [40.0, 0.0, 0.0], 0.5)];
        let optical = vec![target(3, Modality::Optical, [41.0, 0.0, 0.0], 0.5)];

        let fused = fuse(&[], &thermal, &optical, 5.0);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].id, 2);
        assert_relative_eq!(fused[0].confidence, 0.65, epsilon = 1e-12);
    }

    #[test]
    fn test_threat_level_takes_max() {
        let mut radar = target(1, Modality::Radar, [0.0, 0.0, 0.0], 0.5);
        radar.threat_level = ThreatLevel::Medium;
        let mut thermal = target(2, Modality::Thermal, [1.0, 0.0, 0.0], 0.5);
        thermal.threat_level = ThreatLevel::Critical;

        let fused = fuse(&[radar], &[thermal], &[], 5.0);
        assert_eq!(fused[0].threat_level, ThreatLevel::Critical);
    }

    #[test]
    fn test_first_match_wins_not_nearest() {
        // Both radar entries share a cell; the earlier one absorbs the thermal
        // candidate even though the later one is closer.
        let radar = vec![
            target(1, Modality::Radar, [0.5, 0.5, 0.5], 0.8),
            target(2, Modality::Radar, [3.5, 0.5, 0.5], 0.8),
        ];
        let thermal = vec![target(3, Modality::Thermal, [3.0, 0.5, 0.5], 0.6)];

        let fused = fuse(&radar, &thermal, &[], 5.0);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].modality, Modality::Fused);
        assert_eq!(fused[1].modality, Modality::Radar);
    }

    #[test]
    fn test_candidate_order_matters() {
        let radar = vec![target(1, Modality::Radar, [0.0, 0.0, 0.0], 0.8)];
        let east = target(2, Modality::Optical, [4.5, 0.0, 0.0], 0.8);
        let west = target(3, Modality::Optical, [-4.5, 0.0, 0.0], 0.8);

        // Whichever optical candidate comes first drags the radar entry toward
        // itself, leaving the other one out of range.
        let forward = fuse(&radar, &[], &[east.clone(), west.clone()], 5.0);
        let reversed = fuse(&radar, &[], &[west, east], 5.0);

        assert_eq!(forward.len(), 2);
        assert_eq!(reversed.len(), 2);
        assert!(forward[0].position.x > 0.0);
        assert!(reversed[0].position.x < 0.0);
        assert_eq!(forward[1].id, 3);
        assert_eq!(reversed[1].id, 2);
    }

    #[test]
    fn test_huge_coordinates_merge_without_overflow() {
        let mut radar = target(1, Modality::Radar, [0.0, 0.0, 1.5e308], 0.8);
        radar.size = 1.6e308;
        let thermal = target(2, Modality::Thermal, [1.0, 0.0, 1.5e308], 0.6);
        let far = target(3, Modality::Optical, [-1e20, 0.0, 0.0], 0.6);

        let fused = fuse(&[radar], &[thermal], &[far], 5.0);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].modality, Modality::Fused);
        assert!(fused[0].position.iter().all(|v| v.is_finite()));
        assert!(fused[0].size.is_finite());
        assert!(fused.iter().all(Target::is_well_formed));
    }

    #[test]
    fn test_non_positive_threshold_passes_through() {
        let radar = vec![target(1, Modality::Radar, [0.0, 0.0, 0.0], 0.8)];
        let thermal = vec![target(2, Modality::Thermal, [0.0, 0.0, 0.0], 0.6)];
        let fused = fuse(&radar, &thermal, &[], 0.0);
        assert_eq!(fused.len(), 2);
    }
}
