//! Data model shared by every stage of the scan pipeline.
//!
//! A [`Target`] is created by extraction or fusion, mutated in place by the
//! tracker (velocity, threat level) and only ever removed by clearing the
//! engine's store.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

// ============================================================================
// MODALITY
// ============================================================================

/// The sensing channel a detection came from.
///
/// `Fused` is synthetic: it marks a track that absorbed at least one
/// candidate from another modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Radar,
    Thermal,
    Optical,
    Fused,
}

impl Modality {
    /// The three physical sensing channels, in fusion order.
    pub const SENSORS: [Modality; 3] = [Modality::Radar, Modality::Thermal, Modality::Optical];

    /// Minimum number of values a reading of this modality must carry.
    ///
    /// Radar: `[x, y, z, signal_strength]`
    /// Thermal: `[x, y, z, temperature]`
    /// Optical: `[x, y, z, brightness, contrast]`
    pub fn reading_len(&self) -> usize {
        match self {
            Modality::Radar | Modality::Thermal => 4,
            Modality::Optical => 5,
            Modality::Fused => 0,
        }
    }

    /// Reliability multiplier applied to confidence when blending during fusion.
    pub fn reliability(&self) -> f64 {
        match self {
            Modality::Radar => 1.2,
            Modality::Fused => 1.1,
            Modality::Optical => 1.0,
            Modality::Thermal => 0.9,
        }
    }

    /// Short tag appended to a fused track's description.
    pub fn tag(&self) -> &'static str {
        match self {
            Modality::Radar => "radar",
            Modality::Thermal => "thermal",
            Modality::Optical => "optical",
            Modality::Fused => "fused",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// THREAT LEVEL
// ============================================================================

/// Threat classification, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// `High` and `Critical` tracks are served by the high-priority query.
    pub fn is_high_priority(&self) -> bool {
        matches!(self, ThreatLevel::High | ThreatLevel::Critical)
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

// ============================================================================
// SENSOR AVAILABILITY
// ============================================================================

/// Operational state of one sensing channel.
///
/// Anything other than `Active` short-circuits extraction for that channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorAvailability {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Error,
}

impl SensorAvailability {
    pub fn is_active(&self) -> bool {
        matches!(self, SensorAvailability::Active)
    }
}

// ============================================================================
// TARGET
// ============================================================================

/// A detected or fused object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Engine-assigned id, strictly increasing and never reused
    pub id: u64,

    /// Position [x, y, z] in abstract distance units
    pub position: Vector3<f64>,

    /// Speed magnitude (>= 0)
    pub velocity: f64,

    /// Apparent size
    pub size: f64,

    /// Confidence score [0.0 - 1.0]
    pub confidence: f64,

    /// Source channel, or `Fused`
    pub modality: Modality,

    pub threat_level: ThreatLevel,

    /// Wall-clock time the detection was produced
    pub detection_time: SystemTime,

    /// Human-readable provenance; fusion appends modality tags here
    pub description: String,
}

impl Target {
    /// Euclidean distance from the sensor origin.
    #[inline]
    pub fn range(&self) -> f64 {
        self.position.norm()
    }

    /// Euclidean distance to another target.
    #[inline]
    pub fn distance_to(&self, other: &Target) -> f64 {
        (self.position - other.position).norm()
    }

    /// True when size and confidence are finite and non-negative and
    /// confidence does not exceed 1.
    pub fn is_well_formed(&self) -> bool {
        self.size.is_finite()
            && self.size >= 0.0
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && self.velocity.is_finite()
            && self.velocity >= 0.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {} | Threat: {} | Conf: {:.2} | Vel: {:.2} | {} @ ({:.1}, {:.1}, {:.1})",
            self.id,
            self.threat_level,
            self.confidence,
            self.velocity,
            self.modality,
            self.position.x,
            self.position.y,
            self.position.z,
        )
    }
}
