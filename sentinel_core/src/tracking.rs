//! Temporal tracking: velocity estimation from consecutive observations.
//!
//! The tracker keeps the last snapshot of every id it has seen in a
//! [`TrackHistory`]. When a track with a known id comes back, its velocity is
//! re-derived from the displacement and its threat level recomputed.
//!
//! Two estimators are available:
//! - `FiniteDifference` (default): `|Δposition| / Δt`
//! - `Smoothed`: alpha blend between a constant-velocity prediction and the
//!   measurement, plus optional Gaussian jitter

use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::target::Target;
use crate::threat::ThreatPolicy;

/// Default history cap.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default blend factor toward the measurement in smoothed mode.
pub const DEFAULT_POSITION_ALPHA: f64 = 0.3;

// ============================================================================
// TRACK HISTORY
// ============================================================================

/// Last observed snapshot per track id.
///
/// Bounded by `capacity`: once the map holds more than that many ids it is
/// cleared entirely. There is no per-entry eviction.
#[derive(Debug, Clone)]
pub struct TrackHistory {
    entries: HashMap<u64, Target>,
    capacity: usize,
}

impl TrackHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, id: u64) -> Option<&Target> {
        self.entries.get(&id)
    }

    /// Store `target` as the latest snapshot for its id.
    pub fn insert(&mut self, target: Target) {
        self.entries.insert(target.id, target);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clear the whole map if it grew past its cap. Returns true if it did.
    pub fn enforce_cap(&mut self) -> bool {
        if self.entries.len() > self.capacity {
            debug!(
                size = self.entries.len(),
                cap = self.capacity,
                "track history over cap, clearing"
            );
            self.entries.clear();
            true
        } else {
            false
        }
    }
}

impl Default for TrackHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

// ============================================================================
// TRACKING MODE
// ============================================================================

/// Velocity estimator used by a [`Tracker`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    #[default]
    FiniteDifference,

    Smoothed {
        /// Weight of the measurement against the prediction (0, 1]
        position_alpha: f64,

        /// Standard deviation of the per-axis position jitter (0 disables it)
        jitter_std: f64,
    },
}

impl TrackingMode {
    /// Smoothed mode with the default alpha and no jitter.
    pub fn smoothed() -> Self {
        TrackingMode::Smoothed {
            position_alpha: DEFAULT_POSITION_ALPHA,
            jitter_std: 0.0,
        }
    }
}

// ============================================================================
// TRACKER
// ============================================================================

/// Per-engine tracker state: the estimator and its RNG.
#[derive(Debug, Clone)]
pub struct Tracker {
    mode: TrackingMode,
    jitter: Option<Normal<f64>>,
    rng: ChaCha8Rng,
}

impl Tracker {
    /// `seed` drives the smoothing jitter; finite-difference mode never draws.
    pub fn new(mode: TrackingMode, seed: u64) -> Self {
        let jitter = match mode {
            TrackingMode::Smoothed { jitter_std, .. } if jitter_std > 0.0 => {
                Normal::new(0.0, jitter_std).ok()
            }
            _ => None,
        };

        Self {
            mode,
            jitter,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Update velocities and threat levels of `tracks` against `history`,
    /// then record every track as the latest snapshot of its id.
    ///
    /// `dt <= 0` or non-finite leaves velocities untouched.
    pub fn update(
        &mut self,
        tracks: &mut [Target],
        dt: f64,
        history: &mut TrackHistory,
        policy: &ThreatPolicy,
    ) {
        let dt_valid = dt > 0.0 && dt.is_finite();
        let mut matched = 0usize;

        for track in tracks.iter_mut() {
            if let Some(previous) = history.get(track.id) {
                matched += 1;
                if dt_valid {
                    let position = match self.mode {
                        TrackingMode::FiniteDifference => track.position,
                        TrackingMode::Smoothed { position_alpha, .. } => {
                            self.smooth(previous, &track.position, dt, position_alpha)
                        }
                    };
                    let velocity = (position - previous.position).norm() / dt;
                    // Displacements too large to represent keep the old estimate
                    if velocity.is_finite() && position.iter().all(|v| v.is_finite()) {
                        track.velocity = velocity;
                        track.position = position;
                    }
                }
                track.threat_level = policy.classify(track);
            }
            history.insert(track.clone());
        }

        let cleared = history.enforce_cap();
        debug!(tracks = tracks.len(), matched, cleared, "tracking update");
    }

    /// Alpha-blend the measurement with a constant-velocity prediction.
    fn smooth(
        &mut self,
        previous: &Target,
        measured: &Vector3<f64>,
        dt: f64,
        alpha: f64,
    ) -> Vector3<f64> {
        let displacement = measured - previous.position;
        let direction = displacement.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros);

        let predicted = previous.position + direction * previous.velocity * dt;
        let mut blended = predicted + (measured - predicted) * alpha;

        if let Some(noise) = &self.jitter {
            blended += Vector3::new(
                noise.sample(&mut self.rng),
                noise.sample(&mut self.rng),
                noise.sample(&mut self.rng),
            );
        }

        blended
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackingMode::default(), 0)
    }
}
