//! The detection engine: extraction, fusion, tracking and the track store.
//!
//! One [`DetectionEngine`] owns everything that persists across scan cycles.
//! It is `Send + Sync`; every operation takes `&self`.
//!
//! Shared state lives behind a single mutex that is only held for short
//! reads and writes. Extraction itself runs outside the lock on the engine's
//! own rayon pool, and ids come from an atomic counter.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use tracing::{debug, warn};

use crate::config::{
    validate_fusion_threshold, validate_noise_threshold, ConfigError, EngineConfig,
};
use crate::extraction::{classify_reading, ReadingOutcome};
use crate::fusion;
use crate::metrics::{DetectionMetrics, ThreatStats};
use crate::target::{Modality, SensorAvailability, Target, ThreatLevel};
use crate::threat::ThreatPolicy;
use crate::tracking::{TrackHistory, Tracker};

/// First id handed out by a fresh (or cleared) engine.
const FIRST_ID: u64 = 1;

// ============================================================================
// SCAN FRAME
// ============================================================================

/// Raw readings of one scan cycle, one list per modality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFrame {
    pub radar: Vec<Vec<f64>>,
    pub thermal: Vec<Vec<f64>>,
    pub optical: Vec<Vec<f64>>,
}

impl ScanFrame {
    pub fn readings(&self, modality: Modality) -> &[Vec<f64>] {
        match modality {
            Modality::Radar => &self.radar,
            Modality::Thermal => &self.thermal,
            Modality::Optical => &self.optical,
            Modality::Fused => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.radar.len() + self.thermal.len() + self.optical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// ENGINE STATE
// ============================================================================

/// Everything guarded by the engine mutex.
#[derive(Debug)]
struct EngineState {
    tracks: Vec<Target>,
    history: TrackHistory,
    tracker: Tracker,
    metrics: DetectionMetrics,
    availability: [SensorAvailability; 3],
    noise_threshold: f64,
    fusion_threshold: f64,
}

fn sensor_slot(modality: Modality) -> Option<usize> {
    Modality::SENSORS.iter().position(|&m| m == modality)
}

impl EngineState {
    fn availability(&self, modality: Modality) -> SensorAvailability {
        match sensor_slot(modality) {
            Some(slot) => self.availability[slot],
            None => SensorAvailability::Inactive,
        }
    }
}

/// Result of extracting one modality before it is published.
struct Extraction {
    targets: Vec<Target>,
    metrics: DetectionMetrics,
}

// ============================================================================
// DETECTION ENGINE
// ============================================================================

/// Thread-safe detection, fusion and tracking engine.
pub struct DetectionEngine {
    state: Mutex<EngineState>,
    next_id: AtomicU64,
    total_detections: AtomicU64,
    policy: ThreatPolicy,
    prediction_decay: f64,
    pool: ThreadPool,
}

impl DetectionEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("sentinel-worker-{i}"))
            .build()?;

        debug!(
            workers = pool.current_num_threads(),
            policy = ?config.threat_policy,
            mode = ?config.tracking_mode,
            "detection engine created"
        );

        Ok(Self {
            state: Mutex::new(EngineState {
                tracks: Vec::new(),
                history: TrackHistory::with_capacity(config.history_capacity),
                tracker: Tracker::new(config.tracking_mode, config.tracker_seed),
                metrics: DetectionMetrics::default(),
                availability: [SensorAvailability::Active; 3],
                noise_threshold: config.noise_threshold,
                fusion_threshold: config.fusion_threshold,
            }),
            next_id: AtomicU64::new(FIRST_ID),
            total_detections: AtomicU64::new(0),
            policy: config.threat_policy,
            prediction_decay: config.prediction_decay,
            pool,
        })
    }

    pub fn with_defaults() -> Result<Self, EngineError> {
        Self::new(EngineConfig::default())
    }

    /// The state holds plain data only, so a poisoned lock is still usable.
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn threat_policy(&self) -> ThreatPolicy {
        self.policy
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    // ========================================================================
    // EXTRACTION
    // ========================================================================

    /// Convert one modality's readings into targets.
    ///
    /// Returns an empty list without touching metrics when the sensor is not
    /// `Active`. Otherwise records a fresh metrics snapshot and adds the
    /// result count to the total-detections counter.
    pub fn detect<R>(&self, modality: Modality, readings: &[R]) -> Vec<Target>
    where
        R: AsRef<[f64]> + Sync,
    {
        match self.extract(modality, readings) {
            Some(extraction) => {
                self.lock_state().metrics = extraction.metrics;
                extraction.targets
            }
            None => Vec::new(),
        }
    }

    pub fn detect_radar<R: AsRef<[f64]> + Sync>(&self, readings: &[R]) -> Vec<Target> {
        self.detect(Modality::Radar, readings)
    }

    pub fn detect_thermal<R: AsRef<[f64]> + Sync>(&self, readings: &[R]) -> Vec<Target> {
        self.detect(Modality::Thermal, readings)
    }

    pub fn detect_optical<R: AsRef<[f64]> + Sync>(&self, readings: &[R]) -> Vec<Target> {
        self.detect(Modality::Optical, readings)
    }

    /// Extraction without publishing metrics. `None` if the sensor is off.
    fn extract<R>(&self, modality: Modality, readings: &[R]) -> Option<Extraction>
    where
        R: AsRef<[f64]> + Sync,
    {
        let start = Instant::now();

        let noise_threshold = {
            let state = self.lock_state();
            let availability = state.availability(modality);
            if !availability.is_active() {
                debug!(%modality, ?availability, "sensor not active, skipping extraction");
                return None;
            }
            state.noise_threshold
        };

        let outcomes: Vec<ReadingOutcome> = self.pool.install(|| {
            readings
                .par_iter()
                .map(|reading| classify_reading(modality, reading.as_ref(), noise_threshold))
                .collect()
        });

        let mut false_positives = 0;
        let mut missed_targets = 0;
        let mut candidates = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                ReadingOutcome::Accepted(candidate) => candidates.push(candidate),
                ReadingOutcome::Rejected => false_positives += 1,
                ReadingOutcome::Malformed => missed_targets += 1,
                ReadingOutcome::BelowActivation => {}
            }
        }

        // Reserve a contiguous id block so concurrent callers never interleave
        let base_id = self.next_id.fetch_add(candidates.len() as u64, Ordering::SeqCst);
        let detection_time = SystemTime::now();
        let targets: Vec<Target> = candidates
            .into_iter()
            .enumerate()
            .map(|(offset, candidate)| {
                let level = self.policy.classify_attributes(
                    candidate.velocity,
                    candidate.size,
                    candidate.range(),
                    candidate.confidence,
                );
                candidate.into_target(base_id + offset as u64, level, detection_time)
            })
            .collect();

        self.total_detections.fetch_add(targets.len() as u64, Ordering::Relaxed);

        let metrics = DetectionMetrics::from_extraction(
            start.elapsed(),
            &targets,
            false_positives,
            missed_targets,
        );
        debug!(
            %modality,
            readings = readings.len(),
            detected = targets.len(),
            false_positives,
            missed_targets,
            "extraction complete"
        );

        Some(Extraction { targets, metrics })
    }

    // ========================================================================
    // FUSION & TRACKING
    // ========================================================================

    /// Fuse three candidate lists using the engine's fusion threshold.
    pub fn fuse(&self, radar: &[Target], thermal: &[Target], optical: &[Target]) -> Vec<Target> {
        let threshold = self.lock_state().fusion_threshold;
        fusion::fuse(radar, thermal, optical, threshold)
    }

    /// Update velocities and threat levels of `tracks` against the engine's
    /// history.
    pub fn track(&self, tracks: &mut [Target], dt: f64) {
        let mut guard = self.lock_state();
        let state = &mut *guard;
        state.tracker.update(tracks, dt, &mut state.history, &self.policy);
    }

    /// Run one full scan cycle: extract all three modalities, fuse, track,
    /// and replace the stored track list.
    ///
    /// The metrics snapshot afterwards covers the whole scan.
    pub fn scan(&self, frame: &ScanFrame, dt: f64) -> Vec<Target> {
        let start = Instant::now();

        let mut lists: [Vec<Target>; 3] = Default::default();
        let mut parts = Vec::with_capacity(3);
        for (slot, modality) in Modality::SENSORS.into_iter().enumerate() {
            if let Some(extraction) = self.extract(modality, frame.readings(modality)) {
                lists[slot] = extraction.targets;
                parts.push(extraction.metrics);
            }
        }
        let [radar, thermal, optical] = lists;

        let mut tracks = self.fuse(&radar, &thermal, &optical);
        self.track(&mut tracks, dt);

        let metrics = DetectionMetrics::combine(&parts, start.elapsed());
        {
            let mut state = self.lock_state();
            state.tracks = tracks.clone();
            state.metrics = metrics;
        }

        debug!(
            radar = radar.len(),
            thermal = thermal.len(),
            optical = optical.len(),
            tracks = tracks.len(),
            "scan complete"
        );
        tracks
    }

    // ========================================================================
    // STORE & QUERIES
    // ========================================================================

    pub fn add_target(&self, target: Target) {
        self.lock_state().tracks.push(target);
    }

    pub fn add_targets(&self, targets: impl IntoIterator<Item = Target>) {
        self.lock_state().tracks.extend(targets);
    }

    /// Drop all tracks and history and restart ids from the beginning.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.tracks.clear();
        state.history.clear();
        self.next_id.store(FIRST_ID, Ordering::SeqCst);
    }

    pub fn targets(&self) -> Vec<Target> {
        self.lock_state().tracks.clone()
    }

    pub fn target_count(&self) -> usize {
        self.lock_state().tracks.len()
    }

    pub fn targets_by_threat(&self, level: ThreatLevel) -> Vec<Target> {
        self.lock_state()
            .tracks
            .iter()
            .filter(|t| t.threat_level == level)
            .cloned()
            .collect()
    }

    /// Tracks at `High` or `Critical`.
    pub fn high_priority_targets(&self) -> Vec<Target> {
        self.lock_state()
            .tracks
            .iter()
            .filter(|t| t.threat_level.is_high_priority())
            .cloned()
            .collect()
    }

    /// Sort by threat level then confidence, both descending.
    pub fn prioritize(&self, targets: &mut [Target]) {
        prioritize_targets(targets);
    }

    /// Stored tracks in priority order.
    pub fn prioritized_targets(&self) -> Vec<Target> {
        let mut targets = self.targets();
        prioritize_targets(&mut targets);
        targets
    }

    /// Extrapolate `tracks` by `dt` and decay their confidence.
    pub fn predict_positions(&self, tracks: &[Target], dt: f64) -> Vec<Target> {
        predict_positions(tracks, dt, self.prediction_decay)
    }

    pub fn threat_stats(&self) -> ThreatStats {
        ThreatStats::from_targets(&self.lock_state().tracks)
    }

    pub fn metrics(&self) -> DetectionMetrics {
        self.lock_state().metrics.clone()
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections.load(Ordering::Relaxed)
    }

    pub fn history_len(&self) -> usize {
        self.lock_state().history.len()
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    pub fn noise_threshold(&self) -> f64 {
        self.lock_state().noise_threshold
    }

    /// Rejected values leave the current threshold in place.
    pub fn set_noise_threshold(&self, value: f64) -> Result<(), ConfigError> {
        match validate_noise_threshold(value) {
            Ok(v) => {
                self.lock_state().noise_threshold = v;
                Ok(())
            }
            Err(e) => {
                warn!(value, "rejected noise threshold");
                Err(e)
            }
        }
    }

    pub fn fusion_threshold(&self) -> f64 {
        self.lock_state().fusion_threshold
    }

    /// Rejected values leave the current threshold in place.
    pub fn set_fusion_threshold(&self, value: f64) -> Result<(), ConfigError> {
        match validate_fusion_threshold(value) {
            Ok(v) => {
                self.lock_state().fusion_threshold = v;
                Ok(())
            }
            Err(e) => {
                warn!(value, "rejected fusion threshold");
                Err(e)
            }
        }
    }

    /// `Fused` is not a sensor and always reports `Inactive`.
    pub fn sensor_availability(&self, modality: Modality) -> SensorAvailability {
        self.lock_state().availability(modality)
    }

    pub fn set_sensor_availability(&self, modality: Modality, availability: SensorAvailability) {
        match sensor_slot(modality) {
            Some(slot) => {
                self.lock_state().availability[slot] = availability;
                debug!(%modality, ?availability, "sensor availability changed");
            }
            None => warn!(%modality, "availability can only be set on a physical sensor"),
        }
    }
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("total_detections", &self.total_detections())
            .field("policy", &self.policy)
            .field("workers", &self.pool.current_num_threads())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FREE FUNCTIONS
// ============================================================================

/// Stable sort by `(threat_level desc, confidence desc)`.
pub fn prioritize_targets(targets: &mut [Target]) {
    targets.sort_by(|a, b| {
        b.threat_level
            .cmp(&a.threat_level)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
}

/// Move each track radially by `velocity * dt` and multiply its confidence
/// by `decay`. A track at the origin has no direction and only decays,
/// as does one whose moved position would not be finite.
pub fn predict_positions(tracks: &[Target], dt: f64, decay: f64) -> Vec<Target> {
    tracks
        .iter()
        .map(|track| {
            let mut predicted = track.clone();
            if let Some(direction) = track.position.try_normalize(f64::EPSILON) {
                let moved = track.position + direction * track.velocity * dt;
                if moved.iter().all(|v| v.is_finite()) {
                    predicted.position = moved;
                }
            }
            predicted.confidence *= decay;
            predicted
        })
        .collect()
}

// ============================================================================
// ERRORS
// ============================================================================

/// Engine construction failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

// ============================================================================
// TESTS
// ============================================================================
