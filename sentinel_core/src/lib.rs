//! Sentinel Core - Multi-Modality Detection, Fusion and Tracking Engine
//!
//! Turns per-scan radar, thermal and optical readings into a deduplicated,
//! threat-ranked track list:
//! 1. **Extraction**: per-reading validation and candidate derivation, in parallel
//! 2. **Fusion**: greedy cross-modality merge over a uniform spatial hash
//! 3. **Tracking**: velocity from consecutive observations with bounded history

pub mod config;
pub mod engine;
pub mod extraction;
pub mod fusion;
pub mod metrics;
pub mod spatial;
pub mod target;
pub mod threat;
pub mod tracking;

// Re-export key types for convenience
pub use config::{ConfigError, EngineConfig};
pub use engine::{predict_positions, prioritize_targets, DetectionEngine, EngineError, ScanFrame};
pub use extraction::{extract_candidate, is_valid_target, Candidate};
pub use fusion::fuse;
pub use metrics::{DetectionMetrics, ThreatStats};
pub use spatial::{SpatialHashGrid, SpatialIndexStats};
pub use target::{Modality, SensorAvailability, Target, ThreatLevel};
pub use threat::ThreatPolicy;
pub use tracking::{TrackHistory, Tracker, TrackingMode};
