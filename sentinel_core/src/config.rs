//! Engine configuration and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::threat::ThreatPolicy;
use crate::tracking::{TrackingMode, DEFAULT_HISTORY_CAPACITY};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for a [`DetectionEngine`](crate::DetectionEngine).
///
/// Every field has a default, so a JSON file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Radar activation level and validity floor for all modalities (default: 0.3)
    pub noise_threshold: f64,

    /// Merge distance and spatial grid cell edge (default: 5.0)
    pub fusion_threshold: f64,

    /// Track history cap; exceeding it clears the whole history (default: 1000)
    pub history_capacity: usize,

    /// Worker threads for parallel extraction, 0 = rayon default
    pub worker_threads: usize,

    pub threat_policy: ThreatPolicy,

    pub tracking_mode: TrackingMode,

    /// Seed for the smoothing jitter RNG
    pub tracker_seed: u64,

    /// Confidence multiplier applied per prediction step (default: 0.95)
    pub prediction_decay: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 0.3,
            fusion_threshold: 5.0,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            worker_threads: 0,
            threat_policy: ThreatPolicy::WeightedScore,
            tracking_mode: TrackingMode::FiniteDifference,
            tracker_seed: 0,
            prediction_decay: 0.95,
        }
    }
}

impl EngineConfig {
    /// Check every field against its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_noise_threshold(self.noise_threshold)?;
        validate_fusion_threshold(self.fusion_threshold)?;

        if self.history_capacity == 0 {
            return Err(ConfigError::HistoryCapacity);
        }
        if !(self.prediction_decay > 0.0 && self.prediction_decay <= 1.0) {
            return Err(ConfigError::PredictionDecay(self.prediction_decay));
        }
        if let TrackingMode::Smoothed { position_alpha, jitter_std } = self.tracking_mode {
            if !(position_alpha > 0.0 && position_alpha <= 1.0) {
                return Err(ConfigError::PositionAlpha(position_alpha));
            }
            if !(jitter_std >= 0.0 && jitter_std.is_finite()) {
                return Err(ConfigError::JitterStd(jitter_std));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Noise threshold domain: (0, 1].
pub fn validate_noise_threshold(value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::NoiseThreshold(value))
    }
}

/// Fusion threshold domain: positive and finite.
pub fn validate_fusion_threshold(value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::FusionThreshold(value))
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("noise threshold must be in (0, 1], got {0}")]
    NoiseThreshold(f64),

    #[error("fusion threshold must be positive and finite, got {0}")]
    FusionThreshold(f64),

    #[error("history capacity must be at least 1")]
    HistoryCapacity,

    #[error("prediction decay must be in (0, 1], got {0}")]
    PredictionDecay(f64),

    #[error("smoothing alpha must be in (0, 1], got {0}")]
    PositionAlpha(f64),

    #[error("jitter standard deviation must be finite and non-negative, got {0}")]
    JitterStd(f64),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.noise_threshold, 0.3);
        assert_eq!(config.fusion_threshold, 5.0);
        assert_eq!(config.history_capacity, 1000);
    }

    #[test]
    fn test_threshold_domains() {
        assert!(validate_noise_threshold(1.0).is_ok());
        assert!(validate_noise_threshold(0.0).is_err());
        assert!(validate_noise_threshold(1.5).is_err());
        assert!(validate_noise_threshold(f64::NAN).is_err());

        assert!(validate_fusion_threshold(0.1).is_ok());
        assert!(validate_fusion_threshold(-2.0).is_err());
        assert!(validate_fusion_threshold(f64::INFINITY).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "fusion_threshold": 8.0, "threat_policy": "threshold_ladder" }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.fusion_threshold, 8.0);
        assert_eq!(config.noise_threshold, 0.3);
        assert_eq!(config.threat_policy, ThreatPolicy::ThresholdLadder);
        assert_eq!(config.tracking_mode, TrackingMode::FiniteDifference);
    }

    #[test]
    fn test_smoothed_mode_from_json() {
        let config = EngineConfig::from_json(
            r#"{ "tracking_mode": { "smoothed": { "position_alpha": 0.3, "jitter_std": 0.05 } } }"#,
        )
        .unwrap();
        assert_eq!(
            config.tracking_mode,
            TrackingMode::Smoothed {
                position_alpha: 0.3,
                jitter_std: 0.05
            }
        );
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "noise_threshold": 0.0 }"#),
            Err(ConfigError::NoiseThreshold(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "history_capacity": 0 }"#),
            Err(ConfigError::HistoryCapacity)
        ));
        assert!(matches!(EngineConfig::from_json("not json"), Err(ConfigError::Parse(_))));
    }
}
