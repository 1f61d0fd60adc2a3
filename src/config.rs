//! Engine configuration
//!
//! Every field has a default so partial JSON files can override only what
//! they need.

use crate::error::MotionError;
use serde::{Deserialize, Serialize};

/// Default exponential smoothing factor for landmark coordinates
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.25;

/// Default per-landmark confidence gate
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Tunables shared by every stage of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Blend factor applied to new coordinates (0-1]
    pub smoothing_alpha: f64,
    /// Minimum landmark confidence trusted by geometry
    pub min_confidence: f64,
    /// Start hands-free calibration when an exercise without a profile is selected
    pub auto_calibrate: bool,
    /// Continuous stability required before an autonomous capture (ms)
    pub calibration_stable_ms: u64,
    /// Minimum gap between two autonomous captures (ms)
    pub calibration_cooldown_ms: u64,
    /// Autonomous sampling gives up on a step after this long (ms)
    pub calibration_timeout_ms: u64,
    /// Wrist sampling window for the automatic bar reference (ms)
    pub bar_sample_window_ms: u64,
    /// Confident wrist samples required to place the bar automatically
    pub bar_min_samples: usize,
    /// Distance the automatic bar line sits below the hands
    pub bar_hand_offset: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            auto_calibrate: false,
            calibration_stable_ms: 900,
            calibration_cooldown_ms: 700,
            calibration_timeout_ms: 15_000,
            bar_sample_window_ms: 900,
            bar_min_samples: 10,
            bar_hand_offset: 0.015,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, MotionError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), MotionError> {
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(MotionError::ConfigError(format!(
                "smoothing_alpha must be in (0, 1], got {}",
                self.smoothing_alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(MotionError::ConfigError(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.bar_min_samples == 0 {
            return Err(MotionError::ConfigError(
                "bar_min_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"min_confidence": 0.6}"#).unwrap();
        assert_eq!(
            config,
            EngineConfig {
                min_confidence: 0.6,
                ..EngineConfig::default()
            }
        );
    }

    #[test]
    fn test_rejects_out_of_range_alpha() {
        let result = EngineConfig::from_json(r#"{"smoothing_alpha": 0.0}"#);
        assert!(matches!(result, Err(MotionError::ConfigError(_))));
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig {
            auto_calibrate: true,
            ..EngineConfig::default()
        };
        let loaded = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, loaded);
    }
}
