//! Error types for Synheart Motion
//!
//! The per-frame engine never fails: visibility gaps, debounce suppression and
//! rejected attempts all degrade to "no progress this frame". These errors only
//! surface at the edges (parsing, persistence, exercise selection, capture
//! requests).

use thiserror::Error;

/// Errors that can occur outside the per-frame classification pass
#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Failed to parse frame payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unknown exercise: {0}")]
    UnknownExercise(String),

    #[error("Calibration error: {0}")]
    CalibrationError(String),

    #[error("Bar reference error: {0}")]
    BarReferenceError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
