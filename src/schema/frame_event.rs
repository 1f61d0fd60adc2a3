//! pose.frame.v1 event definition

use crate::types::{Landmark, LandmarkFrame, MAX_LANDMARKS};
use serde::{Deserialize, Serialize};

/// Current input schema version
pub const SCHEMA_VERSION: &str = "pose.frame.v1";

/// One frame from the pose provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    /// Schema version; optional on input, always written on output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,

    /// Provider-assigned frame identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,

    /// Capture timestamp in milliseconds
    pub timestamp_ms: u64,

    /// Keypoints in BlazePose order; empty or missing means no pose
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl FrameEvent {
    pub fn new(timestamp_ms: u64, landmarks: Vec<Landmark>) -> Self {
        Self {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            frame_id: None,
            timestamp_ms,
            landmarks,
        }
    }

    /// Check a single frame
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(ValidationError::InvalidSchemaVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: version.clone(),
                });
            }
        }

        if self.landmarks.len() > MAX_LANDMARKS {
            return Err(ValidationError::TooManyLandmarks {
                count: self.landmarks.len(),
                max: MAX_LANDMARKS,
            });
        }

        for (index, lm) in self.landmarks.iter().enumerate() {
            let finite = lm.x.is_finite() && lm.y.is_finite() && lm.z.map_or(true, f64::is_finite);
            if !finite {
                return Err(ValidationError::NonFiniteCoordinate { index });
            }
            if !(0.0..=1.0).contains(&lm.confidence) {
                return Err(ValidationError::ConfidenceOutOfRange {
                    index,
                    value: lm.confidence,
                });
            }
        }

        Ok(())
    }

    pub fn to_landmark_frame(&self) -> LandmarkFrame {
        LandmarkFrame::new(self.timestamp_ms, self.landmarks.clone())
    }
}

impl From<FrameEvent> for LandmarkFrame {
    fn from(event: FrameEvent) -> Self {
        LandmarkFrame::new(event.timestamp_ms, event.landmarks)
    }
}

impl From<&LandmarkFrame> for FrameEvent {
    fn from(frame: &LandmarkFrame) -> Self {
        FrameEvent::new(frame.timestamp_ms, frame.landmarks.clone())
    }
}

/// Validation errors for frame events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Too many landmarks: {count} (max {max})")]
    TooManyLandmarks { count: usize, max: usize },

    #[error("Landmark {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },

    #[error("Landmark {index} confidence {value} is outside [0, 1]")]
    ConfidenceOutOfRange { index: usize, value: f64 },

    #[error("Timestamp went backwards: {actual} after {previous}")]
    TimestampRegression { previous: u64, actual: u64 },
}
