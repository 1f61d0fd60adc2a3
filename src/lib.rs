//! Synheart Motion - On-device repetition counting from pose landmarks
//!
//! Motion turns per-frame body landmarks into counted exercise repetitions
//! through a deterministic pipeline: frame smoothing → tracking health →
//! exercise classification → rep quality → session summary.
//!
//! ## Modules
//!
//! - **Classifiers**: Hysteresis state machines for the supported exercise families
//! - **Calibration**: Per-exercise extremes captured manually or hands-free
//! - **Bar reference**: Horizontal bar line for pull-up style exercises

pub mod bar;
pub mod calibration;
pub mod classifiers;
pub mod config;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod preprocess;
pub mod quality;
pub mod schema;
pub mod tracking;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bar::{BarReference, BarReferenceLocator};
pub use calibration::{CalibrationProfile, CalibrationStep, CalibrationStore};
pub use classifiers::{ClassifierRegistry, ExerciseClassifier};
pub use config::EngineConfig;
pub use encoder::{SessionEncoder, SessionSummary};
pub use error::MotionError;
pub use pipeline::{classify_frame, frames_to_session_summary, FrameReport, MotionProcessor};
pub use quality::{QualityLabel, RepQuality};
pub use types::{DecisionEvent, ExerciseState, LandmarkFrame, Phase};

// Schema exports
pub use schema::{FrameAdapter, FrameEvent, SCHEMA_VERSION};

/// Motion version embedded in all session payloads
pub const MOTION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session payloads
pub const PRODUCER_NAME: &str = "synheart-motion";
