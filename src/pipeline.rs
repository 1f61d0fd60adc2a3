//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Motion. Each frame flows
//! through: smoothing → bar locator → calibration sampling → tracking health
//! → classification → quality → session tally.

use crate::bar::{BarEvent, BarReference, BarReferenceLocator};
use crate::calibration::{
    CalibrationEvent, CalibrationProfile, CalibrationSession, CalibrationStatus, CalibrationStep,
    CalibrationStore,
};
use crate::classifiers::{
    Classification, ClassifierContext, ClassifierRegistry, ExerciseClassifier, HingeClassifier,
};
use crate::config::EngineConfig;
use crate::encoder::{SessionEncoder, SessionSummary, SessionTally};
use crate::error::MotionError;
use crate::preprocess::FramePreprocessor;
use crate::quality::{QualityAggregate, RepQuality};
use crate::schema::{FrameAdapter, FrameEvent};
use crate::tracking::{assess_tracking, TrackingReport};
use crate::types::{DecisionEvent, ExerciseFamily, ExerciseState, LandmarkFrame, SmoothedFrame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything the renderer needs after one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub timestamp_ms: u64,
    pub state: ExerciseState,
    pub decision: DecisionEvent,
    pub tracking: TrackingReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<RepQuality>,
    pub calibration: CalibrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<BarReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_event: Option<BarEvent>,
}

/// Advance one exercise by one frame.
///
/// Pure: every input is explicit and the previous state is not modified. A
/// missing frame (no pose) forces the phase to unknown and keeps counters.
pub fn classify_frame(
    classifier: &dyn ExerciseClassifier,
    prev: &ExerciseState,
    frame: Option<&SmoothedFrame>,
    now_ms: u64,
    ctx: &ClassifierContext<'_>,
) -> Classification {
    match frame {
        Some(frame) => classifier.classify(prev, frame, now_ms, ctx),
        None => Classification::unknown(prev.clone(), "Step into view of the camera"),
    }
}

/// Replay a recorded frame stream for one exercise and return the session
/// summary JSON.
///
/// # Arguments
/// * `frames` - pose.frame.v1 frames as NDJSON or a JSON array
/// * `exercise_id` - Exercise id or alias (e.g. "squat", "jumping_jacks")
///
/// # Example
/// ```ignore
/// let summary_json = frames_to_session_summary(ndjson, "squat".to_string())?;
/// ```
pub fn frames_to_session_summary(
    frames: String,
    exercise_id: String,
) -> Result<String, MotionError> {
    let frames = FrameAdapter::to_landmark_frames(FrameAdapter::parse_auto(&frames)?)?;

    let mut processor = MotionProcessor::new();
    processor.select_exercise(&exercise_id)?;
    for frame in &frames {
        processor.process_frame(frame);
    }

    processor.finish_session_json()
}

/// Stateful processor owning every per-session record.
///
/// Calibration profiles persist across exercise switches and sessions; the
/// exercise state resets on every switch.
pub struct MotionProcessor {
    config: EngineConfig,
    registry: ClassifierRegistry,
    active: Arc<dyn ExerciseClassifier>,
    state: ExerciseState,
    preprocessor: FramePreprocessor,
    calibrations: CalibrationStore,
    calibration: CalibrationSession,
    bar: BarReferenceLocator,
    quality: QualityAggregate,
    tally: SessionTally,
    encoder: SessionEncoder,
    last_timestamp_ms: Option<u64>,
}

impl Default for MotionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionProcessor {
    /// Create a new processor with default settings; the active exercise is
    /// squat until another one is selected
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, MotionError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let active: Arc<dyn ExerciseClassifier> = Arc::new(HingeClassifier::squat());
        let mut tally = SessionTally::new();
        tally.touch(active.id());
        Self {
            state: ExerciseState::new(active.id()),
            preprocessor: FramePreprocessor::new(config.smoothing_alpha),
            calibration: CalibrationSession::new(&config),
            bar: BarReferenceLocator::new(&config),
            registry: ClassifierRegistry::with_defaults(),
            calibrations: CalibrationStore::new(),
            quality: QualityAggregate::new(),
            encoder: SessionEncoder::new(),
            last_timestamp_ms: None,
            active,
            tally,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }

    /// Add or replace an exercise strategy
    pub fn register_classifier(&mut self, classifier: Arc<dyn ExerciseClassifier>) {
        self.registry.register(classifier);
    }

    /// Switch the active exercise.
    ///
    /// Resets the exercise state and any in-flight calibration sampling. The
    /// previous exercise's calibration profile is left untouched.
    pub fn select_exercise(&mut self, exercise_id: &str) -> Result<(), MotionError> {
        let next = self.registry.resolve(exercise_id)?;

        if self.active.family() == ExerciseFamily::ReferenceLine && self.active.id() != next.id() {
            self.bar.clear();
        }

        self.active = next;
        self.state = ExerciseState::new(self.active.id());
        self.calibration.reset();
        self.tally.touch(self.active.id());
        log::info!("Selected exercise {}", self.active.id());

        if self.config.auto_calibrate && !self.calibrations.contains(self.active.id()) {
            self.calibration
                .start_auto(self.active.id(), &self.calibrations);
        }
        Ok(())
    }

    pub fn current_exercise(&self) -> &str {
        self.active.id()
    }

    pub fn classifier(&self) -> &dyn ExerciseClassifier {
        self.active.as_ref()
    }

    pub fn state(&self) -> &ExerciseState {
        &self.state
    }

    /// Process one frame.
    ///
    /// Returns `None` for duplicate or out-of-order timestamps, which are
    /// skipped without touching any state.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Option<FrameReport> {
        let now_ms = frame.timestamp_ms;
        if let Some(last) = self.last_timestamp_ms {
            if now_ms == last {
                log::debug!("Skipping duplicate frame at {}ms", now_ms);
                return None;
            }
            if now_ms < last {
                log::warn!("Skipping out-of-order frame at {}ms (last {}ms)", now_ms, last);
                return None;
            }
        }
        self.last_timestamp_ms = Some(now_ms);
        self.tally.observe_frame(now_ms);

        let smoothed = self.preprocessor.process(frame).cloned();
        let min_confidence = self.config.min_confidence;

        let bar_event = self.bar.observe(smoothed.as_ref(), now_ms, min_confidence);
        let bar = self.bar.reference().copied();

        let sampling_ctx = ClassifierContext {
            calibration: None,
            bar: bar.as_ref(),
            min_confidence,
        };
        let calibration_event = self.calibration.observe(
            self.active.as_ref(),
            smoothed.as_ref(),
            now_ms,
            &sampling_ctx,
            &mut self.calibrations,
        );

        let profile = self.calibrations.get(self.active.id()).cloned();
        let ctx = ClassifierContext {
            calibration: profile.as_ref(),
            bar: bar.as_ref(),
            min_confidence,
        };

        let tracking = assess_tracking(
            smoothed.as_ref(),
            self.active.required_groups(),
            min_confidence,
        );
        let Classification {
            state,
            decision,
            rep_rom_pct,
        } = classify_frame(
            self.active.as_ref(),
            &self.state,
            smoothed.as_ref(),
            now_ms,
            &ctx,
        );

        let quality = decision.is_rep().then(|| {
            let tempo_ms = self
                .state
                .last_rep_ms
                .map_or(0, |last| now_ms.saturating_sub(last));
            let rep = RepQuality::new(
                self.active.id(),
                state.rep_count,
                rep_rom_pct,
                tempo_ms,
                self.active.timing().min_tempo_ms,
            );
            self.quality.record(&rep);
            rep
        });

        self.tally.record(self.active.id(), &decision);
        self.state = state;

        Some(FrameReport {
            timestamp_ms: now_ms,
            state: self.state.clone(),
            decision,
            tracking,
            quality,
            calibration: self.calibration.status(
                self.active.as_ref(),
                now_ms,
                profile.is_some(),
                calibration_event,
            ),
            bar,
            bar_event,
        })
    }

    /// Parse, validate and process one pose.frame.v1 JSON frame
    pub fn process_frame_json(&mut self, json: &str) -> Result<Option<FrameReport>, MotionError> {
        let event: FrameEvent = serde_json::from_str(json)?;
        event
            .validate()
            .map_err(|e| MotionError::InvalidFrame(e.to_string()))?;
        Ok(self.process_frame(&LandmarkFrame::from(event)))
    }

    /// Capture one calibration extreme from the latest smoothed frame
    pub fn capture_calibration(
        &mut self,
        step: CalibrationStep,
    ) -> Result<CalibrationEvent, MotionError> {
        let bar = self.bar.reference().copied();
        let ctx = ClassifierContext {
            calibration: None,
            bar: bar.as_ref(),
            min_confidence: self.config.min_confidence,
        };
        self.calibration.capture_manual(
            self.active.as_ref(),
            step,
            self.preprocessor.last(),
            &ctx,
            &mut self.calibrations,
        )
    }

    /// Begin hands-free calibration for the active exercise
    pub fn start_auto_calibration(&mut self) {
        self.calibration
            .start_auto(self.active.id(), &self.calibrations);
    }

    /// Delete the active exercise's profile
    pub fn clear_calibration(&mut self) -> Option<CalibrationProfile> {
        self.calibration.reset();
        let removed = self.calibrations.remove(self.active.id());
        if self.config.auto_calibrate {
            self.start_auto_calibration();
        }
        removed
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        self.calibration.status(
            self.active.as_ref(),
            self.last_timestamp_ms.unwrap_or(0),
            self.calibrations.contains(self.active.id()),
            None,
        )
    }

    pub fn calibration_profile(&self) -> Option<&CalibrationProfile> {
        self.calibrations.get(self.active.id())
    }

    /// Load calibration profiles from JSON
    pub fn load_calibrations(&mut self, json: &str) -> Result<(), MotionError> {
        self.calibrations = CalibrationStore::from_json(json)
            .map_err(|e| MotionError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save calibration profiles to JSON
    pub fn save_calibrations(&self) -> Result<String, MotionError> {
        self.calibrations
            .to_json()
            .map_err(|e| MotionError::EncodingError(e.to_string()))
    }

    /// Record a tap on the preview; the second tap sets the bar
    pub fn bar_click(&mut self, x: f64, y: f64) -> Result<Option<BarReference>, MotionError> {
        self.bar.click(x, y)
    }

    pub fn start_bar_auto(&mut self) {
        self.bar.start_auto();
    }

    pub fn set_bar(&mut self, bar: BarReference) {
        self.bar.set(bar);
    }

    pub fn clear_bar(&mut self) {
        self.bar.clear();
    }

    pub fn bar_reference(&self) -> Option<&BarReference> {
        self.bar.reference()
    }

    /// Summarize the session and start a new one
    pub fn finish_session(&mut self) -> Result<SessionSummary, MotionError> {
        let summary = self.encoder.encode(&self.tally, self.quality.finish())?;
        self.tally = SessionTally::new();
        self.tally.touch(self.active.id());
        log::info!(
            "Session finished with {} reps across {} exercises",
            summary.total_reps(),
            summary.exercises.len()
        );
        Ok(summary)
    }

    /// Summarize the session as pretty JSON and start a new one
    pub fn finish_session_json(&mut self) -> Result<String, MotionError> {
        let summary = self.finish_session()?;
        serde_json::to_string_pretty(&summary).map_err(MotionError::JsonError)
    }
}
