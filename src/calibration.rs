//! Calibration management
//!
//! This module personalizes classifier thresholds. Each exercise has two named
//! extremes (top/bottom, closed/open, ...) captured either on request
//! (manual) or by holding a stable pose (hands-free). Captured values live in
//! a per-exercise profile that survives exercise resets and sessions.

use crate::classifiers::{ClassifierContext, ExerciseClassifier};
use crate::config::EngineConfig;
use crate::error::MotionError;
use crate::types::SmoothedFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the two extremes captured per exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    First,
    Second,
}

impl CalibrationStep {
    pub fn index(&self) -> usize {
        match self {
            CalibrationStep::First => 0,
            CalibrationStep::Second => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(CalibrationStep::First),
            1 => Some(CalibrationStep::Second),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            CalibrationStep::First => Some(CalibrationStep::Second),
            CalibrationStep::Second => None,
        }
    }
}

/// Measured extreme values for one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub exercise_id: String,
    /// Named extreme values (e.g. `top_angle`, `open_ratio`)
    pub values: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

impl CalibrationProfile {
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            values: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
        self.updated_at = Utc::now();
    }

    /// Overwrite the given keys, leaving every other value untouched
    pub fn merge(&mut self, values: &[(&'static str, f64)]) {
        for (key, value) in values {
            self.set(key, *value);
        }
    }
}

/// Persistent collection of calibration profiles keyed by exercise id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStore {
    profiles: BTreeMap<String, CalibrationProfile>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, exercise_id: &str) -> Option<&CalibrationProfile> {
        self.profiles.get(exercise_id)
    }

    pub fn contains(&self, exercise_id: &str) -> bool {
        self.profiles.contains_key(exercise_id)
    }

    pub fn upsert(&mut self, profile: CalibrationProfile) {
        self.profiles.insert(profile.exercise_id.clone(), profile);
    }

    pub fn remove(&mut self, exercise_id: &str) -> Option<CalibrationProfile> {
        self.profiles.remove(exercise_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn exercise_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Load calibration store from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize calibration store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// How the current sampling run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    Manual,
    Auto,
}

/// Calibration lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalibrationPhase {
    #[default]
    Idle,
    Sampling {
        step: CalibrationStep,
        mode: CalibrationMode,
    },
    Done,
}

/// Something that happened to calibration during one frame or request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CalibrationEvent {
    Captured { step: CalibrationStep },
    Completed,
    Aborted,
}

/// Calibration snapshot included in each frame report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStatus {
    #[serde(flatten)]
    pub phase: CalibrationPhase,
    /// Name of the extreme being sampled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    /// How long the current pose has been held (ms)
    pub stable_ms: u64,
    /// A profile exists for the active exercise
    pub calibrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<CalibrationEvent>,
}

/// Two-step calibration state machine for the active exercise
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    phase: CalibrationPhase,
    draft: Option<CalibrationProfile>,
    stable_since_ms: Option<u64>,
    last_capture_ms: Option<u64>,
    step_started_ms: Option<u64>,
    stable_window_ms: u64,
    cooldown_ms: u64,
    timeout_ms: u64,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CalibrationSession {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            draft: None,
            stable_since_ms: None,
            last_capture_ms: None,
            step_started_ms: None,
            stable_window_ms: config.calibration_stable_ms,
            cooldown_ms: config.calibration_cooldown_ms,
            timeout_ms: config.calibration_timeout_ms,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Drop any in-flight sampling and return to idle
    pub fn reset(&mut self) {
        self.phase = CalibrationPhase::Idle;
        self.draft = None;
        self.stable_since_ms = None;
        self.last_capture_ms = None;
        self.step_started_ms = None;
    }

    /// Begin hands-free sampling from the first step.
    ///
    /// The draft starts from the stored profile so a partial run never loses
    /// earlier values; nothing is written to the store until both steps land.
    pub fn start_auto(&mut self, exercise_id: &str, store: &CalibrationStore) {
        self.reset();
        self.draft = Some(
            store
                .get(exercise_id)
                .cloned()
                .unwrap_or_else(|| CalibrationProfile::new(exercise_id)),
        );
        self.phase = CalibrationPhase::Sampling {
            step: CalibrationStep::First,
            mode: CalibrationMode::Auto,
        };
        log::info!("Hands-free calibration started for {}", exercise_id);
    }

    /// How long the current pose has been held
    pub fn stable_ms(&self, now_ms: u64) -> u64 {
        self.stable_since_ms
            .map(|since| now_ms.saturating_sub(since))
            .unwrap_or(0)
    }

    /// Capture the given step from the current frame and write it to the store
    pub fn capture_manual(
        &mut self,
        classifier: &dyn ExerciseClassifier,
        step: CalibrationStep,
        frame: Option<&SmoothedFrame>,
        ctx: &ClassifierContext<'_>,
        store: &mut CalibrationStore,
    ) -> Result<CalibrationEvent, MotionError> {
        let frame = frame.ok_or_else(|| {
            MotionError::CalibrationError("no pose available to capture".to_string())
        })?;
        let values = classifier.extract_calibration(step, frame, ctx).ok_or_else(|| {
            MotionError::CalibrationError(format!(
                "landmarks for {} '{}' are not confidently visible",
                classifier.id(),
                classifier.calibration_steps()[step.index()]
            ))
        })?;

        let mut profile = store
            .get(classifier.id())
            .cloned()
            .unwrap_or_else(|| CalibrationProfile::new(classifier.id()));
        profile.merge(&values);
        store.upsert(profile);

        self.draft = None;
        self.stable_since_ms = None;
        self.last_capture_ms = Some(frame.timestamp_ms);
        log::info!(
            "Captured {} calibration step '{}'",
            classifier.id(),
            classifier.calibration_steps()[step.index()]
        );

        match step.next() {
            Some(next) => {
                self.phase = CalibrationPhase::Sampling {
                    step: next,
                    mode: CalibrationMode::Manual,
                };
                Ok(CalibrationEvent::Captured { step })
            }
            None => {
                self.phase = CalibrationPhase::Done;
                Ok(CalibrationEvent::Completed)
            }
        }
    }

    /// Feed one frame to hands-free sampling
    pub fn observe(
        &mut self,
        classifier: &dyn ExerciseClassifier,
        frame: Option<&SmoothedFrame>,
        now_ms: u64,
        ctx: &ClassifierContext<'_>,
        store: &mut CalibrationStore,
    ) -> Option<CalibrationEvent> {
        let CalibrationPhase::Sampling {
            step,
            mode: CalibrationMode::Auto,
        } = self.phase
        else {
            return None;
        };

        let step_started = *self.step_started_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(step_started) > self.timeout_ms {
            log::warn!(
                "Hands-free calibration for {} timed out on step '{}'",
                classifier.id(),
                classifier.calibration_steps()[step.index()]
            );
            self.reset();
            return Some(CalibrationEvent::Aborted);
        }

        let frame = match frame {
            Some(frame) if classifier.is_stable(step, frame, ctx) => frame,
            _ => {
                self.stable_since_ms = None;
                return None;
            }
        };

        let since = *self.stable_since_ms.get_or_insert(now_ms);
        let held_long_enough = now_ms.saturating_sub(since) >= self.stable_window_ms;
        let cooled_down = self
            .last_capture_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.cooldown_ms);
        if !held_long_enough || !cooled_down {
            return None;
        }

        let Some(values) = classifier.extract_calibration(step, frame, ctx) else {
            self.stable_since_ms = None;
            return None;
        };

        let draft = self
            .draft
            .get_or_insert_with(|| CalibrationProfile::new(classifier.id()));
        draft.merge(&values);
        self.last_capture_ms = Some(now_ms);
        self.stable_since_ms = None;
        self.step_started_ms = Some(now_ms);
        log::info!(
            "Hands-free capture of {} step '{}'",
            classifier.id(),
            classifier.calibration_steps()[step.index()]
        );

        match step.next() {
            Some(next) => {
                self.phase = CalibrationPhase::Sampling {
                    step: next,
                    mode: CalibrationMode::Auto,
                };
                Some(CalibrationEvent::Captured { step })
            }
            None => {
                if let Some(profile) = self.draft.take() {
                    store.upsert(profile);
                }
                self.phase = CalibrationPhase::Done;
                Some(CalibrationEvent::Completed)
            }
        }
    }

    /// Status snapshot for the frame report
    pub fn status(
        &self,
        classifier: &dyn ExerciseClassifier,
        now_ms: u64,
        calibrated: bool,
        event: Option<CalibrationEvent>,
    ) -> CalibrationStatus {
        let step_name = match self.phase {
            CalibrationPhase::Sampling { step, .. } => {
                Some(classifier.calibration_steps()[step.index()].to_string())
            }
            _ => None,
        };
        CalibrationStatus {
            phase: self.phase,
            step_name,
            stable_ms: self.stable_ms(now_ms),
            calibrated,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::hinge::HingeClassifier;
    use crate::classifiers::test_support::squat_frame;

    fn ctx() -> ClassifierContext<'static> {
        ClassifierContext {
            calibration: None,
            bar: None,
            min_confidence: 0.5,
        }
    }

    #[test]
    fn test_store_serialization() {
        let mut store = CalibrationStore::new();
        let mut profile = CalibrationProfile::new("squat");
        profile.set("top_angle", 172.0);
        profile.set("bottom_angle", 98.0);
        store.upsert(profile);

        let loaded = CalibrationStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.get("squat").unwrap().get("bottom_angle"), Some(98.0));
    }

    #[test]
    fn test_manual_capture_keeps_other_step() {
        let squat = HingeClassifier::squat();
        let mut store = CalibrationStore::new();
        let mut profile = CalibrationProfile::new("squat");
        profile.set("bottom_angle", 100.0);
        store.upsert(profile);

        let mut session = CalibrationSession::default();
        let frame = squat_frame(0, 170.0);
        let event = session
            .capture_manual(&squat, CalibrationStep::First, Some(&frame), &ctx(), &mut store)
            .unwrap();

        assert_eq!(event, CalibrationEvent::Captured { step: CalibrationStep::First });
        let profile = store.get("squat").unwrap();
        assert!((profile.get("top_angle").unwrap() - 170.0).abs() < 0.5);
        assert_eq!(profile.get("bottom_angle"), Some(100.0));
        assert_eq!(
            session.phase(),
            CalibrationPhase::Sampling {
                step: CalibrationStep::Second,
                mode: CalibrationMode::Manual
            }
        );
    }

    #[test]
    fn test_manual_capture_without_pose_fails() {
        let squat = HingeClassifier::squat();
        let mut store = CalibrationStore::new();
        let mut session = CalibrationSession::default();

        let result =
            session.capture_manual(&squat, CalibrationStep::First, None, &ctx(), &mut store);
        assert!(matches!(result, Err(MotionError::CalibrationError(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_auto_capture_after_full_window() {
        let squat = HingeClassifier::squat();
        let mut store = CalibrationStore::new();
        let mut session = CalibrationSession::default();
        session.start_auto("squat", &store);

        let mut events = Vec::new();
        for ts in (0..=900).step_by(100) {
            let frame = squat_frame(ts, 172.0);
            events.extend(session.observe(&squat, Some(&frame), ts, &ctx(), &mut store));
        }

        assert_eq!(events, vec![CalibrationEvent::Captured { step: CalibrationStep::First }]);
        // Nothing is committed until both steps are captured
        assert!(store.is_empty());

        for ts in (1700..=2700).step_by(100) {
            let frame = squat_frame(ts, 100.0);
            events.extend(session.observe(&squat, Some(&frame), ts, &ctx(), &mut store));
        }

        assert_eq!(events.last(), Some(&CalibrationEvent::Completed));
        assert_eq!(session.phase(), CalibrationPhase::Done);
        let profile = store.get("squat").unwrap();
        assert!((profile.get("top_angle").unwrap() - 172.0).abs() < 0.5);
        assert!((profile.get("bottom_angle").unwrap() - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_interrupted_stability_does_not_capture() {
        let squat = HingeClassifier::squat();
        let mut store = CalibrationStore::new();
        let mut session = CalibrationSession::default();
        session.start_auto("squat", &store);

        for ts in (0..890).step_by(10) {
            let frame = squat_frame(ts, 172.0);
            assert_eq!(session.observe(&squat, Some(&frame), ts, &ctx(), &mut store), None);
        }
        // Pose breaks at 890ms, just under the window
        let bent = squat_frame(890, 140.0);
        assert_eq!(session.observe(&squat, Some(&bent), 890, &ctx(), &mut store), None);
        assert_eq!(session.stable_ms(890), 0);

        // Stable again, but the window restarts
        for ts in (900..1700).step_by(100) {
            let frame = squat_frame(ts, 172.0);
            assert_eq!(session.observe(&squat, Some(&frame), ts, &ctx(), &mut store), None);
        }
        assert_eq!(
            session.phase(),
            CalibrationPhase::Sampling {
                step: CalibrationStep::First,
                mode: CalibrationMode::Auto
            }
        );
    }

    #[test]
    fn test_dropout_resets_stable_duration() {
        let squat = HingeClassifier::squat();
        let mut store = CalibrationStore::new();
        let mut session = CalibrationSession::default();
        session.start_auto("squat", &store);

        let frame = squat_frame(0, 172.0);
        session.observe(&squat, Some(&frame), 0, &ctx(), &mut store);
        session.observe(&squat, None, 500, &ctx(), &mut store);
        assert_eq!(session.stable_ms(500), 0);
        assert!(matches!(session.phase(), CalibrationPhase::Sampling { .. }));
    }

    #[test]
    fn test_timeout_aborts_without_touching_store() {
        let squat = HingeClassifier::squat();
        let mut store = CalibrationStore::new();
        let mut session = CalibrationSession::default();
        session.start_auto("squat", &store);

        let bent = squat_frame(0, 140.0);
        assert_eq!(session.observe(&squat, Some(&bent), 0, &ctx(), &mut store), None);
        let late = squat_frame(15_001, 140.0);
        assert_eq!(
            session.observe(&squat, Some(&late), 15_001, &ctx(), &mut store),
            Some(CalibrationEvent::Aborted)
        );
        assert_eq!(session.phase(), CalibrationPhase::Idle);
        assert!(store.is_empty());
    }
}
