//! Core types for the Synheart Motion engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: raw landmark frames, smoothed frames, per-exercise state and the
//! decision events handed to downstream consumers.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// Maximum number of keypoints in a frame (BlazePose topology)
pub const MAX_LANDMARKS: usize = 33;

/// BlazePose keypoint indices used by the classifiers
pub mod landmark {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
}

/// A single tracked keypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized horizontal position (0 = left edge)
    pub x: f64,
    /// Normalized vertical position (0 = top edge, grows downward)
    pub y: f64,
    /// Optional relative depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Detection confidence (0-1)
    #[serde(alias = "visibility")]
    pub confidence: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            confidence,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Raw frame delivered by the pose provider.
///
/// An empty landmark list means no pose was detected in this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture timestamp (milliseconds, monotonically non-decreasing)
    pub timestamp_ms: u64,
    /// Ordered keypoints
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(timestamp_ms: u64, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp_ms,
            landmarks,
        }
    }

    /// Frame with no detected pose
    pub fn empty(timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, Vec::new())
    }

    pub fn has_pose(&self) -> bool {
        !self.landmarks.is_empty()
    }
}

/// Landmark frame after exponential smoothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedFrame {
    pub timestamp_ms: u64,
    pub landmarks: Vec<Landmark>,
}

impl SmoothedFrame {
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// Position of a landmark if it passes the confidence gate
    pub fn point(&self, index: usize, min_confidence: f64) -> Option<Point> {
        self.landmark(index)
            .filter(|lm| lm.confidence >= min_confidence)
            .map(Landmark::point)
    }

    /// Positions of several landmarks, all of which must pass the gate
    pub fn points<const N: usize>(
        &self,
        indices: [usize; N],
        min_confidence: f64,
    ) -> Option<[Point; N]> {
        let mut out = [Point::default(); N];
        for (slot, index) in out.iter_mut().zip(indices) {
            *slot = self.point(index, min_confidence)?;
        }
        Some(out)
    }

    pub fn is_confident(&self, index: usize, min_confidence: f64) -> bool {
        self.point(index, min_confidence).is_some()
    }
}

/// Movement phase of the active exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unknown,
    Closed,
    Open,
    Up,
    Down,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unknown => "unknown",
            Phase::Closed => "closed",
            Phase::Open => "open",
            Phase::Up => "up",
            Phase::Down => "down",
        }
    }
}

/// Body side that performed the last qualifying movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    #[default]
    None,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::None => Side::None,
        }
    }
}

/// Exercise family; selects the state-machine shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseFamily {
    OpenClose,
    Hinge,
    AlternatingLift,
    MultiGate,
    ReferenceLine,
}

impl ExerciseFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseFamily::OpenClose => "open_close",
            ExerciseFamily::Hinge => "hinge",
            ExerciseFamily::AlternatingLift => "alternating_lift",
            ExerciseFamily::MultiGate => "multi_gate",
            ExerciseFamily::ReferenceLine => "reference_line",
        }
    }
}

/// Why a completed movement cycle was not counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Cycle completed faster than the exercise's minimum rep duration
    TooFast,
    /// The extreme position was never reached during the cycle
    InsufficientRange,
    /// Same limb lifted twice in a row on an alternating exercise
    SameSide,
}

/// Per-frame outcome of attempting to count a repetition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionEvent {
    #[default]
    None,
    Rep {
        rep_count: u32,
        message: String,
    },
    Reject {
        reason: RejectReason,
        message: String,
    },
}

impl DecisionEvent {
    pub fn is_none(&self) -> bool {
        matches!(self, DecisionEvent::None)
    }

    pub fn is_rep(&self) -> bool {
        matches!(self, DecisionEvent::Rep { .. })
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, DecisionEvent::Reject { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            DecisionEvent::None => None,
            DecisionEvent::Rep { message, .. } | DecisionEvent::Reject { message, .. } => {
                Some(message)
            }
        }
    }
}

/// Progress through the current movement cycle.
///
/// `reached_extreme` is set while the inner phase visits its extreme and is
/// cleared only when a rep is counted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CycleState {
    /// The "deep enough" / "open enough" extreme was visited
    pub reached_extreme: bool,
    /// Limb used for the last counted alternating lift
    pub last_active_side: Side,
    /// When the cycle left its rest phase (ms)
    pub started_ms: Option<u64>,
    /// Best range-of-motion percentage observed during this cycle
    pub peak_rom_pct: Option<f64>,
}

impl CycleState {
    pub fn record_rom(&mut self, pct: f64) {
        self.peak_rom_pct = Some(self.peak_rom_pct.map_or(pct, |peak| peak.max(pct)));
    }
}

/// Live state of the active exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseState {
    pub exercise_id: String,
    pub phase: Phase,
    pub rep_count: u32,
    pub last_phase_change_ms: Option<u64>,
    pub last_rep_ms: Option<u64>,
    pub cycle: CycleState,
    /// Human-readable cue for the renderer
    pub feedback: String,
    /// Current depth/openness (0-100) when measurable
    pub rom_pct: Option<f64>,
}

impl ExerciseState {
    /// Fresh state for a newly selected exercise
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            phase: Phase::Unknown,
            rep_count: 0,
            last_phase_change_ms: None,
            last_rep_ms: None,
            cycle: CycleState::default(),
            feedback: String::new(),
            rom_pct: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_requires_every_landmark() {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.9); 3];
        landmarks[2].confidence = 0.2;
        let frame = SmoothedFrame {
            timestamp_ms: 0,
            landmarks,
        };

        assert!(frame.points([0, 1], 0.5).is_some());
        assert!(frame.points([0, 2], 0.5).is_none());
        assert!(frame.points([0, 40], 0.5).is_none());
    }

    #[test]
    fn test_decision_event_serialization() {
        let event = DecisionEvent::Reject {
            reason: RejectReason::TooFast,
            message: "Too fast".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "reject");
        assert_eq!(json["reason"], "too_fast");

        let none = serde_json::to_value(DecisionEvent::None).unwrap();
        assert_eq!(none["kind"], "none");
    }

    #[test]
    fn test_landmark_accepts_visibility_alias() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.1,"y":0.2,"visibility":0.8}"#).unwrap();
        assert_eq!(lm.confidence, 0.8);
        assert_eq!(lm.z, None);
    }

    #[test]
    fn test_cycle_peak_keeps_maximum() {
        let mut cycle = CycleState::default();
        cycle.record_rom(40.0);
        cycle.record_rom(72.0);
        cycle.record_rom(55.0);
        assert_eq!(cycle.peak_rom_pct, Some(72.0));
    }
}
