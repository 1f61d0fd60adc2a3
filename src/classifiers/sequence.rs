//! Multi-gate sequence classifier (burpee)
//!
//! Each frame is matched against three pose gates (stand, crouch, plank).
//! A rep is a return to standing after the plank was reached; frames that
//! match no gate keep the current phase.

use super::hinge::knee_angle;
use super::{
    advance_phase, feedback_for, Classification, ClassifierContext, CountingEdge, CycleMessages,
    ExerciseClassifier, Extremes, Timing,
};
use crate::calibration::CalibrationStep;
use crate::geometry::{weighted_midpoint, Point};
use crate::tracking::LandmarkGroup;
use crate::types::{landmark, ExerciseFamily, ExerciseState, Phase, SmoothedFrame};

const DEFAULT_TILT: Extremes = Extremes::new(90.0, 0.0);

pub const PLANK_MAX_TILT: f64 = 35.0;
pub const PLANK_MIN_KNEE: f64 = 140.0;
pub const CROUCH_MAX_KNEE: f64 = 110.0;
pub const STAND_MIN_TILT: f64 = 60.0;
pub const STAND_MIN_KNEE: f64 = 150.0;

/// stand = up, crouch = down, plank = open
const EDGE: CountingEdge = CountingEdge {
    from: &[Phase::Down, Phase::Open],
    to: Phase::Up,
};

const MESSAGES: CycleMessages = CycleMessages {
    too_fast: "Too fast - hit every position",
    insufficient_range: "Kick back to a full plank",
};

const REQUIRED: &[LandmarkGroup] = &[LandmarkGroup::LowerBody, LandmarkGroup::UpperBody];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    /// Torso angle above horizontal (90 = upright)
    pub torso_tilt: f64,
    pub knee_angle: f64,
    pub shoulders_above_hips: bool,
}

fn side_midpoint(
    frame: &SmoothedFrame,
    left: usize,
    right: usize,
    min_confidence: f64,
) -> Option<Point> {
    let l = frame.landmark(left).filter(|lm| lm.confidence >= min_confidence);
    let r = frame.landmark(right).filter(|lm| lm.confidence >= min_confidence);
    match (l, r) {
        (Some(l), Some(r)) => Some(weighted_midpoint(l.point(), l.confidence, r.point(), r.confidence)),
        (Some(only), None) | (None, Some(only)) => Some(only.point()),
        (None, None) => None,
    }
}

impl BodyPose {
    pub fn measure(frame: &SmoothedFrame, min_confidence: f64) -> Option<Self> {
        let shoulders = side_midpoint(
            frame,
            landmark::LEFT_SHOULDER,
            landmark::RIGHT_SHOULDER,
            min_confidence,
        )?;
        let hips = side_midpoint(frame, landmark::LEFT_HIP, landmark::RIGHT_HIP, min_confidence)?;
        let knee_angle = knee_angle(frame, min_confidence)?;

        let dx = (shoulders.x - hips.x).abs();
        let dy = (shoulders.y - hips.y).abs();
        Some(Self {
            torso_tilt: dy.atan2(dx).to_degrees(),
            knee_angle,
            shoulders_above_hips: shoulders.y < hips.y,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MultiGateClassifier {
    id: &'static str,
    timing: Timing,
}

impl MultiGateClassifier {
    pub fn new(id: &'static str, timing: Timing) -> Self {
        Self { id, timing }
    }

    pub fn burpee() -> Self {
        Self::new(
            "burpee",
            Timing {
                min_phase_ms: 220,
                min_rep_ms: 950,
                min_tempo_ms: 650,
            },
        )
    }

    /// Gate matched by `pose`; plank wins over crouch, crouch over stand
    fn gate(&self, pose: &BodyPose, tilt: &Extremes) -> Option<Phase> {
        let plank_tilt = DEFAULT_TILT.scale(PLANK_MAX_TILT, tilt);
        let stand_tilt = DEFAULT_TILT.scale(STAND_MIN_TILT, tilt);

        if pose.torso_tilt < plank_tilt && pose.knee_angle > PLANK_MIN_KNEE {
            Some(Phase::Open)
        } else if pose.knee_angle < CROUCH_MAX_KNEE {
            Some(Phase::Down)
        } else if pose.torso_tilt > stand_tilt
            && pose.knee_angle > STAND_MIN_KNEE
            && pose.shoulders_above_hips
        {
            Some(Phase::Up)
        } else {
            None
        }
    }
}

impl ExerciseClassifier for MultiGateClassifier {
    fn id(&self) -> &str {
        self.id
    }

    fn family(&self) -> ExerciseFamily {
        ExerciseFamily::MultiGate
    }

    fn required_groups(&self) -> &'static [LandmarkGroup] {
        REQUIRED
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn calibration_steps(&self) -> [&'static str; 2] {
        ["stand", "plank"]
    }

    fn extract_calibration(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> Option<Vec<(&'static str, f64)>> {
        let pose = BodyPose::measure(frame, ctx.min_confidence)?;
        let key = match step {
            CalibrationStep::First => "stand_tilt",
            CalibrationStep::Second => "plank_tilt",
        };
        Some(vec![(key, pose.torso_tilt)])
    }

    fn is_stable(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> bool {
        let Some(pose) = BodyPose::measure(frame, ctx.min_confidence) else {
            return false;
        };
        match step {
            CalibrationStep::First => pose.torso_tilt > 70.0 && pose.knee_angle > 160.0,
            CalibrationStep::Second => pose.torso_tilt < 25.0 && pose.knee_angle > 150.0,
        }
    }

    fn classify(
        &self,
        prev: &ExerciseState,
        frame: &SmoothedFrame,
        now_ms: u64,
        ctx: &ClassifierContext<'_>,
    ) -> Classification {
        let mut state = prev.clone();
        let Some(pose) = BodyPose::measure(frame, ctx.min_confidence) else {
            return Classification::unknown(state, "Turn sideways and keep your whole body in view");
        };

        let tilt = DEFAULT_TILT.calibrated(ctx, "stand_tilt", "plank_tilt");
        let rom = tilt.progress_pct(pose.torso_tilt);
        state.rom_pct = Some(rom);
        state.cycle.record_rom(rom);

        let candidate = self.gate(&pose, &tilt).unwrap_or(state.phase);
        let outcome = advance_phase(&mut state, candidate, now_ms, self.timing, EDGE, MESSAGES);

        if state.phase == Phase::Open {
            state.cycle.reached_extreme = true;
        }

        let cue = match state.phase {
            Phase::Up => "Drop into a squat",
            Phase::Down if state.cycle.reached_extreme => "Jump back up",
            Phase::Down => "Kick back to plank",
            Phase::Open => "Bring your feet in",
            _ => "Stand tall to start",
        };
        state.feedback = feedback_for(&outcome.decision, cue.to_string());

        Classification {
            state,
            rep_rom_pct: if outcome.decision.is_rep() {
                outcome.rom_pct
            } else {
                None
            },
            decision: outcome.decision,
        }
    }
}
