//! Single-hinge angle classifier (squat, lunge, jump squat)
//!
//! Discriminant: the smaller of the left/right hip-knee-ankle angles.
//! Counting edge: down → up.

use super::{
    advance_phase, feedback_for, Classification, ClassifierContext, CountingEdge, CycleMessages,
    ExerciseClassifier, Extremes, Timing,
};
use crate::calibration::CalibrationStep;
use crate::geometry::angle_at_vertex;
use crate::tracking::LandmarkGroup;
use crate::types::{landmark, ExerciseFamily, ExerciseState, Phase, SmoothedFrame};

/// Standing and bottom knee angles the default thresholds are expressed against
pub const DEFAULT_EXTREMES: (f64, f64) = (175.0, 95.0);

pub const DOWN_ENTER_DEG: f64 = 115.0;
pub const DOWN_EXIT_DEG: f64 = 135.0;
pub const UP_ENTER_DEG: f64 = 165.0;
pub const UP_EXIT_DEG: f64 = 155.0;

const TOP_KEY: &str = "top_angle";
const BOTTOM_KEY: &str = "bottom_angle";

const EDGE: CountingEdge = CountingEdge {
    from: &[Phase::Down],
    to: Phase::Up,
};

const MESSAGES: CycleMessages = CycleMessages {
    too_fast: "Too fast - control the descent",
    insufficient_range: "Go deeper",
};

const REQUIRED: &[LandmarkGroup] = &[LandmarkGroup::LowerBody];

/// Knee-hinge classifier parameterized by exercise timing
#[derive(Debug, Clone)]
pub struct HingeClassifier {
    id: &'static str,
    timing: Timing,
}

/// Thresholds after calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeThresholds {
    pub extremes: (f64, f64),
    pub down_enter: f64,
    pub down_exit: f64,
    pub up_enter: f64,
    pub up_exit: f64,
}

impl HingeClassifier {
    pub fn new(id: &'static str, timing: Timing) -> Self {
        Self { id, timing }
    }

    pub fn squat() -> Self {
        Self::new(
            "squat",
            Timing {
                min_phase_ms: 220,
                min_rep_ms: 700,
                min_tempo_ms: 700,
            },
        )
    }

    pub fn lunge() -> Self {
        Self::new(
            "lunge",
            Timing {
                min_phase_ms: 220,
                min_rep_ms: 750,
                min_tempo_ms: 750,
            },
        )
    }

    /// Explosive variant with shorter guards
    pub fn jump_squat() -> Self {
        Self::new(
            "jump_squat",
            Timing {
                min_phase_ms: 200,
                min_rep_ms: 520,
                min_tempo_ms: 520,
            },
        )
    }

    pub fn thresholds(&self, ctx: &ClassifierContext<'_>) -> HingeThresholds {
        let defaults = Extremes::new(DEFAULT_EXTREMES.0, DEFAULT_EXTREMES.1);
        let actual = defaults.calibrated(ctx, TOP_KEY, BOTTOM_KEY);
        HingeThresholds {
            extremes: (actual.rest, actual.extreme),
            down_enter: defaults.scale(DOWN_ENTER_DEG, &actual),
            down_exit: defaults.scale(DOWN_EXIT_DEG, &actual),
            up_enter: defaults.scale(UP_ENTER_DEG, &actual),
            up_exit: defaults.scale(UP_EXIT_DEG, &actual),
        }
    }
}

/// Smallest confident knee angle across both legs
pub fn knee_angle(frame: &SmoothedFrame, min_confidence: f64) -> Option<f64> {
    [
        [landmark::LEFT_HIP, landmark::LEFT_KNEE, landmark::LEFT_ANKLE],
        [landmark::RIGHT_HIP, landmark::RIGHT_KNEE, landmark::RIGHT_ANKLE],
    ]
    .into_iter()
    .filter_map(|chain| frame.points(chain, min_confidence))
    .map(|[hip, knee, ankle]| angle_at_vertex(hip, knee, ankle))
    .min_by(|a, b| a.total_cmp(b))
}

impl ExerciseClassifier for HingeClassifier {
    fn id(&self) -> &str {
        self.id
    }

    fn family(&self) -> ExerciseFamily {
        ExerciseFamily::Hinge
    }

    fn required_groups(&self) -> &'static [LandmarkGroup] {
        REQUIRED
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn calibration_steps(&self) -> [&'static str; 2] {
        ["top", "bottom"]
    }

    fn extract_calibration(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> Option<Vec<(&'static str, f64)>> {
        let angle = knee_angle(frame, ctx.min_confidence)?;
        let key = match step {
            CalibrationStep::First => TOP_KEY,
            CalibrationStep::Second => BOTTOM_KEY,
        };
        Some(vec![(key, angle)])
    }

    fn is_stable(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> bool {
        match (step, knee_angle(frame, ctx.min_confidence)) {
            (CalibrationStep::First, Some(angle)) => angle > 160.0,
            (CalibrationStep::Second, Some(angle)) => angle < 125.0,
            (_, None) => false,
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
        let Some(angle) = knee_angle(frame, ctx.min_confidence) else {
            return Classification::unknown(state, "Show your hips, knees and ankles");
        };

        let t = self.thresholds(ctx);
        let depth = Extremes::new(t.extremes.0, t.extremes.1).progress_pct(angle);
        state.rom_pct = Some(depth);
        state.cycle.record_rom(depth);

        let candidate = match state.phase {
            Phase::Up if angle < t.down_enter => Phase::Down,
            Phase::Up => Phase::Up,
            Phase::Down if angle > t.up_enter => Phase::Up,
            Phase::Down => Phase::Down,
            _ if angle < t.down_exit => Phase::Down,
            _ if angle > t.up_exit => Phase::Up,
            _ => Phase::Unknown,
        };

        let outcome = advance_phase(&mut state, candidate, now_ms, self.timing, EDGE, MESSAGES);

        // Acquiring down from unknown only needs down_exit; depth needs down_enter
        if state.phase == Phase::Down && angle < t.down_enter {
            state.cycle.reached_extreme = true;
        }

        let cue = match state.phase {
            Phase::Down => format!("Depth {:.0}% - drive up", depth),
            _ => format!("Depth {:.0}%", depth),
        };
        state.feedback = feedback_for(&outcome.decision, cue);

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
