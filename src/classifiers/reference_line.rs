//! Reference-line classifier (pull-up, chin-up)
//!
//! Works relative to a horizontal bar set by [`crate::bar`]. Reaching the top
//! needs the nose above the bar; returning to the hang needs straight elbows.
//! Counting edge: up → down. Frames where the hands are off the bar are
//! unknown.

use super::{
    advance_phase, feedback_for, Classification, ClassifierContext, CountingEdge, CycleMessages,
    ExerciseClassifier, Extremes, Timing,
};
use crate::bar::BarReference;
use crate::calibration::CalibrationStep;
use crate::geometry::angle_at_vertex;
use crate::tracking::LandmarkGroup;
use crate::types::{landmark, ExerciseFamily, ExerciseState, Phase, SmoothedFrame};

/// Nose height above the bar (positive = above)
const DEFAULT_CLEARANCE: Extremes = Extremes::new(-0.25, 0.05);
const DEFAULT_ELBOW: Extremes = Extremes::new(170.0, 70.0);

pub const TOP_ENTER: f64 = 0.02;
pub const TOP_EXIT: f64 = -0.03;
pub const BOTTOM_ENTER_DEG: f64 = 155.0;
pub const BOTTOM_EXIT_DEG: f64 = 140.0;

/// Wrist distance from the bar line still counted as gripping
pub const GRIP_Y_TOLERANCE: f64 = 0.08;
/// Horizontal slack beyond the bar extent
pub const GRIP_X_TOLERANCE: f64 = 0.1;

const EDGE: CountingEdge = CountingEdge {
    from: &[Phase::Up],
    to: Phase::Down,
};

const MESSAGES: CycleMessages = CycleMessages {
    too_fast: "Too fast - control the lowering",
    insufficient_range: "Pull your chin over the bar",
};

const REQUIRED: &[LandmarkGroup] = &[
    LandmarkGroup::Arms,
    LandmarkGroup::UpperBody,
    LandmarkGroup::Face,
];

/// Whether every confident wrist is on the bar (and at least one is)
pub fn is_gripping(frame: &SmoothedFrame, bar: &BarReference, min_confidence: f64) -> bool {
    let wrists: Vec<_> = [landmark::LEFT_WRIST, landmark::RIGHT_WRIST]
        .into_iter()
        .filter_map(|i| frame.point(i, min_confidence))
        .collect();

    !wrists.is_empty()
        && wrists.iter().all(|w| {
            (w.y - bar.y).abs() <= GRIP_Y_TOLERANCE
                && w.x >= bar.x_min - GRIP_X_TOLERANCE
                && w.x <= bar.x_max + GRIP_X_TOLERANCE
        })
}

/// Smallest confident shoulder-elbow-wrist angle
pub fn elbow_angle(frame: &SmoothedFrame, min_confidence: f64) -> Option<f64> {
    [
        [landmark::LEFT_SHOULDER, landmark::LEFT_ELBOW, landmark::LEFT_WRIST],
        [landmark::RIGHT_SHOULDER, landmark::RIGHT_ELBOW, landmark::RIGHT_WRIST],
    ]
    .into_iter()
    .filter_map(|chain| frame.points(chain, min_confidence))
    .map(|[shoulder, elbow, wrist]| angle_at_vertex(shoulder, elbow, wrist))
    .min_by(|a, b| a.total_cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HangMetrics {
    pub clearance: f64,
    pub elbow: f64,
}

impl HangMetrics {
    pub fn measure(frame: &SmoothedFrame, bar: &BarReference, min_confidence: f64) -> Option<Self> {
        let nose = frame.point(landmark::NOSE, min_confidence)?;
        Some(Self {
            clearance: bar.y - nose.y,
            elbow: elbow_angle(frame, min_confidence)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLineThresholds {
    pub clearance: (f64, f64),
    pub top_enter: f64,
    pub top_exit: f64,
    pub bottom_enter: f64,
    pub bottom_exit: f64,
}

#[derive(Debug, Clone)]
pub struct ReferenceLineClassifier {
    id: &'static str,
    timing: Timing,
}

impl ReferenceLineClassifier {
    pub fn new(id: &'static str, timing: Timing) -> Self {
        Self { id, timing }
    }

    fn bar_timing() -> Timing {
        Timing {
            min_phase_ms: 200,
            min_rep_ms: 900,
            min_tempo_ms: 650,
        }
    }

    pub fn pull_up() -> Self {
        Self::new("pull_up", Self::bar_timing())
    }

    pub fn chin_up() -> Self {
        Self::new("chin_up", Self::bar_timing())
    }

    pub fn thresholds(&self, ctx: &ClassifierContext<'_>) -> ReferenceLineThresholds {
        let clearance = DEFAULT_CLEARANCE.calibrated(ctx, "hang_clearance", "top_clearance");
        let elbow = DEFAULT_ELBOW.calibrated(ctx, "hang_elbow", "top_elbow");
        ReferenceLineThresholds {
            clearance: (clearance.rest, clearance.extreme),
            top_enter: DEFAULT_CLEARANCE.scale(TOP_ENTER, &clearance),
            top_exit: DEFAULT_CLEARANCE.scale(TOP_EXIT, &clearance),
            bottom_enter: DEFAULT_ELBOW.scale(BOTTOM_ENTER_DEG, &elbow),
            bottom_exit: DEFAULT_ELBOW.scale(BOTTOM_EXIT_DEG, &elbow),
        }
    }

    fn metrics(&self, frame: &SmoothedFrame, ctx: &ClassifierContext<'_>) -> Option<HangMetrics> {
        let bar = ctx.bar?;
        if !is_gripping(frame, bar, ctx.min_confidence) {
            return None;
        }
        HangMetrics::measure(frame, bar, ctx.min_confidence)
    }
}

impl ExerciseClassifier for ReferenceLineClassifier {
    fn id(&self) -> &str {
        self.id
    }

    fn family(&self) -> ExerciseFamily {
        ExerciseFamily::ReferenceLine
    }

    fn required_groups(&self) -> &'static [LandmarkGroup] {
        REQUIRED
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn calibration_steps(&self) -> [&'static str; 2] {
        ["hang", "top"]
    }

    fn extract_calibration(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> Option<Vec<(&'static str, f64)>> {
        let m = self.metrics(frame, ctx)?;
        let (clearance_key, elbow_key) = match step {
            CalibrationStep::First => ("hang_clearance", "hang_elbow"),
            CalibrationStep::Second => ("top_clearance", "top_elbow"),
        };
        Some(vec![(clearance_key, m.clearance), (elbow_key, m.elbow)])
    }

    fn is_stable(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> bool {
        match (step, self.metrics(frame, ctx)) {
            (CalibrationStep::First, Some(m)) => m.elbow > 150.0 && m.clearance < -0.1,
            (CalibrationStep::Second, Some(m)) => m.clearance > 0.0,
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
        let Some(bar) = ctx.bar else {
            return Classification::unknown(state, "Set the bar reference first");
        };
        if !is_gripping(frame, bar, ctx.min_confidence) {
            return Classification::unknown(state, "Grab the bar");
        }
        let Some(m) = HangMetrics::measure(frame, bar, ctx.min_confidence) else {
            return Classification::unknown(state, "Keep your head and arms in view");
        };

        let t = self.thresholds(ctx);
        let height = Extremes::new(t.clearance.0, t.clearance.1).progress_pct(m.clearance);
        state.rom_pct = Some(height);
        state.cycle.record_rom(height);

        let candidate = match state.phase {
            Phase::Down if m.clearance > t.top_enter => Phase::Up,
            Phase::Down => Phase::Down,
            Phase::Up if m.elbow > t.bottom_enter => Phase::Down,
            Phase::Up => Phase::Up,
            _ if m.elbow > t.bottom_exit => Phase::Down,
            _ if m.clearance > t.top_exit => Phase::Up,
            _ => Phase::Unknown,
        };

        let outcome = advance_phase(&mut state, candidate, now_ms, self.timing, EDGE, MESSAGES);

        if state.phase == Phase::Up && m.clearance > t.top_enter {
            state.cycle.reached_extreme = true;
        }

        let cue = match state.phase {
            Phase::Up if state.cycle.reached_extreme => "Lower all the way down",
            Phase::Up => "Chin over the bar",
            _ => "Pull",
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
