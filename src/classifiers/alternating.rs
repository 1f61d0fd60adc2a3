//! Alternating-limb-lift classifier (high knees)
//!
//! Discriminant: the higher of the two knee lifts, normalized by torso
//! length. A single threshold with no hysteresis band; a rep is each lift
//! on the side opposite the previous one.

use super::{
    commit_rep, feedback_for, reject, Classification, ClassifierContext, ExerciseClassifier,
    Extremes, Timing,
};
use crate::calibration::CalibrationStep;
use crate::geometry::{distance, safe_ratio};
use crate::tracking::LandmarkGroup;
use crate::types::{
    landmark, DecisionEvent, ExerciseFamily, ExerciseState, Phase, RejectReason, Side,
    SmoothedFrame,
};

const DEFAULT_LIFT: Extremes = Extremes::new(-0.8, -0.05);
pub const LIFT_THRESHOLD: f64 = -0.35;

const REQUIRED: &[LandmarkGroup] = &[LandmarkGroup::LowerBody, LandmarkGroup::UpperBody];

/// Knee lift above the hip in torso lengths; negative while the knee is below
/// the hip
pub fn knee_lift(frame: &SmoothedFrame, side: Side, min_confidence: f64) -> Option<f64> {
    let chain = match side {
        Side::Left => [landmark::LEFT_SHOULDER, landmark::LEFT_HIP, landmark::LEFT_KNEE],
        Side::Right => [landmark::RIGHT_SHOULDER, landmark::RIGHT_HIP, landmark::RIGHT_KNEE],
        Side::None => return None,
    };
    let [shoulder, hip, knee] = frame.points(chain, min_confidence)?;
    Some(safe_ratio(hip.y - knee.y, distance(shoulder, hip)))
}

/// Side with the higher knee and its lift
pub fn leading_lift(frame: &SmoothedFrame, min_confidence: f64) -> Option<(Side, f64)> {
    [Side::Left, Side::Right]
        .into_iter()
        .filter_map(|side| knee_lift(frame, side, min_confidence).map(|lift| (side, lift)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[derive(Debug, Clone)]
pub struct AlternatingLiftClassifier {
    id: &'static str,
    timing: Timing,
}

impl AlternatingLiftClassifier {
    pub fn new(id: &'static str, timing: Timing) -> Self {
        Self { id, timing }
    }

    pub fn high_knees() -> Self {
        Self::new(
            "high_knees",
            Timing {
                min_phase_ms: 0,
                min_rep_ms: 300,
                min_tempo_ms: 300,
            },
        )
    }

    fn extremes(&self, ctx: &ClassifierContext<'_>) -> Extremes {
        DEFAULT_LIFT.calibrated(ctx, "rest_lift", "peak_lift")
    }

    pub fn threshold(&self, ctx: &ClassifierContext<'_>) -> f64 {
        DEFAULT_LIFT.scale(LIFT_THRESHOLD, &self.extremes(ctx))
    }

    fn count_lift(&self, state: &mut ExerciseState, side: Side, now_ms: u64) -> DecisionEvent {
        if side == state.cycle.last_active_side {
            return reject(state, RejectReason::SameSide, "Switch legs");
        }
        if let Some(last) = state.last_rep_ms {
            if now_ms.saturating_sub(last) < self.timing.min_rep_ms {
                return reject(state, RejectReason::TooFast, "Too fast - lift each knee fully");
            }
        }
        state.cycle.last_active_side = side;
        commit_rep(state, now_ms)
    }
}

impl ExerciseClassifier for AlternatingLiftClassifier {
    fn id(&self) -> &str {
        self.id
    }

    fn family(&self) -> ExerciseFamily {
        ExerciseFamily::AlternatingLift
    }

    fn required_groups(&self) -> &'static [LandmarkGroup] {
        REQUIRED
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn calibration_steps(&self) -> [&'static str; 2] {
        ["rest", "peak"]
    }

    fn extract_calibration(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> Option<Vec<(&'static str, f64)>> {
        let (_, lift) = leading_lift(frame, ctx.min_confidence)?;
        let key = match step {
            CalibrationStep::First => "rest_lift",
            CalibrationStep::Second => "peak_lift",
        };
        Some(vec![(key, lift)])
    }

    fn is_stable(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> bool {
        match (step, leading_lift(frame, ctx.min_confidence)) {
            (CalibrationStep::First, Some((_, lift))) => lift < -0.6,
            (CalibrationStep::Second, Some((_, lift))) => lift > -0.2,
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
        let Some((side, lift)) = leading_lift(frame, ctx.min_confidence) else {
            return Classification::unknown(state, "Keep your hips and knees in view");
        };

        state.rom_pct = Some(self.extremes(ctx).progress_pct(lift));

        let candidate = if lift > self.threshold(ctx) {
            Phase::Up
        } else {
            Phase::Down
        };

        let mut decision = DecisionEvent::None;
        if candidate != state.phase {
            let previous = state.phase;
            state.phase = candidate;
            state.last_phase_change_ms = Some(now_ms);
            log::debug!(
                "{}: {} -> {} ({:?}) at {}ms",
                state.exercise_id,
                previous.as_str(),
                candidate.as_str(),
                side,
                now_ms
            );
            if previous == Phase::Down && candidate == Phase::Up {
                decision = self.count_lift(&mut state, side, now_ms);
            }
        }

        let cue = match state.cycle.last_active_side {
            Side::Left => "Now the right knee",
            Side::Right => "Now the left knee",
            Side::None => "Drive your knees up",
        };
        state.feedback = feedback_for(&decision, cue.to_string());

        Classification {
            rep_rom_pct: if decision.is_rep() {
                state.rom_pct
            } else {
                None
            },
            state,
            decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationProfile;
    use crate::classifiers::test_support::knee_lift_frame;
    use pretty_assertions::assert_eq;

    const DOWN: f64 = -0.8;
    const UP: f64 = -0.1;

    fn ctx() -> ClassifierContext<'static> {
        ClassifierContext {
            calibration: None,
            bar: None,
            min_confidence: 0.5,
        }
    }

    fn run(samples: &[(u64, f64, f64)]) -> (ExerciseState, Vec<DecisionEvent>) {
        let knees = AlternatingLiftClassifier::high_knees();
        let mut state = ExerciseState::new("high_knees");
        let mut decisions = Vec::new();
        for &(ts, left, right) in samples {
            let out = knees.classify(&state, &knee_lift_frame(ts, left, right), ts, &ctx());
            state = out.state;
            if !out.decision.is_none() {
                decisions.push(out.decision);
            }
        }
        (state, decisions)
    }

    fn reasons(decisions: &[DecisionEvent]) -> Vec<Option<RejectReason>> {
        decisions
            .iter()
            .map(|d| match d {
                DecisionEvent::Reject { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_lift_measure() {
        let frame = knee_lift_frame(0, DOWN, UP);
        assert!((knee_lift(&frame, Side::Left, 0.5).unwrap() - DOWN).abs() < 1e-9);
        let (side, lift) = leading_lift(&frame, 0.5).unwrap();
        assert_eq!(side, Side::Right);
        assert!((lift - UP).abs() < 1e-9);
    }

    #[test]
    fn test_alternating_lifts_count() {
        let (state, decisions) = run(&[
            (0, DOWN, DOWN),
            (300, UP, DOWN),
            (450, DOWN, DOWN),
            (650, DOWN, UP),
        ]);
        assert_eq!(state.rep_count, 2);
        assert_eq!(reasons(&decisions), vec![None, None]);
        assert_eq!(state.cycle.last_active_side, Side::Right);
    }

    #[test]
    fn test_same_side_twice_is_rejected() {
        let (state, decisions) = run(&[
            (0, DOWN, DOWN),
            (300, UP, DOWN),
            (450, DOWN, DOWN),
            (800, UP, DOWN),
        ]);
        assert_eq!(state.rep_count, 1);
        assert_eq!(reasons(&decisions), vec![None, Some(RejectReason::SameSide)]);
    }

    #[test]
    fn test_rapid_alternation_is_rejected() {
        let (state, decisions) = run(&[
            (0, DOWN, DOWN),
            (300, UP, DOWN),
            (400, DOWN, DOWN),
            (500, DOWN, UP),
        ]);
        assert_eq!(state.rep_count, 1);
        assert_eq!(reasons(&decisions), vec![None, Some(RejectReason::TooFast)]);
        // the rejected side does not become the active side
        assert_eq!(state.cycle.last_active_side, Side::Left);
    }

    #[test]
    fn test_counted_lift_reports_rom() {
        let knees = AlternatingLiftClassifier::high_knees();
        let rest = knees.classify(
            &ExerciseState::new("high_knees"),
            &knee_lift_frame(0, DOWN, DOWN),
            0,
            &ctx(),
        );
        assert_eq!(rest.rep_rom_pct, None);

        let out = knees.classify(&rest.state, &knee_lift_frame(300, UP, DOWN), 300, &ctx());
        assert!(out.decision.is_rep());
        // -0.1 sits 0.7 of the way along the 0.75 default span
        assert!((out.rep_rom_pct.unwrap() - 70.0 / 0.75).abs() < 1e-6);
        assert_eq!(out.rep_rom_pct, out.state.rom_pct);
    }

    #[test]
    fn test_no_debounce_between_phases() {
        let (_, decisions) = run(&[(0, DOWN, DOWN), (10, UP, DOWN)]);
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn test_calibration_moves_threshold() {
        let knees = AlternatingLiftClassifier::high_knees();
        let mut profile = CalibrationProfile::new("high_knees");
        profile.set("rest_lift", -0.6);
        profile.set("peak_lift", 0.2);
        let calibrated = ClassifierContext {
            calibration: Some(&profile),
            ..ctx()
        };
        assert!((knees.threshold(&ctx()) - LIFT_THRESHOLD).abs() < 1e-9);
        assert!((knees.threshold(&calibrated) - -0.12).abs() < 1e-9);

        let down = ExerciseState {
            phase: Phase::Down,
            ..ExerciseState::new("high_knees")
        };
        let out = knees.classify(&down, &knee_lift_frame(0, -0.2, DOWN), 0, &calibrated);
        assert_eq!(out.state.phase, Phase::Down);
        let out = knees.classify(&down, &knee_lift_frame(0, -0.2, DOWN), 0, &ctx());
        assert!(out.decision.is_rep());
    }
}
