//! Open/close classifier (jumping jack)
//!
//! Two discriminants must agree: leg spread (ankle distance over hip width)
//! and arm lift (wrist height above the shoulders). Counting edge:
//! open → closed.

use super::{
    advance_phase, feedback_for, Classification, ClassifierContext, CountingEdge, CycleMessages,
    ExerciseClassifier, Extremes, Timing,
};
use crate::calibration::CalibrationStep;
use crate::geometry::{distance, safe_ratio};
use crate::tracking::LandmarkGroup;
use crate::types::{landmark, ExerciseFamily, ExerciseState, Phase, SmoothedFrame};

pub const SPREAD_ENTER: f64 = 1.45;
pub const SPREAD_EXIT: f64 = 1.25;
pub const LIFT_ENTER: f64 = 0.03;
pub const LIFT_EXIT: f64 = 0.02;

const DEFAULT_SPREAD: Extremes = Extremes::new(1.0, 2.0);
const DEFAULT_LIFT: Extremes = Extremes::new(-0.25, 0.15);

/// Openness needed during the open phase for the closing edge to count
const MIN_OPENNESS_PCT: f64 = 50.0;

const EDGE: CountingEdge = CountingEdge {
    from: &[Phase::Open],
    to: Phase::Closed,
};

const MESSAGES: CycleMessages = CycleMessages {
    too_fast: "Too fast - finish each jack",
    insufficient_range: "Open wider and reach overhead",
};

const REQUIRED: &[LandmarkGroup] = &[
    LandmarkGroup::LowerBody,
    LandmarkGroup::UpperBody,
    LandmarkGroup::Arms,
];

/// Spread and lift measured on one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JackFeatures {
    /// Ankle distance over hip width
    pub spread: f64,
    /// Lowest wrist height above its shoulder (positive = above)
    pub lift: f64,
}

impl JackFeatures {
    pub fn measure(frame: &SmoothedFrame, min_confidence: f64) -> Option<Self> {
        let [left_ankle, right_ankle, left_hip, right_hip] = frame.points(
            [
                landmark::LEFT_ANKLE,
                landmark::RIGHT_ANKLE,
                landmark::LEFT_HIP,
                landmark::RIGHT_HIP,
            ],
            min_confidence,
        )?;
        let spread = safe_ratio(
            distance(left_ankle, right_ankle),
            distance(left_hip, right_hip),
        );

        let lift = [
            [landmark::LEFT_SHOULDER, landmark::LEFT_WRIST],
            [landmark::RIGHT_SHOULDER, landmark::RIGHT_WRIST],
        ]
        .into_iter()
        .filter_map(|pair| frame.points(pair, min_confidence))
        .map(|[shoulder, wrist]| shoulder.y - wrist.y)
        .min_by(|a, b| a.total_cmp(b))?;

        Some(Self { spread, lift })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenCloseThresholds {
    pub spread: (f64, f64),
    pub lift: (f64, f64),
    pub spread_enter: f64,
    pub spread_exit: f64,
    pub lift_enter: f64,
    pub lift_exit: f64,
}

impl OpenCloseThresholds {
    /// Share of full range reached, limited by the weaker of the two signals
    pub fn openness_pct(&self, features: &JackFeatures) -> f64 {
        let spread = Extremes::new(self.spread.0, self.spread.1).progress_pct(features.spread);
        let lift = Extremes::new(self.lift.0, self.lift.1).progress_pct(features.lift);
        spread.min(lift)
    }
}

#[derive(Debug, Clone)]
pub struct OpenCloseClassifier {
    id: &'static str,
    timing: Timing,
}

impl OpenCloseClassifier {
    pub fn new(id: &'static str, timing: Timing) -> Self {
        Self { id, timing }
    }

    pub fn jumping_jack() -> Self {
        Self::new(
            "jumping_jack",
            Timing {
                min_phase_ms: 180,
                min_rep_ms: 450,
                min_tempo_ms: 380,
            },
        )
    }

    pub fn thresholds(&self, ctx: &ClassifierContext<'_>) -> OpenCloseThresholds {
        let spread = DEFAULT_SPREAD.calibrated(ctx, "closed_ratio", "open_ratio");
        let lift = DEFAULT_LIFT.calibrated(ctx, "closed_lift", "open_lift");
        OpenCloseThresholds {
            spread: (spread.rest, spread.extreme),
            lift: (lift.rest, lift.extreme),
            // never looser than the defaults
            spread_enter: DEFAULT_SPREAD.scale(SPREAD_ENTER, &spread).max(SPREAD_ENTER),
            spread_exit: DEFAULT_SPREAD.scale(SPREAD_EXIT, &spread).max(SPREAD_EXIT),
            lift_enter: DEFAULT_LIFT.scale(LIFT_ENTER, &lift),
            lift_exit: DEFAULT_LIFT.scale(LIFT_EXIT, &lift),
        }
    }
}

impl ExerciseClassifier for OpenCloseClassifier {
    fn id(&self) -> &str {
        self.id
    }

    fn family(&self) -> ExerciseFamily {
        ExerciseFamily::OpenClose
    }

    fn required_groups(&self) -> &'static [LandmarkGroup] {
        REQUIRED
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn calibration_steps(&self) -> [&'static str; 2] {
        ["closed", "open"]
    }

    fn extract_calibration(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> Option<Vec<(&'static str, f64)>> {
        let features = JackFeatures::measure(frame, ctx.min_confidence)?;
        let (ratio_key, lift_key) = match step {
            CalibrationStep::First => ("closed_ratio", "closed_lift"),
            CalibrationStep::Second => ("open_ratio", "open_lift"),
        };
        Some(vec![(ratio_key, features.spread), (lift_key, features.lift)])
    }

    fn is_stable(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> bool {
        let Some(f) = JackFeatures::measure(frame, ctx.min_confidence) else {
            return false;
        };
        match step {
            CalibrationStep::First => f.spread < SPREAD_EXIT && f.lift < 0.0,
            CalibrationStep::Second => f.spread > SPREAD_ENTER && f.lift > LIFT_ENTER,
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
        let Some(features) = JackFeatures::measure(frame, ctx.min_confidence) else {
            return Classification::unknown(state, "Keep your whole body in view");
        };

        let t = self.thresholds(ctx);
        let openness = t.openness_pct(&features);
        state.rom_pct = Some(openness);
        state.cycle.record_rom(openness);

        let entering = features.spread > t.spread_enter && features.lift > t.lift_enter;
        let holding = features.spread > t.spread_exit && features.lift > t.lift_exit;
        let candidate = match state.phase {
            Phase::Closed if entering => Phase::Open,
            Phase::Closed => Phase::Closed,
            _ if holding => Phase::Open,
            _ => Phase::Closed,
        };

        let outcome = advance_phase(&mut state, candidate, now_ms, self.timing, EDGE, MESSAGES);

        if state.phase == Phase::Open && openness >= MIN_OPENNESS_PCT {
            state.cycle.reached_extreme = true;
        }

        let cue = match state.phase {
            Phase::Open => format!("Open {:.0}% - bring it back in", openness),
            _ => "Jump out and raise your arms".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationProfile;
    use crate::classifiers::test_support::jack_frame;
    use crate::types::{DecisionEvent, RejectReason};

    const CLOSED: (f64, f64) = (1.0, -0.24);
    const OPEN: (f64, f64) = (1.8, 0.1);

    fn ctx() -> ClassifierContext<'static> {
        ClassifierContext {
            calibration: None,
            bar: None,
            min_confidence: 0.5,
        }
    }

    fn run(samples: &[(u64, (f64, f64))]) -> (ExerciseState, Vec<DecisionEvent>) {
        let jack = OpenCloseClassifier::jumping_jack();
        let mut state = ExerciseState::new("jumping_jack");
        let mut decisions = Vec::new();
        for &(ts, (spread, lift)) in samples {
            let out = jack.classify(&state, &jack_frame(ts, spread, lift), ts, &ctx());
            state = out.state;
            if !out.decision.is_none() {
                decisions.push(out.decision);
            }
        }
        (state, decisions)
    }

    #[test]
    fn test_features_from_frame() {
        let f = JackFeatures::measure(&jack_frame(0, 1.8, 0.1), 0.5).unwrap();
        assert!((f.spread - 1.8).abs() < 1e-9);
        assert!((f.lift - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_full_jack_counts() {
        let (state, decisions) = run(&[(0, CLOSED), (300, OPEN), (800, CLOSED)]);
        assert_eq!(state.rep_count, 1);
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].is_rep());
        assert_eq!(state.phase, Phase::Closed);
    }

    #[test]
    fn test_legs_alone_do_not_open() {
        let (state, decisions) = run(&[(0, CLOSED), (300, (1.8, -0.2)), (800, CLOSED)]);
        assert_eq!(state.rep_count, 0);
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_half_open_jack_is_rejected() {
        let (state, decisions) = run(&[(0, CLOSED), (300, (1.46, 0.04)), (800, CLOSED)]);
        assert_eq!(state.rep_count, 0);
        assert!(matches!(
            decisions.as_slice(),
            [DecisionEvent::Reject {
                reason: RejectReason::InsufficientRange,
                ..
            }]
        ));
    }

    #[test]
    fn test_open_holds_inside_band() {
        // 1.3 / 0.025 sits between exit and enter on both signals
        let (state, _) = run(&[(0, CLOSED), (300, OPEN), (600, (1.3, 0.025))]);
        assert_eq!(state.phase, Phase::Open);
    }

    #[test]
    fn test_calibrated_spread_never_loosens() {
        let mut profile = CalibrationProfile::new("jumping_jack");
        profile.set("closed_ratio", 0.9);
        profile.set("open_ratio", 1.5);
        let t = OpenCloseClassifier::jumping_jack().thresholds(&ClassifierContext {
            calibration: Some(&profile),
            ..ctx()
        });
        assert!((t.spread_enter - SPREAD_ENTER).abs() < 1e-9);
        assert!((t.spread_exit - SPREAD_EXIT).abs() < 1e-9);
    }

    #[test]
    fn test_calibrated_spread_tightens() {
        let mut profile = CalibrationProfile::new("jumping_jack");
        profile.set("closed_ratio", 1.2);
        profile.set("open_ratio", 2.6);
        let t = OpenCloseClassifier::jumping_jack().thresholds(&ClassifierContext {
            calibration: Some(&profile),
            ..ctx()
        });
        // 1.2 + 0.45 * 1.4
        assert!((t.spread_enter - 1.83).abs() < 1e-9);
    }

    #[test]
    fn test_stability_predicates() {
        let jack = OpenCloseClassifier::jumping_jack();
        let closed = jack_frame(0, CLOSED.0, CLOSED.1);
        let open = jack_frame(0, OPEN.0, OPEN.1);
        assert!(jack.is_stable(CalibrationStep::First, &closed, &ctx()));
        assert!(!jack.is_stable(CalibrationStep::First, &open, &ctx()));
        assert!(jack.is_stable(CalibrationStep::Second, &open, &ctx()));
    }
}
