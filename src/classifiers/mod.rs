//! Exercise classifiers
//!
//! One strategy per exercise family, each a dual-threshold hysteresis state
//! machine over a scalar discriminant. Strategies are looked up by exercise
//! id through [`ClassifierRegistry`]; adding an exercise means registering a
//! strategy.

pub mod alternating;
pub mod hinge;
pub mod open_close;
pub mod reference_line;
pub mod sequence;

#[cfg(test)]
pub(crate) mod test_support;

pub use alternating::AlternatingLiftClassifier;
pub use hinge::HingeClassifier;
pub use open_close::OpenCloseClassifier;
pub use reference_line::ReferenceLineClassifier;
pub use sequence::MultiGateClassifier;

use crate::bar::BarReference;
use crate::calibration::{CalibrationProfile, CalibrationStep};
use crate::error::MotionError;
use crate::tracking::LandmarkGroup;
use crate::types::{
    DecisionEvent, ExerciseFamily, ExerciseState, Phase, RejectReason, SmoothedFrame,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only inputs shared by every classification pass
#[derive(Debug, Clone, Copy)]
pub struct ClassifierContext<'a> {
    /// Profile for the active exercise, if calibrated
    pub calibration: Option<&'a CalibrationProfile>,
    /// Reference line for bar exercises
    pub bar: Option<&'a BarReference>,
    /// Per-landmark confidence gate
    pub min_confidence: f64,
}

/// Timing guards for one exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Minimum time between two phase transitions (ms)
    pub min_phase_ms: u64,
    /// Minimum time between two counted reps (ms)
    pub min_rep_ms: u64,
    /// Reps faster than this are labelled sloppy (ms)
    pub min_tempo_ms: u64,
}

/// Result of one classification pass
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: ExerciseState,
    pub decision: DecisionEvent,
    /// Range of motion of the rep just counted, when the family measures one
    pub rep_rom_pct: Option<f64>,
}

impl Classification {
    /// Required landmarks failed the confidence gate: phase becomes unknown,
    /// counters and cycle progress are preserved
    pub fn unknown(mut state: ExerciseState, hint: &str) -> Self {
        state.phase = Phase::Unknown;
        state.rom_pct = None;
        state.feedback = hint.to_string();
        Self {
            state,
            decision: DecisionEvent::None,
            rep_rom_pct: None,
        }
    }
}

/// Strategy interface implemented by every exercise family
pub trait ExerciseClassifier: Send + Sync {
    /// Canonical exercise id
    fn id(&self) -> &str;

    fn family(&self) -> ExerciseFamily;

    /// Landmark groups that must be visible for tracking to be good
    fn required_groups(&self) -> &'static [LandmarkGroup];

    fn timing(&self) -> Timing;

    /// Names of the two calibrated extremes, in capture order
    fn calibration_steps(&self) -> [&'static str; 2];

    /// Discriminant values for a calibration step; `None` if the required
    /// landmarks are not confidently visible
    fn extract_calibration(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> Option<Vec<(&'static str, f64)>>;

    /// Whether the frame holds the pose expected for a hands-free capture
    fn is_stable(
        &self,
        step: CalibrationStep,
        frame: &SmoothedFrame,
        ctx: &ClassifierContext<'_>,
    ) -> bool;

    /// Advance the exercise state by one frame
    fn classify(
        &self,
        prev: &ExerciseState,
        frame: &SmoothedFrame,
        now_ms: u64,
        ctx: &ClassifierContext<'_>,
    ) -> Classification;
}

/// The transition that may count a rep: any phase in `from` moving to `to`.
///
/// `to` is the rest phase; leaving it starts a new cycle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CountingEdge {
    pub from: &'static [Phase],
    pub to: Phase,
}

/// Reject messages for one family
#[derive(Debug, Clone, Copy)]
pub(crate) struct CycleMessages {
    pub too_fast: &'static str,
    pub insufficient_range: &'static str,
}

/// Outcome of a phase advance
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct EdgeOutcome {
    pub decision: DecisionEvent,
    pub rom_pct: Option<f64>,
}

/// Move `state` toward `candidate`, honoring the debounce window and the
/// counting rules on the designated edge.
pub(crate) fn advance_phase(
    state: &mut ExerciseState,
    candidate: Phase,
    now_ms: u64,
    timing: Timing,
    edge: CountingEdge,
    messages: CycleMessages,
) -> EdgeOutcome {
    if candidate == state.phase || candidate == Phase::Unknown {
        return EdgeOutcome::default();
    }

    if let Some(last) = state.last_phase_change_ms {
        if now_ms.saturating_sub(last) < timing.min_phase_ms {
            log::debug!(
                "{}: {} -> {} suppressed by debounce",
                state.exercise_id,
                state.phase.as_str(),
                candidate.as_str()
            );
            return EdgeOutcome::default();
        }
    }

    let previous = state.phase;
    state.phase = candidate;
    state.last_phase_change_ms = Some(now_ms);
    log::debug!(
        "{}: {} -> {} at {}ms",
        state.exercise_id,
        previous.as_str(),
        candidate.as_str(),
        now_ms
    );

    // A cycle also starts when tracking resumes mid-movement
    if previous == edge.to || (previous == Phase::Unknown && candidate != edge.to) {
        state.cycle.started_ms = Some(now_ms);
    }

    if candidate == edge.to && edge.from.contains(&previous) {
        close_cycle(state, now_ms, timing, messages)
    } else {
        EdgeOutcome::default()
    }
}

fn close_cycle(
    state: &mut ExerciseState,
    now_ms: u64,
    timing: Timing,
    messages: CycleMessages,
) -> EdgeOutcome {
    let rom_pct = state.cycle.peak_rom_pct.take();

    if !state.cycle.reached_extreme {
        return EdgeOutcome {
            decision: reject(state, RejectReason::InsufficientRange, messages.insufficient_range),
            rom_pct,
        };
    }

    let reference = state.last_rep_ms.or(state.cycle.started_ms);
    if let Some(reference) = reference {
        if now_ms.saturating_sub(reference) < timing.min_rep_ms {
            return EdgeOutcome {
                decision: reject(state, RejectReason::TooFast, messages.too_fast),
                rom_pct,
            };
        }
    }

    EdgeOutcome {
        decision: commit_rep(state, now_ms),
        rom_pct,
    }
}

/// Count a rep: bump the counter, stamp the time, clear the extreme flag
pub(crate) fn commit_rep(state: &mut ExerciseState, now_ms: u64) -> DecisionEvent {
    state.rep_count += 1;
    state.last_rep_ms = Some(now_ms);
    state.cycle.reached_extreme = false;
    log::info!("{}: rep {} at {}ms", state.exercise_id, state.rep_count, now_ms);
    DecisionEvent::Rep {
        rep_count: state.rep_count,
        message: format!("Rep {}", state.rep_count),
    }
}

pub(crate) fn reject(state: &ExerciseState, reason: RejectReason, message: &str) -> DecisionEvent {
    log::debug!("{}: attempt rejected ({:?})", state.exercise_id, reason);
    DecisionEvent::Reject {
        reason,
        message: message.to_string(),
    }
}

/// Feedback text: the decision message when there is one, the live cue otherwise
pub(crate) fn feedback_for(decision: &DecisionEvent, cue: String) -> String {
    decision.message().map(str::to_string).unwrap_or(cue)
}

/// Extreme pair of a discriminant: value at rest and at full range
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Extremes {
    pub rest: f64,
    pub extreme: f64,
}

/// A calibrated span narrower than this share of the default is ignored
const MIN_CALIBRATED_SPAN_SHARE: f64 = 0.25;

impl Extremes {
    pub const fn new(rest: f64, extreme: f64) -> Self {
        Self { rest, extreme }
    }

    fn span(&self) -> f64 {
        self.extreme - self.rest
    }

    /// Calibrated extremes for the active profile, falling back to `self` for
    /// missing keys or a degenerate span
    pub fn calibrated(&self, ctx: &ClassifierContext<'_>, rest_key: &str, extreme_key: &str) -> Self {
        let Some(profile) = ctx.calibration else {
            return *self;
        };
        let candidate = Self {
            rest: profile.get(rest_key).unwrap_or(self.rest),
            extreme: profile.get(extreme_key).unwrap_or(self.extreme),
        };
        let same_direction = candidate.span().signum() == self.span().signum();
        if same_direction && candidate.span().abs() >= self.span().abs() * MIN_CALIBRATED_SPAN_SHARE {
            candidate
        } else {
            *self
        }
    }

    /// Map a default threshold onto `actual`, keeping its relative position
    pub fn scale(&self, threshold: f64, actual: &Extremes) -> f64 {
        crate::geometry::remap(threshold, self.rest, self.extreme, actual.rest, actual.extreme)
    }

    /// Progress of `value` from rest toward the extreme (0-100)
    pub fn progress_pct(&self, value: f64) -> f64 {
        crate::geometry::progress_pct(value, self.rest, self.extreme)
    }
}

/// Exercise id → strategy lookup
#[derive(Clone)]
pub struct ClassifierRegistry {
    classifiers: BTreeMap<String, Arc<dyn ExerciseClassifier>>,
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClassifierRegistry {
    /// Registry with no strategies
    pub fn empty() -> Self {
        Self {
            classifiers: BTreeMap::new(),
        }
    }

    /// Registry with every built-in exercise
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(OpenCloseClassifier::jumping_jack()));
        registry.register(Arc::new(HingeClassifier::squat()));
        registry.register(Arc::new(HingeClassifier::lunge()));
        registry.register(Arc::new(HingeClassifier::jump_squat()));
        registry.register(Arc::new(AlternatingLiftClassifier::high_knees()));
        registry.register(Arc::new(MultiGateClassifier::burpee()));
        registry.register(Arc::new(ReferenceLineClassifier::pull_up()));
        registry.register(Arc::new(ReferenceLineClassifier::chin_up()));
        registry
    }

    /// Add or replace the strategy for its id
    pub fn register(&mut self, classifier: Arc<dyn ExerciseClassifier>) {
        self.classifiers
            .insert(classifier.id().to_string(), classifier);
    }

    pub fn get(&self, exercise_id: &str) -> Option<Arc<dyn ExerciseClassifier>> {
        self.classifiers.get(exercise_id).cloned()
    }

    /// Look up an exercise by id or alias
    pub fn resolve(&self, exercise_id: &str) -> Result<Arc<dyn ExerciseClassifier>, MotionError> {
        let canonical = canonical_exercise_id(exercise_id);
        self.get(&canonical)
            .ok_or_else(|| MotionError::UnknownExercise(exercise_id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.classifiers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ExerciseClassifier>> {
        self.classifiers.values()
    }
}

/// Normalize case, separators and common aliases
pub fn canonical_exercise_id(exercise_id: &str) -> String {
    let normalized = exercise_id
        .trim()
        .to_lowercase()
        .replace(['-', ' '], "_");
    match normalized.as_str() {
        "jumping_jacks" | "jacks" => "jumping_jack".to_string(),
        "squats" => "squat".to_string(),
        "lunges" => "lunge".to_string(),
        "jump_squats" => "jump_squat".to_string(),
        "highknees" | "high_knee" => "high_knees".to_string(),
        "burpees" => "burpee".to_string(),
        "pullup" | "pullups" | "pull_ups" => "pull_up".to_string(),
        "chinup" | "chinups" | "chin_ups" => "chin_up".to_string(),
        _ => normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> Timing {
        Timing {
            min_phase_ms: 200,
            min_rep_ms: 700,
            min_tempo_ms: 700,
        }
    }

    const EDGE: CountingEdge = CountingEdge {
        from: &[Phase::Down],
        to: Phase::Up,
    };

    const MESSAGES: CycleMessages = CycleMessages {
        too_fast: "Too fast",
        insufficient_range: "Go deeper",
    };

    #[test]
    fn test_debounce_suppresses_quick_transition() {
        let mut state = ExerciseState::new("squat");
        advance_phase(&mut state, Phase::Up, 0, timing(), EDGE, MESSAGES);
        let outcome = advance_phase(&mut state, Phase::Down, 150, timing(), EDGE, MESSAGES);

        assert_eq!(outcome, EdgeOutcome::default());
        assert_eq!(state.phase, Phase::Up);
        assert_eq!(state.last_phase_change_ms, Some(0));
    }

    #[test]
    fn test_edge_without_extreme_rejects() {
        let mut state = ExerciseState::new("squat");
        advance_phase(&mut state, Phase::Up, 0, timing(), EDGE, MESSAGES);
        advance_phase(&mut state, Phase::Down, 300, timing(), EDGE, MESSAGES);
        let outcome = advance_phase(&mut state, Phase::Up, 1200, timing(), EDGE, MESSAGES);

        assert!(matches!(
            outcome.decision,
            DecisionEvent::Reject {
                reason: RejectReason::InsufficientRange,
                ..
            }
        ));
        assert_eq!(state.rep_count, 0);
    }

    #[test]
    fn test_cycle_starts_when_acquired_from_unknown() {
        let mut state = ExerciseState::new("squat");
        advance_phase(&mut state, Phase::Down, 300, timing(), EDGE, MESSAGES);
        assert_eq!(state.cycle.started_ms, Some(300));

        state.cycle.reached_extreme = true;
        let outcome = advance_phase(&mut state, Phase::Up, 600, timing(), EDGE, MESSAGES);
        assert!(matches!(
            outcome.decision,
            DecisionEvent::Reject {
                reason: RejectReason::TooFast,
                ..
            }
        ));
        assert_eq!(state.rep_count, 0);
    }

    #[test]
    fn test_rep_clears_extreme_flag() {
        let mut state = ExerciseState::new("squat");
        advance_phase(&mut state, Phase::Up, 0, timing(), EDGE, MESSAGES);
        advance_phase(&mut state, Phase::Down, 300, timing(), EDGE, MESSAGES);
        state.cycle.reached_extreme = true;
        state.cycle.record_rom(80.0);
        let outcome = advance_phase(&mut state, Phase::Up, 1000, timing(), EDGE, MESSAGES);

        assert!(outcome.decision.is_rep());
        assert_eq!(outcome.rom_pct, Some(80.0));
        assert_eq!(state.rep_count, 1);
        assert_eq!(state.last_rep_ms, Some(1000));
        assert!(!state.cycle.reached_extreme);
        assert_eq!(state.cycle.peak_rom_pct, None);
    }

    #[test]
    fn test_registry_resolves_aliases() {
        let registry = ClassifierRegistry::with_defaults();
        assert_eq!(registry.resolve("Jumping-Jacks").unwrap().id(), "jumping_jack");
        assert_eq!(registry.resolve("pullup").unwrap().id(), "pull_up");
        assert!(matches!(
            registry.resolve("cartwheel"),
            Err(MotionError::UnknownExercise(_))
        ));
        assert_eq!(registry.ids().count(), 8);
    }

    #[test]
    fn test_degenerate_calibration_falls_back() {
        let defaults = Extremes::new(175.0, 95.0);
        let mut profile = CalibrationProfile::new("squat");
        profile.set("top_angle", 170.0);
        profile.set("bottom_angle", 165.0);
        let ctx = ClassifierContext {
            calibration: Some(&profile),
            bar: None,
            min_confidence: 0.5,
        };
        assert_eq!(defaults.calibrated(&ctx, "top_angle", "bottom_angle"), defaults);
    }
}
