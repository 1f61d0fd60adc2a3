//! Session summary encoding
//!
//! This module turns the per-session tallies (counted reps, rejects, quality)
//! into a `motion.session.v1` JSON payload for the history store.

use crate::error::MotionError;
use crate::quality::QualitySnapshot;
use crate::types::{DecisionEvent, RejectReason};
use crate::{MOTION_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current session summary schema version
pub const SESSION_SCHEMA_VERSION: &str = "motion.session.v1";

/// Rejected attempts by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectCounts {
    pub too_fast: u32,
    pub insufficient_range: u32,
    pub same_side: u32,
}

impl RejectCounts {
    pub fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::TooFast => self.too_fast += 1,
            RejectReason::InsufficientRange => self.insufficient_range += 1,
            RejectReason::SameSide => self.same_side += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.too_fast + self.insufficient_range + self.same_side
    }
}

/// Per-exercise outcome of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub exercise_id: String,
    pub reps: u32,
    pub rejects: RejectCounts,
}

/// Decisions seen during one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTally {
    started_ms: Option<u64>,
    ended_ms: Option<u64>,
    exercises: BTreeMap<String, ExerciseSummary>,
}

impl SessionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the exercise appears in the summary even without reps
    pub fn touch(&mut self, exercise_id: &str) {
        self.entry(exercise_id);
    }

    /// Extend the session window to cover a processed frame
    pub fn observe_frame(&mut self, timestamp_ms: u64) {
        self.started_ms.get_or_insert(timestamp_ms);
        self.ended_ms = Some(timestamp_ms);
    }

    pub fn record(&mut self, exercise_id: &str, decision: &DecisionEvent) {
        match decision {
            DecisionEvent::Rep { .. } => self.entry(exercise_id).reps += 1,
            DecisionEvent::Reject { reason, .. } => self.entry(exercise_id).rejects.record(*reason),
            DecisionEvent::None => {}
        }
    }

    pub fn reps(&self, exercise_id: &str) -> u32 {
        self.exercises.get(exercise_id).map_or(0, |e| e.reps)
    }

    fn entry(&mut self, exercise_id: &str) -> &mut ExerciseSummary {
        self.exercises
            .entry(exercise_id.to_string())
            .or_insert_with(|| ExerciseSummary {
                exercise_id: exercise_id.to_string(),
                reps: 0,
                rejects: RejectCounts::default(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// motion.session.v1 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub schema_version: String,
    pub producer: SessionProducer,
    pub computed_at_utc: String,
    pub session_started_ms: Option<u64>,
    pub session_ended_ms: Option<u64>,
    pub exercises: Vec<ExerciseSummary>,
    pub quality: QualitySnapshot,
}

impl SessionSummary {
    pub fn total_reps(&self) -> u32 {
        self.exercises.iter().map(|e| e.reps).sum()
    }
}

/// Session encoder for producing summary payloads
pub struct SessionEncoder {
    instance_id: String,
}

impl Default for SessionEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(
        &self,
        tally: &SessionTally,
        quality: QualitySnapshot,
    ) -> Result<SessionSummary, MotionError> {
        if let (Some(start), Some(end)) = (tally.started_ms, tally.ended_ms) {
            if end < start {
                return Err(MotionError::EncodingError(format!(
                    "session ends at {}ms before it starts at {}ms",
                    end, start
                )));
            }
        }

        Ok(SessionSummary {
            schema_version: SESSION_SCHEMA_VERSION.to_string(),
            producer: SessionProducer {
                name: PRODUCER_NAME.to_string(),
                version: MOTION_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            session_started_ms: tally.started_ms,
            session_ended_ms: tally.ended_ms,
            exercises: tally.exercises.values().cloned().collect(),
            quality,
        })
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        tally: &SessionTally,
        quality: QualitySnapshot,
    ) -> Result<String, MotionError> {
        let summary = self.encode(tally, quality)?;
        serde_json::to_string_pretty(&summary).map_err(MotionError::JsonError)
    }
}
