//! Rep quality
//!
//! Every counted rep gets a label from its tempo and range of motion. Labels
//! are tallied per session, globally and per exercise.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ROM share for a clean rep
pub const CLEAN_ROM_PCT: f64 = 70.0;
/// ROM share for an acceptable rep
pub const OK_ROM_PCT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Clean,
    Ok,
    Sloppy,
}

/// Label one rep.
///
/// `tempo_ms` is the time since the previous counted rep, 0 for the first.
pub fn classify_rep(rom_pct: Option<f64>, tempo_ms: u64, min_tempo_ms: u64) -> QualityLabel {
    if tempo_ms > 0 && tempo_ms < min_tempo_ms {
        return QualityLabel::Sloppy;
    }
    match rom_pct {
        None => QualityLabel::Ok,
        Some(rom) if rom >= CLEAN_ROM_PCT => QualityLabel::Clean,
        Some(rom) if rom >= OK_ROM_PCT => QualityLabel::Ok,
        Some(_) => QualityLabel::Sloppy,
    }
}

/// Quality of a single counted rep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepQuality {
    pub exercise_id: String,
    pub rep_count: u32,
    pub label: QualityLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rom_pct: Option<f64>,
    pub tempo_ms: u64,
}

impl RepQuality {
    pub fn new(
        exercise_id: impl Into<String>,
        rep_count: u32,
        rom_pct: Option<f64>,
        tempo_ms: u64,
        min_tempo_ms: u64,
    ) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            rep_count,
            label: classify_rep(rom_pct, tempo_ms, min_tempo_ms),
            rom_pct,
            tempo_ms,
        }
    }
}

/// Running label counts and ROM sum
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityCounts {
    pub clean: u32,
    pub ok: u32,
    pub sloppy: u32,
    pub rom_sum: f64,
    pub rom_count: u32,
}

impl QualityCounts {
    fn record(&mut self, rep: &RepQuality) {
        match rep.label {
            QualityLabel::Clean => self.clean += 1,
            QualityLabel::Ok => self.ok += 1,
            QualityLabel::Sloppy => self.sloppy += 1,
        }
        if let Some(rom) = rep.rom_pct {
            self.rom_sum += rom;
            self.rom_count += 1;
        }
    }

    pub fn total(&self) -> u32 {
        self.clean + self.ok + self.sloppy
    }

    pub fn mean_rom_pct(&self) -> Option<f64> {
        if self.rom_count == 0 {
            None
        } else {
            Some(self.rom_sum / self.rom_count as f64)
        }
    }
}

/// Session-scoped quality tally
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityAggregate {
    overall: QualityCounts,
    by_exercise: BTreeMap<String, QualityCounts>,
}

impl QualityAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, rep: &RepQuality) {
        self.overall.record(rep);
        self.by_exercise
            .entry(rep.exercise_id.clone())
            .or_default()
            .record(rep);
    }

    pub fn is_empty(&self) -> bool {
        self.overall.total() == 0
    }

    pub fn snapshot(&self) -> QualitySnapshot {
        QualitySnapshot {
            total_reps: self.overall.total(),
            mean_rom_pct: self.overall.mean_rom_pct(),
            overall: self.overall.clone(),
            by_exercise: self.by_exercise.clone(),
        }
    }

    /// Final snapshot; the aggregate starts over
    pub fn finish(&mut self) -> QualitySnapshot {
        let snapshot = self.snapshot();
        *self = Self::default();
        snapshot
    }
}

/// Immutable view of the aggregate handed off at session end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub total_reps: u32,
    pub mean_rom_pct: Option<f64>,
    pub overall: QualityCounts,
    pub by_exercise: BTreeMap<String, QualityCounts>,
}
