//! Frame preprocessing
//!
//! Blends each incoming landmark frame with the previous smoothed frame so the
//! classifiers see stable geometry:
//! - Coordinates follow `prev + (raw - prev) * alpha`
//! - Confidence passes through untouched (it gates trust, not geometry)
//! - A missing previous frame or a changed keypoint count restarts smoothing

use crate::config::DEFAULT_SMOOTHING_ALPHA;
use crate::types::{Landmark, LandmarkFrame, SmoothedFrame};

/// Smooth a raw frame against the previous smoothed frame.
///
/// Returns `None` when the frame carries no pose.
pub fn smooth_frame(
    raw: &LandmarkFrame,
    prev: Option<&SmoothedFrame>,
    alpha: f64,
) -> Option<SmoothedFrame> {
    if !raw.has_pose() {
        return None;
    }

    let landmarks = match prev {
        Some(prev) if prev.landmarks.len() == raw.landmarks.len() => raw
            .landmarks
            .iter()
            .zip(&prev.landmarks)
            .map(|(cur, old)| blend(cur, old, alpha))
            .collect(),
        _ => raw.landmarks.clone(),
    };

    Some(SmoothedFrame {
        timestamp_ms: raw.timestamp_ms,
        landmarks,
    })
}

fn blend(cur: &Landmark, old: &Landmark, alpha: f64) -> Landmark {
    Landmark {
        x: old.x + (cur.x - old.x) * alpha,
        y: old.y + (cur.y - old.y) * alpha,
        z: match (cur.z, old.z) {
            (Some(z), Some(prev_z)) => Some(prev_z + (z - prev_z) * alpha),
            (z, _) => z,
        },
        confidence: cur.confidence,
    }
}

/// Stateful wrapper that remembers the last smoothed frame
#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    alpha: f64,
    last: Option<SmoothedFrame>,
}

impl Default for FramePreprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_ALPHA)
    }
}

impl FramePreprocessor {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, last: None }
    }

    /// Smooth the next frame; a frame without a pose clears the history
    pub fn process(&mut self, raw: &LandmarkFrame) -> Option<&SmoothedFrame> {
        self.last = smooth_frame(raw, self.last.as_ref(), self.alpha);
        self.last.as_ref()
    }

    /// Most recent smoothed frame, if a pose is currently tracked
    pub fn last(&self) -> Option<&SmoothedFrame> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: u64, x: f64, confidence: f64, count: usize) -> LandmarkFrame {
        LandmarkFrame::new(ts, vec![Landmark::new(x, 0.5, confidence); count])
    }

    #[test]
    fn test_cold_start_passes_through() {
        let raw = frame(0, 0.8, 0.9, 33);
        let smoothed = smooth_frame(&raw, None, 0.25).unwrap();
        assert_eq!(smoothed.landmarks, raw.landmarks);
    }

    #[test]
    fn test_blends_coordinates() {
        let mut pre = FramePreprocessor::new(0.25);
        pre.process(&frame(0, 0.0, 0.9, 33));
        let smoothed = pre.process(&frame(33, 1.0, 0.4, 33)).unwrap();

        assert!((smoothed.landmarks[0].x - 0.25).abs() < 1e-9);
        assert!((smoothed.landmarks[0].y - 0.5).abs() < 1e-9);
        // Confidence is never smoothed
        assert_eq!(smoothed.landmarks[0].confidence, 0.4);
    }

    #[test]
    fn test_count_change_restarts() {
        let mut pre = FramePreprocessor::new(0.25);
        pre.process(&frame(0, 0.0, 0.9, 33));
        let smoothed = pre.process(&frame(33, 1.0, 0.9, 17)).unwrap();
        assert_eq!(smoothed.landmarks[0].x, 1.0);
    }

    #[test]
    fn test_no_pose_clears_history() {
        let mut pre = FramePreprocessor::new(0.25);
        pre.process(&frame(0, 0.0, 0.9, 33));
        assert!(pre.process(&LandmarkFrame::empty(33)).is_none());
        let smoothed = pre.process(&frame(66, 1.0, 0.9, 33)).unwrap();
        assert_eq!(smoothed.landmarks[0].x, 1.0);
    }
}
