//! Tracking health
//!
//! Classifies each frame as good / partial / lost from the landmark groups the
//! active exercise needs, and picks the most actionable hint for the user.

use crate::types::{landmark, SmoothedFrame};
use serde::{Deserialize, Serialize};

/// Body region a classifier depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkGroup {
    /// Hips, knees and ankles
    LowerBody,
    /// Shoulders and hips
    UpperBody,
    /// Elbows and wrists
    Arms,
    /// Nose
    Face,
}

impl LandmarkGroup {
    /// Hint priority; lower goes first
    fn priority(&self) -> u8 {
        match self {
            LandmarkGroup::LowerBody => 0,
            LandmarkGroup::UpperBody => 1,
            LandmarkGroup::Arms => 2,
            LandmarkGroup::Face => 3,
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            LandmarkGroup::LowerBody => "Step back so your legs and feet are visible",
            LandmarkGroup::UpperBody => "Keep your shoulders and hips in frame",
            LandmarkGroup::Arms => "Keep both arms in view",
            LandmarkGroup::Face => "Keep your face visible",
        }
    }

    /// Landmark chains for each body side; the group is visible when at least
    /// one side is fully confident
    fn side_chains(&self) -> &'static [&'static [usize]] {
        match self {
            LandmarkGroup::LowerBody => &[
                &[landmark::LEFT_HIP, landmark::LEFT_KNEE, landmark::LEFT_ANKLE],
                &[landmark::RIGHT_HIP, landmark::RIGHT_KNEE, landmark::RIGHT_ANKLE],
            ],
            LandmarkGroup::UpperBody => &[
                &[landmark::LEFT_SHOULDER, landmark::LEFT_HIP],
                &[landmark::RIGHT_SHOULDER, landmark::RIGHT_HIP],
            ],
            LandmarkGroup::Arms => &[
                &[landmark::LEFT_ELBOW, landmark::LEFT_WRIST],
                &[landmark::RIGHT_ELBOW, landmark::RIGHT_WRIST],
            ],
            LandmarkGroup::Face => &[&[landmark::NOSE]],
        }
    }

    pub fn is_visible(&self, frame: &SmoothedFrame, min_confidence: f64) -> bool {
        self.side_chains().iter().any(|chain| {
            chain
                .iter()
                .all(|&index| frame.is_confident(index, min_confidence))
        })
    }
}

/// Overall tracking quality for the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Good,
    Partial,
    Lost,
}

/// Tracking assessment with the most actionable hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub status: TrackingStatus,
    pub missing: Vec<LandmarkGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Assess tracking health for the required groups of the active exercise
pub fn assess_tracking(
    frame: Option<&SmoothedFrame>,
    required: &[LandmarkGroup],
    min_confidence: f64,
) -> TrackingReport {
    let Some(frame) = frame else {
        return TrackingReport {
            status: TrackingStatus::Lost,
            missing: required.to_vec(),
            hint: Some("Step into view of the camera".to_string()),
        };
    };

    let mut missing: Vec<LandmarkGroup> = required
        .iter()
        .copied()
        .filter(|group| !group.is_visible(frame, min_confidence))
        .collect();
    missing.sort_by_key(LandmarkGroup::priority);

    let status = match missing.len() {
        0 => TrackingStatus::Good,
        1 => TrackingStatus::Partial,
        _ => TrackingStatus::Lost,
    };

    TrackingReport {
        status,
        hint: missing.first().map(|group| group.hint().to_string()),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    fn frame_with(confident: &[usize]) -> SmoothedFrame {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.1); 33];
        for &i in confident {
            landmarks[i].confidence = 0.9;
        }
        SmoothedFrame {
            timestamp_ms: 0,
            landmarks,
        }
    }

    #[test]
    fn test_no_pose_is_lost() {
        let report = assess_tracking(None, &[LandmarkGroup::LowerBody], 0.5);
        assert_eq!(report.status, TrackingStatus::Lost);
        assert!(report.hint.is_some());
    }

    #[test]
    fn test_one_side_is_enough() {
        let frame = frame_with(&[landmark::LEFT_HIP, landmark::LEFT_KNEE, landmark::LEFT_ANKLE]);
        let report = assess_tracking(Some(&frame), &[LandmarkGroup::LowerBody], 0.5);
        assert_eq!(report.status, TrackingStatus::Good);
        assert_eq!(report.hint, None);
    }

    #[test]
    fn test_lower_body_hint_takes_priority() {
        let frame = frame_with(&[landmark::LEFT_SHOULDER]);
        let report = assess_tracking(
            Some(&frame),
            &[LandmarkGroup::Arms, LandmarkGroup::UpperBody, LandmarkGroup::LowerBody],
            0.5,
        );
        assert_eq!(report.status, TrackingStatus::Lost);
        assert_eq!(report.missing[0], LandmarkGroup::LowerBody);
        assert_eq!(
            report.hint.as_deref(),
            Some("Step back so your legs and feet are visible")
        );
    }

    #[test]
    fn test_single_missing_group_is_partial() {
        let frame = frame_with(&[
            landmark::LEFT_SHOULDER,
            landmark::LEFT_HIP,
            landmark::LEFT_KNEE,
            landmark::LEFT_ANKLE,
        ]);
        let report = assess_tracking(
            Some(&frame),
            &[LandmarkGroup::LowerBody, LandmarkGroup::UpperBody, LandmarkGroup::Arms],
            0.5,
        );
        assert_eq!(report.status, TrackingStatus::Partial);
        assert_eq!(report.hint.as_deref(), Some("Keep both arms in view"));
    }
}
