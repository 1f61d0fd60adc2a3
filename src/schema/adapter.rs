//! Adapter for converting pose.frame.v1 events to landmark frames
//!
//! Handles both input layouts (NDJSON and JSON array) and batch-level checks
//! such as timestamp ordering.

use crate::error::MotionError;
use crate::schema::frame_event::*;
use crate::types::LandmarkFrame;

/// Adapter for parsing and validating frame events
pub struct FrameAdapter;

impl FrameAdapter {
    /// Parse a JSON string containing an array of FrameEvents
    pub fn parse_array(json: &str) -> Result<Vec<FrameEvent>, MotionError> {
        let events: Vec<FrameEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing FrameEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameEvent>, MotionError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FrameEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(MotionError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Parse either layout, picking by the first non-blank character
    pub fn parse_auto(input: &str) -> Result<Vec<FrameEvent>, MotionError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Validate every event and convert to landmark frames
    pub fn to_landmark_frames(events: Vec<FrameEvent>) -> Result<Vec<LandmarkFrame>, MotionError> {
        if let Some(failure) = Self::validate_frames(&events).into_iter().next() {
            return Err(MotionError::InvalidFrame(format!(
                "frame {}: {}",
                failure.index, failure.error
            )));
        }
        Ok(events.into_iter().map(LandmarkFrame::from).collect())
    }

    /// Validate a batch of events, including timestamp ordering
    pub fn validate_frames(events: &[FrameEvent]) -> Vec<ValidationResult> {
        let mut failures = Vec::new();
        let mut previous: Option<u64> = None;

        for (index, event) in events.iter().enumerate() {
            let ordering = match previous {
                Some(prev) if event.timestamp_ms < prev => {
                    Err(ValidationError::TimestampRegression {
                        previous: prev,
                        actual: event.timestamp_ms,
                    })
                }
                _ => Ok(()),
            };

            if let Err(error) = event.validate().and(ordering) {
                failures.push(ValidationResult {
                    index,
                    frame_id: event.frame_id.clone(),
                    error,
                });
            }
            previous = Some(previous.map_or(event.timestamp_ms, |p| p.max(event.timestamp_ms)));
        }

        failures
    }
}

/// Result of frame validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub frame_id: Option<String>,
    pub error: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    fn ndjson() -> String {
        [
            r#"{"schema_version": "pose.frame.v1", "timestamp_ms": 0, "landmarks": []}"#,
            "",
            r#"{"timestamp_ms": 33, "landmarks": [{"x": 0.5, "y": 0.5, "confidence": 0.9}]}"#,
        ]
        .join("\n")
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let events = FrameAdapter::parse_ndjson(&ndjson()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].timestamp_ms, 33);
    }

    #[test]
    fn test_parse_ndjson_names_failing_line() {
        let input = format!("{}\nnot json", ndjson());
        match FrameAdapter::parse_ndjson(&input) {
            Err(MotionError::ParseError(msg)) => assert!(msg.contains("line 4")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_auto_detects_array() {
        let events = FrameAdapter::parse_auto(r#" [{"timestamp_ms": 1}, {"timestamp_ms": 2}]"#).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(FrameAdapter::parse_auto(&ndjson()).unwrap().len(), 2);
    }

    #[test]
    fn test_validate_frames_reports_regression() {
        let events = vec![
            FrameEvent::new(100, Vec::new()),
            FrameEvent::new(50, Vec::new()),
            FrameEvent::new(100, vec![Landmark::new(0.5, 0.5, 2.0)]),
        ];
        let failures = FrameAdapter::validate_frames(&events);

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert_eq!(
            failures[0].error,
            ValidationError::TimestampRegression {
                previous: 100,
                actual: 50
            }
        );
        assert!(matches!(
            failures[1].error,
            ValidationError::ConfidenceOutOfRange { .. }
        ));
    }

    #[test]
    fn test_to_landmark_frames() {
        let frames = FrameAdapter::to_landmark_frames(FrameAdapter::parse_ndjson(&ndjson()).unwrap())
            .unwrap();
        assert!(!frames[0].has_pose());
        assert!(frames[1].has_pose());

        let bad = vec![FrameEvent::new(0, vec![Landmark::new(f64::INFINITY, 0.5, 0.9)])];
        assert!(matches!(
            FrameAdapter::to_landmark_frames(bad),
            Err(MotionError::InvalidFrame(_))
        ));
    }
}
