//! Bar reference locator
//!
//! Reference-line exercises count relative to a horizontal bar. The bar is
//! set either by two taps on the preview (manual) or by sampling wrist
//! positions while the user hangs (auto).

use crate::config::EngineConfig;
use crate::error::MotionError;
use crate::geometry::{median, Point};
use crate::types::{landmark, SmoothedFrame};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Horizontal reference line in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarReference {
    pub y: f64,
    pub x_min: f64,
    pub x_max: f64,
}

impl BarReference {
    pub fn new(y: f64, x_a: f64, x_b: f64) -> Result<Self, MotionError> {
        if !(y.is_finite() && x_a.is_finite() && x_b.is_finite()) {
            return Err(MotionError::BarReferenceError(
                "bar coordinates must be finite".to_string(),
            ));
        }
        Ok(Self {
            y,
            x_min: x_a.min(x_b),
            x_max: x_a.max(x_b),
        })
    }

    /// Line through the vertical midpoint of two taps, spanning their x-range
    pub fn from_points(a: Point, b: Point) -> Result<Self, MotionError> {
        Self::new((a.y + b.y) / 2.0, a.x, b.x)
    }
}

impl FromStr for BarReference {
    type Err = MotionError;

    /// `y` (full-width bar) or `y,x0,x1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| {
                p.trim().parse::<f64>().map_err(|e| {
                    MotionError::BarReferenceError(format!("invalid number '{}': {}", p.trim(), e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [y] => Self::new(*y, 0.0, 1.0),
            [y, x0, x1] => Self::new(*y, *x0, *x1),
            _ => Err(MotionError::BarReferenceError(format!(
                "expected 'y' or 'y,x0,x1', got '{}'",
                s
            ))),
        }
    }
}

/// Locator lifecycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BarLocatorState {
    #[default]
    Unset,
    /// First tap recorded
    Drafting { x: f64, y: f64 },
    /// Collecting wrist samples; the window opens on the first observed frame
    AutoSampling { started_ms: Option<u64> },
    Set { bar: BarReference },
}

/// Outcome of an auto-sampling window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BarEvent {
    Located { bar: BarReference },
    Aborted { samples: usize },
}

#[derive(Debug, Clone)]
pub struct BarReferenceLocator {
    state: BarLocatorState,
    samples: Vec<Point>,
    window_ms: u64,
    min_samples: usize,
    hand_offset: f64,
}

impl Default for BarReferenceLocator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl BarReferenceLocator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: BarLocatorState::Unset,
            samples: Vec::new(),
            window_ms: config.bar_sample_window_ms,
            min_samples: config.bar_min_samples,
            hand_offset: config.bar_hand_offset,
        }
    }

    pub fn state(&self) -> &BarLocatorState {
        &self.state
    }

    pub fn reference(&self) -> Option<&BarReference> {
        match &self.state {
            BarLocatorState::Set { bar } => Some(bar),
            _ => None,
        }
    }

    /// Use a known bar directly
    pub fn set(&mut self, bar: BarReference) {
        self.samples.clear();
        self.state = BarLocatorState::Set { bar };
        log::info!("Bar reference set at y={:.3}", bar.y);
    }

    /// Record a tap; the second tap finalizes the bar
    pub fn click(&mut self, x: f64, y: f64) -> Result<Option<BarReference>, MotionError> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(MotionError::BarReferenceError(
                "tap coordinates must be finite".to_string(),
            ));
        }
        match self.state {
            BarLocatorState::Drafting { x: x0, y: y0 } => {
                let bar = BarReference::from_points(Point::new(x0, y0), Point::new(x, y))?;
                self.set(bar);
                Ok(Some(bar))
            }
            _ => {
                self.samples.clear();
                self.state = BarLocatorState::Drafting { x, y };
                Ok(None)
            }
        }
    }

    /// Start sampling wrist positions; replaces any current bar
    pub fn start_auto(&mut self) {
        self.samples.clear();
        self.state = BarLocatorState::AutoSampling { started_ms: None };
        log::info!("Bar auto-detection started");
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.state = BarLocatorState::Unset;
    }

    /// Feed one frame while auto-sampling
    pub fn observe(
        &mut self,
        frame: Option<&SmoothedFrame>,
        now_ms: u64,
        min_confidence: f64,
    ) -> Option<BarEvent> {
        let BarLocatorState::AutoSampling { started_ms } = self.state else {
            return None;
        };
        let started = match started_ms {
            Some(started) => started,
            None => {
                self.state = BarLocatorState::AutoSampling {
                    started_ms: Some(now_ms),
                };
                now_ms
            }
        };

        if now_ms.saturating_sub(started) < self.window_ms {
            if let Some(frame) = frame {
                self.samples.extend(
                    [landmark::LEFT_WRIST, landmark::RIGHT_WRIST]
                        .into_iter()
                        .filter_map(|i| frame.point(i, min_confidence)),
                );
            }
            return None;
        }

        Some(self.finish_auto())
    }

    fn finish_auto(&mut self) -> BarEvent {
        let samples = std::mem::take(&mut self.samples);
        let heights: Vec<f64> = samples.iter().map(|p| p.y).collect();

        let located = if samples.len() >= self.min_samples {
            median(&heights).and_then(|y| {
                let x_min = samples.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
                let x_max = samples.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
                BarReference::new(y + self.hand_offset, x_min, x_max).ok()
            })
        } else {
            None
        };

        match located {
            Some(bar) => {
                self.set(bar);
                BarEvent::Located { bar }
            }
            None => {
                log::warn!(
                    "Bar auto-detection aborted with {} wrist samples (need {})",
                    samples.len(),
                    self.min_samples
                );
                self.state = BarLocatorState::Unset;
                BarEvent::Aborted {
                    samples: samples.len(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::test_support::{base_landmarks, frame, set};
    use pretty_assertions::assert_eq;

    fn hands_at(ts: u64, y: f64) -> SmoothedFrame {
        let mut lms = base_landmarks();
        set(&mut lms, landmark::LEFT_WRIST, 0.4, y);
        set(&mut lms, landmark::RIGHT_WRIST, 0.6, y);
        frame(ts, lms)
    }

    #[test]
    fn test_two_clicks_set_bar() {
        let mut locator = BarReferenceLocator::default();
        assert_eq!(locator.click(0.7, 0.22).unwrap(), None);
        assert!(matches!(locator.state(), BarLocatorState::Drafting { .. }));

        let bar = locator.click(0.3, 0.18).unwrap().unwrap();
        assert!((bar.y - 0.2).abs() < 1e-9);
        assert_eq!((bar.x_min, bar.x_max), (0.3, 0.7));
        assert_eq!(locator.reference(), Some(&bar));
    }

    #[test]
    fn test_auto_sampling_sets_bar_below_hands() {
        let mut locator = BarReferenceLocator::default();
        locator.start_auto();

        let mut event = None;
        for ts in (0..=900).step_by(100) {
            event = locator.observe(Some(&hands_at(ts, 0.2)), ts, 0.5);
        }

        let bar = locator.reference().copied().unwrap();
        assert_eq!(event, Some(BarEvent::Located { bar }));
        assert!((bar.y - 0.215).abs() < 1e-9);
        assert!((bar.x_min - 0.4).abs() < 1e-9);
        assert!((bar.x_max - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_auto_sampling_aborts_without_hands() {
        let mut locator = BarReferenceLocator::default();
        locator.start_auto();

        let mut event = None;
        for ts in (0..=900).step_by(100) {
            let mut hidden = hands_at(ts, 0.2);
            hidden.landmarks[landmark::LEFT_WRIST].confidence = 0.1;
            hidden.landmarks[landmark::RIGHT_WRIST].confidence = 0.1;
            event = locator.observe(Some(&hidden), ts, 0.5);
        }

        assert_eq!(event, Some(BarEvent::Aborted { samples: 0 }));
        assert_eq!(locator.state(), &BarLocatorState::Unset);
        assert_eq!(locator.reference(), None);
    }

    #[test]
    fn test_clear_removes_bar() {
        let mut locator = BarReferenceLocator::default();
        locator.set(BarReference::new(0.2, 0.3, 0.7).unwrap());
        locator.clear();
        assert_eq!(locator.reference(), None);
    }

    #[test]
    fn test_parse_bar_argument() {
        let full: BarReference = "0.25".parse().unwrap();
        assert_eq!((full.y, full.x_min, full.x_max), (0.25, 0.0, 1.0));

        let span: BarReference = "0.2, 0.6, 0.4".parse().unwrap();
        assert_eq!((span.x_min, span.x_max), (0.4, 0.6));

        assert!(matches!(
            "0.2,0.4".parse::<BarReference>(),
            Err(MotionError::BarReferenceError(_))
        ));
    }
}
