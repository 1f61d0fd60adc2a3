//! 2D geometry helpers
//!
//! Pure functions over projected landmark positions. Degenerate inputs are
//! floor-clamped rather than reported.

use serde::{Deserialize, Serialize};

/// Smallest denominator allowed in ratio and angle math
pub const MIN_DENOMINATOR: f64 = 1e-6;

/// A point in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Angle at vertex `b` formed by `a-b-c`, in degrees (law of cosines)
pub fn angle_at_vertex(a: Point, b: Point, c: Point) -> f64 {
    let ab = distance(a, b);
    let cb = distance(c, b);
    let ac = distance(a, c);

    let denominator = (2.0 * ab * cb).max(MIN_DENOMINATOR);
    let cos_angle = ((ab * ab + cb * cb - ac * ac) / denominator).clamp(-1.0, 1.0);

    cos_angle.acos().to_degrees()
}

/// Midpoint of two points
pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Midpoint weighted by each point's confidence
pub fn weighted_midpoint(a: Point, weight_a: f64, b: Point, weight_b: f64) -> Point {
    let total = weight_a.max(0.0) + weight_b.max(0.0);
    if total < MIN_DENOMINATOR {
        return midpoint(a, b);
    }
    let wa = weight_a.max(0.0) / total;
    let wb = weight_b.max(0.0) / total;
    Point::new(a.x * wa + b.x * wb, a.y * wa + b.y * wb)
}

/// `numerator / denominator` with the denominator floored
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    numerator / denominator.abs().max(MIN_DENOMINATOR)
}

/// Linear map of `value` from the `[from_lo, from_hi]` span onto `[to_lo, to_hi]`
pub fn remap(value: f64, from_lo: f64, from_hi: f64, to_lo: f64, to_hi: f64) -> f64 {
    let span = from_hi - from_lo;
    if span.abs() < MIN_DENOMINATOR {
        return to_lo;
    }
    to_lo + (value - from_lo) / span * (to_hi - to_lo)
}

/// Position of `value` between `rest` and `extreme`, as a 0-100 percentage
pub fn progress_pct(value: f64, rest: f64, extreme: f64) -> f64 {
    let span = extreme - rest;
    if span.abs() < MIN_DENOMINATOR {
        return 0.0;
    }
    ((value - rest) / span * 100.0).clamp(0.0, 100.0)
}

/// Median of a sample set; `None` when empty
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_angle() {
        let angle = angle_at_vertex(
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(1.0, 0.0),
        );
        assert!((angle - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_right_angle() {
        let angle = angle_at_vertex(
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(0.5, 0.5),
        );
        assert!((angle - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_angle_is_finite() {
        let p = Point::new(0.3, 0.3);
        let angle = angle_at_vertex(p, p, p);
        assert!(angle.is_finite());
    }

    #[test]
    fn test_weighted_midpoint() {
        let m = weighted_midpoint(Point::new(0.0, 0.0), 3.0, Point::new(1.0, 1.0), 1.0);
        assert!((m.x - 0.25).abs() < 1e-9);
        assert!((m.y - 0.25).abs() < 1e-9);

        let fallback = weighted_midpoint(Point::new(0.0, 0.0), 0.0, Point::new(1.0, 0.0), 0.0);
        assert_eq!(fallback, Point::new(0.5, 0.0));
    }

    #[test]
    fn test_remap_preserves_relative_position() {
        // 115 sits a quarter of the way up the default 95..175 span
        let mapped = remap(115.0, 95.0, 175.0, 105.0, 175.0);
        assert!((mapped - 122.5).abs() < 1e-9);
    }

    #[test]
    fn test_progress_pct_clamps() {
        assert_eq!(progress_pct(175.0, 175.0, 95.0), 0.0);
        assert_eq!(progress_pct(60.0, 175.0, 95.0), 100.0);
        assert!((progress_pct(135.0, 175.0, 95.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
