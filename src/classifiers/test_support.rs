//! Synthetic landmark frames for classifier tests

use crate::geometry::Point;
use crate::types::{landmark, Landmark, SmoothedFrame, MAX_LANDMARKS};

pub(crate) const CONFIDENT: f64 = 0.95;

/// Standing skeleton with every landmark confident
pub(crate) fn base_landmarks() -> Vec<Landmark> {
    let mut lms = vec![Landmark::new(0.5, 0.5, CONFIDENT); MAX_LANDMARKS];
    set(&mut lms, landmark::NOSE, 0.5, 0.15);
    set(&mut lms, landmark::LEFT_SHOULDER, 0.42, 0.25);
    set(&mut lms, landmark::RIGHT_SHOULDER, 0.58, 0.25);
    set(&mut lms, landmark::LEFT_ELBOW, 0.40, 0.37);
    set(&mut lms, landmark::RIGHT_ELBOW, 0.60, 0.37);
    set(&mut lms, landmark::LEFT_WRIST, 0.40, 0.49);
    set(&mut lms, landmark::RIGHT_WRIST, 0.60, 0.49);
    set(&mut lms, landmark::LEFT_HIP, 0.45, 0.5);
    set(&mut lms, landmark::RIGHT_HIP, 0.55, 0.5);
    set(&mut lms, landmark::LEFT_KNEE, 0.45, 0.7);
    set(&mut lms, landmark::RIGHT_KNEE, 0.55, 0.7);
    set(&mut lms, landmark::LEFT_ANKLE, 0.45, 0.9);
    set(&mut lms, landmark::RIGHT_ANKLE, 0.55, 0.9);
    lms
}

pub(crate) fn set(lms: &mut [Landmark], index: usize, x: f64, y: f64) {
    lms[index].x = x;
    lms[index].y = y;
}

pub(crate) fn frame(timestamp_ms: u64, landmarks: Vec<Landmark>) -> SmoothedFrame {
    SmoothedFrame {
        timestamp_ms,
        landmarks,
    }
}

/// Point at `length` from `vertex`, at `angle_deg` from the upward direction
/// (`sign` picks the side)
fn swing(vertex: Point, length: f64, angle_deg: f64, sign: f64) -> Point {
    let theta = angle_deg.to_radians();
    Point::new(
        vertex.x + sign * length * theta.sin(),
        vertex.y - length * theta.cos(),
    )
}

/// Skeleton whose hip-knee-ankle angle equals `knee_angle` on both legs
pub(crate) fn squat_frame(timestamp_ms: u64, knee_angle: f64) -> SmoothedFrame {
    let mut lms = base_landmarks();
    for (knee, ankle, sign) in [
        (landmark::LEFT_KNEE, landmark::LEFT_ANKLE, -1.0),
        (landmark::RIGHT_KNEE, landmark::RIGHT_ANKLE, 1.0),
    ] {
        let k = lms[knee].point();
        let a = swing(k, 0.2, knee_angle, sign);
        set(&mut lms, ankle, a.x, a.y);
    }
    frame(timestamp_ms, lms)
}

/// Skeleton with the given ankle-spread ratio (relative to hip width) and arm
/// lift (shoulder y minus wrist y)
pub(crate) fn jack_frame(timestamp_ms: u64, spread_ratio: f64, arm_lift: f64) -> SmoothedFrame {
    let mut lms = base_landmarks();
    let hip_width = 0.1;
    let half = spread_ratio * hip_width / 2.0;
    set(&mut lms, landmark::LEFT_ANKLE, 0.5 - half, 0.9);
    set(&mut lms, landmark::RIGHT_ANKLE, 0.5 + half, 0.9);
    set(&mut lms, landmark::LEFT_WRIST, 0.35, 0.25 - arm_lift);
    set(&mut lms, landmark::RIGHT_WRIST, 0.65, 0.25 - arm_lift);
    frame(timestamp_ms, lms)
}

/// Skeleton with each knee lifted by the given share of torso length
/// (`(hip y - knee y) / torso`)
pub(crate) fn knee_lift_frame(timestamp_ms: u64, left: f64, right: f64) -> SmoothedFrame {
    let mut lms = base_landmarks();
    // torso (shoulder to hip) is 0.25 tall on both sides
    set(&mut lms, landmark::LEFT_SHOULDER, 0.45, 0.25);
    set(&mut lms, landmark::RIGHT_SHOULDER, 0.55, 0.25);
    set(&mut lms, landmark::LEFT_KNEE, 0.45, 0.5 - left * 0.25);
    set(&mut lms, landmark::RIGHT_KNEE, 0.55, 0.5 - right * 0.25);
    frame(timestamp_ms, lms)
}

/// Side-view skeleton: torso tilted `torso_tilt` degrees above horizontal,
/// knees at `knee_angle`
pub(crate) fn side_frame(timestamp_ms: u64, torso_tilt: f64, knee_angle: f64) -> SmoothedFrame {
    let mut lms = base_landmarks();
    let hip = Point::new(0.5, 0.6);
    let tilt = torso_tilt.to_radians();
    let shoulder = Point::new(hip.x - 0.3 * tilt.cos(), hip.y - 0.3 * tilt.sin());
    // thigh continues the torso line away from the shoulders
    let knee = Point::new(hip.x + 0.2 * tilt.cos(), hip.y + 0.2 * tilt.sin());
    let thigh_dir = (knee.x - hip.x, knee.y - hip.y);
    // rotate the thigh direction by (180 - knee_angle) to place the shin
    let bend = (180.0 - knee_angle).to_radians();
    let shin = (
        thigh_dir.0 * bend.cos() - thigh_dir.1 * bend.sin(),
        thigh_dir.0 * bend.sin() + thigh_dir.1 * bend.cos(),
    );
    let ankle = Point::new(knee.x + shin.0, knee.y + shin.1);

    for (s, h, k, a) in [
        (
            landmark::LEFT_SHOULDER,
            landmark::LEFT_HIP,
            landmark::LEFT_KNEE,
            landmark::LEFT_ANKLE,
        ),
        (
            landmark::RIGHT_SHOULDER,
            landmark::RIGHT_HIP,
            landmark::RIGHT_KNEE,
            landmark::RIGHT_ANKLE,
        ),
    ] {
        set(&mut lms, s, shoulder.x, shoulder.y);
        set(&mut lms, h, hip.x, hip.y);
        set(&mut lms, k, knee.x, knee.y);
        set(&mut lms, a, ankle.x, ankle.y);
    }
    frame(timestamp_ms, lms)
}

/// Hanging skeleton below a bar at `bar_y`: nose at `bar_y - clearance`,
/// elbows bent to `elbow_angle`, wrists on the bar
pub(crate) fn hang_frame(
    timestamp_ms: u64,
    bar_y: f64,
    clearance: f64,
    elbow_angle: f64,
) -> SmoothedFrame {
    let mut lms = base_landmarks();
    let nose_y = bar_y - clearance;
    set(&mut lms, landmark::NOSE, 0.5, nose_y);
    for (wrist, elbow, shoulder, x) in [
        (landmark::LEFT_WRIST, landmark::LEFT_ELBOW, landmark::LEFT_SHOULDER, 0.4),
        (landmark::RIGHT_WRIST, landmark::RIGHT_ELBOW, landmark::RIGHT_SHOULDER, 0.6),
    ] {
        let w = Point::new(x, bar_y);
        // forearm hangs straight down from the wrist
        let e = Point::new(x, bar_y + 0.12);
        // upper arm swings from straight down by (180 - elbow_angle)
        let bend = (180.0 - elbow_angle).to_radians();
        let s = Point::new(x, e.y + 0.12 * bend.cos());
        let s = Point::new(s.x + 0.12 * bend.sin() * if x < 0.5 { 1.0 } else { -1.0 }, s.y);
        set(&mut lms, wrist, w.x, w.y);
        set(&mut lms, elbow, e.x, e.y);
        set(&mut lms, shoulder, s.x, s.y);
    }
    frame(timestamp_ms, lms)
}
