//! Replay a synthetic squat set through the processor and print the summary

use synheart_motion::types::{landmark, Landmark, LandmarkFrame, MAX_LANDMARKS};
use synheart_motion::MotionProcessor;

const FRAME_MS: u64 = 33;
const REP_MS: f64 = 2000.0;

/// Standing skeleton with both knees bent to `knee_angle` degrees
fn squat_frame(timestamp_ms: u64, knee_angle: f64) -> LandmarkFrame {
    let mut lms = vec![Landmark::new(0.5, 0.5, 0.95); MAX_LANDMARKS];
    let mut put = |index: usize, x: f64, y: f64| {
        lms[index].x = x;
        lms[index].y = y;
    };
    put(landmark::NOSE, 0.5, 0.15);
    put(landmark::LEFT_SHOULDER, 0.42, 0.25);
    put(landmark::RIGHT_SHOULDER, 0.58, 0.25);
    put(landmark::LEFT_HIP, 0.45, 0.5);
    put(landmark::RIGHT_HIP, 0.55, 0.5);
    put(landmark::LEFT_KNEE, 0.45, 0.7);
    put(landmark::RIGHT_KNEE, 0.55, 0.7);

    let theta = knee_angle.to_radians();
    put(landmark::LEFT_ANKLE, 0.45 - 0.2 * theta.sin(), 0.7 - 0.2 * theta.cos());
    put(landmark::RIGHT_ANKLE, 0.55 + 0.2 * theta.sin(), 0.7 - 0.2 * theta.cos());

    LandmarkFrame::new(timestamp_ms, lms)
}

fn main() {
    let mut processor = MotionProcessor::new();
    if let Err(e) = processor.select_exercise("squats") {
        eprintln!("Error: {e:?}");
        return;
    }

    let total_ms = (REP_MS * 5.0) as u64 + 500;
    for ts in (0..total_ms).step_by(FRAME_MS as usize) {
        let cycle = (ts as f64 / REP_MS) * std::f64::consts::TAU;
        let knee_angle = 135.0 + 40.0 * cycle.cos();

        if let Some(report) = processor.process_frame(&squat_frame(ts, knee_angle)) {
            if let Some(quality) = &report.quality {
                println!(
                    "rep {} at {}ms: {:?} (rom {:?})",
                    quality.rep_count, ts, quality.label, quality.rom_pct
                );
            }
        }
    }

    match processor.finish_session_json() {
        Ok(summary) => print!("{summary}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
