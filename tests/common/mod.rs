//! Shared fixtures for the integration tests

use head_tracking::clock::ManualClock;
use head_tracking::config::Config;
use head_tracking::constants::FRAME_BUFFER_LEN;
use head_tracking::frame::pack_rgb565;
use head_tracking::reflex::ReflexTracker;

/// Tracker driven by a deterministic clock starting at t = 1000 ms
pub fn tracker_with_clock() -> (ReflexTracker, ManualClock) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = ManualClock::new(1000);
    let tracker =
        ReflexTracker::with_clock(Config::default(), Box::new(clock.clone())).expect("valid config");
    (tracker, clock)
}

/// RGB565 frame with a skin-tone square centered at (cx, cy) on a dark
/// blue background
#[allow(dead_code)]
pub fn face_frame(cx: i32, cy: i32, half: i32) -> Vec<u8> {
    let skin = pack_rgb565(200, 140, 110);
    let background = pack_rgb565(10, 10, 60);
    let mut buf = vec![0u8; FRAME_BUFFER_LEN];
    for y in 0..240i32 {
        for x in 0..240i32 {
            let inside = (x - cx).abs() <= half && (y - cy).abs() <= half;
            let pixel = if inside { skin } else { background };
            let idx = ((y * 240 + x) * 2) as usize;
            buf[idx] = (pixel & 0xFF) as u8;
            buf[idx + 1] = (pixel >> 8) as u8;
        }
    }
    buf
}
