//! Constants shared across the tracking core.
//!
//! Per-component tunables live in [`crate::config`]; what belongs here is the
//! fixed hardware contract (frame geometry, servo ranges) and the control
//! tick timing.

/// Camera frame width in pixels
pub const FRAME_WIDTH: i32 = 240;

/// Camera frame height in pixels
pub const FRAME_HEIGHT: i32 = 240;

/// Bytes per RGB565 pixel
pub const BYTES_PER_PIXEL: usize = 2;

/// Expected frame buffer length in bytes
pub const FRAME_BUFFER_LEN: usize = (FRAME_WIDTH as usize) * (FRAME_HEIGHT as usize) * BYTES_PER_PIXEL;

/// Horizontal frame center
pub const CAMERA_CENTER_X: i32 = 120;

/// Vertical frame center
pub const CAMERA_CENTER_Y: i32 = 120;

/// Base (pan) servo range in degrees
pub const BASE_MIN: f32 = 10.0;
pub const BASE_MAX: f32 = 170.0;
pub const BASE_CENTER: f32 = 90.0;

/// Nod (tilt) servo range in degrees
pub const NOD_MIN: f32 = 80.0;
pub const NOD_MAX: f32 = 150.0;
pub const NOD_CENTER: f32 = 115.0;

/// Control loop rate (50 Hz)
pub const CONTROL_RATE_HZ: f32 = 50.0;

/// Control loop time step in seconds
pub const CONTROL_DT: f32 = 0.02;

/// Number of bins in each hue/saturation histogram
pub const HIST_BINS: usize = 16;

/// Number of vertically stacked signature regions
pub const NUM_REGIONS: usize = 3;

/// Rolling window length for tracking quality assessment
pub const QUALITY_HISTORY_SIZE: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_len() {
        assert_eq!(FRAME_BUFFER_LEN, 115_200);
    }

    #[test]
    fn test_servo_centers_inside_range() {
        assert!(BASE_MIN < BASE_CENTER && BASE_CENTER < BASE_MAX);
        assert!(NOD_MIN < NOD_CENTER && NOD_CENTER < NOD_MAX);
    }
}
