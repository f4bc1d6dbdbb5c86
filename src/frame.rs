//! Read-only frame access and RGB565 to HSV color conversion.
//!
//! The camera delivers 240x240 RGB565 little-endian buffers. The tracker
//! never mutates or retains a frame; every operation borrows a
//! [`FrameView`] for the duration of one call.

use crate::constants::{FRAME_BUFFER_LEN, FRAME_HEIGHT, FRAME_WIDTH};
use crate::{Error, Result};

/// A pixel in HSV space, H in 0-179, S and V in 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hsv {
    pub h: i32,
    pub s: i32,
    pub v: i32,
}

/// Borrowed, read-only view over one RGB565 camera frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap a raw RGB565 buffer, validating its length
    ///
    /// # Errors
    /// Returns [`Error::FrameBuffer`] if the buffer is not exactly one
    /// 240x240 RGB565 frame.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() != FRAME_BUFFER_LEN {
            return Err(Error::FrameBuffer(format!(
                "expected {} bytes, got {}",
                FRAME_BUFFER_LEN,
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// HSV value of the pixel at (x, y)
    ///
    /// Out-of-range coordinates yield black (all zeros) rather than an
    /// error, so sampling loops near the frame edge degrade gracefully.
    #[must_use]
    pub fn pixel_hsv(&self, x: i32, y: i32) -> Hsv {
        if x < 0 || x >= FRAME_WIDTH || y < 0 || y >= FRAME_HEIGHT {
            return Hsv::default();
        }
        let idx = (y as usize * FRAME_WIDTH as usize + x as usize) * 2;
        let pixel = u16::from(self.data[idx + 1]) << 8 | u16::from(self.data[idx]);
        rgb565_to_hsv(pixel)
    }
}

/// Convert a packed RGB565 pixel to HSV (H 0-179, S/V 0-100)
#[must_use]
pub fn rgb565_to_hsv(rgb565: u16) -> Hsv {
    let r = i32::from((rgb565 >> 11) & 0x1F) << 3;
    let g = i32::from((rgb565 >> 5) & 0x3F) << 2;
    let b = i32::from(rgb565 & 0x1F) << 3;

    let max_rgb = r.max(g).max(b);
    let min_rgb = r.min(g).min(b);
    let delta = max_rgb - min_rgb;

    let v = (max_rgb * 100) / 255;
    let s = if max_rgb == 0 { 0 } else { (delta * 100) / max_rgb };

    let mut h = if delta == 0 {
        0
    } else if max_rgb == r {
        let mut h = 30 * ((g - b) / delta);
        if h < 0 {
            h += 180;
        }
        h
    } else if max_rgb == g {
        30 * (2 + (b - r) / delta)
    } else {
        30 * (4 + (r - g) / delta)
    };

    h = h.clamp(0, 179);
    Hsv {
        h,
        s: s.clamp(0, 100),
        v: v.clamp(0, 100),
    }
}

/// Pack an RGB888 triple into RGB565 (test and fixture helper)
#[must_use]
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}

/// Skin tone gate in HSV space
///
/// Matches the camera calibration the signature model was tuned against:
/// H in [0, 25], S in [25, 95], V in [45, 98].
#[must_use]
pub fn is_skin_tone(hsv: Hsv) -> bool {
    (0..=25).contains(&hsv.h) && (25..=95).contains(&hsv.s) && (45..=98).contains(&hsv.v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_view_rejects_wrong_length() {
        let short = vec![0u8; 100];
        assert!(FrameView::new(&short).is_err());

        let exact = vec![0u8; FRAME_BUFFER_LEN];
        assert!(FrameView::new(&exact).is_ok());
    }

    #[test]
    fn test_out_of_range_pixel_is_black() {
        let buf = vec![0xFFu8; FRAME_BUFFER_LEN];
        let frame = FrameView::new(&buf).unwrap();
        assert_eq!(frame.pixel_hsv(-1, 0), Hsv::default());
        assert_eq!(frame.pixel_hsv(0, 240), Hsv::default());
    }

    #[test]
    fn test_rgb565_primaries() {
        // Pure red: hue 0, full saturation
        let red = rgb565_to_hsv(pack_rgb565(255, 0, 0));
        assert_eq!(red.h, 0);
        assert_eq!(red.s, 100);
        assert!(red.v > 90);

        // Pure green: hue near 60 in 0-179 space
        let green = rgb565_to_hsv(pack_rgb565(0, 255, 0));
        assert_eq!(green.h, 60);

        // Pure blue: hue near 120
        let blue = rgb565_to_hsv(pack_rgb565(0, 0, 255));
        assert_eq!(blue.h, 120);

        // Gray: no saturation, hue 0
        let gray = rgb565_to_hsv(pack_rgb565(128, 128, 128));
        assert_eq!(gray.s, 0);
        assert_eq!(gray.h, 0);
    }

    #[test]
    fn test_skin_tone_gate() {
        assert!(is_skin_tone(Hsv { h: 10, s: 50, v: 70 }));
        assert!(!is_skin_tone(Hsv { h: 90, s: 50, v: 70 })); // wrong hue
        assert!(!is_skin_tone(Hsv { h: 10, s: 10, v: 70 })); // too desaturated
        assert!(!is_skin_tone(Hsv { h: 10, s: 50, v: 20 })); // too dark
    }

    #[test]
    fn test_pixel_addressing_little_endian() {
        let mut buf = vec![0u8; FRAME_BUFFER_LEN];
        let pixel = pack_rgb565(255, 0, 0);
        // Pixel at (3, 2)
        let idx = (2 * 240 + 3) * 2;
        buf[idx] = (pixel & 0xFF) as u8;
        buf[idx + 1] = (pixel >> 8) as u8;

        let frame = FrameView::new(&buf).unwrap();
        let hsv = frame.pixel_hsv(3, 2);
        assert_eq!(hsv.h, 0);
        assert_eq!(hsv.s, 100);
    }
}
