//! Face signature model: a color/texture fingerprint of a confirmed face.
//!
//! A signature is built exactly once per acquisition event, when the
//! external vision model confirms a bounding box. It stores three
//! vertically stacked region histograms (hue and saturation), mean HSV,
//! a texture variance metric and a skin-pixel ratio. The signature is
//! read-only after creation; only validity can change.

use crate::constants::{FRAME_HEIGHT, FRAME_WIDTH, HIST_BINS, NUM_REGIONS};
use crate::frame::{is_skin_tone, FrameView};

/// Sampling stride inside the signature box
const SAMPLE_STEP: i32 = 2;

/// Margin added around the reported bounding box
const BOX_MARGIN: i32 = 5;

/// Stride for the coarse texture variance grid
const TEXTURE_STEP: i32 = 3;

/// Histogram and color statistics over a rectangular patch,
/// split into top/middle/bottom thirds
#[derive(Debug, Clone)]
pub struct RegionStats {
    /// Normalized hue histograms, one per region
    pub hue_hist: [[f32; HIST_BINS]; NUM_REGIONS],
    /// Normalized saturation histograms, one per region
    pub sat_hist: [[f32; HIST_BINS]; NUM_REGIONS],
    /// Mean hue over the whole patch
    pub mean_hue: f32,
    /// Mean saturation over the whole patch
    pub mean_sat: f32,
    /// Mean value over the whole patch
    pub mean_val: f32,
    /// Fraction of sampled pixels passing the skin gate
    pub skin_ratio: f32,
    /// Number of sampled pixels
    pub pixel_count: u32,
}

impl Default for RegionStats {
    fn default() -> Self {
        Self {
            hue_hist: [[0.0; HIST_BINS]; NUM_REGIONS],
            sat_hist: [[0.0; HIST_BINS]; NUM_REGIONS],
            mean_hue: 0.0,
            mean_sat: 0.0,
            mean_val: 0.0,
            skin_ratio: 0.0,
            pixel_count: 0,
        }
    }
}

/// Sample a patch on a 2-pixel grid and accumulate per-region histograms
///
/// The patch is clamped to the frame; the vertical extent is split into
/// three equal regions. Histograms come back probability-normalized.
#[must_use]
pub fn sample_region(frame: &FrameView<'_>, x1: i32, y1: i32, x2: i32, y2: i32) -> RegionStats {
    let mut stats = RegionStats::default();

    let x1 = x1.max(0);
    let y1 = y1.max(0);
    let x2 = x2.min(FRAME_WIDTH);
    let y2 = y2.min(FRAME_HEIGHT);
    if x2 <= x1 || y2 <= y1 {
        return stats;
    }

    let region_height = (y2 - y1) / NUM_REGIONS as i32;
    let top_end = y1 + region_height;
    let mid_end = top_end + region_height;

    let mut weights = [0.0f32; NUM_REGIONS];
    let mut sum_h = 0.0f32;
    let mut sum_s = 0.0f32;
    let mut sum_v = 0.0f32;
    let mut skin_pixels = 0u32;

    let mut y = y1;
    while y < y2 {
        let region = if y < top_end {
            0
        } else if y < mid_end {
            1
        } else {
            2
        };

        let mut x = x1;
        while x < x2 {
            let hsv = frame.pixel_hsv(x, y);

            if is_skin_tone(hsv) {
                skin_pixels += 1;
            }

            let h_bin = ((hsv.h as usize * HIST_BINS) / 180).min(HIST_BINS - 1);
            let s_bin = ((hsv.s as usize * HIST_BINS) / 100).min(HIST_BINS - 1);

            sum_h += hsv.h as f32;
            sum_s += hsv.s as f32;
            sum_v += hsv.v as f32;

            stats.hue_hist[region][h_bin] += 1.0;
            stats.sat_hist[region][s_bin] += 1.0;
            weights[region] += 1.0;
            stats.pixel_count += 1;

            x += SAMPLE_STEP;
        }
        y += SAMPLE_STEP;
    }

    for region in 0..NUM_REGIONS {
        if weights[region] > 0.0 {
            for bin in 0..HIST_BINS {
                stats.hue_hist[region][bin] /= weights[region];
                stats.sat_hist[region][bin] /= weights[region];
            }
        }
    }

    if stats.pixel_count > 0 {
        let n = stats.pixel_count as f32;
        stats.mean_hue = sum_h / n;
        stats.mean_sat = sum_s / n;
        stats.mean_val = sum_v / n;
        stats.skin_ratio = skin_pixels as f32 / n;
    }

    stats
}

/// Variance of the value channel over a coarse grid around (cx, cy)
#[must_use]
pub fn texture_variance(frame: &FrameView<'_>, cx: i32, cy: i32, radius: i32) -> f32 {
    let x1 = (cx - radius).max(0);
    let y1 = (cy - radius).max(0);
    let x2 = (cx + radius).min(FRAME_WIDTH);
    let y2 = (cy + radius).min(FRAME_HEIGHT);

    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0u32;

    let mut y = y1;
    while y < y2 {
        let mut x = x1;
        while x < x2 {
            let v = frame.pixel_hsv(x, y).v as f32;
            sum += v;
            sum_sq += v * v;
            count += 1;
            x += TEXTURE_STEP;
        }
        y += TEXTURE_STEP;
    }

    if count < 2 {
        return 0.0;
    }
    let n = count as f32;
    let mean = sum / n;
    (sum_sq / n) - (mean * mean)
}

/// Color/texture fingerprint of a confirmed face region
#[derive(Debug, Clone)]
pub struct FaceSignature {
    stats: RegionStats,
    texture_variance: f32,
    created_at_ms: u64,
    valid: bool,
}

impl FaceSignature {
    /// Build a signature from a confirmed bounding box
    ///
    /// Samples every 2nd pixel inside the box expanded by a 5 px margin.
    /// The signature is valid only if the skin ratio meets
    /// `min_skin_ratio`; an invalid signature makes every subsequent
    /// match attempt fail.
    #[must_use]
    pub fn build(
        frame: &FrameView<'_>,
        face_x: i32,
        face_y: i32,
        face_w: i32,
        face_h: i32,
        min_skin_ratio: f32,
        now_ms: u64,
    ) -> Self {
        let x1 = face_x - face_w / 2 - BOX_MARGIN;
        let y1 = face_y - face_h / 2 - BOX_MARGIN;
        let x2 = face_x + face_w / 2 + BOX_MARGIN;
        let y2 = face_y + face_h / 2 + BOX_MARGIN;

        let stats = sample_region(frame, x1, y1, x2, y2);
        let texture = texture_variance(frame, face_x, face_y, face_w.max(face_h) / 2);

        let valid = stats.pixel_count > 0 && stats.skin_ratio >= min_skin_ratio;

        Self {
            stats,
            texture_variance: texture,
            created_at_ms: now_ms,
            valid,
        }
    }

    /// Region statistics of the signature patch
    #[must_use]
    pub fn stats(&self) -> &RegionStats {
        &self.stats
    }

    /// Texture variance metric captured at creation
    #[must_use]
    pub fn texture_variance(&self) -> f32 {
        self.texture_variance
    }

    /// Skin-pixel ratio captured at creation
    #[must_use]
    pub fn skin_ratio(&self) -> f32 {
        self.stats.skin_ratio
    }

    /// Number of pixels sampled at creation
    #[must_use]
    pub fn pixel_count(&self) -> u32 {
        self.stats.pixel_count
    }

    /// Whether the signature is currently usable for matching
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Milliseconds since the signature was captured
    #[must_use]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// Mark the signature unusable
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Bhattacharyya coefficient between two probability histograms
#[must_use]
pub fn bhattacharyya(a: &[f32; HIST_BINS], b: &[f32; HIST_BINS]) -> f32 {
    let mut sum = 0.0;
    for i in 0..HIST_BINS {
        sum += (a[i] * b[i]).sqrt();
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_BUFFER_LEN;
    use crate::frame::pack_rgb565;

    fn solid_frame(r: u8, g: u8, b: u8) -> Vec<u8> {
        let pixel = pack_rgb565(r, g, b);
        let mut buf = vec![0u8; FRAME_BUFFER_LEN];
        for chunk in buf.chunks_exact_mut(2) {
            chunk[0] = (pixel & 0xFF) as u8;
            chunk[1] = (pixel >> 8) as u8;
        }
        buf
    }

    // A tone that lands inside the skin gate after RGB565 quantization
    fn skin_frame() -> Vec<u8> {
        solid_frame(200, 140, 110)
    }

    #[test]
    fn test_histograms_are_normalized() {
        let buf = skin_frame();
        let frame = FrameView::new(&buf).unwrap();
        let stats = sample_region(&frame, 60, 60, 180, 180);

        for region in 0..NUM_REGIONS {
            let hue_sum: f32 = stats.hue_hist[region].iter().sum();
            let sat_sum: f32 = stats.sat_hist[region].iter().sum();
            assert!((hue_sum - 1.0).abs() < 1e-3, "hue sum {hue_sum}");
            assert!((sat_sum - 1.0).abs() < 1e-3, "sat sum {sat_sum}");
        }
    }

    #[test]
    fn test_signature_valid_on_skin_region() {
        let buf = skin_frame();
        let frame = FrameView::new(&buf).unwrap();
        let sig = FaceSignature::build(&frame, 120, 120, 60, 60, 0.28, 1000);
        assert!(sig.is_valid());
        assert!(sig.skin_ratio() > 0.9);
        assert!(sig.pixel_count() > 0);
    }

    #[test]
    fn test_signature_invalid_without_skin() {
        // Saturated blue never passes the skin gate
        let buf = solid_frame(0, 0, 255);
        let frame = FrameView::new(&buf).unwrap();
        let sig = FaceSignature::build(&frame, 120, 120, 60, 60, 0.28, 1000);
        assert!(!sig.is_valid());
    }

    #[test]
    fn test_signature_age() {
        let buf = skin_frame();
        let frame = FrameView::new(&buf).unwrap();
        let sig = FaceSignature::build(&frame, 120, 120, 60, 60, 0.28, 1000);
        assert_eq!(sig.age_ms(1000), 0);
        assert_eq!(sig.age_ms(1350), 350);
        // A clock that went backwards does not underflow
        assert_eq!(sig.age_ms(900), 0);
    }

    #[test]
    fn test_bhattacharyya_identical_histograms() {
        let buf = skin_frame();
        let frame = FrameView::new(&buf).unwrap();
        let stats = sample_region(&frame, 60, 60, 180, 180);
        let coeff = bhattacharyya(&stats.hue_hist[0], &stats.hue_hist[0]);
        assert!((coeff - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_bhattacharyya_disjoint_histograms() {
        let mut a = [0.0f32; HIST_BINS];
        let mut b = [0.0f32; HIST_BINS];
        a[0] = 1.0;
        b[HIST_BINS - 1] = 1.0;
        assert_eq!(bhattacharyya(&a, &b), 0.0);
    }

    #[test]
    fn test_texture_variance_flat_vs_checkered() {
        let flat = skin_frame();
        let frame = FrameView::new(&flat).unwrap();
        assert!(texture_variance(&frame, 120, 120, 30) < 1.0);

        // Alternate dark and bright rows for strong value variance
        let bright = pack_rgb565(230, 180, 150);
        let dark = pack_rgb565(40, 30, 25);
        let mut buf = vec![0u8; FRAME_BUFFER_LEN];
        for y in 0..240usize {
            let pixel = if y % 2 == 0 { bright } else { dark };
            for x in 0..240usize {
                let idx = (y * 240 + x) * 2;
                buf[idx] = (pixel & 0xFF) as u8;
                buf[idx + 1] = (pixel >> 8) as u8;
            }
        }
        let frame = FrameView::new(&buf).unwrap();
        assert!(texture_variance(&frame, 120, 120, 30) > 100.0);
    }
}
