//! Histogram-based face re-identification between vision model updates.
//!
//! Given a stored [`FaceSignature`] and a raw camera frame, the searcher
//! looks for the best-matching region near a predicted position and
//! returns a refined position with a confidence score. Search runs in two
//! stages for speed and accuracy: a coarse pass on a 4 px grid over a
//! speed-adaptive window, then a 1 px refinement around the coarse best.
//!
//! The searcher trusts itself based on how well it is tracking, not just
//! how long since the vision model last confirmed: the quality monitor
//! sizes the histogram-only frame budget, and a skin collapse in the
//! search window ends the episode immediately.

use crate::config::{QualityConfig, SearchConfig, SignatureConfig};
use crate::constants::{CAMERA_CENTER_X, CAMERA_CENTER_Y, FRAME_HEIGHT, FRAME_WIDTH, NUM_REGIONS};
use crate::frame::{is_skin_tone, FrameView};
use crate::quality::{TrackingQuality, TrackingQualityMonitor};
use crate::signature::{bhattacharyya, sample_region, FaceSignature};
use log::debug;

/// Candidate patch half-size (patch spans 31x31 px)
const PATCH_RADIUS: i32 = 15;

/// Search centers stay this far from the frame edge
const SEARCH_MARGIN: i32 = 30;

/// Occupancy grid dimension for the coherence check
const COHERENCE_GRID: usize = 8;

/// A successful histogram match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMatch {
    /// Matched x position in frame coordinates
    pub x: i32,
    /// Matched y position in frame coordinates
    pub y: i32,
    /// Adjusted match confidence, 0.0-1.0
    pub confidence: f32,
}

/// Score for one candidate position
struct CandidateScore {
    confidence: f32,
    skin_percentage: f32,
    valid: bool,
}

/// Two-stage histogram search with quality-adaptive trust
pub struct HistogramSearcher {
    config: SearchConfig,
    signature_config: SignatureConfig,
    signature: Option<FaceSignature>,
    quality: TrackingQualityMonitor,

    search_radius: i32,
    histogram_only_frames: u32,

    consecutive_stable: u32,
    consecutive_collapses: u32,
    last_match_x: i32,
    last_match_y: i32,
    last_confidence: f32,
}

impl HistogramSearcher {
    #[must_use]
    pub fn new(config: SearchConfig, signature_config: SignatureConfig, quality_config: QualityConfig) -> Self {
        let radius = config.radius_slow;
        Self {
            config,
            signature_config,
            signature: None,
            quality: TrackingQualityMonitor::new(quality_config),
            search_radius: radius,
            histogram_only_frames: 0,
            consecutive_stable: 0,
            consecutive_collapses: 0,
            last_match_x: CAMERA_CENTER_X,
            last_match_y: CAMERA_CENTER_Y,
            last_confidence: 0.0,
        }
    }

    /// Drop the signature and all tracking history
    pub fn reset(&mut self) {
        self.signature = None;
        self.quality.reset();
        self.search_radius = self.config.radius_slow;
        self.histogram_only_frames = 0;
        self.consecutive_stable = 0;
        self.consecutive_collapses = 0;
        self.last_match_x = CAMERA_CENTER_X;
        self.last_match_y = CAMERA_CENTER_Y;
        self.last_confidence = 0.0;
    }

    /// Capture a fresh signature from a confirmed bounding box
    ///
    /// Always starts a fresh tracking episode: frame counters, collapse
    /// counters and the quality history are cleared.
    pub fn build_signature(
        &mut self,
        frame: &FrameView<'_>,
        face_x: i32,
        face_y: i32,
        face_w: i32,
        face_h: i32,
        now_ms: u64,
    ) {
        let signature = FaceSignature::build(
            frame,
            face_x,
            face_y,
            face_w,
            face_h,
            self.signature_config.min_skin_ratio,
            now_ms,
        );

        if !signature.is_valid() {
            debug!(
                "signature rejected: skin ratio {:.2} below {:.2}",
                signature.skin_ratio(),
                self.signature_config.min_skin_ratio
            );
        }

        self.signature = Some(signature);
        self.histogram_only_frames = 0;
        self.consecutive_collapses = 0;
        self.consecutive_stable = 0;
        self.last_match_x = face_x;
        self.last_match_y = face_y;
        self.last_confidence = 1.0;
        self.quality.reset();
    }

    /// Whether a usable signature exists right now
    #[must_use]
    pub fn is_signature_valid(&self, now_ms: u64) -> bool {
        match &self.signature {
            Some(sig) => sig.is_valid() && sig.age_ms(now_ms) <= self.config.signature_max_age_ms,
            None => false,
        }
    }

    /// Age of the current signature, if one exists and is valid
    #[must_use]
    pub fn signature_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.signature.as_ref().filter(|s| s.is_valid()).map(|s| s.age_ms(now_ms))
    }

    /// Frames tracked on histogram evidence alone since the last signature
    #[must_use]
    pub fn histogram_only_frames(&self) -> u32 {
        self.histogram_only_frames
    }

    /// Current quality classification of the episode
    #[must_use]
    pub fn tracking_quality(&self) -> TrackingQuality {
        self.quality.assess()
    }

    /// Explicitly end the current episode
    pub fn invalidate(&mut self) {
        if let Some(sig) = &mut self.signature {
            sig.invalidate();
        }
    }

    /// Last accepted match position
    #[must_use]
    pub fn last_position(&self) -> (i32, i32) {
        (self.last_match_x, self.last_match_y)
    }

    /// Confidence of the last accepted match
    #[must_use]
    pub fn last_confidence(&self) -> f32 {
        self.last_confidence
    }

    /// Consecutive accepted matches without a large position jump
    #[must_use]
    pub fn stable_frames(&self) -> u32 {
        self.consecutive_stable
    }

    /// Search the frame for the signature near a predicted position
    ///
    /// `servo_speed` (deg/s) widens the search window while the head is
    /// moving. Returns `None` when no acceptable match exists this frame;
    /// the signature itself may be invalidated as a side effect (age
    /// ceiling, quality budget exhaustion, or repeated skin collapse).
    pub fn track(
        &mut self,
        frame: &FrameView<'_>,
        predicted_x: i32,
        predicted_y: i32,
        servo_speed: f32,
        now_ms: u64,
    ) -> Option<TrackMatch> {
        let Some(signature) = &self.signature else {
            return None;
        };
        if !signature.is_valid() || signature.pixel_count() == 0 {
            return None;
        }

        let age = signature.age_ms(now_ms);

        if age > self.config.signature_max_age_ms {
            debug!("signature expired at {age} ms");
            self.invalidate();
            return None;
        }

        // Quality-based frame budget, only after the minimum age
        if age > self.config.signature_min_age_ms {
            let quality = self.quality.assess();
            let budget = self.quality.max_bridge_frames(quality);
            if self.histogram_only_frames >= budget {
                debug!(
                    "bridge budget exhausted: {} frames at {:?} quality",
                    self.histogram_only_frames, quality
                );
                self.invalidate();
                return None;
            }
        }

        self.search_radius = self.adaptive_radius(servo_speed);

        let search_cx = predicted_x.clamp(SEARCH_MARGIN, FRAME_WIDTH - SEARCH_MARGIN);
        let search_cy = predicted_y.clamp(SEARCH_MARGIN, FRAME_HEIGHT - SEARCH_MARGIN);

        // Stage 1: coarse grid over the search window. Confidence ties
        // break toward the predicted position so a uniform color region
        // cannot pull the match to its first-scanned corner
        let mut best_conf = 0.0f32;
        let mut best_d2 = f32::MAX;
        let mut best_x = search_cx;
        let mut best_y = search_cy;
        let mut window_skin = 0.0f32;

        let prediction_d2 = |x: i32, y: i32| {
            let dx = (x - predicted_x) as f32;
            let dy = (y - predicted_y) as f32;
            dx * dx + dy * dy
        };

        let x_start = (search_cx - self.search_radius).max(SEARCH_MARGIN);
        let x_end = (search_cx + self.search_radius).min(FRAME_WIDTH - SEARCH_MARGIN);
        let y_start = (search_cy - self.search_radius).max(SEARCH_MARGIN);
        let y_end = (search_cy + self.search_radius).min(FRAME_HEIGHT - SEARCH_MARGIN);

        let mut y = y_start;
        while y < y_end {
            let mut x = x_start;
            while x < x_end {
                let score = self.evaluate_candidate(frame, x, y);
                if score.skin_percentage > window_skin {
                    window_skin = score.skin_percentage;
                }
                let d2 = prediction_d2(x, y);
                if score.valid
                    && (score.confidence > best_conf
                        || (score.confidence == best_conf && d2 < best_d2))
                {
                    best_conf = score.confidence;
                    best_d2 = d2;
                    best_x = x;
                    best_y = y;
                }
                x += self.config.coarse_step;
            }
            y += self.config.coarse_step;
        }

        // Skin collapse means the face is genuinely gone, not hard to match
        if window_skin < self.config.skin_collapse_threshold {
            self.consecutive_collapses += 1;
            if self.consecutive_collapses >= 2 {
                debug!("skin collapse x2, signature invalidated");
                self.invalidate();
            }
            self.histogram_only_frames += 1;
            return None;
        }
        self.consecutive_collapses = 0;

        // Slightly lower bar for the coarse stage
        if best_conf < self.config.confidence_threshold * 0.9 {
            self.histogram_only_frames += 1;
            return None;
        }

        // Stage 2: fine refinement around the coarse best
        let fine_x_start = (best_x - self.config.fine_radius).max(SEARCH_MARGIN);
        let fine_x_end = (best_x + self.config.fine_radius).min(FRAME_WIDTH - SEARCH_MARGIN);
        let fine_y_start = (best_y - self.config.fine_radius).max(SEARCH_MARGIN);
        let fine_y_end = (best_y + self.config.fine_radius).min(FRAME_HEIGHT - SEARCH_MARGIN);

        let (coarse_x, coarse_y) = (best_x, best_y);
        for y in fine_y_start..=fine_y_end {
            for x in fine_x_start..=fine_x_end {
                if x == coarse_x && y == coarse_y {
                    continue;
                }
                let score = self.evaluate_candidate(frame, x, y);
                let d2 = prediction_d2(x, y);
                if score.valid
                    && (score.confidence > best_conf
                        || (score.confidence == best_conf && d2 < best_d2))
                {
                    best_conf = score.confidence;
                    best_d2 = d2;
                    best_x = x;
                    best_y = y;
                }
            }
        }

        // Validation on the refined position
        let mut confidence = best_conf;

        let coherence = self.coherence(frame, best_x, best_y, PATCH_RADIUS);
        if coherence < self.config.min_coherence {
            self.histogram_only_frames += 1;
            return None;
        }
        confidence *= 0.92 + 0.08 * coherence;

        let dx = (best_x - predicted_x) as f32;
        let dy = (best_y - predicted_y) as f32;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist > self.config.match_distance_limit {
            self.histogram_only_frames += 1;
            return None;
        }
        confidence *= 1.0 - (dist / self.search_radius as f32) * 0.03;

        if confidence < self.config.confidence_threshold {
            self.histogram_only_frames += 1;
            return None;
        }

        // Accepted: update quality history and stability bookkeeping
        self.quality.record(confidence, best_x, best_y);

        let jump_x = (best_x - self.last_match_x) as f32;
        let jump_y = (best_y - self.last_match_y) as f32;
        if (jump_x * jump_x + jump_y * jump_y).sqrt() < self.quality.position_jump_limit() {
            self.consecutive_stable += 1;
        } else {
            self.consecutive_stable = 0;
        }

        self.last_match_x = best_x;
        self.last_match_y = best_y;
        self.last_confidence = confidence;
        self.histogram_only_frames += 1;

        Some(TrackMatch {
            x: best_x,
            y: best_y,
            confidence,
        })
    }

    /// Search window radius for the current servo speed, linearly
    /// interpolated between the slow and fast radii
    fn adaptive_radius(&self, servo_speed: f32) -> i32 {
        let cfg = &self.config;
        if servo_speed > cfg.speed_threshold_fast {
            cfg.radius_fast
        } else if servo_speed < cfg.speed_threshold_slow {
            cfg.radius_slow
        } else {
            let t = (servo_speed - cfg.speed_threshold_slow)
                / (cfg.speed_threshold_fast - cfg.speed_threshold_slow);
            cfg.radius_slow + (t * (cfg.radius_fast - cfg.radius_slow) as f32) as i32
        }
    }

    /// Score one candidate position against the signature
    fn evaluate_candidate(&self, frame: &FrameView<'_>, x: i32, y: i32) -> CandidateScore {
        let mut score = CandidateScore {
            confidence: 0.0,
            skin_percentage: 0.0,
            valid: false,
        };

        let Some(signature) = &self.signature else {
            return score;
        };

        let stats = sample_region(
            frame,
            x - PATCH_RADIUS,
            y - PATCH_RADIUS,
            x + PATCH_RADIUS,
            y + PATCH_RADIUS,
        );
        if stats.pixel_count == 0 {
            return score;
        }

        score.skin_percentage = stats.skin_ratio;
        if stats.skin_ratio < self.config.min_skin_percentage {
            return score;
        }

        let drift = self.drift_penalty(stats.mean_hue, stats.mean_sat, stats.mean_val);
        if drift >= 1.0 {
            return score;
        }

        // Per-region similarity, 60% hue / 40% saturation
        let sig = signature.stats();
        let mut region_conf = [0.0f32; NUM_REGIONS];
        let mut passing = 0u32;
        for region in 0..NUM_REGIONS {
            let conf = 0.6 * bhattacharyya(&sig.hue_hist[region], &stats.hue_hist[region])
                + 0.4 * bhattacharyya(&sig.sat_hist[region], &stats.sat_hist[region]);
            region_conf[region] = conf;
            if conf >= self.config.min_region_confidence {
                passing += 1;
            }
        }
        if passing < self.config.min_regions_passing {
            return score;
        }

        let avg = region_conf.iter().sum::<f32>() / NUM_REGIONS as f32;
        score.confidence = avg * (1.0 - 0.25 * drift);
        score.valid = true;
        score
    }

    /// Penalty for mean-color drift from the signature: 0 below the soft
    /// limits, 1 beyond any hard limit, linear in between
    fn drift_penalty(&self, mean_hue: f32, mean_sat: f32, mean_val: f32) -> f32 {
        let Some(signature) = &self.signature else {
            return 1.0;
        };
        let sig = signature.stats();
        let cfg = &self.config;

        let hue_diff = (mean_hue - sig.mean_hue).abs();
        let sat_diff = (mean_sat - sig.mean_sat).abs();
        let val_diff = (mean_val - sig.mean_val).abs();

        if hue_diff > cfg.hue_drift_hard || sat_diff > cfg.sat_drift_hard || val_diff > cfg.val_drift_hard {
            return 1.0;
        }

        let ramp = |diff: f32, soft: f32, hard: f32| {
            if diff > soft {
                (diff - soft) / (hard - soft)
            } else {
                0.0
            }
        };

        0.4 * ramp(hue_diff, cfg.hue_drift_soft, cfg.hue_drift_hard)
            + 0.3 * ramp(sat_diff, cfg.sat_drift_soft, cfg.sat_drift_hard)
            + 0.3 * ramp(val_diff, cfg.val_drift_soft, cfg.val_drift_hard)
    }

    /// Spatial coherence: fraction of occupied skin cells in a coarse
    /// grid that have at least one occupied neighbor
    fn coherence(&self, frame: &FrameView<'_>, cx: i32, cy: i32, radius: i32) -> f32 {
        let x1 = (cx - radius).max(0);
        let y1 = (cy - radius).max(0);
        let x2 = (cx + radius).min(FRAME_WIDTH);
        let y2 = (cy + radius).min(FRAME_HEIGHT);

        let cell_w = (x2 - x1) / COHERENCE_GRID as i32;
        let cell_h = (y2 - y1) / COHERENCE_GRID as i32;
        if cell_w <= 0 || cell_h <= 0 {
            return 0.0;
        }

        let mut cells = [[0u32; COHERENCE_GRID]; COHERENCE_GRID];
        let mut total = 0u32;

        let mut y = y1;
        while y < y2 {
            let mut x = x1;
            while x < x2 {
                if is_skin_tone(frame.pixel_hsv(x, y)) {
                    let cell_x = (((x - x1) / cell_w) as usize).min(COHERENCE_GRID - 1);
                    let cell_y = (((y - y1) / cell_h) as usize).min(COHERENCE_GRID - 1);
                    cells[cell_y][cell_x] += 1;
                    total += 1;
                }
                x += 2;
            }
            y += 2;
        }

        if total < 10 {
            return 0.0;
        }

        let mut occupied = 0u32;
        let mut connected = 0u32;
        for y in 0..COHERENCE_GRID {
            for x in 0..COHERENCE_GRID {
                if cells[y][x] == 0 {
                    continue;
                }
                occupied += 1;
                'neighbors: for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let ny = y as i32 + dy;
                        let nx = x as i32 + dx;
                        if (0..COHERENCE_GRID as i32).contains(&ny)
                            && (0..COHERENCE_GRID as i32).contains(&nx)
                            && cells[ny as usize][nx as usize] > 0
                        {
                            connected += 1;
                            break 'neighbors;
                        }
                    }
                }
            }
        }

        if occupied > 0 {
            connected as f32 / occupied as f32
        } else {
            0.0
        }
    }
}
