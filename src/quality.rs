//! Tracking quality assessment over a short rolling history.
//!
//! The monitor keeps the last few (confidence, x, y) samples and
//! classifies current tracking as good, moderate or poor. The
//! classification sizes the histogram-only bridging budget: well-behaved
//! tracking is trusted for more frames than tracking that is drifting or
//! jumping around.

use crate::config::QualityConfig;
use crate::constants::QUALITY_HISTORY_SIZE;

/// Classification of the current tracking episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingQuality {
    /// High confidence and stable position
    Good,
    /// Acceptable confidence, some variation
    Moderate,
    /// Dropping confidence or unstable position
    Poor,
}

/// Rolling-window monitor of match confidence and position stability
#[derive(Debug, Clone)]
pub struct TrackingQualityMonitor {
    config: QualityConfig,
    confidence: [f32; QUALITY_HISTORY_SIZE],
    pos_x: [i32; QUALITY_HISTORY_SIZE],
    pos_y: [i32; QUALITY_HISTORY_SIZE],
    index: usize,
    count: usize,
}

impl TrackingQualityMonitor {
    #[must_use]
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            confidence: [0.0; QUALITY_HISTORY_SIZE],
            pos_x: [0; QUALITY_HISTORY_SIZE],
            pos_y: [0; QUALITY_HISTORY_SIZE],
            index: 0,
            count: 0,
        }
    }

    /// Record one successful match sample
    pub fn record(&mut self, confidence: f32, x: i32, y: i32) {
        self.confidence[self.index] = confidence;
        self.pos_x[self.index] = x;
        self.pos_y[self.index] = y;
        self.index = (self.index + 1) % QUALITY_HISTORY_SIZE;
        if self.count < QUALITY_HISTORY_SIZE {
            self.count += 1;
        }
    }

    /// Drop all history (new signature, new episode)
    pub fn reset(&mut self) {
        self.index = 0;
        self.count = 0;
        self.confidence = [0.0; QUALITY_HISTORY_SIZE];
        self.pos_x = [0; QUALITY_HISTORY_SIZE];
        self.pos_y = [0; QUALITY_HISTORY_SIZE];
    }

    /// Number of samples currently in the window
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.count
    }

    /// Classify current tracking from the rolling window
    ///
    /// Compares the mean of the 2 most recent confidences against the
    /// older ones and measures the largest frame-to-frame position jump.
    /// With fewer than 3 samples there is not enough evidence either way.
    #[must_use]
    pub fn assess(&self) -> TrackingQuality {
        if self.count < 3 {
            return TrackingQuality::Moderate;
        }

        let mut recent_sum = 0.0;
        let mut recent_n = 0u32;
        let mut older_sum = 0.0;
        let mut older_n = 0u32;

        for i in 0..self.count {
            let idx = (self.index + QUALITY_HISTORY_SIZE - 1 - i) % QUALITY_HISTORY_SIZE;
            if i < 2 {
                recent_sum += self.confidence[idx];
                recent_n += 1;
            } else {
                older_sum += self.confidence[idx];
                older_n += 1;
            }
        }

        let recent_avg = recent_sum / recent_n as f32;
        let older_avg = if older_n > 0 { older_sum / older_n as f32 } else { 0.0 };

        let dropping = older_n > 0 && recent_avg < older_avg - self.config.confidence_drop_alert;
        let high = recent_avg >= self.config.confidence_high;

        let mut max_jump = 0.0f32;
        for i in 1..self.count {
            let a = (self.index + QUALITY_HISTORY_SIZE - i) % QUALITY_HISTORY_SIZE;
            let b = (self.index + QUALITY_HISTORY_SIZE - i - 1) % QUALITY_HISTORY_SIZE;
            let dx = (self.pos_x[a] - self.pos_x[b]) as f32;
            let dy = (self.pos_y[a] - self.pos_y[b]) as f32;
            let jump = (dx * dx + dy * dy).sqrt();
            if jump > max_jump {
                max_jump = jump;
            }
        }
        let stable = max_jump < self.config.max_position_jump;

        if dropping || !stable {
            TrackingQuality::Poor
        } else if high && stable {
            TrackingQuality::Good
        } else {
            TrackingQuality::Moderate
        }
    }

    /// Position jump treated as unstable, shared with stability counters
    #[must_use]
    pub fn position_jump_limit(&self) -> f32 {
        self.config.max_position_jump
    }

    /// How many histogram-only frames the current quality tolerates
    #[must_use]
    pub fn max_bridge_frames(&self, quality: TrackingQuality) -> u32 {
        match quality {
            TrackingQuality::Good => self.config.max_bridge_frames_good,
            TrackingQuality::Moderate => {
                (self.config.max_bridge_frames_good + self.config.max_bridge_frames_poor) / 2
            }
            TrackingQuality::Poor => self.config.max_bridge_frames_poor,
        }
    }
}
