//! Stale input feed detection.
//!
//! A frozen upstream link keeps delivering the same coordinates at a
//! healthy rate, which would otherwise look like a perfectly stationary
//! face. The detector watches for reports that stop changing and marks
//! the feed stale after too many unchanged reports or too long without a
//! real change.

use crate::config::StaleConfig;

/// Verdict for one observed position report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Coordinates changed; the feed is alive
    Fresh,
    /// Unchanged, but still within tolerance
    Suspect,
    /// The feed has frozen; discard this report
    Stale,
}

/// Detector for a position feed that has stopped changing
#[derive(Debug, Clone)]
pub struct StaleDataDetector {
    config: StaleConfig,
    prev_x: i32,
    prev_y: i32,
    last_change_ms: u64,
    stale_count: u32,
    is_stale: bool,
}

impl StaleDataDetector {
    #[must_use]
    pub fn new(config: StaleConfig) -> Self {
        Self {
            config,
            prev_x: 0,
            prev_y: 0,
            last_change_ms: 0,
            stale_count: 0,
            is_stale: false,
        }
    }

    /// Clear all bookkeeping
    pub fn reset(&mut self) {
        self.prev_x = 0;
        self.prev_y = 0;
        self.last_change_ms = 0;
        self.stale_count = 0;
        self.is_stale = false;
    }

    /// Observe one position report and classify the feed
    pub fn observe(&mut self, x: i32, y: i32, now_ms: u64) -> Freshness {
        let delta = (x - self.prev_x).abs() + (y - self.prev_y).abs();

        if delta >= self.config.change_threshold {
            self.prev_x = x;
            self.prev_y = y;
            self.last_change_ms = now_ms;
            self.stale_count = 0;
            self.is_stale = false;
            return Freshness::Fresh;
        }

        self.stale_count += 1;
        let since_change = now_ms.saturating_sub(self.last_change_ms);

        if since_change > self.config.timeout_ms || self.stale_count > self.config.max_count {
            self.is_stale = true;
            return Freshness::Stale;
        }

        Freshness::Suspect
    }

    /// Whether the feed is currently considered frozen
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StaleDataDetector {
        StaleDataDetector::new(StaleConfig::default())
    }

    #[test]
    fn test_changing_data_stays_fresh() {
        let mut d = detector();
        assert_eq!(d.observe(100, 100, 0), Freshness::Fresh);
        assert_eq!(d.observe(110, 104, 20), Freshness::Fresh);
        assert_eq!(d.observe(100, 100, 40), Freshness::Fresh);
        assert!(!d.is_stale());
    }

    #[test]
    fn test_repeat_count_marks_stale() {
        let mut d = detector();
        d.observe(100, 100, 0);
        // Default max_count is 5; the 6th unchanged report trips it
        for i in 1..=5 {
            assert_eq!(d.observe(100, 100, i * 20), Freshness::Suspect, "report {i}");
        }
        assert_eq!(d.observe(100, 100, 120), Freshness::Stale);
        assert!(d.is_stale());
    }

    #[test]
    fn test_elapsed_time_marks_stale() {
        let mut d = detector();
        d.observe(100, 100, 0);
        assert_eq!(d.observe(101, 100, 100), Freshness::Suspect);
        // 400 ms since the last real change exceeds the 300 ms timeout
        assert_eq!(d.observe(101, 100, 400), Freshness::Stale);
    }

    #[test]
    fn test_fresh_data_recovers_from_stale() {
        let mut d = detector();
        d.observe(100, 100, 0);
        for i in 1..=6 {
            d.observe(100, 100, i * 20);
        }
        assert!(d.is_stale());
        assert_eq!(d.observe(130, 90, 200), Freshness::Fresh);
        assert!(!d.is_stale());
    }

    #[test]
    fn test_sub_threshold_jitter_counts_as_unchanged() {
        let mut d = detector();
        d.observe(100, 100, 0);
        // |dx| + |dy| = 2 is below the default threshold of 3
        assert_eq!(d.observe(101, 101, 20), Freshness::Suspect);
    }
}
