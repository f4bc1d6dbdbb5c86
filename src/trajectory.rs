//! Eased return-to-center trajectory after a sustained loss.
//!
//! A plan is created only when the face has been gone long enough that
//! holding position stops making sense. Duration is proportional to the
//! angular distance, clamped so short hops still look deliberate and long
//! sweeps never drag.

use crate::constants::{BASE_CENTER, CONTROL_RATE_HZ, NOD_CENTER};

/// Degrees of travel per second of plan duration
const TRAVEL_RATE_DEG_PER_SEC: f32 = 60.0;

/// Plan duration bounds in seconds
const MIN_DURATION_S: f32 = 0.3;
const MAX_DURATION_S: f32 = 1.5;

/// Short eased motion plan from the current angles back to center
#[derive(Debug, Clone)]
pub struct GentleTrajectory {
    active: bool,
    start_pan: f32,
    start_tilt: f32,
    target_pan: f32,
    target_tilt: f32,
    current_step: f32,
    total_steps: f32,
}

impl GentleTrajectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: false,
            start_pan: BASE_CENTER,
            start_tilt: NOD_CENTER,
            target_pan: BASE_CENTER,
            target_tilt: NOD_CENTER,
            current_step: 0.0,
            total_steps: 0.0,
        }
    }

    /// Plan a return to center from the given angles
    pub fn plan_return_to_center(&mut self, from_pan: f32, from_tilt: f32) {
        self.start_pan = from_pan;
        self.start_tilt = from_tilt;
        self.target_pan = BASE_CENTER;
        self.target_tilt = NOD_CENTER;

        let dp = self.target_pan - from_pan;
        let dt = self.target_tilt - from_tilt;
        let distance = (dp * dp + dt * dt).sqrt();
        let duration = (distance / TRAVEL_RATE_DEG_PER_SEC).clamp(MIN_DURATION_S, MAX_DURATION_S);

        self.total_steps = duration * CONTROL_RATE_HZ;
        self.current_step = 0.0;
        self.active = true;
    }

    /// Next interpolated (pan, tilt) pair, or `None` once complete
    ///
    /// Uses an ease-in-out blend so motion accelerates away from the
    /// start and decelerates into the target.
    pub fn next_position(&mut self) -> Option<(f32, f32)> {
        if !self.active {
            return None;
        }
        if self.current_step >= self.total_steps {
            self.active = false;
            return None;
        }

        let t = self.current_step / self.total_steps;
        let eased = if t < 0.5 {
            2.0 * t * t
        } else {
            1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
        };

        let pan = self.start_pan + (self.target_pan - self.start_pan) * eased;
        let tilt = self.start_tilt + (self.target_tilt - self.start_tilt) * eased;

        self.current_step += 1.0;
        Some((pan, tilt))
    }

    /// Whether a plan is currently running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Abandon the current plan
    pub fn cancel(&mut self) {
        self.active = false;
    }
}

impl Default for GentleTrajectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_until_planned() {
        let mut traj = GentleTrajectory::new();
        assert!(!traj.is_active());
        assert!(traj.next_position().is_none());
    }

    #[test]
    fn test_monotonic_approach_to_center() {
        let mut traj = GentleTrajectory::new();
        traj.plan_return_to_center(150.0, 140.0);

        let mut prev_pan_dist = (150.0f32 - BASE_CENTER).abs();
        let mut prev_tilt_dist = (140.0f32 - NOD_CENTER).abs();
        let mut steps = 0;
        while let Some((pan, tilt)) = traj.next_position() {
            let pan_dist = (pan - BASE_CENTER).abs();
            let tilt_dist = (tilt - NOD_CENTER).abs();
            assert!(pan_dist <= prev_pan_dist + 1e-3);
            assert!(tilt_dist <= prev_tilt_dist + 1e-3);
            prev_pan_dist = pan_dist;
            prev_tilt_dist = tilt_dist;
            steps += 1;
        }
        assert!(!traj.is_active());
        // Ends essentially at center
        assert!(prev_pan_dist < 2.0);
        assert!(prev_tilt_dist < 2.0);
        assert!(steps > 0);
    }

    #[test]
    fn test_duration_scales_with_distance_and_clamps() {
        let mut short = GentleTrajectory::new();
        short.plan_return_to_center(BASE_CENTER + 1.0, NOD_CENTER);
        // 1 degree away still takes the minimum duration
        assert_eq!(short.total_steps, MIN_DURATION_S * CONTROL_RATE_HZ);

        let mut long = GentleTrajectory::new();
        long.plan_return_to_center(170.0, NOD_CENTER + 35.0);
        assert!(long.total_steps > short.total_steps);
        assert!(long.total_steps <= MAX_DURATION_S * CONTROL_RATE_HZ);
    }

    #[test]
    fn test_cancel_stops_plan() {
        let mut traj = GentleTrajectory::new();
        traj.plan_return_to_center(150.0, 140.0);
        assert!(traj.next_position().is_some());
        traj.cancel();
        assert!(!traj.is_active());
        assert!(traj.next_position().is_none());
    }
}
