//! Adaptive PID controller, one independent instance per servo axis.
//!
//! Gains are table-driven by error magnitude: large errors get the most
//! aggressive response, small errors the gentlest, so the head moves
//! decisively when far off target and settles without hunting. On top of
//! the table, a continuously varying motion scale (confidence, settling,
//! depth) softens or sharpens both Kp and Kd.

/// One row of the gain schedule
#[derive(Debug, Clone, Copy)]
struct GainSet {
    kp: f32,
    kd: f32,
}

/// Gain schedule by absolute error magnitude, most aggressive first
const LARGE_ERROR: GainSet = GainSet { kp: 0.11, kd: 0.004 };
const MEDIUM_ERROR: GainSet = GainSet { kp: 0.09, kd: 0.003 };
const BALANCED: GainSet = GainSet { kp: 0.07, kd: 0.0025 };
const PRECISE: GainSet = GainSet { kp: 0.05, kd: 0.0015 };

/// Error magnitudes selecting each regime (px)
const LARGE_ERROR_ABOVE: f32 = 50.0;
const MEDIUM_ERROR_ABOVE: f32 = 30.0;
const BALANCED_ABOVE: f32 = 15.0;

/// Integral accumulator bound
const MAX_INTEGRAL: f32 = 15.0;

/// Default integral gain
const KI: f32 = 0.012;

/// Per-axis PID controller with error-scheduled gains
#[derive(Debug, Clone)]
pub struct AdaptivePid {
    kp: f32,
    ki: f32,
    kd: f32,
    max_output: f32,
    integral: f32,
    prev_error: f32,
}

impl AdaptivePid {
    /// Create a controller whose output is clamped to `max_output`
    /// degrees per tick
    #[must_use]
    pub fn new(max_output: f32) -> Self {
        Self {
            kp: BALANCED.kp,
            ki: KI,
            kd: BALANCED.kd,
            max_output,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// Clear accumulated state (re-entering acquisition from LOST)
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    /// Select gains for the current error magnitude and motion scale
    pub fn update_gains(&mut self, error_magnitude: f32, motion_scale: f32) {
        let set = match error_magnitude.abs() {
            e if e > LARGE_ERROR_ABOVE => LARGE_ERROR,
            e if e > MEDIUM_ERROR_ABOVE => MEDIUM_ERROR,
            e if e > BALANCED_ABOVE => BALANCED,
            _ => PRECISE,
        };
        self.kp = set.kp * motion_scale;
        self.kd = set.kd * motion_scale;
    }

    /// One PID step; output is clamped to the configured maximum
    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        let derivative = (error - self.prev_error) / dt;

        self.integral += self.ki * error * dt;
        self.integral = self.integral.clamp(-MAX_INTEGRAL, MAX_INTEGRAL);

        let output = self.kp * error + self.integral + self.kd * derivative;
        self.prev_error = error;

        output.clamp(-self.max_output, self.max_output)
    }

    /// Decay the integral toward zero without producing output
    ///
    /// Used inside the deadband so a residual accumulator cannot creep
    /// the head once the error has been zeroed.
    pub fn bleed_integral(&mut self) {
        self.integral *= 0.9;
        self.prev_error = 0.0;
    }

    /// Current proportional gain (diagnostics)
    #[must_use]
    pub fn kp(&self) -> f32 {
        self.kp
    }
}
