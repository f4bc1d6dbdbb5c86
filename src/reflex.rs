//! Reflexive tracking control: the per-tick orchestrator.
//!
//! Converts face position reports into smooth pan ("base") and tilt
//! ("nod") servo targets at a fixed 50 Hz tick. Two small state machines
//! drive the behavior: the primary LOST -> ACQUIRE -> TRACK machine and a
//! secondary NORMAL -> BLIND_MOVING -> GENTLE_SETTLING machine used only
//! for disengagement back to center. All transitions happen inside named
//! methods so the invariants stay auditable.
//!
//! Position data arrives from two sources with different reliability:
//! the external vision model (via [`ReflexTracker::update_face_data`])
//! and the local histogram searcher (via [`ReflexTracker::track`]). When
//! both produce a position inside the same control interval, the vision
//! model report wins; the histogram match only fills gaps.

use crate::clock::{MonotonicClock, TimeSource};
use crate::config::Config;
use crate::constants::{
    BASE_CENTER, BASE_MAX, BASE_MIN, CAMERA_CENTER_X, CAMERA_CENTER_Y, CONTROL_DT, FRAME_HEIGHT,
    FRAME_WIDTH, NOD_CENTER, NOD_MAX, NOD_MIN,
};
use crate::frame::FrameView;
use crate::pid::AdaptivePid;
use crate::quality::TrackingQuality;
use crate::searcher::{HistogramSearcher, TrackMatch};
use crate::stale::{Freshness, StaleDataDetector};
use crate::trajectory::GentleTrajectory;
use crate::Result;
use log::{debug, trace};
use std::fmt::Write as _;

/// Derived face velocity bound (px/s)
const MAX_FACE_VELOCITY: i32 = 200;

/// How often the face timeout is re-checked (ms)
const TIMEOUT_CHECK_INTERVAL_MS: u64 = 500;

/// Throttle for periodic status traces (ms)
const STATUS_LOG_INTERVAL_MS: u64 = 500;

/// Reacquisition sweep offsets around the current pose (pan, tilt)
const SEARCH_OFFSETS: [(f32, f32); 8] = [
    (0.0, 0.0),
    (-30.0, 0.0),
    (30.0, 0.0),
    (0.0, -15.0),
    (0.0, 15.0),
    (-45.0, -15.0),
    (45.0, -15.0),
    (0.0, 0.0),
];

/// Primary control state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// No face; holding, predicting, or returning to center
    Lost,
    /// Face found, still centering
    Acquire,
    /// Face centered, smooth tracking
    Track,
}

/// Secondary disengagement state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlindState {
    /// Normal operation
    Normal,
    /// Following a trajectory, ignoring position data
    BlindMoving,
    /// Reduced gain after a blind move
    GentleSettling,
}

/// One tick's servo output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    /// Base (pan) target angle in degrees, clamped to 10-170
    pub base: i32,
    /// Nod (tilt) target angle in degrees, clamped to 80-150
    pub nod: i32,
    /// Whether the tracker is actively producing commands
    pub active: bool,
}

/// Mutable control state, exclusively owned by the tracker
#[derive(Debug, Clone)]
struct TrackingState {
    active: bool,
    should_be_active: bool,

    control_state: ControlState,
    blind_state: BlindState,

    face_x: i32,
    face_y: i32,
    face_vx: i32,
    face_vy: i32,
    face_size: i32,
    face_confidence: i32,
    face_distance: i32,
    last_face_ms: u64,
    data_is_stale: bool,

    frames_tracked: u32,
    frames_lost: u32,
    blind_frame_counter: u32,
    oscillation_count: i32,

    pan_angle: f32,
    tilt_angle: f32,
    target_base: i32,
    target_nod: i32,

    tracking_quality: f32,
    error_magnitude: f32,
    prev_error_magnitude: f32,
    is_settled: bool,

    update_count: u32,
    error_x: i32,
    error_y: i32,
    adjust_base: f32,
    adjust_nod: f32,
    current_gain: f32,
}

impl TrackingState {
    fn new() -> Self {
        Self {
            active: false,
            should_be_active: false,
            control_state: ControlState::Lost,
            blind_state: BlindState::Normal,
            face_x: CAMERA_CENTER_X,
            face_y: CAMERA_CENTER_Y,
            face_vx: 0,
            face_vy: 0,
            face_size: 0,
            face_confidence: 0,
            face_distance: 100,
            last_face_ms: 0,
            data_is_stale: false,
            frames_tracked: 0,
            frames_lost: 0,
            blind_frame_counter: 0,
            oscillation_count: 0,
            pan_angle: BASE_CENTER,
            tilt_angle: NOD_CENTER,
            target_base: BASE_CENTER as i32,
            target_nod: NOD_CENTER as i32,
            tracking_quality: 0.0,
            error_magnitude: 0.0,
            prev_error_magnitude: 0.0,
            is_settled: false,
            update_count: 0,
            error_x: 0,
            error_y: 0,
            adjust_base: 0.0,
            adjust_nod: 0.0,
            current_gain: 0.0,
        }
    }
}

/// The head-tracking control core
pub struct ReflexTracker {
    config: Config,
    clock: Box<dyn TimeSource>,

    searcher: HistogramSearcher,
    stale: StaleDataDetector,
    pan_pid: AdaptivePid,
    tilt_pid: AdaptivePid,
    trajectory: GentleTrajectory,

    state: TrackingState,

    last_update_ms: u64,
    last_timeout_check_ms: u64,
    last_status_log_ms: u64,
    last_report_ms: u64,
    returning_to_center: bool,

    last_face_x: i32,
    last_face_y: i32,
    last_velocity_ms: u64,
}

impl ReflexTracker {
    /// Tracker with default configuration and a monotonic system clock
    #[must_use]
    pub fn new() -> Self {
        Self::build(Config::default(), Box::new(MonotonicClock::new()))
    }

    /// Tracker with a custom configuration
    ///
    /// # Errors
    /// Returns [`crate::Error::ConfigError`] if the configuration fails
    /// validation.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Box::new(MonotonicClock::new())))
    }

    /// Tracker with a custom configuration and time source
    ///
    /// # Errors
    /// Returns [`crate::Error::ConfigError`] if the configuration fails
    /// validation.
    pub fn with_clock(config: Config, clock: Box<dyn TimeSource>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: Config, clock: Box<dyn TimeSource>) -> Self {
        let searcher = HistogramSearcher::new(
            config.search.clone(),
            config.signature.clone(),
            config.quality.clone(),
        );
        let stale = StaleDataDetector::new(config.stale.clone());
        let max_velocity = config.control.max_velocity_per_tick;
        Self {
            config,
            clock,
            searcher,
            stale,
            pan_pid: AdaptivePid::new(max_velocity),
            tilt_pid: AdaptivePid::new(max_velocity),
            trajectory: GentleTrajectory::new(),
            state: TrackingState::new(),
            last_update_ms: 0,
            last_timeout_check_ms: 0,
            last_status_log_ms: 0,
            last_report_ms: 0,
            returning_to_center: false,
            last_face_x: CAMERA_CENTER_X,
            last_face_y: CAMERA_CENTER_Y,
            last_velocity_ms: 0,
        }
    }

    /// Return to a clean slate, as if freshly constructed
    pub fn reset(&mut self) {
        self.state = TrackingState::new();
        self.searcher.reset();
        self.stale.reset();
        self.pan_pid.reset();
        self.tilt_pid.reset();
        self.trajectory.cancel();
        self.last_update_ms = 0;
        self.last_timeout_check_ms = 0;
        self.last_status_log_ms = 0;
        self.last_report_ms = 0;
        self.returning_to_center = false;
        self.last_face_x = CAMERA_CENTER_X;
        self.last_face_y = CAMERA_CENTER_Y;
        self.last_velocity_ms = 0;
    }

    // ------------------------------------------------------------------
    // Activation intent
    // ------------------------------------------------------------------

    /// The intent layer wants the head to track
    pub fn enable(&mut self) {
        self.state.should_be_active = true;
        if !self.state.active {
            self.state.active = true;
        }
    }

    /// The intent layer wants the head released
    ///
    /// Cancellation is synchronous and total: activity and settled state
    /// clear immediately, with no pending work to drain.
    pub fn disable(&mut self) {
        self.state.should_be_active = false;
        if self.state.active {
            self.state.active = false;
            self.state.is_settled = false;
        }
    }

    // ------------------------------------------------------------------
    // Position inputs
    // ------------------------------------------------------------------

    /// Ingest a vision model report
    ///
    /// Coordinates are clamped to the frame. Reports from a frozen feed
    /// are discarded and force-deactivate the tracker until fresh data
    /// resumes.
    pub fn update_face_data(&mut self, x: i32, y: i32, size: i32, distance: i32) {
        let now = self.clock.now_ms();
        let x = x.clamp(0, FRAME_WIDTH);
        let y = y.clamp(0, FRAME_HEIGHT);

        match self.stale.observe(x, y, now) {
            Freshness::Stale => {
                self.state.data_is_stale = true;
                if self.state.active {
                    debug!("stale feed detected, deactivating");
                    self.state.active = false;
                }
                return;
            }
            Freshness::Fresh | Freshness::Suspect => {
                self.state.data_is_stale = false;
            }
        }

        self.derive_velocity(x, y, now);

        self.state.face_x = x;
        self.state.face_y = y;
        self.state.face_size = size;
        self.state.face_distance = distance;
        self.state.last_face_ms = now;
        self.last_report_ms = now;

        // Default for upstreams that never send a confidence
        if self.state.face_confidence == 0 {
            self.state.face_confidence = 100;
        }

        if self.state.should_be_active && !self.state.active && !self.state.data_is_stale {
            self.state.active = true;
        }
    }

    /// Companion confidence for the latest report (0-100)
    pub fn update_confidence(&mut self, confidence: i32) {
        self.state.face_confidence = confidence.clamp(0, 100);
    }

    /// Capture a fresh face signature from a confirmed bounding box
    pub fn build_signature(&mut self, frame: &FrameView<'_>, x: i32, y: i32, w: i32, h: i32) {
        let now = self.clock.now_ms();
        self.searcher.build_signature(frame, x, y, w, h, now);
    }

    /// Attempt histogram re-identification on the current frame
    ///
    /// A successful match is applied as a position update unless a
    /// vision model report already landed inside the current control
    /// interval; the fresher report always wins the tick.
    pub fn track(
        &mut self,
        frame: &FrameView<'_>,
        predicted_x: i32,
        predicted_y: i32,
        servo_speed: f32,
    ) -> Option<TrackMatch> {
        let now = self.clock.now_ms();
        let m = self.searcher.track(frame, predicted_x, predicted_y, servo_speed, now)?;

        let report_age = now.saturating_sub(self.last_report_ms);
        if self.last_report_ms == 0 || report_age >= self.control_interval_ms() {
            self.derive_velocity(m.x, m.y, now);
            self.state.face_x = m.x;
            self.state.face_y = m.y;
            self.state.face_confidence = (m.confidence * 100.0) as i32;
            self.state.last_face_ms = now;
            if self.state.should_be_active && !self.state.active {
                self.state.active = true;
            }
        }

        Some(m)
    }

    // ------------------------------------------------------------------
    // Per-tick control
    // ------------------------------------------------------------------

    /// The main control step, polled by the driver loop
    ///
    /// Calls arriving faster than the current control interval are
    /// no-ops that return the last computed targets, so the caller may
    /// poll at any rate at or above the tick rate.
    pub fn calculate(&mut self, current_base: f32, current_nod: f32) -> ServoCommand {
        let now = self.clock.now_ms();

        self.check_face_timeout(now);

        if now.saturating_sub(self.last_update_ms) < self.control_interval_ms() {
            return self.last_command();
        }
        self.last_update_ms = now;

        self.state.pan_angle = current_base.clamp(BASE_MIN, BASE_MAX);
        self.state.tilt_angle = current_nod.clamp(NOD_MIN, NOD_MAX);

        if self.step_blind_machine() {
            return self.last_command();
        }

        self.step_control_machine(now);

        match self.state.control_state {
            ControlState::Acquire | ControlState::Track => self.update_predictive_tracking(now),
            ControlState::Lost => self.update_lost(now),
        }

        self.state.target_base = self.state.pan_angle.clamp(BASE_MIN, BASE_MAX) as i32;
        self.state.target_nod = self.state.tilt_angle.clamp(NOD_MIN, NOD_MAX) as i32;
        self.state.update_count += 1;

        self.last_command()
    }

    fn last_command(&self) -> ServoCommand {
        ServoCommand {
            base: self.state.target_base,
            nod: self.state.target_nod,
            active: self.state.active,
        }
    }

    /// Control interval for the current primary state: fastest while
    /// tracking, slower while deciding in acquisition
    fn control_interval_ms(&self) -> u64 {
        match self.state.control_state {
            ControlState::Track => self.config.control.track_interval_ms,
            ControlState::Acquire => self.config.control.acquire_interval_ms,
            ControlState::Lost => self.config.control.lost_interval_ms,
        }
    }

    /// Deactivate after a long gap with no face, checked periodically
    fn check_face_timeout(&mut self, now: u64) {
        if !self.state.active {
            return;
        }
        if now.saturating_sub(self.last_timeout_check_ms) < TIMEOUT_CHECK_INTERVAL_MS {
            return;
        }
        self.last_timeout_check_ms = now;

        if self.state.last_face_ms > 0
            && now.saturating_sub(self.state.last_face_ms) > self.config.control.face_timeout_ms
        {
            debug!("face timeout, deactivating");
            self.state.active = false;
        }
    }

    /// Advance the disengagement machine; returns true if this tick is
    /// fully handled by a blind trajectory
    fn step_blind_machine(&mut self) -> bool {
        if self.state.blind_state == BlindState::Normal {
            return false;
        }
        self.state.blind_frame_counter += 1;

        if self.state.blind_state == BlindState::BlindMoving {
            if self.state.blind_frame_counter <= self.config.control.blind_ignore_frames {
                // Follow the trajectory; position data is ignored
                if let Some((pan, tilt)) = self.trajectory.next_position() {
                    self.state.pan_angle = pan;
                    self.state.tilt_angle = tilt;
                }
                self.state.target_base = self.state.pan_angle.clamp(BASE_MIN, BASE_MAX) as i32;
                self.state.target_nod = self.state.tilt_angle.clamp(NOD_MIN, NOD_MAX) as i32;
                return true;
            }
            self.enter_blind_state(BlindState::GentleSettling);
        }

        if self.state.blind_state == BlindState::GentleSettling
            && self.state.blind_frame_counter > self.config.control.settling_frames
        {
            self.enter_blind_state(BlindState::Normal);
            self.returning_to_center = false;
        }
        false
    }

    fn enter_blind_state(&mut self, next: BlindState) {
        if self.state.blind_state != next {
            trace!("blind state {:?} -> {:?}", self.state.blind_state, next);
            self.state.blind_state = next;
            self.state.blind_frame_counter = 0;
        }
    }

    /// Advance the primary LOST/ACQUIRE/TRACK machine
    fn step_control_machine(&mut self, now: u64) {
        // An update counts as valid for this tick if it landed within
        // the last couple of control intervals
        let freshness_window = self.control_interval_ms() * 2;
        let face_detected = self.state.active
            && !self.state.data_is_stale
            && self.state.last_face_ms > 0
            && now.saturating_sub(self.state.last_face_ms) <= freshness_window;

        if face_detected {
            self.state.frames_lost = 0;
            self.state.frames_tracked += 1;

            match self.state.control_state {
                ControlState::Lost
                    if self.state.frames_tracked >= self.config.control.frames_to_acquire =>
                {
                    self.enter_control_state(ControlState::Acquire);
                    self.trajectory.cancel();
                    self.pan_pid.reset();
                    self.tilt_pid.reset();
                }
                ControlState::Acquire
                    if self.state.frames_tracked >= self.config.control.frames_to_track =>
                {
                    let err_x = (self.state.face_x - CAMERA_CENTER_X).abs() as f32;
                    let err_y = (self.state.face_y - CAMERA_CENTER_Y).abs() as f32;
                    if err_x < self.config.control.acquire_threshold
                        && err_y < self.config.control.acquire_threshold
                    {
                        self.enter_control_state(ControlState::Track);
                    }
                }
                _ => {}
            }
        } else {
            self.state.frames_tracked = 0;
            self.state.frames_lost += 1;

            if self.state.frames_lost >= self.config.control.frames_to_lost
                && self.state.control_state != ControlState::Lost
            {
                self.enter_control_state(ControlState::Lost);
                self.enter_blind_state(BlindState::Normal);
            }
        }
    }

    fn enter_control_state(&mut self, next: ControlState) {
        if self.state.control_state != next {
            debug!("control state {:?} -> {:?}", self.state.control_state, next);
            self.state.control_state = next;
        }
    }

    /// Closed-loop tracking toward the frame center
    fn update_predictive_tracking(&mut self, now: u64) {
        let mut error_x = (self.state.face_x - CAMERA_CENTER_X) as f32;
        let mut error_y = (self.state.face_y - CAMERA_CENTER_Y) as f32;

        // Adaptive deadband, TRACK only: higher confidence tightens it
        if self.state.control_state == ControlState::Track {
            let confidence = self.state.face_confidence as f32 / 100.0;
            let width = self.config.control.deadband_max - self.config.control.deadband_min;
            let deadband = self.config.control.deadband_min + (1.0 - confidence) * width;

            if error_x.abs() < deadband {
                error_x = 0.0;
            }
            if error_y.abs() < deadband {
                error_y = 0.0;
            }
        }

        let total_error = (error_x * error_x + error_y * error_y).sqrt();
        self.state.error_x = error_x as i32;
        self.state.error_y = error_y as i32;
        self.state.error_magnitude = total_error;

        let motion_scale = self.motion_scale(total_error);

        self.pan_pid.update_gains(total_error, motion_scale);
        self.tilt_pid.update_gains(total_error, motion_scale);

        // Inside the deadband an axis must not move at all; the integral
        // bleeds off instead of coasting the head
        let pan_command = if error_x == 0.0 {
            self.pan_pid.bleed_integral();
            0.0
        } else {
            self.pan_pid.update(error_x * 0.1, CONTROL_DT)
        };
        let tilt_command = if error_y == 0.0 {
            self.tilt_pid.bleed_integral();
            0.0
        } else {
            self.tilt_pid.update(error_y * 0.1, CONTROL_DT)
        };

        let smoothing = self.config.control.smoothing_factor;
        self.state.pan_angle += pan_command * smoothing;
        self.state.tilt_angle += tilt_command * smoothing;

        self.state.adjust_base = pan_command * smoothing;
        self.state.adjust_nod = tilt_command * smoothing;
        self.state.current_gain = self.pan_pid.kp();

        self.detect_oscillation(total_error);
        self.state.prev_error_magnitude = total_error;

        self.state.tracking_quality = (1.0 - total_error / 120.0).clamp(0.0, 1.0);
        self.state.is_settled = total_error < self.config.control.settle_threshold;

        if now.saturating_sub(self.last_status_log_ms) > STATUS_LOG_INTERVAL_MS {
            trace!(
                "face ({},{}) err ({},{}) conf {} pan {:.1} tilt {:.1}",
                self.state.face_x,
                self.state.face_y,
                self.state.error_x,
                self.state.error_y,
                self.state.face_confidence,
                self.state.pan_angle,
                self.state.tilt_angle
            );
            self.last_status_log_ms = now;
        }
    }

    /// Combined gain multiplier from confidence, settling phase, target
    /// velocity, depth and control state
    fn motion_scale(&self, total_error: f32) -> f32 {
        let cfg = &self.config.control;
        let mut scale = 0.4 + (self.state.face_confidence as f32 / 100.0) * 0.6;

        if self.state.blind_state == BlindState::GentleSettling {
            scale *= cfg.settling_gain_scale;
        }

        // A stationary target with a large error gets approached gently;
        // chasing it at full gain overshoots
        let vx = self.state.face_vx as f32;
        let vy = self.state.face_vy as f32;
        let face_speed = (vx * vx + vy * vy).sqrt();
        if face_speed < 5.0 && total_error > 40.0 {
            scale *= 0.6;
        }

        if self.state.face_size > 0 {
            let depth = (self.state.face_size as f32 / cfg.reference_face_width).clamp(0.7, 1.2);
            scale *= depth;
        }

        if self.state.control_state == ControlState::Acquire {
            scale *= cfg.acquire_gain_scale;
        }

        scale
    }

    fn detect_oscillation(&mut self, total_error: f32) {
        let error_delta = (total_error - self.state.prev_error_magnitude).abs();
        if error_delta > 10.0 && total_error < 30.0 {
            self.state.oscillation_count += 1;
        } else if self.state.oscillation_count > 0 {
            self.state.oscillation_count -= 1;
        }
        self.state.oscillation_count = self.state.oscillation_count.clamp(0, 10);
    }

    /// Behavior while no face is available: short-horizon prediction
    /// first, then an eased return to center
    fn update_lost(&mut self, now: u64) {
        let time_lost = now.saturating_sub(self.state.last_face_ms);
        let cfg = &self.config.control;

        if self.state.last_face_ms > 0 && time_lost < cfg.prediction_window_ms {
            // Follow the last known motion for a short while
            let dt_s = time_lost as f32 / 1000.0;
            let predict_x = self.state.face_x as f32 + self.state.face_vx as f32 * dt_s;
            let predict_y = self.state.face_y as f32 + self.state.face_vy as f32 * dt_s;

            let error_x = predict_x - CAMERA_CENTER_X as f32;
            let error_y = predict_y - CAMERA_CENTER_Y as f32;

            self.state.pan_angle += error_x * 0.01;
            self.state.tilt_angle += error_y * 0.01;

            self.enter_blind_state(BlindState::Normal);
            self.returning_to_center = false;
        } else if time_lost >= cfg.return_to_center_timeout_ms {
            if !self.returning_to_center {
                debug!("sustained loss, returning to center");
                self.returning_to_center = true;
                self.enter_blind_state(BlindState::BlindMoving);
                self.trajectory
                    .plan_return_to_center(self.state.pan_angle, self.state.tilt_angle);
            }
            if let Some((pan, tilt)) = self.trajectory.next_position() {
                self.state.pan_angle = pan;
                self.state.tilt_angle = tilt;
            }
        } else {
            self.enter_blind_state(BlindState::Normal);
            self.returning_to_center = false;
        }
    }

    fn derive_velocity(&mut self, x: i32, y: i32, now: u64) {
        if self.last_velocity_ms > 0 {
            let dt = now.saturating_sub(self.last_velocity_ms) as f32 / 1000.0;
            if dt > 0.001 && dt < 0.5 {
                let vx = ((x - self.last_face_x) as f32 / dt) as i32;
                let vy = ((y - self.last_face_y) as f32 / dt) as i32;
                self.state.face_vx = vx.clamp(-MAX_FACE_VELOCITY, MAX_FACE_VELOCITY);
                self.state.face_vy = vy.clamp(-MAX_FACE_VELOCITY, MAX_FACE_VELOCITY);
            }
        }
        self.last_face_x = x;
        self.last_face_y = y;
        self.last_velocity_ms = now;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether the tracker is actively producing commands
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Whether the error magnitude is below the settle threshold
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.is_settled
    }

    /// Continuous tracking quality, 0.0 (far off) to 1.0 (centered)
    #[must_use]
    pub fn tracking_quality(&self) -> f32 {
        self.state.tracking_quality
    }

    /// Quality classification of the histogram tracking episode
    #[must_use]
    pub fn histogram_quality(&self) -> TrackingQuality {
        self.searcher.tracking_quality()
    }

    /// Current pixel error magnitude
    #[must_use]
    pub fn error_magnitude(&self) -> f32 {
        self.state.error_magnitude
    }

    /// Primary state machine position
    #[must_use]
    pub fn control_state(&self) -> ControlState {
        self.state.control_state
    }

    /// Disengagement state machine position
    #[must_use]
    pub fn blind_state(&self) -> BlindState {
        self.state.blind_state
    }

    /// Whether a usable face signature exists right now
    #[must_use]
    pub fn is_signature_valid(&self) -> bool {
        self.searcher.is_signature_valid(self.clock.now_ms())
    }

    /// Age of the current signature, if one exists and is valid
    #[must_use]
    pub fn signature_age_ms(&self) -> Option<u64> {
        self.searcher.signature_age_ms(self.clock.now_ms())
    }

    /// Frames tracked on histogram evidence alone since the last signature
    #[must_use]
    pub fn histogram_only_frames(&self) -> u32 {
        self.searcher.histogram_only_frames()
    }

    /// Explicitly end the current signature episode
    pub fn invalidate_signature(&mut self) {
        self.searcher.invalidate();
    }

    /// Number of completed control ticks
    #[must_use]
    pub fn update_count(&self) -> u32 {
        self.state.update_count
    }

    /// Saturating oscillation indicator, 0-10
    #[must_use]
    pub fn oscillation_count(&self) -> i32 {
        self.state.oscillation_count
    }

    /// Reacquisition sweep position for the given step
    ///
    /// The intent layer walks these while the face is lost: around the
    /// current pose, then widening, then back to center.
    #[must_use]
    pub fn search_position(&self, step: u32) -> (i32, i32) {
        let (dp, dt) = SEARCH_OFFSETS[(step as usize) % SEARCH_OFFSETS.len()];
        let base = (self.state.pan_angle + dp).clamp(BASE_MIN, BASE_MAX) as i32;
        let nod = (self.state.tilt_angle + dt).clamp(NOD_MIN, NOD_MAX) as i32;
        (base, nod)
    }

    /// Human-readable diagnostic dump
    #[must_use]
    pub fn debug_report(&self) -> String {
        let mut out = String::new();
        if self.state.active {
            let state = match self.state.control_state {
                ControlState::Lost => "LOST",
                ControlState::Acquire => "ACQ",
                ControlState::Track => "TRK",
            };
            let _ = write!(
                out,
                "[reflex] {state} face:({},{}) dist:{} err:{:.1}px conf:{} pan:{:.1}{:+.2} \
                 tilt:{:.1}{:+.2} gain:{:.3} quality:{:.0}%",
                self.state.face_x,
                self.state.face_y,
                self.state.face_distance,
                self.state.error_magnitude,
                self.state.face_confidence,
                self.state.pan_angle,
                self.state.adjust_base,
                self.state.tilt_angle,
                self.state.adjust_nod,
                self.state.current_gain,
                self.state.tracking_quality * 100.0
            );
            if self.is_signature_valid() {
                let (hx, hy) = self.searcher.last_position();
                let _ = write!(
                    out,
                    " hist:({hx},{hy}) {:.2} stable:{} bridge:{}",
                    self.searcher.last_confidence(),
                    self.searcher.stable_frames(),
                    self.searcher.histogram_only_frames()
                );
            }
        } else {
            out.push_str("[reflex] inactive");
        }
        out
    }
}

impl Default for ReflexTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker_with_clock() -> (ReflexTracker, ManualClock) {
        let clock = ManualClock::new(1000);
        let tracker = ReflexTracker::with_clock(Config::default(), Box::new(clock.clone())).unwrap();
        (tracker, clock)
    }

    /// Drive one control tick: advance time past the interval, feed a
    /// report, and run calculate once
    fn tick(tracker: &mut ReflexTracker, clock: &ManualClock, face: Option<(i32, i32)>) -> ServoCommand {
        clock.advance(20);
        if let Some((x, y)) = face {
            tracker.update_face_data(x, y, 55, 100);
        }
        let base = tracker.state.pan_angle;
        let nod = tracker.state.tilt_angle;
        tracker.calculate(base, nod)
    }

    #[test]
    fn test_starts_inactive_and_centered() {
        let (mut tracker, _clock) = tracker_with_clock();
        assert!(!tracker.is_active());
        let cmd = tracker.calculate(BASE_CENTER, NOD_CENTER);
        assert_eq!(cmd.base, BASE_CENTER as i32);
        assert_eq!(cmd.nod, NOD_CENTER as i32);
        assert!(!cmd.active);
    }

    #[test]
    fn test_enable_disable() {
        let (mut tracker, _clock) = tracker_with_clock();
        tracker.enable();
        assert!(tracker.is_active());
        tracker.disable();
        assert!(!tracker.is_active());
        assert!(!tracker.is_settled());
    }

    #[test]
    fn test_acquire_then_track_on_consecutive_updates() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        // Jittered positions near center, always within the acquire
        // threshold; jitter keeps the stale detector quiet
        tick(&mut tracker, &clock, Some((122, 121)));
        assert_eq!(tracker.control_state(), ControlState::Acquire);

        // Acquire runs at a slower interval; keep feeding until the
        // machine has had enough accepted ticks
        for i in 0..5 {
            let pos = if i % 2 == 0 { (118, 124) } else { (122, 121) };
            tick(&mut tracker, &clock, Some(pos));
        }
        assert_eq!(tracker.control_state(), ControlState::Track);
    }

    #[test]
    fn test_far_face_does_not_reach_track() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        for i in 0..10 {
            tick(&mut tracker, &clock, Some((200, 60 + (i % 2) * 4)));
        }
        // Error stays above the acquire threshold on both axes
        assert_eq!(tracker.control_state(), ControlState::Acquire);
    }

    #[test]
    fn test_missed_updates_fall_back_to_lost() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        for i in 0..6 {
            tick(&mut tracker, &clock, Some((130 + (i % 2) * 4, 120)));
        }
        assert_ne!(tracker.control_state(), ControlState::Lost);

        for _ in 0..15 {
            tick(&mut tracker, &clock, None);
        }
        assert_eq!(tracker.control_state(), ControlState::Lost);
    }

    #[test]
    fn test_deadband_produces_zero_change() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        // Walk into TRACK near center, jittering to keep the feed fresh
        for i in 0..8 {
            let pos = if i % 2 == 0 { (122, 121) } else { (118, 124) };
            tick(&mut tracker, &clock, Some(pos));
        }
        assert_eq!(tracker.control_state(), ControlState::Track);

        // Error of (5, 3) px is strictly inside the 12 px deadband at
        // full confidence
        let before_pan = tracker.state.pan_angle;
        let before_tilt = tracker.state.tilt_angle;
        clock.advance(20);
        tracker.update_face_data(125, 123, 55, 100);
        tracker.update_confidence(100);
        tracker.calculate(before_pan, before_tilt);
        assert_eq!(tracker.state.adjust_base, 0.0);
        assert_eq!(tracker.state.adjust_nod, 0.0);
        assert_eq!(tracker.state.pan_angle, before_pan);
        assert_eq!(tracker.state.tilt_angle, before_tilt);
    }

    #[test]
    fn test_stale_feed_deactivates() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        tracker.update_face_data(120, 120, 55, 100);
        // Identical coordinates, long past the stale timeout
        for _ in 0..8 {
            clock.advance(100);
            tracker.update_face_data(120, 120, 55, 100);
        }
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_rate_limited_calls_return_last_target() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();
        let first = tick(&mut tracker, &clock, Some((150, 130)));

        // Immediately polling again without advancing time is a no-op
        let second = tracker.calculate(tracker.state.pan_angle, tracker.state.tilt_angle);
        assert_eq!(first.base, second.base);
        assert_eq!(first.nod, second.nod);
        let count = tracker.update_count();
        tracker.calculate(tracker.state.pan_angle, tracker.state.tilt_angle);
        assert_eq!(tracker.update_count(), count);
    }

    #[test]
    fn test_output_always_within_servo_range() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        // Hammer one frame corner for a while
        for i in 0..200 {
            let cmd = tick(&mut tracker, &clock, Some((235 + (i % 2) * 4, 239)));
            assert!(cmd.base >= BASE_MIN as i32 && cmd.base <= BASE_MAX as i32);
            assert!(cmd.nod >= NOD_MIN as i32 && cmd.nod <= NOD_MAX as i32);
        }
    }

    #[test]
    fn test_angle_change_bounded_per_tick() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        let max_step = Config::default().control.max_velocity_per_tick;
        let mut prev = tracker.state.pan_angle;
        for i in 0..100 {
            tick(&mut tracker, &clock, Some((235 + (i % 2) * 4, 120)));
            let step = (tracker.state.pan_angle - prev).abs();
            assert!(step <= max_step + 1e-3, "step {step}");
            prev = tracker.state.pan_angle;
        }
    }

    #[test]
    fn test_sustained_loss_returns_to_center() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();

        // Track a face off to one side for a while
        for i in 0..50 {
            tick(&mut tracker, &clock, Some((200 + (i % 2) * 4, 140)));
        }
        let engaged_pan = tracker.state.pan_angle;
        assert!(engaged_pan != BASE_CENTER);

        // Silence for well past the return-to-center timeout
        let mut reached_blind = false;
        for _ in 0..200 {
            tick(&mut tracker, &clock, None);
            if tracker.blind_state() == BlindState::BlindMoving {
                reached_blind = true;
            }
        }
        assert_eq!(tracker.control_state(), ControlState::Lost);
        assert!(reached_blind, "blind return never started");
        // The head ends near center
        assert!((tracker.state.pan_angle - BASE_CENTER).abs() < 6.0);
        assert!((tracker.state.tilt_angle - NOD_CENTER).abs() < 6.0);
    }

    #[test]
    fn test_reset_restores_clean_slate() {
        let (mut tracker, clock) = tracker_with_clock();
        tracker.enable();
        for i in 0..10 {
            tick(&mut tracker, &clock, Some((150 + (i % 2) * 4, 130)));
        }
        tracker.reset();
        assert!(!tracker.is_active());
        assert_eq!(tracker.control_state(), ControlState::Lost);
        assert_eq!(tracker.blind_state(), BlindState::Normal);
        assert_eq!(tracker.update_count(), 0);
        assert_eq!(tracker.state.pan_angle, BASE_CENTER);
    }

    #[test]
    fn test_search_position_pattern_is_clamped() {
        let (tracker, _clock) = tracker_with_clock();
        for step in 0..16 {
            let (base, nod) = tracker.search_position(step);
            assert!(base >= BASE_MIN as i32 && base <= BASE_MAX as i32);
            assert!(nod >= NOD_MIN as i32 && nod <= NOD_MAX as i32);
        }
        // Step 0 and step 7 both sit at the current pose
        assert_eq!(tracker.search_position(0), tracker.search_position(7));
    }

    #[test]
    fn test_debug_report_mentions_state() {
        let (mut tracker, clock) = tracker_with_clock();
        assert!(tracker.debug_report().contains("inactive"));
        tracker.enable();
        tick(&mut tracker, &clock, Some((130, 120)));
        assert!(tracker.debug_report().contains("ACQ"));
    }
}
