//! Configuration management for the tracking core.
//!
//! Every tunable threshold lives here, grouped per component, with the
//! defaults matching the calibrated 50 Hz servo rig. Configs serialize to
//! YAML so a deployment can override individual values without rebuilding.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reflex control loop configuration
    pub control: ControlConfig,

    /// Histogram search configuration
    pub search: SearchConfig,

    /// Face signature configuration
    pub signature: SignatureConfig,

    /// Tracking quality monitor configuration
    pub quality: QualityConfig,

    /// Stale input feed detection configuration
    pub stale: StaleConfig,
}

/// Reflex control loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Control interval in TRACK state (ms)
    pub track_interval_ms: u64,

    /// Control interval in ACQUIRE state (ms), slower while deciding
    pub acquire_interval_ms: u64,

    /// Control interval in LOST state (ms)
    pub lost_interval_ms: u64,

    /// Pixel error below which a face counts as acquired (per axis)
    pub acquire_threshold: f32,

    /// Consecutive valid frames to leave LOST
    pub frames_to_acquire: u32,

    /// Further consecutive frames (with small error) to enter TRACK
    pub frames_to_track: u32,

    /// Consecutive missed frames before falling back to LOST
    pub frames_to_lost: u32,

    /// Deadband width at full confidence (px)
    pub deadband_min: f32,

    /// Deadband width at zero confidence (px)
    pub deadband_max: f32,

    /// Maximum angular change per control tick (degrees)
    pub max_velocity_per_tick: f32,

    /// Exponential blend factor applied to each velocity command
    pub smoothing_factor: f32,

    /// Face width (px) treated as the reference tracking distance
    pub reference_face_width: f32,

    /// Gain multiplier while in ACQUIRE
    pub acquire_gain_scale: f32,

    /// Gain multiplier during gentle settling
    pub settling_gain_scale: f32,

    /// Frames to ignore position data during a blind return
    pub blind_ignore_frames: u32,

    /// Frames of reduced gain after a blind return
    pub settling_frames: u32,

    /// Time without a face before planning a return to center (ms)
    pub return_to_center_timeout_ms: u64,

    /// Window after loss during which linear prediction still applies (ms)
    pub prediction_window_ms: u64,

    /// Time without any face report before forced deactivation (ms)
    pub face_timeout_ms: u64,

    /// Error magnitude below which the head counts as settled (px)
    pub settle_threshold: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            track_interval_ms: 20,
            acquire_interval_ms: 40,
            lost_interval_ms: 20,
            acquire_threshold: 20.0,
            frames_to_acquire: 1,
            frames_to_track: 2,
            frames_to_lost: 10,
            deadband_min: 12.0,
            deadband_max: 20.0,
            max_velocity_per_tick: 6.0,
            smoothing_factor: 0.5,
            reference_face_width: 55.0,
            acquire_gain_scale: 0.85,
            settling_gain_scale: 0.3,
            blind_ignore_frames: 5,
            settling_frames: 10,
            return_to_center_timeout_ms: 1500,
            prediction_window_ms: 1000,
            face_timeout_ms: 2000,
            settle_threshold: 10.0,
        }
    }
}

/// Histogram search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Absolute maximum signature age (ms)
    pub signature_max_age_ms: u64,

    /// Age below which quality-based frame limits do not apply (ms)
    pub signature_min_age_ms: u64,

    /// Coarse search grid step (px)
    pub coarse_step: i32,

    /// Fine refinement radius around the coarse best (px)
    pub fine_radius: i32,

    /// Search window radius when the servo is nearly still (px)
    pub radius_slow: i32,

    /// Search window radius when the servo is moving fast (px)
    pub radius_fast: i32,

    /// Servo speed treated as "nearly still" (deg/s)
    pub speed_threshold_slow: f32,

    /// Servo speed treated as "fast" (deg/s)
    pub speed_threshold_fast: f32,

    /// Final confidence floor for an accepted match
    pub confidence_threshold: f32,

    /// Minimum per-region confidence
    pub min_region_confidence: f32,

    /// Regions (of 3) that must clear the per-region minimum
    pub min_regions_passing: u32,

    /// Minimum skin fraction for a candidate patch
    pub min_skin_percentage: f32,

    /// Window skin fraction below which the face is considered gone
    pub skin_collapse_threshold: f32,

    /// Minimum spatial coherence of the matched region
    pub min_coherence: f32,

    /// Maximum accepted distance from the predicted position (px)
    pub match_distance_limit: f32,

    /// Mean hue drift: soft penalty onset / hard rejection
    pub hue_drift_soft: f32,
    pub hue_drift_hard: f32,

    /// Mean saturation drift: soft penalty onset / hard rejection
    pub sat_drift_soft: f32,
    pub sat_drift_hard: f32,

    /// Mean value drift: soft penalty onset / hard rejection
    pub val_drift_soft: f32,
    pub val_drift_hard: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            signature_max_age_ms: 1200,
            signature_min_age_ms: 400,
            coarse_step: 4,
            fine_radius: 6,
            radius_slow: 45,
            radius_fast: 90,
            speed_threshold_slow: 10.0,
            speed_threshold_fast: 30.0,
            confidence_threshold: 0.52,
            min_region_confidence: 0.45,
            min_regions_passing: 2,
            min_skin_percentage: 0.20,
            skin_collapse_threshold: 0.10,
            min_coherence: 0.42,
            match_distance_limit: 60.0,
            hue_drift_soft: 12.0,
            hue_drift_hard: 30.0,
            sat_drift_soft: 20.0,
            sat_drift_hard: 50.0,
            val_drift_soft: 25.0,
            val_drift_hard: 60.0,
        }
    }
}

/// Face signature parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Minimum skin-pixel ratio for a usable signature
    pub min_skin_ratio: f32,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self { min_skin_ratio: 0.28 }
    }
}

/// Tracking quality monitor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Recent confidence treated as "high"
    pub confidence_high: f32,

    /// Recent-vs-older confidence drop treated as suspicious
    pub confidence_drop_alert: f32,

    /// Frame-to-frame position jump treated as unstable (px)
    pub max_position_jump: f32,

    /// Histogram-only frame budget while quality is good
    pub max_bridge_frames_good: u32,

    /// Histogram-only frame budget while quality is poor
    pub max_bridge_frames_poor: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            confidence_high: 0.70,
            confidence_drop_alert: 0.08,
            max_position_jump: 25.0,
            max_bridge_frames_good: 12,
            max_bridge_frames_poor: 5,
        }
    }
}

/// Stale input feed detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaleConfig {
    /// Combined pixel delta below which a report counts as unchanged
    pub change_threshold: i32,

    /// Maximum time without a coordinate change (ms)
    pub timeout_ms: u64,

    /// Maximum consecutive unchanged reports
    pub max_count: u32,
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            change_threshold: 3,
            timeout_ms: 300,
            max_count: 5,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.search.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.signature.min_skin_ratio) {
            return Err(Error::ConfigError(
                "Signature skin ratio must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.search.skin_collapse_threshold >= self.search.min_skin_percentage {
            return Err(Error::ConfigError(
                "Skin collapse threshold must be below the candidate skin minimum".to_string(),
            ));
        }
        if self.search.radius_slow > self.search.radius_fast {
            return Err(Error::ConfigError(
                "Slow search radius must not exceed the fast radius".to_string(),
            ));
        }
        if self.search.speed_threshold_slow >= self.search.speed_threshold_fast {
            return Err(Error::ConfigError(
                "Slow speed threshold must be below the fast threshold".to_string(),
            ));
        }
        if self.control.deadband_min > self.control.deadband_max {
            return Err(Error::ConfigError(
                "Minimum deadband must not exceed the maximum".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.control.smoothing_factor) {
            return Err(Error::ConfigError(
                "Smoothing factor must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.control.max_velocity_per_tick <= 0.0 {
            return Err(Error::ConfigError(
                "Max velocity per tick must be positive".to_string(),
            ));
        }
        if self.control.frames_to_lost == 0 {
            return Err(Error::ConfigError(
                "Frames to LOST must be greater than 0".to_string(),
            ));
        }
        if self.quality.max_bridge_frames_poor > self.quality.max_bridge_frames_good {
            return Err(Error::ConfigError(
                "Poor-quality bridge budget must not exceed the good-quality budget".to_string(),
            ));
        }
        if self.stale.change_threshold < 0 {
            return Err(Error::ConfigError(
                "Stale change threshold must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head tracking configuration

# Reflex control loop
control:
  track_interval_ms: 20
  acquire_interval_ms: 40
  lost_interval_ms: 20
  acquire_threshold: 20.0
  frames_to_acquire: 1
  frames_to_track: 2
  frames_to_lost: 10
  deadband_min: 12.0
  deadband_max: 20.0
  max_velocity_per_tick: 6.0
  smoothing_factor: 0.5
  reference_face_width: 55.0
  acquire_gain_scale: 0.85
  settling_gain_scale: 0.3
  blind_ignore_frames: 5
  settling_frames: 10
  return_to_center_timeout_ms: 1500
  prediction_window_ms: 1000
  face_timeout_ms: 2000
  settle_threshold: 10.0

# Histogram search
search:
  signature_max_age_ms: 1200
  signature_min_age_ms: 400
  coarse_step: 4
  fine_radius: 6
  radius_slow: 45
  radius_fast: 90
  speed_threshold_slow: 10.0
  speed_threshold_fast: 30.0
  confidence_threshold: 0.52
  min_region_confidence: 0.45
  min_regions_passing: 2
  min_skin_percentage: 0.20
  skin_collapse_threshold: 0.10
  min_coherence: 0.42
  match_distance_limit: 60.0

# Face signature
signature:
  min_skin_ratio: 0.28

# Tracking quality monitor
quality:
  confidence_high: 0.70
  confidence_drop_alert: 0.08
  max_position_jump: 25.0
  max_bridge_frames_good: 12
  max_bridge_frames_poor: 5

# Stale feed detection
stale:
  change_threshold: 3
  timeout_ms: 300
  max_count: 5
"#;
