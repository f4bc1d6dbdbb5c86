//! Head tracking control core for a pan/tilt camera head.
//!
//! This library turns noisy face position reports into smooth servo
//! targets using:
//! - An adaptive PID pair with error-scheduled gains for pan and tilt
//! - Histogram-based face re-identification to bridge vision model gaps
//! - Explicit LOST / ACQUIRE / TRACK state machines for auditable behavior
//!
//! The control pipeline consists of:
//! 1. Position ingestion with stale feed detection and velocity derivation
//! 2. Histogram search on raw RGB565 frames between vision model updates
//! 3. Per-tick PID control toward the frame center at 50 Hz
//! 4. Gentle eased return to center after a sustained loss
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use head_tracking::reflex::ReflexTracker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tracker = ReflexTracker::new();
//! tracker.enable();
//!
//! // Feed vision model reports as they arrive
//! tracker.update_face_data(150, 110, 55, 100);
//! tracker.update_confidence(92);
//!
//! // Poll at the servo update rate; extra calls are rate-limited
//! let command = tracker.calculate(90.0, 115.0);
//! if command.active {
//!     println!("base: {}, nod: {}", command.base, command.nod);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Bridging Vision Gaps with Histogram Tracking
//!
//! ```no_run
//! use head_tracking::frame::FrameView;
//! use head_tracking::reflex::ReflexTracker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tracker = ReflexTracker::new();
//! tracker.enable();
//!
//! // 240x240 RGB565 frame from the camera
//! let buffer = vec![0u8; 115_200];
//! let frame = FrameView::new(&buffer)?;
//!
//! // Capture a signature when the vision model confirms a face
//! tracker.update_face_data(120, 120, 55, 100);
//! tracker.build_signature(&frame, 120, 120, 55, 70);
//!
//! // Later, with no fresh report, search near the last known position
//! if let Some(m) = tracker.track(&frame, 120, 120, 0.0) {
//!     println!("reacquired at ({}, {}) conf {:.2}", m.x, m.y, m.confidence);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Configuration and Time Source
//!
//! ```no_run
//! use head_tracking::clock::ManualClock;
//! use head_tracking::config::Config;
//! use head_tracking::reflex::ReflexTracker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.control.frames_to_lost = 15;
//! config.validate()?;
//!
//! // Deterministic time for simulation and tests
//! let clock = ManualClock::new(0);
//! let mut tracker = ReflexTracker::with_clock(config, Box::new(clock.clone()))?;
//! tracker.enable();
//! clock.advance(20);
//! let _ = tracker.calculate(90.0, 115.0);
//! # Ok(())
//! # }
//! ```

/// Reflexive tracking control and the servo state machines
pub mod reflex;

/// Histogram search for face re-identification between model updates
pub mod searcher;

/// Face color signatures and histogram similarity
pub mod signature;

/// RGB565 frame access and HSV conversion
pub mod frame;

/// Tracking quality classification over recent match history
pub mod quality;

/// Adaptive PID controller with error-scheduled gains
pub mod pid;

/// Eased return-to-center trajectory planning
pub mod trajectory;

/// Stale input feed detection
pub mod stale;

/// Injectable time sources for deterministic control
pub mod clock;

/// Error types and result handling
pub mod error;

/// Constants used throughout the tracking core
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
