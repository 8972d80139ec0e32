//! Clock and pacing utilities for frame-accurate playback.
//!
//! Every run is anchored to a monotonic epoch recorded at run start.
//! This module provides utilities for:
//! - Capturing the epoch
//! - Computing per-frame pacing deadlines
//! - Measuring drift between nominal and wall-clock playback

use std::time::{Duration, Instant};

/// A run clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment the run started).
#[derive(Debug, Clone)]
pub struct RunClock {
    /// The instant the run started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RunClock {
    /// Create a new run clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Milliseconds elapsed since run start.
    pub fn elapsed_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Wall-clock time at run start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Fixed-interval frame pacer.
///
/// Frame `n` (zero-based) is due to finish at `(n + 1) * interval` after the
/// run epoch. Waiting until that deadline, rather than sleeping a fixed
/// interval after each frame, keeps slow frames from accumulating lag.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    fps: u32,
}

impl FramePacer {
    /// Create a pacer for the given frame rate. A zero rate is treated as 1.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    /// Frames per second.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Nominal duration of one frame in milliseconds (`1000 / fps`).
    pub fn interval_ms(&self) -> f64 {
        1000.0 / self.fps as f64
    }

    /// Nominal playback time after `frames` frames, in milliseconds.
    pub fn nominal_elapsed_ms(&self, frames: u64) -> f64 {
        frames as f64 * self.interval_ms()
    }

    /// How long to wait after frame `frame_index` given the time actually
    /// spent since the run epoch. Zero when the run is behind schedule.
    pub fn delay_after(&self, frame_index: u64, actual_elapsed: Duration) -> Duration {
        let deadline = Duration::from_secs_f64(self.nominal_elapsed_ms(frame_index + 1) / 1000.0);
        deadline.saturating_sub(actual_elapsed)
    }
}

/// Drift between nominal playback time and wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Nominal elapsed time (ms).
    pub nominal_ms: f64,
    /// Measured wall-clock elapsed time (ms).
    pub actual_ms: f64,
}

impl DriftMeasurement {
    /// Drift in milliseconds (positive = playback ran slower than nominal).
    pub fn drift_ms(&self) -> f64 {
        self.actual_ms - self.nominal_ms
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}
