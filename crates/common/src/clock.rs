//! Clock and timing utilities.
//!
//! Two notions of time coexist in a measurement run:
//! - **Media time:** derived from the frame index and the stream frame rate.
//!   All cycle durations are measured in media time.
//! - **Wall-clock time:** when the frame was processed. Recorded alongside
//!   each cycle for traceability only.

use std::cell::Cell;

use chrono::{DateTime, Duration, Utc};

/// Wall-clock format used in the cycle store and CSV export.
pub const WALLCLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Converts between frame indices and media seconds for a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock for the given frame rate.
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Media time of a 1-based frame index (`frame / fps`).
    pub fn time_of(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps
    }

    /// Frame index at a media time, truncated toward zero.
    pub fn frame_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.fps) as u64
    }

    /// Duration in seconds of `frames` frames.
    pub fn frames_to_secs(&self, frames: i64) -> f64 {
        frames as f64 / self.fps
    }
}

/// Source of wall-clock timestamps.
pub trait WallClock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A deterministic clock that starts at a fixed instant and advances by a
/// fixed step on every call.
#[derive(Debug)]
pub struct FixedClock {
    start: DateTime<Utc>,
    step: Duration,
    ticks: Cell<i32>,
}

impl FixedClock {
    /// A clock that always returns `at`.
    pub fn at(at: DateTime<Utc>) -> Self {
        Self::stepping(at, Duration::zero())
    }

    /// A clock returning `start`, `start + step`, `start + 2*step`, ...
    pub fn stepping(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            start,
            step,
            ticks: Cell::new(0),
        }
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.ticks.get();
        self.ticks.set(n.saturating_add(1));
        self.start + self.step * n
    }
}

/// Format a wall-clock timestamp with millisecond precision.
pub fn format_wallclock(at: &DateTime<Utc>) -> String {
    at.format(WALLCLOCK_FORMAT).to_string()
}
