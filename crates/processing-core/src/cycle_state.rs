//! Per-zone cycle state machine.
//!
//! Each zone runs an independent debounce machine over two noisy per-frame
//! signals: *activity* (work in progress) and *completion* (a finished unit).
//!
//! # Transitions
//!
//! **Idle** (completion is checked first):
//! - completion seen: the completion streak grows and the activity streak is
//!   cleared. No cycle starts while a finished unit is still visible.
//! - otherwise activity seen: the activity streak grows; once it reaches the
//!   start threshold a new cycle begins.
//! - otherwise: both streaks reset.
//!
//! **Measuring** (activity is checked first):
//! - activity seen: the activity streak grows, stop progress is cleared.
//! - otherwise completion seen: the completion streak grows; once it reaches
//!   the stop threshold the cycle ends and both streaks reset.
//! - otherwise: both streaks reset.
//!
//! Streaks count *consecutive* frames; any non-qualifying frame erases
//! partial progress.
//!
//! Stopping needs more confirmation frames than starting, so every raw
//! duration carries `(stop - start)` extra frames at its tail. That amount is
//! subtracted as a fixed bias correction.

use chrono::{DateTime, Utc};
use cyclewatch_common::clock::FrameClock;
use cyclewatch_common::config::MeasurementSettings;
use cyclewatch_cycle_model::cycle::CycleRecord;

use crate::membership::ZonePresence;

/// Debounce thresholds and the derived bias correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleThresholds {
    /// Consecutive activity frames needed to start measuring.
    pub start_frames: u32,

    /// Consecutive completion frames needed to stop measuring.
    pub stop_frames: u32,

    /// Frame rate used to convert the bias from frames to seconds.
    pub fps: f64,
}

impl CycleThresholds {
    pub fn new(start_frames: u32, stop_frames: u32, fps: f64) -> Self {
        Self {
            start_frames,
            stop_frames,
            fps,
        }
    }

    /// Build from settings, using `fps` (the stream's effective frame rate).
    pub fn from_settings(settings: &MeasurementSettings, fps: f64) -> Self {
        Self::new(settings.start_threshold, settings.stop_threshold, fps)
    }

    /// `(stop - start) / fps`. Negative if stop < start.
    pub fn bias_correction_secs(&self) -> f64 {
        FrameClock::new(self.fps).frames_to_secs(self.stop_frames as i64 - self.start_frames as i64)
    }
}

/// Where a frame sits in media time and wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStamp {
    pub frame_index: u64,
    pub time_seconds: f64,
    pub wallclock: DateTime<Utc>,
}

/// A cycle being measured.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCycle {
    pub cycle_number: u32,
    pub start_frame: u64,
    pub start_time_seconds: f64,
    pub start_wallclock: DateTime<Utc>,

    /// Cleared by crowding; reset only when the next cycle starts.
    pub valid: bool,
}

/// Phase of a zone. Start fields only exist while measuring.
#[derive(Debug, Clone, PartialEq)]
pub enum ZonePhase {
    Idle,
    Measuring(ActiveCycle),
}

/// What a single frame did to a zone.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No phase change.
    Continue,

    /// Idle -> Measuring.
    Started { cycle_number: u32 },

    /// Measuring -> Idle with a valid cycle; the record is already in history.
    Completed(CycleRecord),

    /// Measuring -> Idle with an invalidated cycle; nothing was recorded.
    Invalidated {
        cycle_number: u32,
        elapsed_seconds: f64,
        corrected_seconds: f64,
    },
}

/// The state machine for one zone.
#[derive(Debug, Clone)]
pub struct ZoneCycleMachine {
    zone_name: String,
    thresholds: CycleThresholds,
    phase: ZonePhase,
    activity_streak: u32,
    completion_streak: u32,
    cycle_number: u32,
    history: Vec<CycleRecord>,
}

impl ZoneCycleMachine {
    /// A machine in the initial state: idle, all counters zero.
    pub fn new(zone_name: impl Into<String>, thresholds: CycleThresholds) -> Self {
        Self {
            zone_name: zone_name.into(),
            thresholds,
            phase: ZonePhase::Idle,
            activity_streak: 0,
            completion_streak: 0,
            cycle_number: 0,
            history: Vec::new(),
        }
    }

    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    pub fn phase(&self) -> &ZonePhase {
        &self.phase
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self.phase, ZonePhase::Measuring(_))
    }

    /// Validity of the cycle in progress, if any.
    pub fn active_cycle_valid(&self) -> Option<bool> {
        match &self.phase {
            ZonePhase::Measuring(active) => Some(active.valid),
            ZonePhase::Idle => None,
        }
    }

    pub fn activity_streak(&self) -> u32 {
        self.activity_streak
    }

    pub fn completion_streak(&self) -> u32 {
        self.completion_streak
    }

    /// Number of cycles started so far, valid or not.
    pub fn cycle_number(&self) -> u32 {
        self.cycle_number
    }

    /// Valid completed cycles, oldest first.
    pub fn history(&self) -> &[CycleRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<CycleRecord> {
        self.history
    }

    /// Mark the cycle in progress invalid. Returns true only when this call
    /// changed the flag. Idle zones are unaffected.
    pub fn invalidate_active_cycle(&mut self) -> bool {
        match &mut self.phase {
            ZonePhase::Measuring(active) if active.valid => {
                active.valid = false;
                true
            }
            _ => false,
        }
    }

    /// Advance by one frame.
    ///
    /// Crowding is applied to the cycle in progress before the transition is
    /// evaluated, so a crowded frame that also completes a cycle invalidates
    /// it.
    pub fn step(&mut self, presence: ZonePresence, crowded: bool, stamp: &FrameStamp) -> StepOutcome {
        if crowded && self.invalidate_active_cycle() {
            tracing::debug!(
                zone = %self.zone_name,
                cycle = self.cycle_number,
                frame = stamp.frame_index,
                "Cycle marked invalid by crowding"
            );
        }

        if self.is_measuring() {
            self.step_measuring(presence, stamp)
        } else {
            self.step_idle(presence, stamp)
        }
    }

    fn step_idle(&mut self, presence: ZonePresence, stamp: &FrameStamp) -> StepOutcome {
        if presence.completion_present {
            self.activity_streak = 0;
            self.completion_streak = self.completion_streak.saturating_add(1);
            return StepOutcome::Continue;
        }

        if presence.activity_present {
            self.activity_streak = self.activity_streak.saturating_add(1);
            self.completion_streak = 0;

            if self.activity_streak >= self.thresholds.start_frames {
                self.cycle_number = self.cycle_number.saturating_add(1);
                self.phase = ZonePhase::Measuring(ActiveCycle {
                    cycle_number: self.cycle_number,
                    start_frame: stamp.frame_index,
                    start_time_seconds: stamp.time_seconds,
                    start_wallclock: stamp.wallclock,
                    valid: true,
                });
                return StepOutcome::Started {
                    cycle_number: self.cycle_number,
                };
            }
            return StepOutcome::Continue;
        }

        self.reset_streaks();
        StepOutcome::Continue
    }

    fn step_measuring(&mut self, presence: ZonePresence, stamp: &FrameStamp) -> StepOutcome {
        if presence.activity_present {
            self.activity_streak = self.activity_streak.saturating_add(1);
            self.completion_streak = 0;
            return StepOutcome::Continue;
        }

        if !presence.completion_present {
            self.reset_streaks();
            return StepOutcome::Continue;
        }

        self.completion_streak = self.completion_streak.saturating_add(1);
        self.activity_streak = 0;
        if self.completion_streak < self.thresholds.stop_frames {
            return StepOutcome::Continue;
        }

        let ZonePhase::Measuring(active) = std::mem::replace(&mut self.phase, ZonePhase::Idle)
        else {
            return StepOutcome::Continue;
        };
        self.reset_streaks();

        let elapsed_seconds = stamp.time_seconds - active.start_time_seconds;
        let corrected_seconds = elapsed_seconds - self.thresholds.bias_correction_secs();

        if !active.valid {
            return StepOutcome::Invalidated {
                cycle_number: active.cycle_number,
                elapsed_seconds,
                corrected_seconds,
            };
        }

        let record = CycleRecord {
            zone_name: self.zone_name.clone(),
            cycle_number: active.cycle_number,
            start_wallclock: active.start_wallclock,
            end_wallclock: stamp.wallclock,
            start_frame: active.start_frame,
            end_frame: stamp.frame_index,
            start_time_seconds: active.start_time_seconds,
            end_time_seconds: stamp.time_seconds,
            elapsed_seconds,
            corrected_seconds,
            valid: true,
        };
        self.history.push(record.clone());
        StepOutcome::Completed(record)
    }

    fn reset_streaks(&mut self) {
        self.activity_streak = 0;
        self.completion_streak = 0;
    }
}
