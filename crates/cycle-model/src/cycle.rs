//! Cycle records, notifications and clip windows.

use chrono::{DateTime, Utc};
use cyclewatch_common::clock::FrameClock;
use serde::{Deserialize, Serialize};

/// One completed, valid cycle for a zone.
///
/// Created exactly once when a zone returns from measuring to idle with a
/// still-valid cycle; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub zone_name: String,
    pub cycle_number: u32,
    pub start_wallclock: DateTime<Utc>,
    pub end_wallclock: DateTime<Utc>,
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time_seconds: f64,
    pub end_time_seconds: f64,

    /// `end_time_seconds - start_time_seconds`.
    pub elapsed_seconds: f64,

    /// `elapsed_seconds` minus the start/stop confirmation bias. May be
    /// negative for cycles shorter than the bias itself.
    pub corrected_seconds: f64,

    pub valid: bool,
}

/// Observable cycle lifecycle events, for logging and UI only.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleNotification {
    Started {
        zone_name: String,
        cycle_number: u32,
        frame_index: u64,
        time_seconds: f64,
    },
    Completed {
        record: CycleRecord,
    },
    Invalidated {
        zone_name: String,
        cycle_number: u32,
        corrected_seconds: f64,
    },
}

/// Time range of the processed media to copy for a zone's longest cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipWindow {
    pub zone_name: String,
    pub cycle_number: u32,

    /// Clamped to `[0, media_duration]`.
    pub extract_start_seconds: f64,

    /// Clamped to `[0, media_duration]`.
    pub extract_end_seconds: f64,
}

impl ClipWindow {
    pub fn duration_secs(&self) -> f64 {
        (self.extract_end_seconds - self.extract_start_seconds).max(0.0)
    }

    /// Inclusive 0-based frame range covered by the window at `fps`.
    pub fn frame_range(&self, fps: f64) -> (u64, u64) {
        let clock = FrameClock::new(fps);
        let start = clock.frame_at(self.extract_start_seconds);
        let end = clock.frame_at(self.extract_end_seconds);
        (start, end.max(start))
    }

    /// Output name without extension: `{zone}_longest_cycle_{n}`.
    pub fn file_stem(&self) -> String {
        format!("{}_longest_cycle_{}", self.zone_name, self.cycle_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: f64, end: f64) -> ClipWindow {
        ClipWindow {
            zone_name: "A_Assemble".to_string(),
            cycle_number: 2,
            extract_start_seconds: start,
            extract_end_seconds: end,
        }
    }

    #[test]
    fn test_clip_file_stem() {
        assert_eq!(window(0.0, 1.0).file_stem(), "A_Assemble_longest_cycle_2");
    }

    #[test]
    fn test_clip_duration_never_negative() {
        assert!((window(18.0, 29.5).duration_secs() - 11.5).abs() < 1e-9);
        assert_eq!(window(5.0, 5.0).duration_secs(), 0.0);
    }

    #[test]
    fn test_clip_frame_range_truncates() {
        let w = window(18.0, 29.5);
        assert_eq!(w.frame_range(24.0), (432, 708));
    }
}
