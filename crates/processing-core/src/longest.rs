//! Longest-cycle selection and clip window computation.

use cyclewatch_cycle_model::cycle::{ClipWindow, CycleRecord};

/// The record with the largest corrected duration. Ties go to the lowest
/// cycle number. `None` for an empty history.
pub fn select_longest(history: &[CycleRecord]) -> Option<&CycleRecord> {
    history.iter().fold(None, |best: Option<&CycleRecord>, record| match best {
        Some(current)
            if current.corrected_seconds > record.corrected_seconds
                || (current.corrected_seconds == record.corrected_seconds
                    && current.cycle_number <= record.cycle_number) =>
        {
            Some(current)
        }
        _ => Some(record),
    })
}

/// Pad a record's span by `margin_secs` on both sides, clamped to the media.
pub fn clip_window_for(record: &CycleRecord, media_duration_secs: f64, margin_secs: f64) -> ClipWindow {
    let duration = media_duration_secs.max(0.0);
    let extract_start_seconds = (record.start_time_seconds - margin_secs).clamp(0.0, duration);
    let extract_end_seconds = (record.end_time_seconds + margin_secs).clamp(0.0, duration);

    ClipWindow {
        zone_name: record.zone_name.clone(),
        cycle_number: record.cycle_number,
        extract_start_seconds,
        extract_end_seconds,
    }
}

/// Clip window around the longest cycle in `history`, if any.
pub fn compute_clip_window(
    history: &[CycleRecord],
    media_duration_secs: f64,
    margin_secs: f64,
) -> Option<ClipWindow> {
    select_longest(history).map(|record| clip_window_for(record, media_duration_secs, margin_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(cycle_number: u32, start: f64, end: f64, corrected: f64) -> CycleRecord {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        CycleRecord {
            zone_name: "A_Assemble".to_string(),
            cycle_number,
            start_wallclock: at,
            end_wallclock: at,
            start_frame: (start * 24.0) as u64,
            end_frame: (end * 24.0) as u64,
            start_time_seconds: start,
            end_time_seconds: end,
            elapsed_seconds: end - start,
            corrected_seconds: corrected,
            valid: true,
        }
    }

    #[test]
    fn test_empty_history_has_no_window() {
        assert!(select_longest(&[]).is_none());
        assert!(compute_clip_window(&[], 100.0, 2.0).is_none());
    }

    #[test]
    fn test_longest_cycle_window() {
        let history = vec![
            record(1, 5.0, 8.0, 3.0),
            record(2, 20.0, 27.5, 7.5),
            record(3, 40.0, 45.0, 5.0),
        ];
        let window = compute_clip_window(&history, 100.0, 2.0).unwrap();
        assert_eq!(window.cycle_number, 2);
        assert!((window.extract_start_seconds - 18.0).abs() < 1e-9);
        assert!((window.extract_end_seconds - 29.5).abs() < 1e-9);
    }

    #[test]
    fn test_tie_goes_to_lowest_cycle_number() {
        let history = vec![
            record(4, 0.0, 1.0, 6.0),
            record(2, 10.0, 11.0, 6.0),
            record(7, 20.0, 21.0, 6.0),
        ];
        assert_eq!(select_longest(&history).unwrap().cycle_number, 2);
    }

    #[test]
    fn test_window_is_clamped_to_media() {
        let history = vec![record(1, 1.0, 9.5, 8.0)];
        let window = compute_clip_window(&history, 10.0, 2.0).unwrap();
        assert_eq!(window.extract_start_seconds, 0.0);
        assert_eq!(window.extract_end_seconds, 10.0);
    }

    #[test]
    fn test_negative_corrected_still_selectable() {
        let history = vec![record(1, 1.0, 1.01, -0.1), record(2, 3.0, 3.02, -0.05)];
        assert_eq!(select_longest(&history).unwrap().cycle_number, 2);
    }
}
