//! CSV export of stored cycles.

use std::path::Path;

use cyclewatch_common::clock::format_wallclock;
use serde::Serialize;

use crate::store::{CycleStore, StoreError, StoredCycle};

/// File name used for the cycle export in an output directory.
pub const CYCLE_CSV_FILE: &str = "cycle_data.csv";

/// One exported row. Field order is the column order.
#[derive(Debug, Serialize)]
struct CycleCsvRow<'a> {
    zone_name: &'a str,
    cycle_number: u32,
    start_datetime: String,
    end_datetime: String,
    start_frame: u64,
    end_frame: u64,
    elapsed_seconds: f64,
    adjusted_time_seconds: f64,
    created_at: &'a str,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl<'a> From<&'a StoredCycle> for CycleCsvRow<'a> {
    fn from(cycle: &'a StoredCycle) -> Self {
        let r = &cycle.record;
        Self {
            zone_name: &r.zone_name,
            cycle_number: r.cycle_number,
            start_datetime: format_wallclock(&r.start_wallclock),
            end_datetime: format_wallclock(&r.end_wallclock),
            start_frame: r.start_frame,
            end_frame: r.end_frame,
            elapsed_seconds: round3(r.elapsed_seconds),
            adjusted_time_seconds: round3(r.corrected_seconds),
            created_at: &cycle.created_at,
        }
    }
}

/// Write cycles to `path` as CSV with a header row.
pub fn write_cycles_csv(cycles: &[StoredCycle], path: &Path) -> Result<usize, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    if cycles.is_empty() {
        wtr.write_record([
            "zone_name",
            "cycle_number",
            "start_datetime",
            "end_datetime",
            "start_frame",
            "end_frame",
            "elapsed_seconds",
            "adjusted_time_seconds",
            "created_at",
        ])?;
    }
    for cycle in cycles {
        wtr.serialize(CycleCsvRow::from(cycle))?;
    }
    wtr.flush()?;
    Ok(cycles.len())
}

/// Export every valid cycle in the store, ordered by zone then cycle number.
pub fn export_cycles_csv(store: &CycleStore, path: &Path) -> Result<usize, StoreError> {
    let cycles = store.load_valid_cycles()?;
    let written = write_cycles_csv(&cycles, path)?;
    tracing::info!(path = %path.display(), records = written, "Cycle data CSV exported");
    Ok(written)
}
