//! SQLite-backed cycle store.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use cyclewatch_common::clock::{format_wallclock, WALLCLOCK_FORMAT};
use cyclewatch_common::error::{CyclewatchError, CyclewatchResult};
use cyclewatch_cycle_model::cycle::CycleRecord;
use cyclewatch_processing_core::session::CycleSink;
use rusqlite::{params, Connection, Row};

use crate::migrations::run_migrations;

/// Errors from the cycle store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open cycle store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Cycle store migration failed: {0:#}")]
    Migration(anyhow::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid value in column {column}: {message}")]
    InvalidRow { column: &'static str, message: String },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for CyclewatchError {
    fn from(e: StoreError) -> Self {
        CyclewatchError::store(e.to_string())
    }
}

/// A persisted cycle row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCycle {
    pub record: CycleRecord,

    /// Insert time as written by SQLite (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub created_at: String,
}

/// Persistent store of measured cycles and per-zone targets.
pub struct CycleStore {
    conn: Connection,
    path: Option<PathBuf>,
}

fn to_i64(value: u64, column: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidRow {
        column,
        message: format!("value {value} exceeds SQLite INTEGER range"),
    })
}

fn to_u64(value: i64, column: &'static str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::InvalidRow {
        column,
        message: format!("negative value {value}"),
    })
}

fn parse_wallclock(value: &str, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(value, WALLCLOCK_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| StoreError::InvalidRow {
            column,
            message: format!("invalid datetime '{value}': {e}"),
        })
}

struct RawRow {
    zone_name: String,
    cycle_number: i64,
    start_datetime: String,
    end_datetime: String,
    start_frame: i64,
    end_frame: i64,
    start_time_seconds: f64,
    end_time_seconds: f64,
    elapsed_seconds: f64,
    adjusted_time_seconds: f64,
    is_valid: bool,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            zone_name: row.get("zone_name")?,
            cycle_number: row.get("cycle_number")?,
            start_datetime: row.get("start_datetime")?,
            end_datetime: row.get("end_datetime")?,
            start_frame: row.get("start_frame")?,
            end_frame: row.get("end_frame")?,
            start_time_seconds: row.get("start_time_seconds")?,
            end_time_seconds: row.get("end_time_seconds")?,
            elapsed_seconds: row.get("elapsed_seconds")?,
            adjusted_time_seconds: row.get("adjusted_time_seconds")?,
            is_valid: row.get("is_valid")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_stored(self) -> Result<StoredCycle, StoreError> {
        let cycle_number = u32::try_from(self.cycle_number).map_err(|_| StoreError::InvalidRow {
            column: "cycle_number",
            message: format!("out of range value {}", self.cycle_number),
        })?;

        Ok(StoredCycle {
            record: CycleRecord {
                zone_name: self.zone_name,
                cycle_number,
                start_wallclock: parse_wallclock(&self.start_datetime, "start_datetime")?,
                end_wallclock: parse_wallclock(&self.end_datetime, "end_datetime")?,
                start_frame: to_u64(self.start_frame, "start_frame")?,
                end_frame: to_u64(self.end_frame, "end_frame")?,
                start_time_seconds: self.start_time_seconds,
                end_time_seconds: self.end_time_seconds,
                elapsed_seconds: self.elapsed_seconds,
                corrected_seconds: self.adjusted_time_seconds,
                valid: self.is_valid,
            },
            created_at: self.created_at,
        })
    }
}

impl CycleStore {
    /// Open (or create) a store file, applying schema migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::warn!(path = %path.display(), error = %e, "Failed to enable WAL mode");
        }

        let store = Self::init(conn, Some(path))?;
        tracing::info!(path = %store.path_display(), "Cycle store opened");
        Ok(store)
    }

    /// A store that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        run_migrations(&mut conn).map_err(StoreError::Migration)?;
        Ok(Self { conn, path })
    }

    /// Database file path; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn path_display(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    /// Delete every cycle and target; the schema is kept.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM cycle_measurements", [])?;
        tx.execute("DELETE FROM zone_targets", [])?;
        tx.commit()?;
        tracing::info!(path = %self.path_display(), "Cycle store cleared");
        Ok(())
    }

    /// Set the same target for every zone in `zones`, replacing old values.
    pub fn set_zone_targets<S: AsRef<str>>(
        &mut self,
        zones: &[S],
        target_seconds: f64,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for zone in zones {
            tx.execute(
                "INSERT INTO zone_targets (zone_name, target_seconds)
                 VALUES (?1, ?2)
                 ON CONFLICT(zone_name) DO UPDATE SET target_seconds = excluded.target_seconds",
                params![zone.as_ref(), target_seconds],
            )?;
        }
        tx.commit()?;
        tracing::debug!(zones = zones.len(), target_seconds, "Zone targets set");
        Ok(())
    }

    /// Persist one cycle record. A record with an existing
    /// `(zone_name, cycle_number)` replaces the earlier row.
    pub fn append(&mut self, record: &CycleRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO cycle_measurements (
                zone_name, cycle_number, start_datetime, end_datetime,
                start_frame, end_frame, start_time_seconds, end_time_seconds,
                elapsed_seconds, adjusted_time_seconds, is_valid
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(zone_name, cycle_number) DO UPDATE SET
                start_datetime = excluded.start_datetime,
                end_datetime = excluded.end_datetime,
                start_frame = excluded.start_frame,
                end_frame = excluded.end_frame,
                start_time_seconds = excluded.start_time_seconds,
                end_time_seconds = excluded.end_time_seconds,
                elapsed_seconds = excluded.elapsed_seconds,
                adjusted_time_seconds = excluded.adjusted_time_seconds,
                is_valid = excluded.is_valid,
                created_at = CURRENT_TIMESTAMP",
            params![
                record.zone_name,
                record.cycle_number,
                format_wallclock(&record.start_wallclock),
                format_wallclock(&record.end_wallclock),
                to_i64(record.start_frame, "start_frame")?,
                to_i64(record.end_frame, "end_frame")?,
                record.start_time_seconds,
                record.end_time_seconds,
                record.elapsed_seconds,
                record.corrected_seconds,
                record.valid,
            ],
        )?;
        Ok(())
    }

    /// Valid cycles ordered by `(zone_name, cycle_number)`.
    pub fn load_valid_cycles(&self) -> Result<Vec<StoredCycle>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT zone_name, cycle_number, start_datetime, end_datetime,
                    start_frame, end_frame, start_time_seconds, end_time_seconds,
                    elapsed_seconds, adjusted_time_seconds, is_valid, created_at
             FROM cycle_measurements
             WHERE is_valid = 1
             ORDER BY zone_name, cycle_number",
        )?;

        let rows = stmt.query_map([], RawRow::from_row)?;
        let mut cycles = Vec::new();
        for row in rows {
            cycles.push(row?.into_stored()?);
        }
        Ok(cycles)
    }

    /// Valid cycle records only, in the same order as [`Self::load_valid_cycles`].
    pub fn load_valid_records(&self) -> Result<Vec<CycleRecord>, StoreError> {
        Ok(self
            .load_valid_cycles()?
            .into_iter()
            .map(|c| c.record)
            .collect())
    }

    pub fn load_zone_targets(&self) -> Result<HashMap<String, f64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT zone_name, target_seconds FROM zone_targets")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;

        let mut targets = HashMap::new();
        for row in rows {
            let (zone, target) = row?;
            targets.insert(zone, target);
        }
        Ok(targets)
    }

    /// Number of valid cycles stored.
    pub fn count_valid(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cycle_measurements WHERE is_valid = 1",
            [],
            |row| row.get(0),
        )?;
        to_u64(count, "count")
    }
}

impl CycleSink for CycleStore {
    fn append(&mut self, record: &CycleRecord) -> CyclewatchResult<()> {
        CycleStore::append(self, record).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(zone: &str, cycle_number: u32, corrected: f64) -> CycleRecord {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
            + chrono::Duration::milliseconds(125);
        CycleRecord {
            zone_name: zone.to_string(),
            cycle_number,
            start_wallclock: start,
            end_wallclock: start + chrono::Duration::milliseconds(2_500),
            start_frame: 24,
            end_frame: 84,
            start_time_seconds: 1.0,
            end_time_seconds: 3.5,
            elapsed_seconds: 2.5,
            corrected_seconds: corrected,
            valid: true,
        }
    }

    #[test]
    fn test_append_and_load_ordered() {
        let mut store = CycleStore::open_in_memory().unwrap();
        store.append(&record("B_Assemble", 1, 2.0)).unwrap();
        store.append(&record("A_Assemble", 2, 3.0)).unwrap();
        store.append(&record("A_Assemble", 1, 4.0)).unwrap();

        let loaded = store.load_valid_records().unwrap();
        let keys: Vec<(&str, u32)> = loaded
            .iter()
            .map(|r| (r.zone_name.as_str(), r.cycle_number))
            .collect();
        assert_eq!(
            keys,
            vec![("A_Assemble", 1), ("A_Assemble", 2), ("B_Assemble", 1)]
        );
        assert_eq!(loaded[2], record("B_Assemble", 1, 2.0));
        assert_eq!(store.count_valid().unwrap(), 3);
    }

    #[test]
    fn test_invalid_rows_are_not_loaded() {
        let mut store = CycleStore::open_in_memory().unwrap();
        let mut invalid = record("A_Assemble", 1, 1.0);
        invalid.valid = false;
        store.append(&invalid).unwrap();
        assert!(store.load_valid_cycles().unwrap().is_empty());
    }

    #[test]
    fn test_same_key_replaces_row() {
        let mut store = CycleStore::open_in_memory().unwrap();
        store.append(&record("A_Assemble", 1, 1.0)).unwrap();
        store.append(&record("A_Assemble", 1, 9.0)).unwrap();
        let loaded = store.load_valid_records().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].corrected_seconds, 9.0);
    }

    #[test]
    fn test_targets_upsert_and_clear() {
        let mut store = CycleStore::open_in_memory().unwrap();
        store.set_zone_targets(&["A_Assemble", "B_Assemble"], 5.0).unwrap();
        store.set_zone_targets(&["A_Assemble"], 6.5).unwrap();

        let targets = store.load_zone_targets().unwrap();
        assert_eq!(targets.get("A_Assemble"), Some(&6.5));
        assert_eq!(targets.get("B_Assemble"), Some(&5.0));

        store.append(&record("A_Assemble", 1, 1.0)).unwrap();
        store.clear().unwrap();
        assert!(store.load_zone_targets().unwrap().is_empty());
        assert!(store.load_valid_cycles().unwrap().is_empty());
    }

    #[test]
    fn test_store_acts_as_sink() {
        let mut store = CycleStore::open_in_memory().unwrap();
        let sink: &mut dyn CycleSink = &mut store;
        sink.append(&record("A_Assemble", 1, 1.0)).unwrap();
        assert_eq!(store.count_valid().unwrap(), 1);
    }
}
