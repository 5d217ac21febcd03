use chrono::{TimeZone, Utc};
use cyclewatch_cycle_model::cycle::CycleRecord;
use cyclewatch_cycle_store::{export_cycles_csv, CycleStore, CYCLE_CSV_FILE};

fn record(zone: &str, cycle_number: u32, corrected: f64) -> CycleRecord {
    let at = Utc.with_ymd_and_hms(2026, 2, 14, 13, 30, 0).unwrap();
    CycleRecord {
        zone_name: zone.to_string(),
        cycle_number,
        start_wallclock: at,
        end_wallclock: at + chrono::Duration::seconds(4),
        start_frame: 100,
        end_frame: 200,
        start_time_seconds: 100.0 / 24.0,
        end_time_seconds: 200.0 / 24.0,
        elapsed_seconds: 100.0 / 24.0,
        corrected_seconds: corrected,
        valid: true,
    }
}

#[test]
fn store_survives_reopen() {
    let dir = std::env::temp_dir().join("cyclewatch_test_store_reopen");
    let _ = std::fs::remove_dir_all(&dir);
    let db = dir.join("nested").join("cycle_time_data.db");

    {
        let mut store = CycleStore::open(&db).unwrap();
        store.set_zone_targets(&["A_Assemble"], 5.0).unwrap();
        store.append(&record("A_Assemble", 1, 4.2)).unwrap();
        store.append(&record("A_Assemble", 2, 5.1)).unwrap();
    }

    let store = CycleStore::open(&db).unwrap();
    assert_eq!(store.path(), Some(db.as_path()));
    let records = store.load_valid_records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].corrected_seconds, 5.1);
    assert_eq!(store.load_zone_targets().unwrap().get("A_Assemble"), Some(&5.0));

    let csv_path = dir.join(CYCLE_CSV_FILE);
    assert_eq!(export_cycles_csv(&store, &csv_path).unwrap(), 2);
    assert_eq!(std::fs::read_to_string(&csv_path).unwrap().lines().count(), 3);

    drop(store);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn fresh_run_clears_previous_rows() {
    let dir = std::env::temp_dir().join("cyclewatch_test_store_fresh");
    let _ = std::fs::remove_dir_all(&dir);
    let db = dir.join("cycle_time_data.db");

    let mut store = CycleStore::open(&db).unwrap();
    store.append(&record("B_Assemble", 1, 3.0)).unwrap();
    store.clear().unwrap();
    store.append(&record("B_Assemble", 1, 6.0)).unwrap();

    let records = store.load_valid_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].corrected_seconds, 6.0);

    drop(store);
    std::fs::remove_dir_all(&dir).ok();
}
