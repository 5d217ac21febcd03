//! Regenerate the CSV export and performance report from an existing store.

use std::path::PathBuf;

use anyhow::Context;
use cyclewatch_cycle_store::{export_cycles_csv, CycleStore, CYCLE_CSV_FILE};
use cyclewatch_processing_core::summary::summarize;
use cyclewatch_render_engine::report::{
    render_performance_report, write_performance_report, PERFORMANCE_REPORT_FILE,
};

pub fn run(
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = super::load_config(config.as_deref())?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let db_path = db.unwrap_or_else(|| config.database_path());
    if !db_path.exists() {
        return Err(anyhow::anyhow!(
            "Cycle store not found: {} (run `cyclewatch measure` first)",
            db_path.display()
        ));
    }
    let store = CycleStore::open(&db_path)
        .with_context(|| format!("Failed to open cycle store {}", db_path.display()))?;
    println!(
        "Cycle store: {} ({} valid cycles)",
        db_path.display(),
        store.count_valid()?
    );

    let csv_path = config.output_dir.join(CYCLE_CSV_FILE);
    let exported = export_cycles_csv(&store, &csv_path)?;
    println!("Cycle data: {} ({exported} records)", csv_path.display());

    let zone_order: Vec<String> = config.zones.iter().map(|z| z.name.clone()).collect();
    let summaries = summarize(
        &store.load_valid_records()?,
        &store.load_zone_targets()?,
        &zone_order,
    );

    let today = chrono::Local::now().date_naive();
    let report_path = config.output_dir.join(PERFORMANCE_REPORT_FILE);
    if write_performance_report(&report_path, &summaries, today)? {
        println!("Performance report: {}\n", report_path.display());
        if let Some(text) = render_performance_report(&summaries, today) {
            print!("{text}");
        }
    } else {
        println!("No valid cycles in the store; report not written.");
    }

    Ok(())
}
