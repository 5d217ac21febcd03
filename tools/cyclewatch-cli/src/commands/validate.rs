//! Validate a CycleWatch configuration.

use std::path::PathBuf;

use cyclewatch_cycle_model::zone::ZoneSet;
use cyclewatch_processing_core::cycle_state::CycleThresholds;

pub fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    match &config {
        Some(path) => println!("Validating config at: {}", path.display()),
        None => println!(
            "Validating config at: {}",
            cyclewatch_common::config::config_file_path().display()
        ),
    }

    let config = super::load_config(config.as_deref())?;

    let mut issues = Vec::new();
    if let Err(e) = config.validate() {
        issues.push(e.to_string());
    }
    match ZoneSet::from_configs(&config.zones) {
        Ok(zones) => {
            println!("  Zones: {}", zones.len());
            for zone in zones.iter() {
                let r = zone.rect;
                println!(
                    "    {} [{}, {}, {}, {}]",
                    zone.name, r.x1, r.y1, r.x2, r.y2
                );
            }
        }
        Err(e) => issues.push(e.to_string()),
    }

    println!("  Classes:");
    for class in &config.classes {
        println!(
            "    {} {} (confidence >= {:.2})",
            class.id, class.name, class.confidence_threshold
        );
    }
    println!(
        "  Roles: activity={}, completion={}, occupancy={}",
        config.class_name(config.roles.activity),
        config.class_name(config.roles.completion),
        config.class_name(config.roles.occupancy)
    );

    let m = &config.measurement;
    let thresholds = CycleThresholds::from_settings(m, m.fps);
    println!(
        "  Measurement: {} fps, start {} / stop {} frames, bias {:.4}s, crowding at {}",
        m.fps,
        m.start_threshold,
        m.stop_threshold,
        thresholds.bias_correction_secs(),
        m.crowding_threshold
    );

    if issues.is_empty() {
        println!("\nConfig is valid.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        Err(anyhow::anyhow!("{} issue(s) found", issues.len()))
    }
}
