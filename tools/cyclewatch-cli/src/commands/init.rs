//! Write a default configuration file.

use std::path::PathBuf;

use cyclewatch_common::config::{config_file_path, AppConfig};

pub fn run(output: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(config_file_path);
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }

    let config = AppConfig::default();
    config
        .save_to(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;

    println!("Config written to {}", path.display());
    println!("  Output directory: {}", config.output_dir.display());
    println!("  Zones:");
    for zone in &config.zones {
        println!("    {} {:?}", zone.name, zone.rect);
    }
    println!(
        "  FPS: {}, start/stop: {}/{} frames",
        config.measurement.fps, config.measurement.start_threshold, config.measurement.stop_threshold
    );
    println!("\nEdit the zone rectangles to match your camera before measuring.");

    Ok(())
}
