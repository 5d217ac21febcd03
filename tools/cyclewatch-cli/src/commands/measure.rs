//! Measure cycle times from a detection stream.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use cyclewatch_common::clock::{FrameClock, SystemClock};
use cyclewatch_cycle_model::detection::DetectionReader;
use cyclewatch_cycle_store::{export_cycles_csv, CycleStore, CYCLE_CSV_FILE};
use cyclewatch_processing_core::session::MeasurementSession;
use cyclewatch_processing_core::summary::summarize;
use cyclewatch_render_engine::clips::{extract_clips, resolve_media_duration, ClipJob, ClipProgress};
use cyclewatch_render_engine::report::{write_performance_report, PERFORMANCE_REPORT_FILE};

pub struct MeasureArgs {
    pub detections: PathBuf,
    pub config: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub fresh: bool,
    pub target_secs: Option<f64>,
}

pub async fn run(args: MeasureArgs) -> anyhow::Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    config.validate().context("Invalid configuration")?;

    let file = File::open(&args.detections)
        .with_context(|| format!("Failed to open {}", args.detections.display()))?;
    let reader = DetectionReader::new(BufReader::new(file))
        .with_context(|| format!("Failed to read header of {}", args.detections.display()))?;
    let header = reader.header().cloned();

    let fps = header
        .as_ref()
        .and_then(|h| h.usable_fps())
        .unwrap_or(config.measurement.fps);

    println!("Measuring cycles in: {}", args.detections.display());
    println!("  Zones: {}", config.zones.len());
    println!("  FPS: {fps}");
    println!(
        "  Start/stop threshold: {}/{} frames",
        config.measurement.start_threshold, config.measurement.stop_threshold
    );
    println!(
        "  Crowding threshold: {} x {}",
        config.measurement.crowding_threshold,
        config.class_name(config.roles.occupancy)
    );

    let mut store = CycleStore::open(config.database_path())?;
    if args.fresh {
        store.clear()?;
    }
    let zone_names: Vec<&str> = config.zones.iter().map(|z| z.name.as_str()).collect();
    let target_secs = args.target_secs.unwrap_or(config.report.target_secs);
    store.set_zone_targets(&zone_names[..], target_secs)?;

    let mut session = MeasurementSession::from_config(&config, fps)?;
    let processed = session
        .run(reader, &FrameClock::new(fps), &SystemClock, &mut store)
        .with_context(|| format!("Measurement stopped in {}", args.detections.display()))?;

    let last_frame = session.last_frame().unwrap_or(0);
    let (media_duration, duration_source) =
        resolve_media_duration(args.video.as_deref(), header.as_ref(), last_frame, fps);
    tracing::debug!(
        duration = media_duration,
        source = ?duration_source,
        "Media duration resolved"
    );

    let report = session.finish(media_duration, config.clip.margin_secs);

    println!();
    println!("Processed {processed} frames ({media_duration:.1}s)");
    for zone in &report.zones {
        match &zone.clip_window {
            Some(window) => println!(
                "  {}: {} valid of {} started, longest #{} ({:.1}s clip from {:.1}s)",
                zone.zone_name,
                zone.history.len(),
                zone.cycles_started,
                window.cycle_number,
                window.duration_secs(),
                window.extract_start_seconds
            ),
            None => println!(
                "  {}: {} valid of {} started",
                zone.zone_name,
                zone.history.len(),
                zone.cycles_started
            ),
        }
    }

    let csv_path = config.output_dir.join(CYCLE_CSV_FILE);
    let exported = export_cycles_csv(&store, &csv_path)?;
    println!("\nCycle data: {} ({exported} records)", csv_path.display());

    let summaries = summarize(
        &store.load_valid_records()?,
        &store.load_zone_targets()?,
        &config.zones.iter().map(|z| z.name.clone()).collect::<Vec<_>>(),
    );
    let report_path = config.output_dir.join(PERFORMANCE_REPORT_FILE);
    if write_performance_report(&report_path, &summaries, chrono::Local::now().date_naive())? {
        println!("Performance report: {}", report_path.display());
    }

    let job = ClipJob {
        source_video: args.video.filter(|_| config.clip.enabled),
        output_dir: config.output_dir.clone(),
        fps,
        windows: report.clip_windows(),
    };
    let progress_cb: Box<dyn Fn(ClipProgress) + Send> = Box::new(|p| {
        println!(
            "  Clip {}/{}: {} {}",
            p.completed,
            p.total,
            p.zone_name,
            if p.succeeded { "ok" } else { "failed" }
        );
    });

    let summary = extract_clips(job, None, Some(progress_cb)).await?;
    if let Some(path) = &summary.windows_path {
        println!("Clip windows: {}", path.display());
    }
    if let Some(reason) = &summary.skipped_reason {
        println!("Clips skipped: {reason}");
    } else {
        println!(
            "Clips: {} extracted, {} failed",
            summary.clips.len(),
            summary.failed.len()
        );
    }

    Ok(())
}
