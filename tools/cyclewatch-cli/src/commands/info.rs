//! Show detection stream information.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use cyclewatch_cycle_model::detection::DetectionReader;

pub fn run(detections: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = super::load_config(config.as_deref())?;

    let file = File::open(&detections)
        .with_context(|| format!("Failed to open {}", detections.display()))?;
    let reader = DetectionReader::new(BufReader::new(file))?;

    println!("Detection stream: {}", detections.display());
    match reader.header() {
        Some(h) => {
            println!("  Schema: {}", h.schema_version);
            if let Some(fps) = h.fps {
                println!("  FPS: {fps}");
            }
            if let Some(count) = h.frame_count {
                println!("  Frames (declared): {count}");
            }
            if let (Some(w), Some(h)) = (h.width, h.height) {
                println!("  Resolution: {w}x{h}");
            }
            if let Some(source) = &h.source {
                println!("  Source: {source}");
            }
            if let Some(secs) = h.media_duration_secs() {
                println!("  Duration: {secs:.1}s");
            }
        }
        None => println!("  No header"),
    }

    let mut frames = 0u64;
    let mut first = None;
    let mut last = None;
    let mut boxes = 0u64;
    let mut per_class: BTreeMap<u32, u64> = BTreeMap::new();
    for frame in reader {
        let frame = frame?;
        frames += 1;
        first.get_or_insert(frame.frame_index);
        last = Some(frame.frame_index);
        boxes += frame.boxes.len() as u64;
        for b in &frame.boxes {
            *per_class.entry(b.class_id).or_default() += 1;
        }
    }

    println!();
    println!("Frames: {frames}");
    if let (Some(first), Some(last)) = (first, last) {
        println!("  Range: {first}..={last}");
        let expected = last - first + 1;
        if expected != frames {
            println!("  Warning: {} frame(s) missing or out of order", expected.abs_diff(frames));
        }
    }
    println!("Detections: {boxes}");
    for (class_id, count) in &per_class {
        println!("  {} {}: {count}", class_id, config.class_name(*class_id));
    }

    Ok(())
}
