use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use cyclewatch_common::clock::{FixedClock, FrameClock};
use cyclewatch_common::config::AppConfig;
use cyclewatch_cycle_model::detection::{
    serialize_detection_stream, DetectionFrame, DetectionReader, DetectionStreamHeader, StreamError,
};
use cyclewatch_processing_core::session::{MeasurementSession, MemorySink, SessionReport};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("line-sample")
        .join("detections.jsonl")
}

fn run_fixture() -> (SessionReport, MemorySink) {
    let file = File::open(fixture_path()).expect("fixture should be readable");
    let reader = DetectionReader::new(BufReader::new(file)).expect("fixture header should parse");
    let header = reader.header().cloned().expect("fixture has a header");
    let fps = header.usable_fps().expect("fixture declares fps");

    let config = AppConfig::default();
    let mut session = MeasurementSession::from_config(&config, fps).unwrap();
    let mut sink = MemorySink::default();

    let processed = session
        .run(reader, &FrameClock::new(fps), &stepping_clock(), &mut sink)
        .unwrap();
    assert_eq!(processed, 240);

    let duration = header.media_duration_secs().unwrap();
    (session.finish(duration, config.clip.margin_secs), sink)
}

fn fnv1a_64(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in input.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[test]
fn line_sample_cycle_signature_is_stable() {
    let (report, _) = run_fixture();

    let signature = report
        .zones
        .iter()
        .flat_map(|z| z.history.iter())
        .map(|r| {
            format!(
                "{}|{}|{}|{}|{:.6}|{:.6}",
                r.zone_name,
                r.cycle_number,
                r.start_frame,
                r.end_frame,
                r.elapsed_seconds,
                r.corrected_seconds
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    assert_eq!(report.total_cycles(), 3);
    assert_eq!(fnv1a_64(&signature), 0x81b1b750c0a0690b);
}

#[test]
fn line_sample_zone_outcomes() {
    let (report, sink) = run_fixture();
    let names: Vec<&str> = report.zones.iter().map(|z| z.zone_name.as_str()).collect();
    assert_eq!(names, vec!["A_Assemble", "A2_Assemble", "B_Assemble", "B2_Assemble"]);

    let a = &report.zones[0];
    assert_eq!(a.cycles_started, 2);
    assert_eq!(a.history.len(), 2);
    assert!((a.history[0].corrected_seconds - 2.0).abs() < 1e-9);

    // Low-confidence pallets never reach A2.
    let a2 = &report.zones[1];
    assert_eq!(a2.cycles_started, 0);
    assert!(a2.clip_window.is_none());

    // B's first cycle overlaps the crowded frames and is dropped.
    let b = &report.zones[2];
    assert_eq!(b.cycles_started, 2);
    assert_eq!(b.history.len(), 1);
    assert_eq!(b.history[0].cycle_number, 2);

    // Records reach the sink in completion order.
    let order: Vec<(&str, u32)> = sink
        .records
        .iter()
        .map(|r| (r.zone_name.as_str(), r.cycle_number))
        .collect();
    assert_eq!(
        order,
        vec![("A_Assemble", 1), ("B_Assemble", 2), ("A_Assemble", 2)]
    );
}

#[test]
fn line_sample_clip_windows() {
    let (report, _) = run_fixture();
    let windows = report.clip_windows();
    assert_eq!(windows.len(), 2);

    let a = &windows[0];
    assert_eq!(a.file_stem(), "A_Assemble_longest_cycle_2");
    assert!((a.extract_start_seconds - (140.0 / 24.0 - 2.0)).abs() < 1e-9);
    assert_eq!(a.extract_end_seconds, 10.0);

    let b = &windows[1];
    assert_eq!(b.file_stem(), "B_Assemble_longest_cycle_2");
    assert!((b.extract_start_seconds - 4.25).abs() < 1e-9);
    assert!((b.extract_end_seconds - (175.0 / 24.0 + 2.0)).abs() < 1e-9);
}

#[test]
fn line_sample_wallclocks_follow_processing_order() {
    let (report, _) = run_fixture();
    let first = &report.zones[0].history[0];
    let base = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    // Frame n is stamped with the (n-1)th tick.
    assert_eq!(first.start_wallclock, base + Duration::milliseconds(42 * 10));
    assert_eq!(first.end_wallclock, base + Duration::milliseconds(42 * 62));
}

fn fixture_frames() -> (DetectionStreamHeader, Vec<DetectionFrame>) {
    let file = File::open(fixture_path()).unwrap();
    let reader = DetectionReader::new(BufReader::new(file)).unwrap();
    let header = reader.header().cloned().unwrap();
    let frames = reader.collect::<Result<Vec<_>, _>>().unwrap();
    (header, frames)
}

fn stepping_clock() -> FixedClock {
    FixedClock::stepping(
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        Duration::milliseconds(42),
    )
}

#[test]
fn line_sample_rewritten_stream_measures_the_same() {
    let (header, frames) = fixture_frames();
    assert_eq!(frames.len(), 240);

    let text = serialize_detection_stream(Some(&header), &frames).unwrap();
    let reader = DetectionReader::new(text.as_bytes()).unwrap();
    assert_eq!(reader.header(), Some(&header));

    let fps = header.usable_fps().unwrap();
    let mut session = MeasurementSession::from_config(&AppConfig::default(), fps).unwrap();
    let mut sink = MemorySink::default();
    session
        .run(reader, &FrameClock::new(fps), &stepping_clock(), &mut sink)
        .unwrap();

    let (_, original) = run_fixture();
    assert_eq!(sink.records, original.records);
}

#[test]
fn line_sample_without_its_first_frame_is_rejected() {
    let (header, frames) = fixture_frames();
    let fps = header.usable_fps().unwrap();
    let mut session = MeasurementSession::from_config(&AppConfig::default(), fps).unwrap();
    let mut sink = MemorySink::default();

    let err = session
        .run(
            frames.into_iter().skip(1).map(Ok::<_, StreamError>),
            &FrameClock::new(fps),
            &stepping_clock(),
            &mut sink,
        )
        .unwrap_err();
    assert!(err.to_string().contains("expected frame 1"));
    assert_eq!(session.frames_processed(), 0);
    assert!(sink.records.is_empty());
}
