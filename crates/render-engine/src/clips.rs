//! Longest-cycle clip extraction.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use cyclewatch_common::error::{CyclewatchError, CyclewatchResult};
use cyclewatch_cycle_model::cycle::ClipWindow;
use cyclewatch_cycle_model::detection::DetectionStreamHeader;
use serde::Serialize;

/// File the computed windows are always written to.
pub const CLIP_WINDOWS_FILE: &str = "clip_windows.json";

/// A clip extraction job for one processed video.
#[derive(Debug, Clone)]
pub struct ClipJob {
    /// Processed video to cut from. Without one only the windows are written.
    pub source_video: Option<PathBuf>,

    /// Directory receiving the clips and `clip_windows.json`.
    pub output_dir: PathBuf,

    /// Frame rate of the source video.
    pub fps: f64,

    pub windows: Vec<ClipWindow>,
}

impl ClipJob {
    /// Output path of the clip for `window`.
    pub fn clip_path(&self, window: &ClipWindow) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", window.file_stem()))
    }
}

/// Progress callback, invoked after each clip.
pub type ProgressCallback = Box<dyn Fn(ClipProgress) + Send>;

#[derive(Debug, Clone)]
pub struct ClipProgress {
    pub zone_name: String,
    pub completed: usize,
    pub total: usize,
    pub succeeded: bool,
}

/// What the extraction produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClipSummary {
    pub windows_path: Option<PathBuf>,
    pub clips: Vec<PathBuf>,
    pub failed: Vec<String>,

    /// Set when clips were not cut at all (no video, no backend).
    pub skipped_reason: Option<String>,
}

/// Trait for clip cutting backends.
pub trait ClipBackend: Send {
    /// Cut `window` out of `source` into `output`.
    fn extract(
        &mut self,
        source: &Path,
        output: &Path,
        window: &ClipWindow,
        fps: f64,
    ) -> CyclewatchResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Cuts clips with the `ffmpeg` binary using a frame-accurate trim filter.
#[derive(Debug, Default)]
pub struct FfmpegClipBackend;

impl FfmpegClipBackend {
    pub fn new() -> Self {
        Self
    }

    /// Arguments for one clip. The window's frame range is inclusive; the
    /// trim filter's `end_frame` is exclusive.
    pub fn build_args(source: &Path, output: &Path, window: &ClipWindow, fps: f64) -> Vec<String> {
        let (start_frame, end_frame) = window.frame_range(fps);
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            source.display().to_string(),
            "-vf".to_string(),
            format!(
                "trim=start_frame={start_frame}:end_frame={},setpts=PTS-STARTPTS",
                end_frame + 1
            ),
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            output.display().to_string(),
        ]
    }
}

impl ClipBackend for FfmpegClipBackend {
    fn extract(
        &mut self,
        source: &Path,
        output: &Path,
        window: &ClipWindow,
        fps: f64,
    ) -> CyclewatchResult<()> {
        let args = Self::build_args(source, output, window, fps);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CyclewatchError::render(format!("Failed to start ffmpeg: {e}")))?;

        let mut stderr_output = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            if let Err(err) = stderr.read_to_string(&mut stderr_output) {
                stderr_output = format!("<failed to read ffmpeg stderr: {err}>");
            }
        }

        let status = child
            .wait()
            .map_err(|e| CyclewatchError::render(format!("Failed to wait on ffmpeg: {e}")))?;
        if !status.success() {
            return Err(CyclewatchError::render(format!(
                "ffmpeg clip extraction failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Write `windows` as pretty JSON.
pub fn write_clip_windows(path: &Path, windows: &[ClipWindow]) -> CyclewatchResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(windows)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Write the clip windows and, when possible, cut each clip.
///
/// Per-clip failures are logged and collected; they do not stop the rest.
pub async fn extract_clips(
    job: ClipJob,
    backend: Option<Box<dyn ClipBackend>>,
    progress: Option<ProgressCallback>,
) -> CyclewatchResult<ClipSummary> {
    std::fs::create_dir_all(&job.output_dir)?;

    let windows_path = job.output_dir.join(CLIP_WINDOWS_FILE);
    write_clip_windows(&windows_path, &job.windows)?;
    tracing::info!(
        path = %windows_path.display(),
        windows = job.windows.len(),
        "Clip windows written"
    );

    let mut summary = ClipSummary {
        windows_path: Some(windows_path),
        ..Default::default()
    };

    let Some(source) = job.source_video.as_deref() else {
        summary.skipped_reason = Some("no processed video supplied".to_string());
        return Ok(summary);
    };
    if !source.exists() {
        return Err(CyclewatchError::FileNotFound {
            path: source.to_path_buf(),
        });
    }

    let mut backend = backend.unwrap_or_else(|| Box::new(FfmpegClipBackend::new()));
    if !backend.is_available() {
        tracing::warn!(
            backend = backend.name(),
            "Clip backend not available, skipping clip extraction"
        );
        summary.skipped_reason = Some(format!("{} not found in PATH", backend.name()));
        return Ok(summary);
    }

    tracing::info!(backend = backend.name(), "Using clip backend");
    let total = job.windows.len();
    for (i, window) in job.windows.iter().enumerate() {
        let output = job.clip_path(window);
        let result = backend.extract(source, &output, window, job.fps);
        let succeeded = result.is_ok();
        match result {
            Ok(()) => {
                tracing::info!(
                    zone = %window.zone_name,
                    cycle = window.cycle_number,
                    path = %output.display(),
                    start = window.extract_start_seconds,
                    end = window.extract_end_seconds,
                    "Longest cycle clip extracted"
                );
                summary.clips.push(output);
            }
            Err(e) => {
                tracing::warn!(
                    zone = %window.zone_name,
                    cycle = window.cycle_number,
                    error = %e,
                    "Clip extraction failed"
                );
                summary.failed.push(window.zone_name.clone());
            }
        }

        if let Some(cb) = &progress {
            cb(ClipProgress {
                zone_name: window.zone_name.clone(),
                completed: i + 1,
                total,
                succeeded,
            });
        }
    }

    Ok(summary)
}

/// Where a media duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    Probe,
    StreamHeader,
    LastFrame,
}

/// Media duration for clamping clip windows: ffprobe on the video, then the
/// stream header's `frame_count / fps`, then `last_frame / fps`.
pub fn resolve_media_duration(
    video: Option<&Path>,
    header: Option<&DetectionStreamHeader>,
    last_frame: u64,
    fps: f64,
) -> (f64, DurationSource) {
    if let Some(secs) = video.and_then(probe_media_duration) {
        return (secs, DurationSource::Probe);
    }
    if let Some(secs) = header.and_then(DetectionStreamHeader::media_duration_secs) {
        return (secs, DurationSource::StreamHeader);
    }
    (last_frame as f64 / fps, DurationSource::LastFrame)
}

/// Container duration in seconds, via `ffprobe`.
pub fn probe_media_duration(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
