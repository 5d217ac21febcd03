//! Detection stream types.
//!
//! The detector runs outside CycleWatch and records its output as JSONL:
//! an optional `# {header}` comment line followed by one JSON object per
//! frame, in frame order. A frame without detections is still written, with
//! an empty `boxes` list, so that frame adjacency is preserved.

use std::io::BufRead;

use cyclewatch_common::clock::FrameClock;
use cyclewatch_common::error::CyclewatchError;
use serde::{Deserialize, Deserializer, Serialize};

use crate::zone::Rect;

/// Current detection stream schema version.
pub const DETECTION_SCHEMA_VERSION: &str = "1.0";

/// One classified bounding box from the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub class_id: u32,
    pub confidence: f32,

    /// Pixel rectangle. Fractional coordinates are truncated toward zero.
    #[serde(deserialize_with = "truncating_rect")]
    pub rect: Rect,
}

impl BoundingBox {
    pub fn new(class_id: u32, confidence: f32, rect: Rect) -> Self {
        Self {
            class_id,
            confidence,
            rect,
        }
    }
}

fn truncating_rect<'de, D>(deserializer: D) -> Result<Rect, D::Error>
where
    D: Deserializer<'de>,
{
    let v = <[f64; 4]>::deserialize(deserializer)?;
    Ok(Rect::new(v[0] as i32, v[1] as i32, v[2] as i32, v[3] as i32))
}

/// One line of the detection stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// 1-based frame index.
    #[serde(rename = "frame")]
    pub frame_index: u64,

    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
}

impl DetectionFrame {
    pub fn new(frame_index: u64, boxes: Vec<BoundingBox>) -> Self {
        Self { frame_index, boxes }
    }

    /// Attach media time for the given frame rate.
    pub fn into_observation(self, clock: &FrameClock) -> FrameObservation {
        FrameObservation {
            time_seconds: clock.time_of(self.frame_index),
            frame_index: self.frame_index,
            boxes: self.boxes,
        }
    }
}

/// A frame's detections together with its media time.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub frame_index: u64,
    pub time_seconds: f64,
    pub boxes: Vec<BoundingBox>,
}

impl FrameObservation {
    pub fn new(frame_index: u64, time_seconds: f64, boxes: Vec<BoundingBox>) -> Self {
        Self {
            frame_index,
            time_seconds,
            boxes,
        }
    }
}

/// Metadata written as the first (comment) line of a detection stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStreamHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Frame rate of the source video, if known.
    #[serde(default)]
    pub fps: Option<f64>,

    /// Total frames in the source video, if known.
    #[serde(default)]
    pub frame_count: Option<u64>,

    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,

    /// Path or identifier of the source video.
    #[serde(default)]
    pub source: Option<String>,
}

impl DetectionStreamHeader {
    pub fn new(fps: f64) -> Self {
        Self {
            schema_version: DETECTION_SCHEMA_VERSION.to_string(),
            fps: Some(fps),
            frame_count: None,
            width: None,
            height: None,
            source: None,
        }
    }

    /// Declared frame rate, ignoring values below 1 fps.
    pub fn usable_fps(&self) -> Option<f64> {
        self.fps.filter(|fps| fps.is_finite() && *fps >= 1.0)
    }

    /// `frame_count / fps`, when both are declared.
    pub fn media_duration_secs(&self) -> Option<f64> {
        match (self.frame_count, self.usable_fps()) {
            (Some(count), Some(fps)) => Some(count as f64 / fps),
            _ => None,
        }
    }
}

/// Errors raised while reading a detection stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("I/O error reading detection stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid header: {source}")]
    Header { source: serde_json::Error },

    #[error("invalid frame on line {line}: {source}")]
    Frame {
        line: usize,
        source: serde_json::Error,
    },
}

impl From<StreamError> for CyclewatchError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Io(io) => CyclewatchError::Io(io),
            other => CyclewatchError::stream(other.to_string()),
        }
    }
}

/// Streaming reader over a detection JSONL source.
///
/// The header (if any) is read eagerly on construction; frames are then
/// yielded lazily so arbitrarily long videos can be processed in one pass.
pub struct DetectionReader<R> {
    reader: R,
    header: Option<DetectionStreamHeader>,
    pending: Option<(usize, String)>,
    line_no: usize,
}

impl<R: BufRead> DetectionReader<R> {
    pub fn new(mut reader: R) -> Result<Self, StreamError> {
        let mut line_no = 0;
        let mut header = None;
        let mut pending = None;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('#') {
                header = Some(
                    serde_json::from_str(rest.trim())
                        .map_err(|source| StreamError::Header { source })?,
                );
            } else {
                pending = Some((line_no, trimmed.to_string()));
            }
            break;
        }

        Ok(Self {
            reader,
            header,
            pending,
            line_no,
        })
    }

    pub fn header(&self) -> Option<&DetectionStreamHeader> {
        self.header.as_ref()
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>, StreamError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some((self.line_no, trimmed.to_string())));
        }
    }
}

impl<R: BufRead> Iterator for DetectionReader<R> {
    type Item = Result<DetectionFrame, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_line() {
            Ok(Some((line, text))) => Some(
                serde_json::from_str(&text).map_err(|source| StreamError::Frame { line, source }),
            ),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Parse a whole detection stream held in memory.
pub fn parse_detection_stream(
    jsonl: &str,
) -> Result<(Option<DetectionStreamHeader>, Vec<DetectionFrame>), StreamError> {
    let reader = DetectionReader::new(jsonl.as_bytes())?;
    let header = reader.header().cloned();
    let frames = reader.collect::<Result<Vec<_>, _>>()?;
    Ok((header, frames))
}

/// Serialize frames (and an optional header) to JSONL.
pub fn serialize_detection_stream(
    header: Option<&DetectionStreamHeader>,
    frames: &[DetectionFrame],
) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    if let Some(header) = header {
        output.push_str("# ");
        output.push_str(&serde_json::to_string(header)?);
        output.push('\n');
    }
    for frame in frames {
        output.push_str(&serde_json::to_string(frame)?);
        output.push('\n');
    }
    Ok(output)
}
