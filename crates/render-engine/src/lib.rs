//! CycleWatch Render Engine
//!
//! Produces the human-facing outputs of a measurement run from the
//! processed video and the cycle store.
//!
//! # Pipeline Architecture
//!
//! ```text
//! session ──── clip windows ──┬── clip_windows.json
//!                             │
//! processed.mp4 ──────────────┴── ffmpeg trim ──► {zone}_longest_cycle_{n}.mp4
//!
//! cycle store ── zone summary ──► performance_report.txt
//! ```

pub mod clips;
pub mod report;

pub use clips::*;
pub use report::{render_performance_report, write_performance_report, PERFORMANCE_REPORT_FILE};
