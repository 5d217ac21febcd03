//! CycleWatch Cycle Model
//!
//! Defines the core data contracts shared by every CycleWatch crate:
//! - **Zones:** Named, axis-aligned pixel rectangles where cycles are tracked
//! - **Detections:** Per-frame detector output, stored as append-only JSONL
//! - **Cycles:** Completed cycle records, notifications, and clip windows
//!
//! All rectangle coordinates are integer pixels in the processed video's
//! frame space.

pub mod cycle;
pub mod detection;
pub mod zone;

pub use cycle::*;
pub use detection::*;
pub use zone::*;
