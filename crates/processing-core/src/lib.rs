//! CycleWatch Processing Core — The Cycle Engine
//!
//! Turns per-frame detections into measured work cycles:
//! - **Membership:** Decide which signal classes are present in which zone
//! - **Cycle state:** Debounce activity/completion into start and stop events
//! - **Occupancy:** Invalidate cycles measured while the scene is crowded
//! - **Longest cycle:** Pick each zone's longest cycle and its clip window
//! - **Summary:** Per-zone statistics against target cycle times
//!
//! This crate is pure computation with no I/O and no platform dependencies.
//! Persistence is reached only through the [`session::CycleSink`] trait.

pub mod cycle_state;
pub mod longest;
pub mod membership;
pub mod occupancy;
pub mod session;
pub mod summary;

pub use cycle_state::{CycleThresholds, ZoneCycleMachine, ZonePhase};
pub use membership::ZoneMembershipAggregator;
pub use occupancy::OccupancyGate;
pub use session::{CycleSink, MeasurementSession};
