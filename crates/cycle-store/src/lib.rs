//! CycleWatch Cycle Store
//!
//! Durable record of measured cycles:
//! - **Store:** SQLite tables for cycle measurements and per-zone targets,
//!   versioned with `PRAGMA user_version` migrations
//! - **Export:** Flat CSV of every valid cycle for downstream analysis
//!
//! The measurement session writes through the [`CycleSink`] implementation
//! and never reads the store back; reports and exports read it afterwards.
//!
//! [`CycleSink`]: cyclewatch_processing_core::session::CycleSink

pub mod export;
mod migrations;
pub mod store;

pub use export::{export_cycles_csv, CYCLE_CSV_FILE};
pub use store::{CycleStore, StoreError, StoredCycle};
