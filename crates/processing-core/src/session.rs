//! Measurement session: the single ordered pass over a detection stream.
//!
//! A session owns one [`ZoneCycleMachine`] per configured zone together with
//! everything needed to turn a frame's boxes into zone signals. Each call to
//! [`MeasurementSession::step`] runs, in order:
//!
//! 1. zone membership aggregation,
//! 2. the crowding decision,
//! 3. every zone's step (crowding applied first, then the transition),
//! 4. forwarding of completed records to the sink.
//!
//! The sink is write-only from the session's point of view. The in-memory
//! history kept by each machine is what [`MeasurementSession::finish`] uses
//! for clip windows.

use cyclewatch_common::clock::{FrameClock, WallClock};
use cyclewatch_common::config::AppConfig;
use cyclewatch_common::error::{CyclewatchError, CyclewatchResult};
use cyclewatch_cycle_model::cycle::{ClipWindow, CycleNotification, CycleRecord};
use cyclewatch_cycle_model::detection::{DetectionFrame, FrameObservation};
use cyclewatch_cycle_model::zone::ZoneSet;

use crate::cycle_state::{CycleThresholds, FrameStamp, StepOutcome, ZoneCycleMachine};
use crate::longest::compute_clip_window;
use crate::membership::ZoneMembershipAggregator;
use crate::occupancy::OccupancyGate;

/// Frame ordering violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Frame {got} is out of order (expected frame {expected})")]
    OutOfOrder { expected: u64, got: u64 },
}

impl From<SessionError> for CyclewatchError {
    fn from(e: SessionError) -> Self {
        CyclewatchError::stream(e.to_string())
    }
}

/// Receives completed, valid cycle records.
pub trait CycleSink {
    fn append(&mut self, record: &CycleRecord) -> CyclewatchResult<()>;
}

/// A sink that keeps every record in memory, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub records: Vec<CycleRecord>,
}

impl CycleSink for MemorySink {
    fn append(&mut self, record: &CycleRecord) -> CyclewatchResult<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Callback invoked for every cycle notification.
pub type NotificationCallback = Box<dyn Fn(&CycleNotification) + Send>;

/// What happened during one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub crowded: bool,
    pub notifications: Vec<CycleNotification>,
}

/// Final per-zone results.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneReport {
    pub zone_name: String,
    pub history: Vec<CycleRecord>,

    /// Cycles started, including invalidated and unfinished ones.
    pub cycles_started: u32,

    /// Window around the longest valid cycle; `None` without history.
    pub clip_window: Option<ClipWindow>,
}

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub frames_processed: u64,
    pub zones: Vec<ZoneReport>,
}

impl SessionReport {
    pub fn clip_windows(&self) -> Vec<ClipWindow> {
        self.zones.iter().filter_map(|z| z.clip_window.clone()).collect()
    }

    pub fn total_cycles(&self) -> usize {
        self.zones.iter().map(|z| z.history.len()).sum()
    }
}

/// Per-frame context for a measurement run.
pub struct MeasurementSession {
    zones: ZoneSet,
    aggregator: ZoneMembershipAggregator,
    gate: OccupancyGate,
    machines: Vec<ZoneCycleMachine>,
    last_frame: Option<u64>,
    frames_processed: u64,
    on_notify: Option<NotificationCallback>,
}

impl MeasurementSession {
    pub fn new(
        zones: ZoneSet,
        aggregator: ZoneMembershipAggregator,
        gate: OccupancyGate,
        thresholds: CycleThresholds,
    ) -> Self {
        let machines = zones
            .iter()
            .map(|zone| ZoneCycleMachine::new(zone.name.clone(), thresholds))
            .collect();
        Self {
            zones,
            aggregator,
            gate,
            machines,
            last_frame: None,
            frames_processed: 0,
            on_notify: None,
        }
    }

    /// Build a session from validated configuration at an effective `fps`.
    pub fn from_config(config: &AppConfig, fps: f64) -> CyclewatchResult<Self> {
        config.validate()?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CyclewatchError::config(format!(
                "Frame rate must be positive, got {fps}"
            )));
        }

        let zones = ZoneSet::from_configs(&config.zones)?;
        Ok(Self::new(
            zones,
            ZoneMembershipAggregator::from_config(config),
            OccupancyGate::from_settings(&config.measurement),
            CycleThresholds::from_settings(&config.measurement, fps),
        ))
    }

    /// Register a callback for cycle notifications.
    pub fn with_notifications(mut self, callback: NotificationCallback) -> Self {
        self.on_notify = Some(callback);
        self
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Last frame index accepted.
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// State machine for a zone, by name.
    pub fn zone_state(&self, name: &str) -> Option<&ZoneCycleMachine> {
        self.machines.iter().find(|m| m.zone_name() == name)
    }

    pub fn zone_states(&self) -> &[ZoneCycleMachine] {
        &self.machines
    }

    /// Process one frame.
    ///
    /// Frames are numbered from 1. A frame whose index is not exactly one
    /// past the previous one (or is not 1, for the first) is rejected
    /// without touching any state.
    pub fn step(
        &mut self,
        observation: &FrameObservation,
        wallclock: chrono::DateTime<chrono::Utc>,
        sink: &mut dyn CycleSink,
    ) -> CyclewatchResult<FrameOutcome> {
        let expected = self.last_frame.map_or(1, |f| f + 1);
        if observation.frame_index != expected {
            return Err(SessionError::OutOfOrder {
                expected,
                got: observation.frame_index,
            }
            .into());
        }
        self.last_frame = Some(observation.frame_index);
        self.frames_processed += 1;

        let signals = self.aggregator.aggregate(&observation.boxes, &self.zones);
        let crowded = self.gate.is_crowded(signals.occupancy_count);
        if crowded {
            tracing::trace!(
                frame = observation.frame_index,
                occupancy = signals.occupancy_count,
                "Crowded frame"
            );
        }

        let stamp = FrameStamp {
            frame_index: observation.frame_index,
            time_seconds: observation.time_seconds,
            wallclock,
        };

        let mut outcome = FrameOutcome {
            frame_index: observation.frame_index,
            crowded,
            notifications: Vec::new(),
        };

        for (machine, presence) in self.machines.iter_mut().zip(signals.presence) {
            let notification = match machine.step(presence, crowded, &stamp) {
                StepOutcome::Continue => continue,
                StepOutcome::Started { cycle_number } => CycleNotification::Started {
                    zone_name: machine.zone_name().to_string(),
                    cycle_number,
                    frame_index: stamp.frame_index,
                    time_seconds: stamp.time_seconds,
                },
                StepOutcome::Completed(record) => {
                    if let Err(e) = sink.append(&record) {
                        tracing::warn!(
                            zone = %record.zone_name,
                            cycle = record.cycle_number,
                            error = %e,
                            "Failed to persist cycle record"
                        );
                    }
                    CycleNotification::Completed { record }
                }
                StepOutcome::Invalidated {
                    cycle_number,
                    corrected_seconds,
                    ..
                } => CycleNotification::Invalidated {
                    zone_name: machine.zone_name().to_string(),
                    cycle_number,
                    corrected_seconds,
                },
            };
            outcome.notifications.push(notification);
        }

        for notification in &outcome.notifications {
            self.notify(notification);
        }

        Ok(outcome)
    }

    /// Run over a whole stream of frames, stopping at the first error.
    /// Returns the number of frames processed.
    pub fn run<I, E>(
        &mut self,
        frames: I,
        clock: &FrameClock,
        wallclock: &dyn WallClock,
        sink: &mut dyn CycleSink,
    ) -> CyclewatchResult<u64>
    where
        I: IntoIterator<Item = Result<DetectionFrame, E>>,
        E: Into<CyclewatchError>,
    {
        let mut processed = 0u64;
        for frame in frames {
            let observation = frame.map_err(Into::into)?.into_observation(clock);
            self.step(&observation, wallclock.now(), sink)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// End the session. Zones still measuring drop their partial cycle.
    pub fn finish(self, media_duration_secs: f64, margin_secs: f64) -> SessionReport {
        let frames_processed = self.frames_processed;

        let zones = self
            .machines
            .into_iter()
            .map(|machine| {
                if machine.is_measuring() {
                    tracing::debug!(
                        zone = %machine.zone_name(),
                        cycle = machine.cycle_number(),
                        "Stream ended mid-cycle, discarding partial cycle"
                    );
                }
                let zone_name = machine.zone_name().to_string();
                let cycles_started = machine.cycle_number();
                let history = machine.into_history();
                let clip_window = compute_clip_window(&history, media_duration_secs, margin_secs);
                ZoneReport {
                    zone_name,
                    history,
                    cycles_started,
                    clip_window,
                }
            })
            .collect();

        SessionReport {
            frames_processed,
            zones,
        }
    }

    fn notify(&self, notification: &CycleNotification) {
        match notification {
            CycleNotification::Started {
                zone_name,
                cycle_number,
                time_seconds,
                ..
            } => {
                tracing::info!(
                    zone = %zone_name,
                    cycle = cycle_number,
                    time = %format!("{time_seconds:.2}s"),
                    "Cycle started"
                );
            }
            CycleNotification::Completed { record } => {
                tracing::info!(
                    zone = %record.zone_name,
                    cycle = record.cycle_number,
                    corrected = %format!("{:.2}s", record.corrected_seconds),
                    "Cycle completed"
                );
            }
            CycleNotification::Invalidated {
                zone_name,
                cycle_number,
                corrected_seconds,
            } => {
                tracing::warn!(
                    zone = %zone_name,
                    cycle = cycle_number,
                    corrected = %format!("{corrected_seconds:.2}s"),
                    "Cycle invalidated by crowding"
                );
            }
        }

        if let Some(callback) = &self.on_notify {
            callback(notification);
        }
    }
}
