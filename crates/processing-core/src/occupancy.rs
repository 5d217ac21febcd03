//! Global crowding signal.
//!
//! When too many occupancy-class actors are visible at once, the timing of
//! any cycle in progress is considered unreliable. The gate only decides
//! *whether* a frame is crowded; each zone applies that decision to its own
//! in-progress cycle.

use cyclewatch_common::config::MeasurementSettings;

/// Decides, once per frame, whether the scene is crowded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyGate {
    threshold: u32,
}

impl OccupancyGate {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn from_settings(settings: &MeasurementSettings) -> Self {
        Self::new(settings.crowding_threshold)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// `count >= threshold`.
    pub fn is_crowded(&self, occupancy_count: u32) -> bool {
        occupancy_count >= self.threshold
    }
}

impl Default for OccupancyGate {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let gate = OccupancyGate::default();
        assert!(!gate.is_crowded(0));
        assert!(!gate.is_crowded(2));
        assert!(gate.is_crowded(3));
        assert!(gate.is_crowded(7));
    }

    #[test]
    fn test_from_settings() {
        let gate = OccupancyGate::from_settings(&MeasurementSettings {
            crowding_threshold: 5,
            ..Default::default()
        });
        assert_eq!(gate.threshold(), 5);
        assert!(!gate.is_crowded(4));
    }
}
