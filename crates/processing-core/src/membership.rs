//! Zone membership: which signal classes are present in which zone.
//!
//! For each frame, boxes below their class's confidence threshold (or of a
//! class with no threshold at all) are dropped. Every surviving box is then
//! tested against every zone with rectangle overlap. The aggregator reports
//! both flags independently; deciding what a frame carrying both signals
//! means is left to the zone state machine.

use std::collections::HashMap;

use cyclewatch_common::config::{AppConfig, ClassRoles};
use cyclewatch_cycle_model::detection::BoundingBox;
use cyclewatch_cycle_model::zone::ZoneSet;

/// Presence flags for one zone in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZonePresence {
    pub activity_present: bool,
    pub completion_present: bool,
}

impl ZonePresence {
    pub const NONE: ZonePresence = ZonePresence {
        activity_present: false,
        completion_present: false,
    };

    pub fn new(activity_present: bool, completion_present: bool) -> Self {
        Self {
            activity_present,
            completion_present,
        }
    }
}

/// Aggregated signals for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSignals {
    /// One entry per zone, in zone-set order.
    pub presence: Vec<ZonePresence>,

    /// Surviving boxes of the occupancy class, anywhere in the frame.
    pub occupancy_count: u32,
}

/// Per-class minimum confidence. Classes without an entry are ignored.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceThresholds {
    by_class: HashMap<u32, f32>,
}

impl ConfidenceThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, class_id: u32, threshold: f32) -> Self {
        self.by_class.insert(class_id, threshold);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let by_class = config
            .classes
            .iter()
            .map(|c| (c.id, c.confidence_threshold))
            .collect();
        Self { by_class }
    }

    /// Whether a box clears its class threshold.
    pub fn accepts(&self, bbox: &BoundingBox) -> bool {
        self.by_class
            .get(&bbox.class_id)
            .map(|threshold| bbox.confidence >= *threshold)
            .unwrap_or(false)
    }
}

/// Turns a frame's boxes into per-zone presence flags and an occupancy count.
#[derive(Debug, Clone)]
pub struct ZoneMembershipAggregator {
    thresholds: ConfidenceThresholds,
    roles: ClassRoles,
}

impl ZoneMembershipAggregator {
    pub fn new(thresholds: ConfidenceThresholds, roles: ClassRoles) -> Self {
        Self { thresholds, roles }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ConfidenceThresholds::from_config(config), config.roles)
    }

    pub fn roles(&self) -> ClassRoles {
        self.roles
    }

    /// Aggregate one frame. Pure: the same boxes always give the same result.
    pub fn aggregate(&self, boxes: &[BoundingBox], zones: &ZoneSet) -> FrameSignals {
        let mut presence = vec![ZonePresence::NONE; zones.len()];
        let mut occupancy_count = 0u32;

        for bbox in boxes.iter().filter(|b| self.thresholds.accepts(b)) {
            if bbox.class_id == self.roles.occupancy {
                occupancy_count = occupancy_count.saturating_add(1);
            }

            let is_activity = bbox.class_id == self.roles.activity;
            let is_completion = bbox.class_id == self.roles.completion;
            if !is_activity && !is_completion {
                continue;
            }

            for (slot, zone) in presence.iter_mut().zip(zones.iter()) {
                if bbox.rect.overlaps(&zone.rect) {
                    slot.activity_present |= is_activity;
                    slot.completion_present |= is_completion;
                }
            }
        }

        FrameSignals {
            presence,
            occupancy_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclewatch_cycle_model::zone::{Rect, ZoneDefinition};

    const WORKER: u32 = 0;
    const PALLET: u32 = 1;
    const ASSEMBLING: u32 = 2;

    fn aggregator() -> ZoneMembershipAggregator {
        ZoneMembershipAggregator::from_config(&AppConfig::default())
    }

    fn zones() -> ZoneSet {
        ZoneSet::new(vec![
            ZoneDefinition::new("A", Rect::new(140, 260, 150, 310)),
            ZoneDefinition::new("B", Rect::new(750, 260, 760, 310)),
        ])
        .unwrap()
    }

    fn bbox(class_id: u32, confidence: f32, rect: [i32; 4]) -> BoundingBox {
        BoundingBox::new(class_id, confidence, Rect::from(rect))
    }

    #[test]
    fn test_empty_frame_reports_nothing() {
        let signals = aggregator().aggregate(&[], &zones());
        assert_eq!(signals.presence, vec![ZonePresence::NONE; 2]);
        assert_eq!(signals.occupancy_count, 0);
    }

    #[test]
    fn test_activity_only_in_overlapped_zone() {
        let signals = aggregator().aggregate(&[bbox(ASSEMBLING, 0.5, [100, 250, 145, 300])], &zones());
        assert_eq!(signals.presence[0], ZonePresence::new(true, false));
        assert_eq!(signals.presence[1], ZonePresence::NONE);
    }

    #[test]
    fn test_both_flags_can_be_set() {
        let boxes = [
            bbox(ASSEMBLING, 0.5, [740, 250, 770, 320]),
            bbox(PALLET, 0.9, [700, 200, 800, 400]),
        ];
        let signals = aggregator().aggregate(&boxes, &zones());
        assert_eq!(signals.presence[1], ZonePresence::new(true, true));
    }

    #[test]
    fn test_low_confidence_is_discarded() {
        // Pallet threshold is 0.30.
        let signals = aggregator().aggregate(&[bbox(PALLET, 0.29, [140, 260, 150, 310])], &zones());
        assert_eq!(signals.presence[0], ZonePresence::NONE);

        let signals = aggregator().aggregate(&[bbox(PALLET, 0.30, [140, 260, 150, 310])], &zones());
        assert_eq!(signals.presence[0], ZonePresence::new(false, true));
    }

    #[test]
    fn test_unknown_class_is_discarded() {
        let signals = aggregator().aggregate(&[bbox(9, 1.0, [140, 260, 150, 310])], &zones());
        assert_eq!(signals.presence[0], ZonePresence::NONE);
    }

    #[test]
    fn test_occupancy_counted_frame_wide() {
        let boxes = [
            bbox(WORKER, 0.9, [0, 0, 10, 10]),
            bbox(WORKER, 0.5, [2000, 2000, 2010, 2010]),
            bbox(WORKER, 0.39, [0, 0, 10, 10]),
        ];
        let signals = aggregator().aggregate(&boxes, &zones());
        assert_eq!(signals.occupancy_count, 2);
        assert_eq!(signals.presence, vec![ZonePresence::NONE; 2]);
    }

    #[test]
    fn test_custom_thresholds_and_roles() {
        let agg = ZoneMembershipAggregator::new(
            ConfidenceThresholds::new().with(5, 0.8).with(6, 0.1),
            ClassRoles {
                activity: 5,
                completion: 6,
                occupancy: 6,
            },
        );
        let signals = agg.aggregate(
            &[bbox(5, 0.7, [140, 260, 150, 310]), bbox(6, 0.2, [140, 260, 150, 310])],
            &zones(),
        );
        assert_eq!(signals.presence[0], ZonePresence::new(false, true));
        assert_eq!(signals.occupancy_count, 1);
    }
}
