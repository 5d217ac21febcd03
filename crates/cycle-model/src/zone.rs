//! Zone geometry and the validated zone set.

use std::collections::HashSet;

use cyclewatch_common::config::ZoneConfig;
use cyclewatch_common::error::CyclewatchError;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel coordinates.
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Whether `x1 < x2` and `y1 < y2`.
    pub fn is_well_formed(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    /// True unless the rectangles are separated along either axis.
    /// Touching edges count as overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let separated = self.x1 > other.x2
            || self.x2 < other.x1
            || self.y1 > other.y2
            || self.y2 < other.y1;
        !separated
    }
}

impl From<[i32; 4]> for Rect {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

/// A named region where one cycle is tracked independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub name: String,
    pub rect: Rect,
}

impl ZoneDefinition {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
        }
    }
}

impl From<&ZoneConfig> for ZoneDefinition {
    fn from(config: &ZoneConfig) -> Self {
        Self::new(config.name.clone(), Rect::from(config.rect))
    }
}

/// Errors raised while building a zone set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZoneError {
    #[error("no zones configured")]
    Empty,

    #[error("zone at position {index} has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate zone name '{name}'")]
    DuplicateName { name: String },

    #[error("zone '{name}' has a degenerate rectangle {rect:?} (need x1 < x2 and y1 < y2)")]
    DegenerateRect { name: String, rect: [i32; 4] },
}

impl From<ZoneError> for CyclewatchError {
    fn from(e: ZoneError) -> Self {
        CyclewatchError::zone(e.to_string())
    }
}

/// The immutable, validated set of zones for a run, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSet {
    zones: Vec<ZoneDefinition>,
}

impl ZoneSet {
    /// Validate and build a zone set.
    pub fn new(zones: Vec<ZoneDefinition>) -> Result<Self, ZoneError> {
        if zones.is_empty() {
            return Err(ZoneError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, zone) in zones.iter().enumerate() {
            if zone.name.trim().is_empty() {
                return Err(ZoneError::EmptyName { index });
            }
            if !seen.insert(zone.name.as_str()) {
                return Err(ZoneError::DuplicateName {
                    name: zone.name.clone(),
                });
            }
            if !zone.rect.is_well_formed() {
                return Err(ZoneError::DegenerateRect {
                    name: zone.name.clone(),
                    rect: zone.rect.into(),
                });
            }
        }

        Ok(Self { zones })
    }

    /// Build from configuration entries.
    pub fn from_configs(configs: &[ZoneConfig]) -> Result<Self, ZoneError> {
        Self::new(configs.iter().map(ZoneDefinition::from).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZoneDefinition> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}


#[cfg(test)]
mod overlap_props {
    use super::Rect;
    use proptest::prelude::*;

    fn rect() -> impl Strategy<Value = Rect> {
        (-500i32..2000, -500i32..2000, 1i32..400, 1i32..400)
            .prop_map(|(x, y, w, h)| Rect::new(x, y, x + w, y + h))
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in rect(), b in rect()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn rect_overlaps_itself_and_its_corners(a in rect()) {
            prop_assert!(a.overlaps(&a));
            prop_assert!(a.overlaps(&Rect::new(a.x2, a.y2, a.x2 + 1, a.y2 + 1)));
            prop_assert!(!a.overlaps(&Rect::new(a.x2 + 1, a.y1, a.x2 + 5, a.y2)));
        }
    }
}
