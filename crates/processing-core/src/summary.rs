//! Per-zone performance summary over valid cycles.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use cyclewatch_cycle_model::cycle::CycleRecord;
use serde::{Deserialize, Serialize};

/// Achievement at or above this is a pass.
pub const PASS_PERCENT: f64 = 95.0;

/// Achievement at or above this (and below pass) is marginal.
pub const MARGINAL_PERCENT: f64 = 90.0;

/// How a zone performed against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    Pass,
    Marginal,
    Fail,
}

impl PerformanceStatus {
    pub fn from_achievement(percent: f64) -> Self {
        if percent >= PASS_PERCENT {
            Self::Pass
        } else if percent >= MARGINAL_PERCENT {
            Self::Marginal
        } else {
            Self::Fail
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Pass => "○",
            Self::Marginal => "△",
            Self::Fail => "×",
        }
    }
}

impl fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Aggregate statistics for one zone. Durations are corrected seconds,
/// rounded to 0.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub zone_name: String,
    pub cycle_count: usize,
    pub average_seconds: f64,
    pub shortest_seconds: f64,
    pub longest_seconds: f64,
    pub target_seconds: Option<f64>,
    pub achievement_percent: Option<f64>,
    pub status: Option<PerformanceStatus>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Summarize valid records per zone.
///
/// Zones follow `zone_order`; zones missing from it come after, sorted by
/// name. Zones without valid records are omitted. Achievement is computed
/// from the unrounded average.
pub fn summarize(
    records: &[CycleRecord],
    targets: &HashMap<String, f64>,
    zone_order: &[String],
) -> Vec<ZoneSummary> {
    let mut by_zone: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.valid) {
        by_zone
            .entry(record.zone_name.as_str())
            .or_default()
            .push(record.corrected_seconds);
    }

    let mut ordered: Vec<&str> = zone_order
        .iter()
        .map(String::as_str)
        .filter(|name| by_zone.contains_key(name))
        .collect();
    ordered.extend(
        by_zone
            .keys()
            .copied()
            .filter(|name| !zone_order.iter().any(|z| z == name)),
    );

    ordered
        .into_iter()
        .filter_map(|name| {
            let durations = by_zone.get(name)?;
            Some(summarize_zone(name, durations, targets.get(name).copied()))
        })
        .collect()
}

fn summarize_zone(name: &str, durations: &[f64], target_seconds: Option<f64>) -> ZoneSummary {
    let count = durations.len();
    let average = durations.iter().sum::<f64>() / count as f64;
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let longest = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let achievement_percent = target_seconds
        .filter(|_| average > 0.0)
        .map(|target| round1(target / average * 100.0));

    ZoneSummary {
        zone_name: name.to_string(),
        cycle_count: count,
        average_seconds: round1(average),
        shortest_seconds: round1(shortest),
        longest_seconds: round1(longest),
        target_seconds,
        achievement_percent,
        status: achievement_percent.map(PerformanceStatus::from_achievement),
    }
}
