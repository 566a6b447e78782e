//! Automation lanes and their fixed priority

use serde::{Deserialize, Serialize};
use std::fmt;

/// A prioritised automation behaviour
///
/// Variants are declared in priority order; the derived ordering puts the
/// highest-priority lane first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    CoEmergency,
    Alert,
    Zone1,
    Zone2,
    AirQuality,
    Normal,
}

impl Lane {
    /// All lanes, highest priority first
    pub const ORDER: [Lane; 6] = [
        Lane::CoEmergency,
        Lane::Alert,
        Lane::Zone1,
        Lane::Zone2,
        Lane::AirQuality,
        Lane::Normal,
    ];

    /// 0 for the highest priority
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::CoEmergency => "co_emergency",
            Lane::Alert => "alert",
            Lane::Zone1 => "zone1",
            Lane::Zone2 => "zone2",
            Lane::AirQuality => "air_quality",
            Lane::Normal => "normal",
        }
    }

    /// Lanes whose activity defers air-quality requests
    pub fn defers_air_quality(&self) -> bool {
        self.rank() < Lane::AirQuality.rank()
    }

    /// Lanes that leave AQ-only outputs where they are instead of idling them
    pub fn holds_air_quality_outputs(&self) -> bool {
        matches!(self, Lane::Zone1 | Lane::Zone2)
    }

    /// Lanes that take humidifiers away from the humidifier track
    pub fn overrides_humidifiers(&self) -> bool {
        matches!(self, Lane::CoEmergency | Lane::Alert)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
