//! Sensor kinds, house levels and risk tiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a mapped telemetry entity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Humidity,
    Temperature,
    Iaq,
    Pm25,
    Voc,
    Co2,
    Co,
}

impl SensorKind {
    pub const ALL: [SensorKind; 7] = [
        SensorKind::Humidity,
        SensorKind::Temperature,
        SensorKind::Iaq,
        SensorKind::Pm25,
        SensorKind::Voc,
        SensorKind::Co2,
        SensorKind::Co,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "humidity",
            SensorKind::Temperature => "temperature",
            SensorKind::Iaq => "iaq",
            SensorKind::Pm25 => "pm25",
            SensorKind::Voc => "voc",
            SensorKind::Co2 => "co2",
            SensorKind::Co => "co",
        }
    }

    /// Human label used in reason text
    pub fn label(&self) -> &'static str {
        match self {
            SensorKind::Humidity => "Humidity",
            SensorKind::Temperature => "Temperature",
            SensorKind::Iaq => "IAQ",
            SensorKind::Pm25 => "PM2.5",
            SensorKind::Voc => "VOC",
            SensorKind::Co2 => "CO2",
            SensorKind::Co => "CO",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Floor of the house a sensor or output belongs to
///
/// The derived ordering (level1 before level2) is the evaluation order
/// wherever per-level work has to be sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Level1,
    Level2,
}

impl Level {
    pub const ALL: [Level; 2] = [Level::Level1, Level::Level2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Level1 => "level1",
            Level::Level2 => "level2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Level::Level1 => "Downstairs",
            Level::Level2 => "Upstairs",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered risk classification for condensation and mould
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    #[serde(rename = "OK")]
    Ok,
    Watch,
    Risk,
    Danger,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Ok => "OK",
            RiskTier::Watch => "Watch",
            RiskTier::Risk => "Risk",
            RiskTier::Danger => "Danger",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
