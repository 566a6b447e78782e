//! Discrete fan stages

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Percentage steps a speed-controlled fan is driven at
pub const FAN_LEVEL_STEPS: [u8; 3] = [33, 66, 100];

/// A fan stage: the device's own automatic mode or a fixed percentage step
///
/// Any requested percentage snaps to the nearest step; zero or less means
/// auto and anything at or above 100 means full speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FanLevel {
    Auto,
    Low,
    Medium,
    High,
}

impl FanLevel {
    pub fn from_percent(percent: i64) -> Self {
        if percent <= 0 {
            return FanLevel::Auto;
        }
        if percent >= 100 {
            return FanLevel::High;
        }
        let nearest = FAN_LEVEL_STEPS
            .iter()
            .copied()
            .min_by_key(|step| (i64::from(*step) - percent).abs())
            .unwrap_or(66);
        match nearest {
            33 => FanLevel::Low,
            66 => FanLevel::Medium,
            _ => FanLevel::High,
        }
    }

    /// Percentage for the step, `None` for auto
    pub fn percent(&self) -> Option<u8> {
        match self {
            FanLevel::Auto => None,
            FanLevel::Low => Some(33),
            FanLevel::Medium => Some(66),
            FanLevel::High => Some(100),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, FanLevel::Auto)
    }

    /// Wire form: "auto", "33", "66" or "100"
    pub fn as_str(&self) -> &'static str {
        match self {
            FanLevel::Auto => "auto",
            FanLevel::Low => "33",
            FanLevel::Medium => "66",
            FanLevel::High => "100",
        }
    }

    /// Text used in reasons: "Auto" or "66%"
    pub fn label(&self) -> String {
        match self.percent() {
            Some(pct) => format!("{}%", pct),
            None => "Auto".to_string(),
        }
    }
}

impl fmt::Display for FanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for fan level text that is neither "auto" nor a number
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fan level '{0}'")]
pub struct ParseFanLevelError(pub String);

impl FromStr for FanLevel {
    type Err = ParseFanLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        if text == "auto" {
            return Ok(FanLevel::Auto);
        }
        let number = text.strip_suffix('%').unwrap_or(&text).trim();
        number
            .parse::<f64>()
            .map(|v| FanLevel::from_percent(v as i64))
            .map_err(|_| ParseFanLevelError(s.to_string()))
    }
}

impl Serialize for FanLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FanLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FanLevelVisitor;

        impl<'de> Visitor<'de> for FanLevelVisitor {
            type Value = FanLevel;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"auto\" or a percentage")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FanLevel, E> {
                Ok(FanLevel::from_percent(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FanLevel, E> {
                Ok(FanLevel::from_percent(i64::try_from(v).unwrap_or(i64::MAX)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<FanLevel, E> {
                Ok(FanLevel::from_percent(v as i64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FanLevel, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(FanLevelVisitor)
    }
}
