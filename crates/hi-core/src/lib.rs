//! Core types for Humidity Intelligence
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace: entity references, sensor kinds, house levels, risk tiers,
//! fan stages and the Context carried by command calls.

mod context;
mod entity_id;
mod fan_level;
mod sensor;

pub use context::Context;
pub use entity_id::{ActuatorClass, EntityId, EntityIdError};
pub use fan_level::{FanLevel, ParseFanLevelError, FAN_LEVEL_STEPS};
pub use sensor::{Level, RiskTier, SensorKind};

/// Integration domain, used as the service namespace
pub const DOMAIN: &str = "humidity_intelligence";

/// State value reported by a source that lost contact with the device
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value reported by a source that has no value yet
pub const STATE_UNKNOWN: &str = "unknown";

/// Round to one decimal place, the precision of every published average
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round1() {
        assert_eq!(round1(44.94), 44.9);
        assert_eq!(round1(44.96), 45.0);
        assert_eq!(round1(-1.25), -1.3);
    }
}
