//! Output commands and lane requests

use hi_core::{ActuatorClass, EntityId, FanLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lane::Lane;

/// What an actuator is asked to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum OutputCommand {
    /// Ventilation stage; relays treat any stage as on and auto as off
    Stage(FanLevel),
    /// Plain on/off
    Power(bool),
    /// Flash a light in a colour for a number of seconds
    Flash { rgb: (u8, u8, u8), duration_secs: u32 },
}

impl OutputCommand {
    /// Ventilation command appropriate for the actuator's class
    pub fn ventilation(actuator: &EntityId, level: FanLevel) -> Self {
        match actuator.actuator_class() {
            Some(ActuatorClass::Fan) | None => OutputCommand::Stage(level),
            Some(_) => OutputCommand::Power(!level.is_auto()),
        }
    }
}

impl fmt::Display for OutputCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputCommand::Stage(level) => write!(f, "stage {}", level.label()),
            OutputCommand::Power(true) => f.write_str("on"),
            OutputCommand::Power(false) => f.write_str("off"),
            OutputCommand::Flash { rgb, duration_secs } => {
                write!(f, "flash rgb({}, {}, {}) for {}s", rgb.0, rgb.1, rgb.2, duration_secs)
            }
        }
    }
}

/// A lane's wish for one actuator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRequest {
    pub actuator: EntityId,
    pub lane: Lane,
    pub command: OutputCommand,
}

impl OutputRequest {
    pub fn new(actuator: EntityId, lane: Lane, command: OutputCommand) -> Self {
        Self {
            actuator,
            lane,
            command,
        }
    }

    /// Ventilation request shaped for the actuator's class
    pub fn ventilation(actuator: &EntityId, lane: Lane, level: FanLevel) -> Self {
        Self::new(actuator.clone(), lane, OutputCommand::ventilation(actuator, level))
    }
}
