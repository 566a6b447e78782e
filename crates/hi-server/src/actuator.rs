//! Actuator that reports commands through the log
//!
//! The server has no device transport of its own; every accepted command is
//! emitted as a structured `tracing` event for whatever ships the logs.

use async_trait::async_trait;
use hi_core::{ActuatorClass, EntityId};
use hi_engine::{Actuator, ActuatorError, OutputCommand};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActuator;

impl TracingActuator {
    pub fn new() -> Self {
        Self
    }
}

fn supports(class: Option<ActuatorClass>, command: &OutputCommand) -> bool {
    match command {
        OutputCommand::Stage(_) => matches!(class, Some(ActuatorClass::Fan) | None),
        OutputCommand::Power(_) => true,
        OutputCommand::Flash { .. } => matches!(class, Some(ActuatorClass::Light)),
    }
}

#[async_trait]
impl Actuator for TracingActuator {
    async fn send(&self, actuator: &EntityId, command: &OutputCommand) -> Result<(), ActuatorError> {
        if !supports(actuator.actuator_class(), command) {
            return Err(ActuatorError::Unsupported {
                actuator: actuator.clone(),
                command: command.to_string(),
            });
        }
        info!(actuator = %actuator, command = %command, "Actuator command");
        Ok(())
    }
}
