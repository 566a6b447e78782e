//! Actuator seam and command dispatch
//!
//! The engine never talks to devices directly. Each cycle's assignment table
//! is handed to an [`Actuator`], one fire-and-forget command per actuator;
//! the only feedback is whether the command was accepted.

use async_trait::async_trait;
use futures::future::join_all;
use hi_core::EntityId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::arbiter::{Arbitration, DispatchStatus};
use crate::error::CycleIssue;
use crate::output::OutputCommand;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("actuator {0} is unavailable")]
    Unavailable(EntityId),

    #[error("{actuator} does not support {command}")]
    Unsupported { actuator: EntityId, command: String },

    #[error("command failed: {0}")]
    Failed(String),
}

/// Receiver of output commands
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn send(&self, actuator: &EntityId, command: &OutputCommand) -> Result<(), ActuatorError>;
}

pub type SharedActuator = Arc<dyn Actuator>;

/// Send every pending assignment and record the outcome in place
///
/// Assignments for isolated actuators are marked suppressed and not sent.
/// Rejections are returned as cycle issues; they never abort the cycle.
pub async fn dispatch(
    table: &mut Arbitration,
    actuator: &dyn Actuator,
    isolated: impl Fn(&EntityId) -> bool,
) -> Vec<CycleIssue> {
    let mut to_send = Vec::new();
    for (id, assignment) in table.assignments.iter_mut() {
        if isolated(id) {
            debug!(actuator = %id, command = %assignment.command, "Command suppressed by isolation");
            assignment.status = DispatchStatus::Suppressed;
        } else {
            to_send.push((id.clone(), assignment.command.clone()));
        }
    }

    let results = join_all(
        to_send
            .iter()
            .map(|(id, command)| async move { actuator.send(id, command).await }),
    )
    .await;

    let mut issues = Vec::new();
    for ((id, command), result) in to_send.into_iter().zip(results) {
        let status = match result {
            Ok(()) => DispatchStatus::Accepted,
            Err(e) => {
                warn!(actuator = %id, command = %command, error = %e, "Actuator rejected command");
                issues.push(CycleIssue::ActuatorCommandRejected {
                    actuator: id.clone(),
                    error: e.to_string(),
                });
                DispatchStatus::Rejected
            }
        };
        if let Some(assignment) = table.assignments.get_mut(&id) {
            assignment.status = status;
        }
    }
    issues
}

/// Actuator that records every command; optionally rejects some actuators
#[derive(Debug, Default)]
pub struct RecordingActuator {
    sent: Mutex<Vec<(EntityId, OutputCommand)>>,
    reject: HashSet<EntityId>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every command addressed to `actuator`
    pub fn rejecting(mut self, actuator: EntityId) -> Self {
        self.reject.insert(actuator);
        self
    }

    /// Commands received so far
    pub fn sent(&self) -> Vec<(EntityId, OutputCommand)> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drain the recorded commands
    pub fn take(&self) -> Vec<(EntityId, OutputCommand)> {
        match self.sent.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn send(&self, actuator: &EntityId, command: &OutputCommand) -> Result<(), ActuatorError> {
        if self.reject.contains(actuator) {
            return Err(ActuatorError::Unavailable(actuator.clone()));
        }
        match self.sent.lock() {
            Ok(mut guard) => guard.push((actuator.clone(), command.clone())),
            Err(poisoned) => poisoned.into_inner().push((actuator.clone(), command.clone())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::Lane;
    use crate::output::OutputRequest;
    use chrono::Utc;
    use hi_core::FanLevel;

    fn make_test_table() -> Arbitration {
        let mut table = Arbitration::new();
        for id in ["fan.kitchen", "fan.bathroom", "humidifier.bedroom"] {
            let id: EntityId = id.parse().unwrap();
            let request = if id.domain() == "humidifier" {
                OutputRequest::new(id, Lane::Normal, OutputCommand::Power(true))
            } else {
                OutputRequest::ventilation(&id, Lane::Zone1, FanLevel::Medium)
            };
            table.apply(&request, Utc::now());
        }
        table
    }

    #[tokio::test]
    async fn test_dispatch_marks_outcomes() {
        let mut table = make_test_table();
        let actuator = RecordingActuator::new().rejecting("fan.bathroom".parse().unwrap());
        let humidifier: EntityId = "humidifier.bedroom".parse().unwrap();

        let issues = dispatch(&mut table, &actuator, |id| id == &humidifier).await;

        let statuses: Vec<DispatchStatus> = table.assignments.values().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![DispatchStatus::Accepted, DispatchStatus::Rejected, DispatchStatus::Suppressed]
        );
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            CycleIssue::ActuatorCommandRejected { actuator, .. } if actuator.to_string() == "fan.bathroom"
        ));
        assert_eq!(actuator.sent().len(), 1);
    }

    #[test]
    fn test_recording_actuator_drains() {
        let actuator = RecordingActuator::new();
        let id: EntityId = "fan.kitchen".parse().unwrap();
        tokio_test::block_on(actuator.send(&id, &OutputCommand::Power(true))).unwrap();
        assert_eq!(actuator.take().len(), 1);
        assert!(actuator.sent().is_empty());
    }
}
