//! Output arbiter
//!
//! Folds every request of a cycle into one assignment per actuator. Requests
//! are applied in a fixed order (idle baseline, humidifier track, air quality
//! level by level, then the active lane) and a request only replaces an
//! existing assignment when its lane ranks at least as high. Equal rank means
//! the later request wins, so the second air-quality level overrides the
//! first on a shared output.

use chrono::{DateTime, Utc};
use hi_core::EntityId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::lane::Lane;
use crate::output::{OutputCommand, OutputRequest};
use crate::resolver::Resolution;

/// How a command fared when dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Not sent yet
    Pending,
    Accepted,
    Rejected,
    /// Held back by an isolation switch
    Suppressed,
}

/// The single command an actuator receives this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputAssignment {
    pub lane: Lane,
    pub command: OutputCommand,
    pub assigned_at: DateTime<Utc>,
    pub status: DispatchStatus,
}

impl OutputAssignment {
    pub fn accepted(&self) -> bool {
        self.status == DispatchStatus::Accepted
    }
}

/// A request the arbiter held back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredRequest {
    pub actuator: EntityId,
    pub lane: Lane,
    pub command: OutputCommand,
    /// Lane that caused the deferral
    pub deferred_by: Lane,
}

/// Assignment table in application order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arbitration {
    pub assignments: IndexMap<EntityId, OutputAssignment>,
    pub deferred: Vec<DeferredRequest>,
}

impl Arbitration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one request under the rank rule; returns whether it took effect
    pub fn apply(&mut self, request: &OutputRequest, at: DateTime<Utc>) -> bool {
        if let Some(existing) = self.assignments.get(&request.actuator) {
            if request.lane.rank() > existing.lane.rank() {
                trace!(
                    actuator = %request.actuator,
                    lane = %request.lane,
                    holder = %existing.lane,
                    "Request outranked"
                );
                return false;
            }
        }
        self.assignments.insert(
            request.actuator.clone(),
            OutputAssignment {
                lane: request.lane,
                command: request.command.clone(),
                assigned_at: at,
                status: DispatchStatus::Pending,
            },
        );
        true
    }

    pub fn apply_all<'a>(&mut self, requests: impl IntoIterator<Item = &'a OutputRequest>, at: DateTime<Utc>) {
        for request in requests {
            self.apply(request, at);
        }
    }

    pub fn get(&self, actuator: &EntityId) -> Option<&OutputAssignment> {
        self.assignments.get(actuator)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Build the assignment table for a resolved cycle
pub fn arbitrate(resolution: &Resolution, baseline: &[OutputRequest], at: DateTime<Utc>) -> Arbitration {
    let mut table = Arbitration::new();
    table.apply_all(baseline, at);
    table.apply_all(&resolution.humidifier_requests, at);

    table.apply_all(&resolution.active.requests, at);

    if let Some(aq) = &resolution.deferred_air_quality {
        table.deferred = aq
            .requests
            .iter()
            .map(|r| DeferredRequest {
                actuator: r.actuator.clone(),
                lane: r.lane,
                command: r.command.clone(),
                deferred_by: resolution.active.lane,
            })
            .collect();
    }
    table
}
