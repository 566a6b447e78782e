//! Last-known telemetry values
//!
//! The store keeps the most recent raw state reported for every entity the
//! telemetry source pushes, sensors and presence trackers alike. It never
//! interprets values; the snapshot builder does that once per cycle.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hi_core::{EntityId, STATE_UNAVAILABLE, STATE_UNKNOWN};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Raw state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    pub entity_id: EntityId,
    pub state: String,
    /// Display name, used in reason text when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// When the value last changed
    pub last_changed: DateTime<Utc>,
    /// When the source last reported, changed or not
    pub last_updated: DateTime<Utc>,
}

impl TelemetryState {
    /// Whether the source reports a usable state at all
    pub fn is_available(&self) -> bool {
        self.state != STATE_UNAVAILABLE && self.state != STATE_UNKNOWN
    }

    /// The state parsed as a number, if available and numeric
    pub fn numeric(&self) -> Option<f64> {
        if !self.is_available() {
            return None;
        }
        self.state.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Notification sent whenever a stored state value changes
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryChange {
    pub entity_id: EntityId,
    pub old_state: Option<String>,
    pub new_state: String,
}

/// Concurrent map of entity id to last reported state
pub struct TelemetryStore {
    states: DashMap<EntityId, TelemetryState>,
    changes: broadcast::Sender<TelemetryChange>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            states: DashMap::new(),
            changes,
        }
    }

    /// Record a reported state
    ///
    /// `last_changed` only moves when the value differs. A change notification
    /// is sent for new entities and changed values, not for repeats.
    #[instrument(skip(self, state, friendly_name), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        friendly_name: Option<String>,
        at: DateTime<Utc>,
    ) -> TelemetryState {
        let state = state.into();
        let old = self.states.get(&entity_id).map(|s| s.clone());

        let changed = old.as_ref().map(|o| o.state != state).unwrap_or(true);
        let new_state = TelemetryState {
            entity_id: entity_id.clone(),
            state: state.clone(),
            friendly_name: friendly_name.or_else(|| old.as_ref().and_then(|o| o.friendly_name.clone())),
            last_changed: match &old {
                Some(o) if !changed => o.last_changed,
                _ => at,
            },
            last_updated: at,
        };

        debug!(state = %state, changed, "Recording telemetry");
        self.states.insert(entity_id.clone(), new_state.clone());

        if changed {
            // No receivers is fine; nothing is waiting for a cycle
            let _ = self.changes.send(TelemetryChange {
                entity_id,
                old_state: old.map(|o| o.state),
                new_state: state,
            });
        }

        new_state
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<TelemetryState> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    pub fn state_of(&self, entity_id: &EntityId) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Display name for reason text, falling back to the entity id
    pub fn display_name(&self, entity_id: &EntityId) -> String {
        self.states
            .get(entity_id)
            .and_then(|s| s.friendly_name.clone())
            .unwrap_or_else(|| entity_id.to_string())
    }

    pub fn remove(&self, entity_id: &EntityId) -> Option<TelemetryState> {
        self.states.remove(entity_id).map(|(_, s)| s)
    }

    /// Subscribe to value changes
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryChange> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedTelemetryStore = Arc<TelemetryStore>;
