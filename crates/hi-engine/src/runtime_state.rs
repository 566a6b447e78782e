//! Published runtime state
//!
//! One [`RuntimeState`] is published per cycle, whatever the outcome. Field
//! names are part of the external contract and only change on a major
//! version bump. Subscribers get the latest value through a
//! [`tokio::sync::watch`] channel; a new value replaces the old one whole.

use chrono::{DateTime, Utc};
use hi_config::OutsideAction;
use hi_core::{EntityId, Level, RiskTier, SensorKind};
use hi_telemetry::physics::seasonal_band;
use hi_telemetry::TelemetrySnapshot;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

use crate::arbiter::{DeferredRequest, OutputAssignment};
use crate::controls::ControlSwitches;
use crate::error::CycleIssue;
use crate::gate::{GateVerdict, PresenceStatus};
use crate::lane::Lane;

/// Gate part of the runtime state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSummary {
    pub blocked: bool,
    pub action: OutsideAction,
    pub in_window: Option<bool>,
    pub presence: Option<PresenceStatus>,
    pub presence_assumed: bool,
    pub reason: Option<String>,
}

impl From<&GateVerdict> for GateSummary {
    fn from(v: &GateVerdict) -> Self {
        Self {
            blocked: v.blocked,
            action: v.action,
            in_window: v.in_window,
            presence: v.presence.as_ref().map(|p| p.status),
            presence_assumed: v.presence.as_ref().is_some_and(|p| p.assumed.is_some()),
            reason: v.reason.clone(),
        }
    }
}

impl Default for GateSummary {
    fn default() -> Self {
        Self {
            blocked: false,
            action: OutsideAction::default(),
            in_window: None,
            presence: None,
            presence_assumed: false,
            reason: None,
        }
    }
}

/// Derived telemetry published alongside the decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub house_humidity: Option<f64>,
    pub humidity_mean_7d: Option<f64>,
    pub humidity_drift: Option<f64>,
    pub target_low: Option<f64>,
    pub target_high: Option<f64>,
    pub worst_spread: Option<f64>,
    pub worst_condensation: Option<RiskTier>,
    pub worst_mould: Option<RiskTier>,
    /// Per-level averages of every sensor kind with a usable reading
    pub levels: BTreeMap<Level, BTreeMap<SensorKind, f64>>,
    pub temperature_slopes: BTreeMap<EntityId, f64>,
}

impl RuntimeMetrics {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, month: u32) -> Self {
        let (low, high) = seasonal_band(month);
        let levels = Level::ALL
            .iter()
            .map(|level| {
                let averages: BTreeMap<SensorKind, f64> = SensorKind::ALL
                    .iter()
                    .filter_map(|kind| snapshot.level_avg(*kind, Some(*level)).map(|v| (*kind, v)))
                    .collect();
                (*level, averages)
            })
            .filter(|(_, averages)| !averages.is_empty())
            .collect();

        Self {
            house_humidity: snapshot.house_humidity,
            humidity_mean_7d: snapshot.humidity_mean_7d,
            humidity_drift: snapshot.humidity_drift,
            target_low: Some(low),
            target_high: Some(high),
            worst_spread: snapshot.worst_spread().map(hi_core::round1),
            worst_condensation: snapshot.worst_condensation(),
            worst_mould: snapshot.worst_mould(),
            levels,
            temperature_slopes: snapshot.temperature_slopes.clone(),
        }
    }
}

/// Everything a cycle decided, as published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub cycle: u64,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub mode: String,
    pub mode_display: String,
    pub active_lane: Option<Lane>,
    pub reason: String,
    pub gate: GateSummary,
    pub paused: bool,
    pub pause_resume_at: Option<DateTime<Utc>>,
    pub controls: ControlSwitches,
    /// One assignment per actuator, in application order
    pub outputs: IndexMap<EntityId, OutputAssignment>,
    /// True when the cycle deliberately sent nothing
    pub outputs_held: bool,
    pub deferred: Vec<DeferredRequest>,
    pub suppressed_lanes: Vec<Lane>,
    pub co_emergency_active: bool,
    pub active_alerts: Vec<String>,
    pub humidifiers_active: BTreeMap<Level, bool>,
    /// End of each running air-quality window
    pub aq_run_until: BTreeMap<Level, DateTime<Utc>>,
    pub metrics: RuntimeMetrics,
    pub issues: Vec<CycleIssue>,
}

impl RuntimeState {
    /// State before the first cycle
    pub fn initial() -> Self {
        Self {
            cycle: 0,
            evaluated_at: None,
            mode: "normal".to_string(),
            mode_display: "NORMAL".to_string(),
            active_lane: None,
            reason: "Waiting for the first evaluation cycle.".to_string(),
            gate: GateSummary::default(),
            paused: false,
            pause_resume_at: None,
            controls: ControlSwitches::default(),
            outputs: IndexMap::new(),
            outputs_held: true,
            deferred: Vec::new(),
            suppressed_lanes: Vec::new(),
            co_emergency_active: false,
            active_alerts: Vec::new(),
            humidifiers_active: BTreeMap::new(),
            aq_run_until: BTreeMap::new(),
            metrics: RuntimeMetrics::default(),
            issues: Vec::new(),
        }
    }
}

/// Single-writer publisher of the latest runtime state
#[derive(Debug, Clone)]
pub struct RuntimePublisher {
    tx: Arc<watch::Sender<Arc<RuntimeState>>>,
}

impl RuntimePublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(RuntimeState::initial()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the published state
    pub fn publish(&self, state: RuntimeState) -> Arc<RuntimeState> {
        let state = Arc::new(state);
        trace!(cycle = state.cycle, mode = %state.mode, "Publishing runtime state");
        self.tx.send_replace(state.clone());
        state
    }

    pub fn current(&self) -> Arc<RuntimeState> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RuntimeState>> {
        self.tx.subscribe()
    }

    /// Notify subscribers again without changing the state
    pub fn republish(&self) {
        self.tx.send_modify(|_| {});
    }
}

impl Default for RuntimePublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let publisher = RuntimePublisher::new();
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.current().cycle, 0);

        let mut state = RuntimeState::initial();
        state.cycle = 7;
        state.mode = "air_quality".into();
        publisher.publish(state);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().cycle, 7);

        publisher.republish();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().mode, "air_quality");
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(RuntimeState::initial()).unwrap();
        for field in [
            "cycle",
            "evaluated_at",
            "mode",
            "mode_display",
            "active_lane",
            "reason",
            "gate",
            "paused",
            "outputs",
            "deferred",
            "metrics",
            "issues",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
