//! Alert lane
//!
//! Up to five alert slots, each watching one danger condition. While any
//! slot triggers, every fan output returns to auto, humidifiers switch off
//! and the slot's lights flash, no more often than once per
//! [`FLASH_INTERVAL_SECONDS`].

use chrono::{DateTime, Duration, Utc};
use hi_config::{AlertConfig, AlertTrigger};
use hi_core::{FanLevel, RiskTier, SensorKind};
use std::collections::BTreeMap;
use tracing::debug;

use super::{LaneDetail, LaneInputs, LaneOutcome};
use crate::lane::Lane;
use crate::output::{OutputCommand, OutputRequest};

pub const FLASH_INTERVAL_SECONDS: i64 = 30;

/// Custom binary triggers fire on this state
const BINARY_ON: &str = "on";

fn triggered(inputs: &LaneInputs<'_>, alert: &AlertConfig) -> bool {
    let snapshot = inputs.snapshot;
    match alert.trigger_type {
        AlertTrigger::CondensationDanger => snapshot.worst_condensation() == Some(RiskTier::Danger),
        AlertTrigger::MouldDanger => snapshot.worst_mould() == Some(RiskTier::Danger),
        AlertTrigger::HumidityDanger => at_or_above(inputs, SensorKind::Humidity, alert),
        AlertTrigger::CoEmergency => at_or_above(inputs, SensorKind::Co, alert),
        AlertTrigger::CustomBinary => alert
            .custom_trigger
            .as_ref()
            .and_then(|id| snapshot.state_of(id))
            .is_some_and(|state| state == BINARY_ON),
    }
}

fn at_or_above(inputs: &LaneInputs<'_>, kind: SensorKind, alert: &AlertConfig) -> bool {
    let Some(threshold) = alert.effective_threshold() else {
        return false;
    };
    inputs.snapshot.values(kind).iter().any(|v| *v >= threshold)
}

/// Slots whose condition holds this cycle, in slot order
pub fn triggered_slots(inputs: &LaneInputs<'_>) -> Vec<usize> {
    inputs
        .config
        .alerts
        .iter()
        .enumerate()
        .filter(|(_, alert)| alert.enabled && triggered(inputs, alert))
        .map(|(idx, _)| idx)
        .collect()
}

/// Evaluate the alert slots against the last flash time of each
///
/// The outcome lists the slots it flashes; the caller records those flash
/// times only if this lane ends up active.
pub fn evaluate(
    inputs: &LaneInputs<'_>,
    flashed_at: &BTreeMap<usize, DateTime<Utc>>,
) -> Option<LaneOutcome> {
    let slots = triggered_slots(inputs);
    if slots.is_empty() {
        return None;
    }

    let config = inputs.config;
    let now = inputs.clock.now;
    let mut requests = Vec::new();
    let mut labels = Vec::new();
    let mut flashed = Vec::new();

    for idx in slots {
        let alert = &config.alerts[idx];
        labels.push(alert.label(idx));

        let due = flashed_at
            .get(&idx)
            .map_or(true, |last| now - *last >= Duration::seconds(FLASH_INTERVAL_SECONDS));
        if !due {
            debug!(alert = idx, "Alert flash rate limited");
            continue;
        }
        flashed.push(idx);

        if let Some(power) = &alert.power_entity {
            requests.push(OutputRequest::new(power.clone(), Lane::Alert, OutputCommand::Power(true)));
        }
        for light in &alert.lights {
            requests.push(OutputRequest::new(
                light.clone(),
                Lane::Alert,
                OutputCommand::Flash {
                    rgb: alert.flash_mode.rgb(),
                    duration_secs: alert.duration,
                },
            ));
        }
    }

    requests.extend(
        config
            .all_fan_outputs()
            .iter()
            .map(|id| OutputRequest::ventilation(id, Lane::Alert, FanLevel::Auto)),
    );
    requests.extend(
        config
            .all_humidifier_outputs()
            .into_iter()
            .map(|id| OutputRequest::new(id, Lane::Alert, OutputCommand::Power(false))),
    );

    Some(LaneOutcome {
        lane: Lane::Alert,
        requests,
        detail: LaneDetail::Alert { labels, flashed },
    })
}
