//! CO emergency lane
//!
//! Latches on as soon as any CO reading reaches the start threshold and stays
//! latched until every CO reading has been below the clear threshold for
//! [`CO_CLEAR_HOLD_MINUTES`]. With no CO readings at all the latch holds.

use chrono::Duration;
use hi_config::{AlertTrigger, HiConfig};
use hi_core::{EntityId, FanLevel, SensorKind};
use tracing::{info, warn};

use super::{LaneDetail, LaneInputs, LaneOutcome};
use crate::lane::Lane;
use crate::memory::CoLatch;
use crate::output::{OutputCommand, OutputRequest};

/// Start threshold when no CO alert is configured, in ppm
pub const CO_START_DEFAULT: f64 = 15.0;

/// Distance of the clear threshold below the start threshold
pub const CO_CLEAR_MARGIN: f64 = 5.0;

pub const CO_CLEAR_HOLD_MINUTES: i64 = 2;

/// Start and clear thresholds and the outputs driven to 100%
#[derive(Debug, Clone, PartialEq)]
pub struct CoSettings {
    pub start_threshold: f64,
    pub clear_threshold: f64,
    pub outputs: Vec<EntityId>,
}

impl CoSettings {
    /// The lowest enabled CO alert threshold wins; outputs come from CO alerts,
    /// else every fan output
    pub fn from_config(config: &HiConfig) -> Self {
        let co_alerts: Vec<_> = config
            .alerts
            .iter()
            .filter(|a| a.enabled && a.trigger_type == AlertTrigger::CoEmergency)
            .collect();

        let start_threshold = co_alerts
            .iter()
            .filter_map(|a| a.effective_threshold())
            .min_by(|a, b| a.total_cmp(b))
            .unwrap_or(CO_START_DEFAULT);

        let mut outputs: Vec<EntityId> = Vec::new();
        for id in co_alerts.iter().flat_map(|a| a.outputs.iter()) {
            if id.is_ventilation() && !outputs.contains(id) {
                outputs.push(id.clone());
            }
        }
        if outputs.is_empty() {
            outputs = config.all_fan_outputs();
        }

        Self {
            start_threshold,
            clear_threshold: (start_threshold - CO_CLEAR_MARGIN).max(0.0),
            outputs,
        }
    }
}

/// Advance the latch and return the lane outcome while it is latched
pub fn evaluate(inputs: &LaneInputs<'_>, latch: &mut CoLatch) -> Option<LaneOutcome> {
    let settings = CoSettings::from_config(inputs.config);
    let values = inputs.snapshot.values(SensorKind::Co);
    let peak = values.iter().copied().max_by(|a, b| a.total_cmp(b));
    let now = inputs.clock.now;

    if values.iter().any(|v| *v >= settings.start_threshold) {
        if !latch.latched {
            warn!(
                peak_ppm = ?peak,
                threshold = settings.start_threshold,
                "CO emergency started"
            );
        }
        latch.latched = true;
        latch.below_since = None;
    } else if latch.latched {
        if !values.is_empty() && values.iter().all(|v| *v < settings.clear_threshold) {
            let since = *latch.below_since.get_or_insert(now);
            if now - since >= Duration::minutes(CO_CLEAR_HOLD_MINUTES) {
                info!(clear_threshold = settings.clear_threshold, "CO emergency cleared");
                latch.latched = false;
                latch.below_since = None;
            }
        } else {
            latch.below_since = None;
        }
    }

    if !latch.latched {
        return None;
    }

    let config = inputs.config;
    let mut requests: Vec<OutputRequest> = settings
        .outputs
        .iter()
        .map(|id| OutputRequest::ventilation(id, Lane::CoEmergency, FanLevel::High))
        .collect();
    requests.extend(
        config
            .all_fan_outputs()
            .iter()
            .filter(|id| !settings.outputs.contains(id))
            .map(|id| OutputRequest::ventilation(id, Lane::CoEmergency, FanLevel::Auto)),
    );
    requests.extend(
        config
            .all_humidifier_outputs()
            .into_iter()
            .map(|id| OutputRequest::new(id, Lane::CoEmergency, OutputCommand::Power(false))),
    );

    Some(LaneOutcome {
        lane: Lane::CoEmergency,
        requests,
        detail: LaneDetail::CoEmergency {
            peak_ppm: peak,
            start_threshold: settings.start_threshold,
            clear_threshold: settings.clear_threshold,
            outputs: settings.outputs,
        },
    })
}
