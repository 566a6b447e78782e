//! Humidifier track
//!
//! Runs beside the lanes rather than as one of them: each level switches on
//! at or below its target-low and off once humidity recovers to
//! `target-low + recovery_in_band` (capped at target-high). Between the two
//! the previous state holds.

use chrono::Datelike;
use hi_config::HumidifierConfig;
use hi_core::{EntityId, Level, SensorKind};
use hi_telemetry::physics::seasonal_band;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::LaneInputs;
use crate::lane::Lane;
use crate::output::{OutputCommand, OutputRequest};

/// Humidity band a level is steered into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumidityBand {
    pub low: f64,
    pub high: f64,
    pub recovery_off: f64,
}

impl HumidityBand {
    pub fn for_month(config: &HumidifierConfig, month: u32) -> Self {
        let (low, high) = seasonal_band(month);
        let low = low + config.band_adjust;
        let high = high + config.band_adjust;
        Self {
            low,
            high,
            recovery_off: high.min(low + config.recovery_in_band),
        }
    }
}

/// One level's decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumidifierDecision {
    pub level: Level,
    pub on: bool,
    pub humidity: Option<f64>,
    pub band: HumidityBand,
    pub outputs: Vec<EntityId>,
}

/// Decide every configured level
///
/// A disabled level, or one whose humidity is unknown, is switched off.
/// Returns the decisions, their requests and the next on/off flags.
pub fn evaluate(
    inputs: &LaneInputs<'_>,
    previous: &BTreeMap<Level, bool>,
) -> (Vec<HumidifierDecision>, Vec<OutputRequest>, BTreeMap<Level, bool>) {
    let month = inputs.clock.local.month();
    let mut decisions = Vec::new();
    let mut requests = Vec::new();
    let mut next = BTreeMap::new();

    for (level, config) in &inputs.config.humidifiers {
        let level = *level;
        if config.outputs.is_empty() {
            continue;
        }
        let band = HumidityBand::for_month(config, month);
        let humidity = inputs.snapshot.level_avg(SensorKind::Humidity, Some(level));
        let was_on = previous.get(&level).copied().unwrap_or(false);

        let on = match humidity {
            Some(h) if config.enabled => {
                if h <= band.low {
                    true
                } else if h >= band.recovery_off {
                    false
                } else {
                    was_on
                }
            }
            _ => false,
        };

        if on != was_on {
            debug!(level = %level, humidity = ?humidity, on, "Humidifier switched");
        }

        next.insert(level, on);
        requests.extend(
            config
                .outputs
                .iter()
                .map(|id| OutputRequest::new(id.clone(), Lane::Normal, OutputCommand::Power(on))),
        );
        decisions.push(HumidifierDecision {
            level,
            on,
            humidity,
            band,
            outputs: config.outputs.clone(),
        });
    }

    (decisions, requests, next)
}
