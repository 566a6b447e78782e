//! Lane resolver
//!
//! Evaluates every lane against the cycle's snapshot and picks the single
//! active lane: the highest-priority one that wants to run, or Normal.
//! Lower lanes that also triggered are reported as suppressed. Resolution
//! is a pure function of its inputs and the previous [`LaneMemory`].

use hi_config::{AlertTrigger, HiConfig, ZoneKey};
use tracing::{debug, instrument};

use crate::error::CycleIssue;
use crate::lane::Lane;
use crate::lanes::air_quality::{self, AqState};
use crate::lanes::humidifier::{self, HumidifierDecision};
use crate::lanes::{alert, co_emergency, zone, LaneDetail, LaneInputs, LaneOutcome};
use crate::memory::LaneMemory;
use crate::output::OutputRequest;

/// The resolver's verdict for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub active: LaneOutcome,
    /// Lower-priority lanes that triggered but were blocked
    pub suppressed: Vec<Lane>,
    /// Air-quality requests held back by a higher lane
    pub deferred_air_quality: Option<LaneOutcome>,
    pub humidifiers: Vec<HumidifierDecision>,
    pub humidifier_requests: Vec<OutputRequest>,
    pub memory: LaneMemory,
    pub issues: Vec<CycleIssue>,
}

/// Enabled lanes that can never trigger
pub fn unconfigured_lanes(config: &HiConfig) -> Vec<CycleIssue> {
    let mut issues = Vec::new();
    for key in ZoneKey::ALL {
        if let Some(zone) = config.zone(key).filter(|z| z.enabled && !z.is_runnable()) {
            let lane = match key {
                ZoneKey::Zone1 => Lane::Zone1,
                ZoneKey::Zone2 => Lane::Zone2,
            };
            let missing = if zone.outputs.is_empty() { "outputs" } else { "triggers" };
            issues.push(CycleIssue::UnconfiguredLane {
                lane,
                detail: format!("{} is enabled without {}", zone.display_label(key), missing),
            });
        }
    }
    for (level, aq) in &config.aq {
        if aq.enabled && !aq.is_runnable() {
            let missing = if aq.outputs.is_empty() { "outputs" } else { "triggers" };
            issues.push(CycleIssue::UnconfiguredLane {
                lane: Lane::AirQuality,
                detail: format!("{} AQ is enabled without {}", level.display_name(), missing),
            });
        }
    }
    for (idx, alert) in config.alerts.iter().enumerate() {
        if alert.enabled && alert.trigger_type == AlertTrigger::CustomBinary && alert.custom_trigger.is_none() {
            issues.push(CycleIssue::UnconfiguredLane {
                lane: Lane::Alert,
                detail: format!("{} has no custom trigger entity", alert.label(idx)),
            });
        }
    }
    issues
}

#[instrument(skip_all, fields(at = %inputs.clock.now))]
pub fn resolve(inputs: &LaneInputs<'_>, previous: &LaneMemory) -> Resolution {
    let mut memory = previous.clone();

    let co = co_emergency::evaluate(inputs, &mut memory.co);
    let alert = alert::evaluate(inputs, &memory.alert_flashed_at);
    let zone1 = zone::evaluate(inputs, ZoneKey::Zone1);
    let zone2 = zone::evaluate(inputs, ZoneKey::Zone2);
    let aq = air_quality::evaluate(
        inputs,
        &AqState {
            runs: memory.aq_runs.clone(),
            triggered: memory.aq_triggered.clone(),
        },
    );

    let mut candidates: Vec<LaneOutcome> = [co, alert, zone1, zone2, aq.outcome.clone()]
        .into_iter()
        .flatten()
        .collect();
    let active = if candidates.is_empty() {
        LaneOutcome::normal()
    } else {
        candidates.remove(0)
    };
    let suppressed: Vec<Lane> = candidates.iter().map(|c| c.lane).collect();

    let deferred_air_quality = if active.lane.defers_air_quality() {
        memory.clear_air_quality();
        candidates.into_iter().find(|c| c.lane == Lane::AirQuality)
    } else {
        memory.aq_runs = aq.next.runs;
        memory.aq_triggered = aq.next.triggered;
        None
    };

    if let LaneDetail::Alert { flashed, .. } = &active.detail {
        for idx in flashed {
            memory.alert_flashed_at.insert(*idx, inputs.clock.now);
        }
    }

    let (humidifiers, humidifier_requests) = if active.lane.overrides_humidifiers() {
        memory.clear_humidifiers();
        (Vec::new(), Vec::new())
    } else {
        let (decisions, requests, next) = humidifier::evaluate(inputs, &previous.humidifier_on);
        memory.humidifier_on = next;
        (decisions, requests)
    };

    debug!(
        active = %active.lane,
        suppressed = ?suppressed,
        deferred_aq = deferred_air_quality.is_some(),
        "Lanes resolved"
    );

    Resolution {
        active,
        suppressed,
        deferred_air_quality,
        humidifiers,
        humidifier_requests,
        memory,
        issues: unconfigured_lanes(inputs.config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_test_clock, make_test_config, make_test_snapshot};

    const CONFIG: &str = r#"
telemetry:
  - entity_id: sensor.kitchen_humidity
    sensor_type: humidity
    level: level1
    room: Kitchen
  - entity_id: sensor.lounge_humidity
    sensor_type: humidity
    level: level1
    room: Lounge
  - entity_id: sensor.kitchen_co
    sensor_type: co
    level: level1
  - entity_id: sensor.lounge_pm25
    sensor_type: pm25
    level: level1
zones:
  zone1:
    enabled: true
    rooms: [Kitchen]
    outputs: [fan.kitchen]
    triggers: [humidity_high]
  zone2:
    enabled: true
    triggers: [mould_risk]
aq:
  level1:
    enabled: true
    outputs: [fan.purifier]
    triggers: [pm25_high]
humidifiers:
  level1:
    enabled: true
    outputs: [humidifier.lounge]
"#;

    fn resolve_states(states: &[(&str, &str)], memory: &LaneMemory) -> Resolution {
        let config = make_test_config(CONFIG);
        let clock = make_test_clock(8, 0);
        let snapshot = make_test_snapshot(&config, states, clock.now);
        let inputs = LaneInputs {
            config: &config,
            snapshot: &snapshot,
            clock,
        };
        resolve(&inputs, memory)
    }

    #[test]
    fn test_normal_when_nothing_triggers() {
        let resolution = resolve_states(&[("sensor.kitchen_humidity", "50"), ("sensor.lounge_humidity", "50")], &LaneMemory::new());
        assert_eq!(resolution.active.lane, Lane::Normal);
        assert!(resolution.suppressed.is_empty());
        assert_eq!(resolution.humidifiers.len(), 1);
        assert!(!resolution.humidifiers[0].on);
    }

    #[test]
    fn test_co_beats_zone_and_defers_aq() {
        let resolution = resolve_states(
            &[
                ("sensor.kitchen_humidity", "80"),
                ("sensor.lounge_humidity", "50"),
                ("sensor.kitchen_co", "16"),
                ("sensor.lounge_pm25", "60"),
            ],
            &LaneMemory::new(),
        );
        assert_eq!(resolution.active.lane, Lane::CoEmergency);
        assert_eq!(resolution.suppressed, vec![Lane::Zone1, Lane::AirQuality]);
        assert!(resolution.deferred_air_quality.is_some());
        assert!(resolution.memory.co.latched);
        assert!(resolution.memory.aq_runs.is_empty());
        assert!(resolution.humidifiers.is_empty());
        assert!(resolution.humidifier_requests.is_empty());
    }

    #[test]
    fn test_aq_runs_when_nothing_above() {
        let resolution = resolve_states(
            &[("sensor.kitchen_humidity", "44"), ("sensor.lounge_humidity", "44"), ("sensor.lounge_pm25", "60")],
            &LaneMemory::new(),
        );
        assert_eq!(resolution.active.lane, Lane::AirQuality);
        assert_eq!(resolution.active.mode(), "air_quality");
        assert!(resolution.memory.aq_runs.contains_key(&hi_core::Level::Level1));
        // Humidifier track still runs under AQ
        assert!(resolution.humidifiers[0].on);
        assert!(resolution.memory.humidifier_active(hi_core::Level::Level1));
    }

    #[test]
    fn test_unconfigured_zone_reported() {
        let resolution = resolve_states(&[], &LaneMemory::new());
        assert_eq!(
            resolution.issues,
            vec![CycleIssue::UnconfiguredLane {
                lane: Lane::Zone2,
                detail: "Bathroom is enabled without outputs".to_string(),
            }]
        );
    }
}
