//! Zone lanes (cooking and bathroom extraction)

use hi_config::{ZoneConfig, ZoneKey, ZoneTrigger};
use hi_core::{FanLevel, SensorKind};

use super::{LaneDetail, LaneInputs, LaneOutcome};
use crate::lane::Lane;
use crate::output::OutputRequest;

fn lane_for(key: ZoneKey) -> Lane {
    match key {
        ZoneKey::Zone1 => Lane::Zone1,
        ZoneKey::Zone2 => Lane::Zone2,
    }
}

/// Run level and trigger lines; the level is the highest any trigger asks for
pub fn trigger_level(inputs: &LaneInputs<'_>, zone: &ZoneConfig) -> (Option<FanLevel>, Vec<String>) {
    let snapshot = inputs.snapshot;
    let thresholds = &zone.thresholds;
    let mut selected: Option<FanLevel> = None;
    let mut details = Vec::new();

    for trigger in &zone.triggers {
        let hit = match trigger {
            ZoneTrigger::HumidityHigh => {
                let rooms = snapshot.rooms_avg(SensorKind::Humidity, &zone.rooms);
                let house = snapshot.level_avg(SensorKind::Humidity, None);
                match (rooms, house) {
                    (Some(rooms), Some(house)) if rooms - house >= thresholds.humidity_high => Some((
                        zone.output_level,
                        format!(
                            "Humidity delta {:.1}% >= threshold {}%",
                            rooms - house,
                            thresholds.humidity_high
                        ),
                    )),
                    _ => None,
                }
            }
            ZoneTrigger::AirQualityBad => snapshot
                .level_avg(SensorKind::Iaq, zone.level)
                .filter(|iaq| *iaq <= thresholds.air_quality_bad)
                .map(|iaq| {
                    (
                        zone.output_level,
                        format!("IAQ {:.1} <= threshold {}", iaq, thresholds.air_quality_bad),
                    )
                }),
            ZoneTrigger::CondensationRisk => snapshot
                .worst_spread()
                .filter(|spread| *spread <= thresholds.condensation_risk)
                .map(|spread| {
                    (
                        zone.boost_output_level,
                        format!(
                            "Dew-point spread {:.1} degC <= threshold {} degC",
                            spread, thresholds.condensation_risk
                        ),
                    )
                }),
            ZoneTrigger::MouldRisk => {
                let level = snapshot.worst_mould_level();
                (f64::from(level) >= thresholds.mould_risk).then(|| {
                    (
                        zone.boost_output_level,
                        format!("Mould risk level {} >= threshold {}", level, thresholds.mould_risk),
                    )
                })
            }
        };

        if let Some((level, detail)) = hit {
            selected = selected.max(Some(level));
            details.push(detail);
        }
    }

    (selected, details)
}

pub fn evaluate(inputs: &LaneInputs<'_>, key: ZoneKey) -> Option<LaneOutcome> {
    let zone = inputs.config.zone(key)?;
    if !zone.is_runnable() {
        return None;
    }
    let (level, triggers) = trigger_level(inputs, zone);
    let level = level?;
    let lane = lane_for(key);

    Some(LaneOutcome {
        lane,
        requests: zone
            .outputs
            .iter()
            .map(|id| OutputRequest::ventilation(id, lane, level))
            .collect(),
        detail: LaneDetail::Zone {
            key,
            label: zone.display_label(key),
            output_level: level,
            outputs: zone.outputs.clone(),
            triggers,
        },
    })
}
