//! Air-quality lane
//!
//! Each level runs independently: a trigger starts a run window of
//! `run_duration` minutes, and a level stays active until its window expires
//! with no trigger holding. A window that expires while the trigger still
//! holds starts again.

use chrono::Duration;
use hi_config::{AqLevelConfig, AqTrigger};
use hi_core::{Level, SensorKind};
use std::collections::BTreeMap;
use tracing::debug;

use super::{AqLevelDetail, LaneDetail, LaneInputs, LaneOutcome};
use crate::lane::Lane;
use crate::memory::AqRun;
use crate::output::OutputRequest;

/// Trigger line used while only the run window keeps a level active
pub const RUN_WINDOW_NOTE: &str = "AQ run window is still active from a recent trigger.";

/// Air-quality state to carry into the next cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AqState {
    pub runs: BTreeMap<Level, AqRun>,
    pub triggered: BTreeMap<Level, bool>,
}

/// Result of evaluating every level
#[derive(Debug, Clone, PartialEq)]
pub struct AqEvaluation {
    /// Present when at least one level is active
    pub outcome: Option<LaneOutcome>,
    pub next: AqState,
}

fn sensor_for(trigger: AqTrigger) -> SensorKind {
    match trigger {
        AqTrigger::IaqBad => SensorKind::Iaq,
        AqTrigger::Pm25High => SensorKind::Pm25,
        AqTrigger::VocBad => SensorKind::Voc,
        AqTrigger::Co2High => SensorKind::Co2,
        AqTrigger::CoWarning => SensorKind::Co,
    }
}

/// Trigger lines for one level; empty when nothing holds
pub fn trigger_details(inputs: &LaneInputs<'_>, level: Level, config: &AqLevelConfig) -> Vec<String> {
    config
        .triggers
        .iter()
        .filter_map(|trigger| {
            let kind = sensor_for(*trigger);
            let value = inputs.snapshot.level_avg(kind, Some(level))?;
            let threshold = config.thresholds.get(*trigger);
            // IAQ is a score where lower is worse; every other reading is a concentration
            let (hit, op) = match trigger {
                AqTrigger::IaqBad => (value <= threshold, "<="),
                _ => (value >= threshold, ">="),
            };
            hit.then(|| format!("{} {:.1} {} threshold {}", kind.label(), value, op, threshold))
        })
        .collect()
}

pub fn evaluate(inputs: &LaneInputs<'_>, previous: &AqState) -> AqEvaluation {
    let now = inputs.clock.now;
    let mut next = AqState::default();
    let mut requests = Vec::new();
    let mut levels = Vec::new();

    for (level, config) in &inputs.config.aq {
        let level = *level;
        if !config.is_runnable() {
            continue;
        }

        let details = trigger_details(inputs, level, config);
        let triggered = !details.is_empty();
        let was_triggered = previous.triggered.get(&level).copied().unwrap_or(false);
        let running = previous.runs.get(&level).filter(|run| run.is_running(now)).copied();

        let run = match running {
            Some(run) if triggered && was_triggered => Some(run),
            _ if triggered => {
                debug!(level = %level, minutes = config.run_duration, "AQ run window started");
                Some(AqRun {
                    started_at: now,
                    until: now + Duration::minutes(i64::from(config.run_duration)),
                })
            }
            other => other,
        };

        next.triggered.insert(level, triggered);
        let Some(run) = run else {
            continue;
        };
        next.runs.insert(level, run);

        requests.extend(
            config
                .outputs
                .iter()
                .map(|id| OutputRequest::ventilation(id, Lane::AirQuality, config.output_level)),
        );
        levels.push(AqLevelDetail {
            level,
            output_level: config.output_level,
            outputs: config.outputs.clone(),
            triggers: if triggered {
                details
            } else {
                vec![RUN_WINDOW_NOTE.to_string()]
            },
        });
    }

    let outcome = (!levels.is_empty()).then(|| LaneOutcome {
        lane: Lane::AirQuality,
        requests,
        detail: LaneDetail::AirQuality { levels },
    });

    AqEvaluation { outcome, next }
}
