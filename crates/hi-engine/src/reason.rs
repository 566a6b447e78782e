//! Human-readable reason text

use hi_core::EntityId;
use hi_telemetry::TelemetrySnapshot;

use crate::controls::ControlSwitches;
use crate::lanes::humidifier::HumidifierDecision;
use crate::lanes::{LaneDetail, LaneOutcome};

pub const CO_EMERGENCY_REASON: &str =
    "CO emergency protection is active, so all configured ventilation outputs are forced to 100%.";
pub const CONTROL_DISABLED_REASON: &str = "System control is disabled, so all automation lanes are idle.";
pub const MANUAL_OVERRIDE_REASON: &str = "Manual override is enabled, so HI automation is standing down.";
pub const FAN_ISOLATION_NOTICE: &str = "Fan outputs are isolated for testing (service calls suppressed).";
pub const HUMIDIFIER_ISOLATION_NOTICE: &str =
    "Humidifier outputs are isolated for testing (service calls suppressed).";

/// Display names joined for a sentence
pub fn describe_outputs(snapshot: &TelemetrySnapshot, outputs: &[EntityId]) -> String {
    if outputs.is_empty() {
        return "no outputs configured".to_string();
    }
    outputs
        .iter()
        .map(|id| snapshot.display_name(id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn trigger_summary(triggers: &[String]) -> String {
    if triggers.is_empty() {
        "configured trigger condition met".to_string()
    } else {
        triggers.join("; ")
    }
}

fn humidifier_reason(snapshot: &TelemetrySnapshot, decisions: &[&HumidifierDecision]) -> String {
    decisions
        .iter()
        .map(|d| {
            let outputs = describe_outputs(snapshot, &d.outputs);
            let level = d.level.display_name();
            match d.humidity {
                Some(humidity) => format!(
                    "{} humidifier is active on {}. Humidity is {:.1}% (target band {:.1}% - {:.1}%, off threshold {:.1}%).",
                    level, outputs, humidity, d.band.low, d.band.high, d.band.recovery_off
                ),
                None => format!("{} humidifier is active on {}.", level, outputs),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reason for the active lane
pub fn lane_reason(
    active: &LaneOutcome,
    humidifiers: &[HumidifierDecision],
    snapshot: &TelemetrySnapshot,
) -> String {
    match &active.detail {
        LaneDetail::CoEmergency { .. } => CO_EMERGENCY_REASON.to_string(),
        LaneDetail::Alert { labels, .. } => format!(
            "Alert response is active ({}). All other lanes are paused until the alert clears.",
            labels.join("; ")
        ),
        LaneDetail::Zone {
            label,
            output_level,
            outputs,
            triggers,
            ..
        } => format!(
            "{} is active at {} on {}. Trigger detail: {}.",
            label,
            output_level.label(),
            describe_outputs(snapshot, outputs),
            trigger_summary(triggers)
        ),
        LaneDetail::AirQuality { levels } => levels
            .iter()
            .map(|l| {
                format!(
                    "{} AQ is active at {} on {}. Trigger detail: {}.",
                    l.level.display_name(),
                    l.output_level.label(),
                    describe_outputs(snapshot, &l.outputs),
                    trigger_summary(&l.triggers)
                )
            })
            .collect::<Vec<_>>()
            .join(" "),
        LaneDetail::Normal => {
            let running: Vec<&HumidifierDecision> = humidifiers.iter().filter(|d| d.on).collect();
            if !running.is_empty() {
                humidifier_reason(snapshot, &running)
            } else if let Some(humidity) = snapshot.house_humidity {
                format!(
                    "System is armed and monitoring telemetry. Current house humidity is {:.1}% and no lane currently needs to run.",
                    humidity
                )
            } else {
                "System is armed and monitoring telemetry. No automation lane currently needs to run.".to_string()
            }
        }
    }
}

/// Pause reason with the time left, if bounded
pub fn pause_reason(remaining_minutes: Option<i64>) -> String {
    match remaining_minutes {
        Some(minutes) => format!(
            "Automation is paused ({} min remaining); no output commands are sent.",
            minutes.max(1)
        ),
        None => "Automation is paused until resumed; no output commands are sent.".to_string(),
    }
}

/// Append isolation notices for the active switches
pub fn with_isolation_notice(reason: String, controls: &ControlSwitches) -> String {
    let mut notices = Vec::new();
    if controls.isolate_fan_outputs {
        notices.push(FAN_ISOLATION_NOTICE);
    }
    if controls.isolate_humidifier_outputs {
        notices.push(HUMIDIFIER_ISOLATION_NOTICE);
    }
    if notices.is_empty() {
        reason
    } else {
        format!("{} {}", reason, notices.join(" "))
    }
}
