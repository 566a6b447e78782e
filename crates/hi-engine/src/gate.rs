//! Global gate: time window and presence
//!
//! The gate runs before any lane. When both a window and presence are
//! configured it blocks only while the house is away *and* the time is
//! outside the window; with just one of them configured, that one decides.
//! An `ignore` outside action never blocks.

use chrono::NaiveTime;
use hi_config::{HiConfig, OutsideAction, PresenceDefault, PresenceGateConfig, TimeWindow};
use hi_telemetry::TelemetrySnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregate presence of the house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Present,
    Away,
}

/// Presence as evaluated for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceVerdict {
    pub status: PresenceStatus,
    /// Set when no entity gave a usable answer and the default was applied
    pub assumed: Option<PresenceDefault>,
    /// "Name=state" pairs for reason text
    pub detail: String,
}

/// Outcome of the gate for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub blocked: bool,
    pub action: OutsideAction,
    pub window: Option<TimeWindow>,
    pub in_window: Option<bool>,
    pub presence: Option<PresenceVerdict>,
    /// Why the gate blocked; `None` while open
    pub reason: Option<String>,
}

impl GateVerdict {
    pub fn open(action: OutsideAction) -> Self {
        Self {
            blocked: false,
            action,
            window: None,
            in_window: None,
            presence: None,
            reason: None,
        }
    }

    /// Ambiguity note, present whenever the presence default was used
    pub fn ambiguity_note(&self) -> Option<String> {
        let assumed = self.presence.as_ref()?.assumed?;
        let word = match assumed {
            PresenceDefault::Present => "present",
            PresenceDefault::Away => "away",
        };
        Some(format!(
            "Presence could not be determined (no presence entity reported a recognised state); assuming {}.",
            word
        ))
    }
}

fn state_in(state: &str, set: &[String]) -> bool {
    set.iter().any(|s| s.eq_ignore_ascii_case(state.trim()))
}

/// Aggregate the presence entities
///
/// Any entity in a present state makes the house present. Otherwise the house
/// is away when every reporting entity is in an away state, or when no away
/// states are configured at all. Anything else is ambiguous and falls back to
/// `default`.
pub fn evaluate_presence(
    gate: &PresenceGateConfig,
    snapshot: &TelemetrySnapshot,
    default: PresenceDefault,
) -> PresenceVerdict {
    let states: Vec<(String, Option<&str>)> = gate
        .entities
        .iter()
        .map(|id| (snapshot.display_name(id), snapshot.state_of(id)))
        .collect();

    let detail = states
        .iter()
        .map(|(name, state)| format!("{}={}", name, state.unwrap_or("unavailable")))
        .collect::<Vec<_>>()
        .join(", ");

    let reported: Vec<&str> = states.iter().filter_map(|(_, s)| *s).collect();

    let decided = if reported.iter().any(|s| state_in(s, &gate.present_states)) {
        Some(PresenceStatus::Present)
    } else if reported.is_empty() {
        None
    } else if gate.away_states.is_empty() || reported.iter().all(|s| state_in(s, &gate.away_states)) {
        Some(PresenceStatus::Away)
    } else {
        None
    };

    match decided {
        Some(status) => PresenceVerdict {
            status,
            assumed: None,
            detail,
        },
        None => PresenceVerdict {
            status: match default {
                PresenceDefault::Present => PresenceStatus::Present,
                PresenceDefault::Away => PresenceStatus::Away,
            },
            assumed: Some(default),
            detail,
        },
    }
}

/// Evaluate the gate at a house-local time
pub fn evaluate_gate(config: &HiConfig, snapshot: &TelemetrySnapshot, local: NaiveTime) -> GateVerdict {
    let action = config.time_gate.outside_action;
    let window = config.time_gate.window();
    let in_window = window.map(|w| w.contains(local));
    let presence = config
        .presence_gate
        .is_active()
        .then(|| evaluate_presence(&config.presence_gate, snapshot, config.engine.default_presence));

    let outside = in_window == Some(false);
    let away = presence.as_ref().map(|p| p.status == PresenceStatus::Away);

    let blocked = action != OutsideAction::Ignore
        && match (in_window.is_some(), away) {
            (true, Some(away)) => outside && away,
            (true, None) => outside,
            (false, Some(away)) => away,
            (false, None) => false,
        };

    let reason = blocked.then(|| {
        let mut parts = Vec::new();
        if let (Some(w), true) = (window, outside) {
            parts.push(format!("outside window {}", w.describe()));
        }
        if let Some(p) = presence.as_ref().filter(|p| p.status == PresenceStatus::Away) {
            parts.push(format!("presence is away ({})", p.detail));
        }
        let consequence = match action {
            OutsideAction::HoldOutputs => "No output changes were applied.",
            _ => "Outputs were moved to a safe state.",
        };
        format!(
            "Global gate is blocking automation: {}. {}",
            parts.join(" and "),
            consequence
        )
    });

    debug!(
        blocked,
        action = action.as_str(),
        in_window = ?in_window,
        away = ?away,
        "Gate evaluated"
    );

    GateVerdict {
        blocked,
        action,
        window,
        in_window,
        presence,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hi_core::EntityId;
    use std::collections::BTreeMap;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn make_test_snapshot(presence: &[(&str, Option<&str>)]) -> TelemetrySnapshot {
        TelemetrySnapshot {
            taken_at: Utc.with_ymd_and_hms(2025, 1, 10, 2, 0, 0).unwrap(),
            readings: vec![],
            presence: presence
                .iter()
                .map(|(id, state)| hi_telemetry::PresenceReading {
                    entity_id: id.parse().unwrap(),
                    state: state.map(str::to_string),
                })
                .collect(),
            watched: BTreeMap::new(),
            rooms: vec![],
            house_humidity: None,
            humidity_mean_7d: None,
            humidity_drift: None,
            temperature_slopes: BTreeMap::new(),
            display_names: BTreeMap::new(),
        }
    }

    fn make_test_config(window: bool, presence: bool, action: &str) -> HiConfig {
        let mut yaml = format!("time_gate:\n  enabled: {}\n  start: \"06:00\"\n  end: \"23:30\"\n  outside_action: {}\n", window, action);
        if presence {
            yaml.push_str(
                "presence_gate:\n  enabled: true\n  entities: [person.alex, person.sam]\n  present_states: [home]\n  away_states: [not_home]\n",
            );
        }
        HiConfig::from_yaml_str(&yaml).unwrap()
    }

    #[test]
    fn test_blocks_when_outside_and_away() {
        let config = make_test_config(true, true, "force_safe_state");
        let snapshot = make_test_snapshot(&[("person.alex", Some("not_home")), ("person.sam", Some("not_home"))]);
        let verdict = evaluate_gate(&config, &snapshot, t(2, 0));

        assert!(verdict.blocked);
        let reason = verdict.reason.unwrap();
        assert!(reason.contains("outside window"), "{}", reason);
        assert!(reason.contains("away"), "{}", reason);
        assert!(reason.contains("person.alex=not_home"), "{}", reason);
    }

    #[test]
    fn test_both_configured_needs_both() {
        let config = make_test_config(true, true, "force_safe_state");
        let away = make_test_snapshot(&[("person.alex", Some("not_home"))]);
        let home = make_test_snapshot(&[("person.alex", Some("home"))]);

        // Inside the window while away
        assert!(!evaluate_gate(&config, &away, t(12, 0)).blocked);
        // Outside the window while someone is home
        assert!(!evaluate_gate(&config, &home, t(2, 0)).blocked);
    }

    #[test]
    fn test_single_condition_decides_alone() {
        let window_only = make_test_config(true, false, "hold_outputs");
        let snapshot = make_test_snapshot(&[]);
        let verdict = evaluate_gate(&window_only, &snapshot, t(23, 45));
        assert!(verdict.blocked);
        assert!(verdict.reason.unwrap().contains("No output changes"));
        assert!(!evaluate_gate(&window_only, &snapshot, t(23, 30)).blocked);

        let presence_only = make_test_config(false, true, "force_safe_state");
        let away = make_test_snapshot(&[("person.alex", Some("not_home")), ("person.sam", Some("not_home"))]);
        assert!(evaluate_gate(&presence_only, &away, t(12, 0)).blocked);
    }

    #[test]
    fn test_ignore_never_blocks() {
        let config = make_test_config(true, true, "ignore");
        let snapshot = make_test_snapshot(&[("person.alex", Some("not_home"))]);
        let verdict = evaluate_gate(&config, &snapshot, t(2, 0));
        assert!(!verdict.blocked);
        assert_eq!(verdict.reason, None);
        assert_eq!(verdict.in_window, Some(false));
    }

    #[test]
    fn test_ambiguous_presence_uses_default() {
        let config = make_test_config(false, true, "force_safe_state");
        let snapshot = make_test_snapshot(&[("person.alex", None), ("person.sam", None)]);
        let verdict = evaluate_gate(&config, &snapshot, t(2, 0));
        assert!(!verdict.blocked);
        assert!(verdict.ambiguity_note().unwrap().contains("assuming present"));

        let mut away_default = config.clone();
        away_default.engine.default_presence = PresenceDefault::Away;
        let verdict = evaluate_gate(&away_default, &snapshot, t(2, 0));
        assert!(verdict.blocked);
        assert!(verdict.ambiguity_note().is_some());
    }

    #[test]
    fn test_unrecognised_state_is_ambiguous() {
        let gate = PresenceGateConfig {
            enabled: true,
            entities: vec!["person.alex".parse::<EntityId>().unwrap()],
            present_states: vec!["home".into()],
            away_states: vec!["not_home".into()],
        };
        let snapshot = make_test_snapshot(&[("person.alex", Some("Work"))]);
        let verdict = evaluate_presence(&gate, &snapshot, PresenceDefault::Present);
        assert_eq!(verdict.status, PresenceStatus::Present);
        assert_eq!(verdict.assumed, Some(PresenceDefault::Present));

        let snapshot = make_test_snapshot(&[("person.alex", Some("HOME"))]);
        let verdict = evaluate_presence(&gate, &snapshot, PresenceDefault::Away);
        assert_eq!(verdict.status, PresenceStatus::Present);
        assert_eq!(verdict.assumed, None);
    }
}
