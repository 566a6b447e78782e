//! Typed configuration for the engine
//!
//! Parses the whole `humidity_intelligence.yaml` document: engine timing,
//! telemetry mapping, the global gate, lane settings and the initial state of
//! the control switches. Every numeric setting has a default and is clamped
//! to its documented bounds by [`HiConfig::normalize`].

use chrono::NaiveTime;
use hi_core::{EntityId, Level, SensorKind};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::lanes::{AlertConfig, AqLevelConfig, HumidifierConfig, ZoneConfig, ZoneKey};
use crate::loader::load_yaml;

/// Default configuration file name inside the config directory
pub const CONFIG_FILE: &str = "humidity_intelligence.yaml";

/// Root configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    /// Sensor mapping; every reading the engine looks at is listed here
    #[serde(default)]
    pub telemetry: Vec<TelemetryMapping>,

    #[serde(default)]
    pub time_gate: TimeGateConfig,

    #[serde(default)]
    pub presence_gate: PresenceGateConfig,

    #[serde(default)]
    pub zones: BTreeMap<ZoneKey, ZoneConfig>,

    #[serde(default)]
    pub aq: BTreeMap<Level, AqLevelConfig>,

    #[serde(default)]
    pub humidifiers: BTreeMap<Level, HumidifierConfig>,

    #[serde(default)]
    pub alerts: Vec<AlertConfig>,

    /// Initial values of the control switches
    #[serde(default)]
    pub controls: ControlDefaults,
}

/// Engine timing and fallback behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Minutes between periodic cycles (1..=30)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Readings older than this are treated as unavailable
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: u32,

    /// Presence assumed when every presence entity is unavailable
    #[serde(default)]
    pub default_presence: PresenceDefault,

    /// Duration used by a pause request that names none (1..=1440)
    #[serde(default = "default_pause_minutes")]
    pub default_pause_minutes: u32,

    /// Delay of the one-shot cycle after start, for slow sensors
    #[serde(default = "default_startup_recheck_seconds")]
    pub startup_recheck_seconds: u64,
}

pub(crate) fn default_interval_minutes() -> u32 {
    5
}

pub(crate) fn default_staleness_minutes() -> u32 {
    60
}

pub(crate) fn default_pause_minutes() -> u32 {
    60
}

fn default_startup_recheck_seconds() -> u64 {
    60
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            staleness_minutes: default_staleness_minutes(),
            default_presence: PresenceDefault::default(),
            default_pause_minutes: default_pause_minutes(),
            startup_recheck_seconds: default_startup_recheck_seconds(),
        }
    }
}

/// Fallback for ambiguous presence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceDefault {
    #[default]
    Present,
    Away,
}

/// One mapped sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMapping {
    pub entity_id: EntityId,
    pub sensor_type: SensorKind,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub room: Option<String>,
}

/// What a blocked gate does to the outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutsideAction {
    /// Gate never blocks
    #[serde(alias = "no_action")]
    Ignore,
    /// Keep whatever the outputs are doing; send nothing
    #[serde(alias = "pause")]
    HoldOutputs,
    /// Request the idle baseline on every output
    #[default]
    #[serde(alias = "safe_state")]
    ForceSafeState,
}

impl OutsideAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutsideAction::Ignore => "ignore",
            OutsideAction::HoldOutputs => "hold_outputs",
            OutsideAction::ForceSafeState => "force_safe_state",
        }
    }
}

/// Time window section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeGateConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, deserialize_with = "deserialize_time")]
    pub start: Option<NaiveTime>,

    #[serde(default, deserialize_with = "deserialize_time")]
    pub end: Option<NaiveTime>,

    #[serde(default)]
    pub outside_action: OutsideAction,
}

impl TimeGateConfig {
    /// The configured window, if the gate is enabled and both bounds parse
    pub fn window(&self) -> Option<TimeWindow> {
        match (self.enabled, self.start, self.end) {
            (true, Some(start), Some(end)) => Some(TimeWindow { start, end }),
            _ => None,
        }
    }
}

/// Presence section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresenceGateConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub entities: Vec<EntityId>,
    #[serde(default)]
    pub present_states: Vec<String>,
    #[serde(default)]
    pub away_states: Vec<String>,
}

impl PresenceGateConfig {
    /// Presence takes part in gating only when it has something to look at
    pub fn is_active(&self) -> bool {
        self.enabled && !self.entities.is_empty() && !self.present_states.is_empty()
    }
}

/// Inclusive daily window; `start > end` wraps past midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }

    pub fn describe(&self) -> String {
        format!("{} - {}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Initial values of the four control switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDefaults {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub manual_override: bool,
    #[serde(default)]
    pub isolate_fan_outputs: bool,
    #[serde(default)]
    pub isolate_humidifier_outputs: bool,
}

impl Default for ControlDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            manual_override: false,
            isolate_fan_outputs: false,
            isolate_humidifier_outputs: false,
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}

/// Accepts "HH:MM" or "HH:MM:SS"; anything else becomes `None`
fn deserialize_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|v| match v {
        Value::String(s) => parse_time(&s),
        _ => None,
    }))
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

impl HiConfig {
    /// Load, normalize and check the configuration in `config_dir`
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_file(config_dir, CONFIG_FILE)
    }

    pub fn load_file(config_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(config_dir.as_ref(), file)?;
        let mut config = Self::from_yaml(yaml)?;
        config.normalize();
        config.ensure_complete()?;
        Ok(config)
    }

    /// Parse without normalizing or checking completeness
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        if yaml.is_null() {
            return Ok(Self::default());
        }
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }
        serde_yaml::from_value(yaml).map_err(|source| ConfigError::Schema { source })
    }

    /// Parse a YAML string, then normalize; used by tests and tooling
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let yaml: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: "<string>".into(),
            source: e,
        })?;
        let mut config = Self::from_yaml(yaml)?;
        config.normalize();
        Ok(config)
    }

    pub fn zone(&self, key: ZoneKey) -> Option<&ZoneConfig> {
        self.zones.get(&key)
    }

    /// Mapped entities of one sensor kind
    pub fn sensors_of(&self, kind: SensorKind) -> impl Iterator<Item = &TelemetryMapping> {
        self.telemetry.iter().filter(move |m| m.sensor_type == kind)
    }

    /// Every fan or switch named by a zone or AQ lane, deduplicated, sorted
    pub fn all_fan_outputs(&self) -> Vec<EntityId> {
        let mut outputs: Vec<EntityId> = self
            .zones
            .values()
            .flat_map(|z| z.outputs.iter())
            .chain(self.aq.values().flat_map(|a| a.outputs.iter()))
            .filter(|id| id.is_ventilation())
            .cloned()
            .collect();
        outputs.sort();
        outputs.dedup();
        outputs
    }

    /// AQ outputs that no zone drives, sorted
    pub fn aq_only_outputs(&self) -> Vec<EntityId> {
        let mut outputs: Vec<EntityId> = self
            .aq
            .values()
            .flat_map(|a| a.outputs.iter())
            .filter(|id| !self.zones.values().any(|z| z.outputs.contains(id)))
            .cloned()
            .collect();
        outputs.sort();
        outputs.dedup();
        outputs
    }

    /// Every humidifier output, deduplicated, sorted
    pub fn all_humidifier_outputs(&self) -> Vec<EntityId> {
        let mut outputs: Vec<EntityId> = self
            .humidifiers
            .values()
            .flat_map(|h| h.outputs.iter())
            .cloned()
            .collect();
        outputs.sort();
        outputs.dedup();
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::{AlertTrigger, AqTrigger, FlashMode, ZoneTrigger};
    use hi_core::FanLevel;

    const SAMPLE: &str = r#"
engine:
  interval_minutes: 10
telemetry:
  - entity_id: sensor.kitchen_humidity
    sensor_type: humidity
    level: level1
    room: Kitchen
  - entity_id: sensor.kitchen_temperature
    sensor_type: temperature
    level: level1
    room: Kitchen
time_gate:
  enabled: true
  start: "06:00"
  end: "23:30"
  outside_action: safe_state
presence_gate:
  enabled: true
  entities: [person.alex]
  present_states: [home]
  away_states: [not_home]
zones:
  zone1:
    enabled: true
    rooms: [Kitchen]
    outputs: [fan.kitchen_extractor]
    triggers: [humidity_high, condensation_risk]
    thresholds:
      humidity_high: 6
    output_level: 50
aq:
  level2:
    enabled: true
    outputs: [fan.purifier]
    triggers: [pm25_high]
humidifiers:
  level1:
    enabled: true
    outputs: [humidifier.lounge]
alerts:
  - trigger_type: co_emergency
    threshold: 20
    lights: [light.hallway]
    flash_mode: white
"#;

    #[test]
    fn test_parse_sample() {
        let config = HiConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.engine.interval_minutes, 10);
        assert_eq!(config.engine.staleness_minutes, 60);
        assert_eq!(config.telemetry.len(), 2);
        assert_eq!(config.time_gate.outside_action, OutsideAction::ForceSafeState);
        assert!(config.presence_gate.is_active());

        let zone1 = config.zone(ZoneKey::Zone1).unwrap();
        assert_eq!(zone1.triggers, vec![ZoneTrigger::HumidityHigh, ZoneTrigger::CondensationRisk]);
        assert_eq!(zone1.thresholds.humidity_high, 6.0);
        assert_eq!(zone1.thresholds.condensation_risk, 4.0);
        assert_eq!(zone1.output_level, FanLevel::Medium);
        assert_eq!(zone1.boost_output_level, FanLevel::High);

        let aq = &config.aq[&Level::Level2];
        assert_eq!(aq.triggers, vec![AqTrigger::Pm25High]);
        assert_eq!(aq.run_duration, 30);

        let alert = &config.alerts[0];
        assert_eq!(alert.trigger_type, AlertTrigger::CoEmergency);
        assert_eq!(alert.flash_mode, FlashMode::White);
        assert_eq!(alert.effective_threshold(), Some(20.0));
        assert!(alert.enabled);
    }

    #[test]
    fn test_outside_action_names() {
        for (text, expected) in [
            ("no_action", OutsideAction::Ignore),
            ("ignore", OutsideAction::Ignore),
            ("pause", OutsideAction::HoldOutputs),
            ("hold_outputs", OutsideAction::HoldOutputs),
            ("safe_state", OutsideAction::ForceSafeState),
            ("force_safe_state", OutsideAction::ForceSafeState),
        ] {
            let parsed: OutsideAction = serde_yaml::from_str(text).unwrap();
            assert_eq!(parsed, expected, "{}", text);
        }
    }

    #[test]
    fn test_window_contains() {
        let day = TimeWindow {
            start: parse_time("06:00").unwrap(),
            end: parse_time("23:30").unwrap(),
        };
        assert!(day.contains(parse_time("06:00").unwrap()));
        assert!(day.contains(parse_time("23:30").unwrap()));
        assert!(!day.contains(parse_time("02:00").unwrap()));

        let night = TimeWindow {
            start: parse_time("22:00").unwrap(),
            end: parse_time("06:00").unwrap(),
        };
        assert!(night.contains(parse_time("23:15").unwrap()));
        assert!(night.contains(parse_time("05:59").unwrap()));
        assert!(!night.contains(parse_time("12:00").unwrap()));
        assert_eq!(night.describe(), "22:00 - 06:00");
    }

    #[test]
    fn test_window_requires_enabled_and_bounds() {
        let mut gate = TimeGateConfig {
            enabled: true,
            start: parse_time("08:00"),
            end: None,
            outside_action: OutsideAction::HoldOutputs,
        };
        assert!(gate.window().is_none());
        gate.end = parse_time("22:00");
        assert!(gate.window().is_some());
        gate.enabled = false;
        assert!(gate.window().is_none());
    }

    #[test]
    fn test_fan_outputs_deduplicated() {
        let config = HiConfig::from_yaml_str(SAMPLE).unwrap();
        let outputs: Vec<String> = config.all_fan_outputs().iter().map(|e| e.to_string()).collect();
        assert_eq!(outputs, vec!["fan.kitchen_extractor", "fan.purifier"]);
        assert_eq!(config.all_humidifier_outputs().len(), 1);
    }

    #[test]
    fn test_aq_only_outputs_exclude_zone_outputs() {
        let config = HiConfig::from_yaml_str(
            r#"
zones:
  zone1:
    outputs: [fan.kitchen_extractor]
aq:
  level1:
    outputs: [fan.purifier, fan.kitchen_extractor]
  level2:
    outputs: [fan.purifier]
"#,
        )
        .unwrap();
        let outputs: Vec<String> = config.aq_only_outputs().iter().map(|e| e.to_string()).collect();
        assert_eq!(outputs, vec!["fan.purifier"]);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = HiConfig::from_yaml(Value::Null).unwrap();
        assert_eq!(config.engine.interval_minutes, 5);
        assert!(config.controls.enabled);
        assert!(!config.controls.manual_override);
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        let result = HiConfig::from_yaml(Value::String("nope".into()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
