//! Per-lane configuration: zones, air quality, humidifiers and alerts

use hi_core::{EntityId, FanLevel, Level};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine_config::default_true;

/// Maximum number of alert slots
pub const MAX_ALERTS: usize = 5;

/// Maximum length of a zone display label
pub const UI_LABEL_MAX_CHARS: usize = 40;

/// The two extraction zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKey {
    Zone1,
    Zone2,
}

impl ZoneKey {
    pub const ALL: [ZoneKey; 2] = [ZoneKey::Zone1, ZoneKey::Zone2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKey::Zone1 => "zone1",
            ZoneKey::Zone2 => "zone2",
        }
    }

    /// Runtime mode name reported while the zone runs
    pub fn mode(&self) -> &'static str {
        match self {
            ZoneKey::Zone1 => "cooking",
            ZoneKey::Zone2 => "bathroom",
        }
    }

    fn fallback_label(&self) -> &'static str {
        match self {
            ZoneKey::Zone1 => "Cooking",
            ZoneKey::Zone2 => "Bathroom",
        }
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTrigger {
    /// Zone rooms' humidity above the house average by at least the threshold
    HumidityHigh,
    /// Level IAQ at or below the threshold
    AirQualityBad,
    /// Worst dew-point spread at or below the threshold; runs at boost
    CondensationRisk,
    /// Worst mould level at or above the threshold; runs at boost
    MouldRisk,
}

/// Zone trigger thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    #[serde(default = "default_humidity_high")]
    pub humidity_high: f64,
    #[serde(default = "default_air_quality_bad")]
    pub air_quality_bad: f64,
    #[serde(default = "default_condensation_risk")]
    pub condensation_risk: f64,
    #[serde(default = "default_mould_risk")]
    pub mould_risk: f64,
}

fn default_humidity_high() -> f64 {
    5.0
}

fn default_air_quality_bad() -> f64 {
    70.0
}

fn default_condensation_risk() -> f64 {
    4.0
}

fn default_mould_risk() -> f64 {
    2.0
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            humidity_high: default_humidity_high(),
            air_quality_bad: default_air_quality_bad(),
            condensation_risk: default_condensation_risk(),
            mould_risk: default_mould_risk(),
        }
    }
}

/// One extraction zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub ui_label: Option<String>,

    /// Level whose IAQ feeds `air_quality_bad`; house-wide when unset
    #[serde(default)]
    pub level: Option<Level>,

    /// Room labels whose humidity feeds `humidity_high`
    #[serde(default)]
    pub rooms: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<EntityId>,

    #[serde(default)]
    pub triggers: Vec<ZoneTrigger>,

    #[serde(default)]
    pub thresholds: ZoneThresholds,

    #[serde(default = "default_zone_output_level")]
    pub output_level: FanLevel,

    #[serde(default = "default_boost_output_level")]
    pub boost_output_level: FanLevel,
}

fn default_zone_output_level() -> FanLevel {
    FanLevel::Medium
}

fn default_boost_output_level() -> FanLevel {
    FanLevel::High
}

impl ZoneConfig {
    /// A zone with no trigger or no output can never run
    pub fn is_runnable(&self) -> bool {
        self.enabled && !self.triggers.is_empty() && !self.outputs.is_empty()
    }

    /// Configured label trimmed to its maximum, else the zone's fallback
    pub fn display_label(&self, key: ZoneKey) -> String {
        match self.ui_label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.chars().take(UI_LABEL_MAX_CHARS).collect(),
            _ => key.fallback_label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqTrigger {
    IaqBad,
    Pm25High,
    VocBad,
    Co2High,
    CoWarning,
}

/// Air-quality trigger thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqThresholds {
    #[serde(default = "default_iaq_bad")]
    pub iaq_bad: f64,
    #[serde(default = "default_pm25_high")]
    pub pm25_high: f64,
    #[serde(default = "default_voc_bad")]
    pub voc_bad: f64,
    #[serde(default = "default_co2_high")]
    pub co2_high: f64,
    #[serde(default = "default_co_warning")]
    pub co_warning: f64,
}

fn default_iaq_bad() -> f64 {
    75.0
}

fn default_pm25_high() -> f64 {
    35.0
}

fn default_voc_bad() -> f64 {
    600.0
}

fn default_co2_high() -> f64 {
    1200.0
}

fn default_co_warning() -> f64 {
    15.0
}

impl Default for AqThresholds {
    fn default() -> Self {
        Self {
            iaq_bad: default_iaq_bad(),
            pm25_high: default_pm25_high(),
            voc_bad: default_voc_bad(),
            co2_high: default_co2_high(),
            co_warning: default_co_warning(),
        }
    }
}

impl AqThresholds {
    pub fn get(&self, trigger: AqTrigger) -> f64 {
        match trigger {
            AqTrigger::IaqBad => self.iaq_bad,
            AqTrigger::Pm25High => self.pm25_high,
            AqTrigger::VocBad => self.voc_bad,
            AqTrigger::Co2High => self.co2_high,
            AqTrigger::CoWarning => self.co_warning,
        }
    }
}

/// Air-quality lane for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqLevelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub outputs: Vec<EntityId>,
    #[serde(default)]
    pub triggers: Vec<AqTrigger>,
    #[serde(default)]
    pub thresholds: AqThresholds,
    #[serde(default = "default_zone_output_level")]
    pub output_level: FanLevel,
    /// Minutes a triggered level keeps running (1..=1440)
    #[serde(default = "default_run_duration")]
    pub run_duration: u32,
}

pub(crate) fn default_run_duration() -> u32 {
    30
}

impl AqLevelConfig {
    pub fn is_runnable(&self) -> bool {
        self.enabled && !self.triggers.is_empty() && !self.outputs.is_empty()
    }
}

/// Humidifier track for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumidifierConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub outputs: Vec<EntityId>,
    /// Shift applied to the seasonal band (-3..=3)
    #[serde(default)]
    pub band_adjust: f64,
    /// Points above target-low at which the humidifier switches off (1..=8)
    #[serde(default = "default_recovery_in_band")]
    pub recovery_in_band: f64,
}

pub(crate) fn default_recovery_in_band() -> f64 {
    3.0
}

impl HumidifierConfig {
    pub fn is_runnable(&self) -> bool {
        self.enabled && !self.outputs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    CondensationDanger,
    HumidityDanger,
    MouldDanger,
    CoEmergency,
    CustomBinary,
}

impl AlertTrigger {
    pub fn label(&self) -> &'static str {
        match self {
            AlertTrigger::CondensationDanger => "Condensation Danger",
            AlertTrigger::HumidityDanger => "Humidity Danger",
            AlertTrigger::MouldDanger => "Mould Danger",
            AlertTrigger::CoEmergency => "CO Emergency",
            AlertTrigger::CustomBinary => "Custom binary sensor",
        }
    }

    /// (min, max, default) for triggers that take a threshold
    pub fn threshold_bounds(&self) -> Option<(f64, f64, f64)> {
        match self {
            AlertTrigger::HumidityDanger => Some((55.0, 90.0, 75.0)),
            AlertTrigger::CoEmergency => Some((10.0, 100.0, 15.0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    #[default]
    Red,
    White,
}

impl FlashMode {
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            FlashMode::Red => (255, 0, 0),
            FlashMode::White => (255, 255, 255),
        }
    }
}

/// One alert slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub trigger_type: AlertTrigger,

    #[serde(default)]
    pub threshold: Option<f64>,

    /// Binary entity watched by `custom_binary`
    #[serde(default)]
    pub custom_trigger: Option<EntityId>,

    #[serde(default)]
    pub lights: Vec<EntityId>,

    #[serde(default)]
    pub flash_mode: FlashMode,

    /// Flash duration in seconds (5..=120)
    #[serde(default = "default_flash_duration")]
    pub duration: u32,

    /// Switched on before flashing, for lights on a smart plug
    #[serde(default)]
    pub power_entity: Option<EntityId>,

    /// Ventilation driven to 100% by a `co_emergency` alert
    #[serde(default)]
    pub outputs: Vec<EntityId>,
}

pub(crate) fn default_flash_duration() -> u32 {
    10
}

impl AlertConfig {
    /// Threshold clamped to the trigger's bounds, default when unset
    pub fn effective_threshold(&self) -> Option<f64> {
        let (min, max, default) = self.trigger_type.threshold_bounds()?;
        let value = self.threshold.filter(|v| v.is_finite()).unwrap_or(default);
        Some(value.clamp(min, max))
    }

    /// "Alert 2: Humidity Danger @ 80"
    pub fn label(&self, index: usize) -> String {
        let suffix = match (self.threshold, self.effective_threshold()) {
            (Some(_), Some(effective)) => format!(" @ {}", effective),
            _ => String::new(),
        };
        format!("Alert {}: {}{}", index + 1, self.trigger_type.label(), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(trigger_type: AlertTrigger, threshold: Option<f64>) -> AlertConfig {
        AlertConfig {
            enabled: true,
            trigger_type,
            threshold,
            custom_trigger: None,
            lights: vec![],
            flash_mode: FlashMode::Red,
            duration: 10,
            power_entity: None,
            outputs: vec![],
        }
    }

    #[test]
    fn test_alert_threshold_bounds() {
        assert_eq!(alert(AlertTrigger::HumidityDanger, None).effective_threshold(), Some(75.0));
        assert_eq!(alert(AlertTrigger::HumidityDanger, Some(95.0)).effective_threshold(), Some(90.0));
        assert_eq!(alert(AlertTrigger::CoEmergency, Some(5.0)).effective_threshold(), Some(10.0));
        assert_eq!(alert(AlertTrigger::MouldDanger, Some(5.0)).effective_threshold(), None);
    }

    #[test]
    fn test_alert_labels() {
        assert_eq!(
            alert(AlertTrigger::HumidityDanger, Some(80.0)).label(1),
            "Alert 2: Humidity Danger @ 80"
        );
        assert_eq!(alert(AlertTrigger::MouldDanger, None).label(0), "Alert 1: Mould Danger");
    }

    #[test]
    fn test_zone_labels() {
        let mut zone: ZoneConfig = serde_yaml::from_str("enabled: true").unwrap();
        assert_eq!(zone.display_label(ZoneKey::Zone1), "Cooking");
        assert_eq!(zone.display_label(ZoneKey::Zone2), "Bathroom");

        zone.ui_label = Some("  ".to_string());
        assert_eq!(zone.display_label(ZoneKey::Zone2), "Bathroom");

        zone.ui_label = Some("x".repeat(60));
        assert_eq!(zone.display_label(ZoneKey::Zone1).chars().count(), 40);
    }

    #[test]
    fn test_flash_colors() {
        assert_eq!(FlashMode::Red.rgb(), (255, 0, 0));
        assert_eq!(FlashMode::White.rgb(), (255, 255, 255));
    }

    #[test]
    fn test_runnable_requires_outputs_and_triggers() {
        let zone: ZoneConfig =
            serde_yaml::from_str("enabled: true\ntriggers: [mould_risk]\n").unwrap();
        assert!(!zone.is_runnable());
        let aq: AqLevelConfig =
            serde_yaml::from_str("enabled: true\noutputs: [fan.purifier]\ntriggers: [voc_bad]\n")
                .unwrap();
        assert!(aq.is_runnable());
    }
}
