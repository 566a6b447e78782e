//! Bounds clamping and completeness checks

use hi_core::SensorKind;
use std::collections::HashSet;
use tracing::warn;

use crate::engine_config::HiConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::lanes::{AlertTrigger, ZoneTrigger, MAX_ALERTS};

pub const INTERVAL_MINUTES_BOUNDS: (u32, u32) = (1, 30);
pub const PAUSE_MINUTES_BOUNDS: (u32, u32) = (1, 1440);
pub const STALENESS_MINUTES_BOUNDS: (u32, u32) = (1, 1440);
pub const RUN_DURATION_BOUNDS: (u32, u32) = (1, 1440);
pub const FLASH_DURATION_BOUNDS: (u32, u32) = (5, 120);
pub const BAND_ADJUST_BOUNDS: (f64, f64) = (-3.0, 3.0);
pub const RECOVERY_IN_BAND_BOUNDS: (f64, f64) = (1.0, 8.0);

fn clamp_u32(key: &str, value: &mut u32, (min, max): (u32, u32)) {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        warn!(key, value = *value, clamped, "Configuration value out of bounds");
        *value = clamped;
    }
}

fn clamp_f64(key: &str, value: &mut f64, (min, max): (f64, f64), default: f64) {
    let clamped = if value.is_finite() {
        value.clamp(min, max)
    } else {
        default
    };
    if clamped != *value {
        warn!(key, value = *value, clamped, "Configuration value out of bounds");
        *value = clamped;
    }
}

impl HiConfig {
    /// Clamp every tunable to its bounds and fix up dependent values
    pub fn normalize(&mut self) {
        clamp_u32(
            "engine.interval_minutes",
            &mut self.engine.interval_minutes,
            INTERVAL_MINUTES_BOUNDS,
        );
        clamp_u32(
            "engine.default_pause_minutes",
            &mut self.engine.default_pause_minutes,
            PAUSE_MINUTES_BOUNDS,
        );
        clamp_u32(
            "engine.staleness_minutes",
            &mut self.engine.staleness_minutes,
            STALENESS_MINUTES_BOUNDS,
        );

        for (key, zone) in self.zones.iter_mut() {
            let t = &mut zone.thresholds;
            clamp_f64(&format!("zones.{}.thresholds.humidity_high", key), &mut t.humidity_high, (2.0, 20.0), 5.0);
            clamp_f64(&format!("zones.{}.thresholds.air_quality_bad", key), &mut t.air_quality_bad, (50.0, 90.0), 70.0);
            clamp_f64(&format!("zones.{}.thresholds.condensation_risk", key), &mut t.condensation_risk, (2.0, 6.0), 4.0);
            clamp_f64(&format!("zones.{}.thresholds.mould_risk", key), &mut t.mould_risk, (1.0, 3.0), 2.0);
            if zone.boost_output_level < zone.output_level {
                zone.boost_output_level = zone.output_level;
            }
        }

        for (level, aq) in self.aq.iter_mut() {
            clamp_u32(&format!("aq.{}.run_duration", level), &mut aq.run_duration, RUN_DURATION_BOUNDS);
            let t = &mut aq.thresholds;
            clamp_f64(&format!("aq.{}.thresholds.iaq_bad", level), &mut t.iaq_bad, (60.0, 90.0), 75.0);
            clamp_f64(&format!("aq.{}.thresholds.pm25_high", level), &mut t.pm25_high, (12.0, 65.0), 35.0);
            clamp_f64(&format!("aq.{}.thresholds.voc_bad", level), &mut t.voc_bad, (200.0, 1000.0), 600.0);
            clamp_f64(&format!("aq.{}.thresholds.co2_high", level), &mut t.co2_high, (800.0, 2000.0), 1200.0);
            clamp_f64(&format!("aq.{}.thresholds.co_warning", level), &mut t.co_warning, (5.0, 50.0), 15.0);
        }

        for (level, humidifier) in self.humidifiers.iter_mut() {
            clamp_f64(
                &format!("humidifiers.{}.band_adjust", level),
                &mut humidifier.band_adjust,
                BAND_ADJUST_BOUNDS,
                0.0,
            );
            clamp_f64(
                &format!("humidifiers.{}.recovery_in_band", level),
                &mut humidifier.recovery_in_band,
                RECOVERY_IN_BAND_BOUNDS,
                3.0,
            );
        }

        if self.alerts.len() > MAX_ALERTS {
            warn!(
                configured = self.alerts.len(),
                max = MAX_ALERTS,
                "Too many alerts configured, extra entries ignored"
            );
            self.alerts.truncate(MAX_ALERTS);
        }
        for (idx, alert) in self.alerts.iter_mut().enumerate() {
            clamp_u32(&format!("alerts.{}.duration", idx), &mut alert.duration, FLASH_DURATION_BOUNDS);
            alert.threshold = alert.threshold.and(alert.effective_threshold());
        }
    }

    /// Mappings without which the engine cannot run
    pub fn missing_mappings(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.telemetry.is_empty() {
            missing.push("telemetry: no sensors mapped".to_string());
        } else if self.sensors_of(SensorKind::Humidity).next().is_none() {
            missing.push("telemetry: no humidity sensor mapped".to_string());
        }

        if self.time_gate.enabled && self.time_gate.window().is_none() {
            missing.push("time_gate: enabled without a valid start and end (HH:MM)".to_string());
        }

        if self.presence_gate.enabled {
            if self.presence_gate.entities.is_empty() {
                missing.push("presence_gate: enabled without entities".to_string());
            }
            if self.presence_gate.present_states.is_empty() {
                missing.push("presence_gate: enabled without present_states".to_string());
            }
        }

        for (idx, alert) in self.alerts.iter().enumerate() {
            if alert.enabled
                && alert.trigger_type == AlertTrigger::CustomBinary
                && alert.custom_trigger.is_none()
            {
                missing.push(format!("alerts.{}: custom_binary without custom_trigger", idx));
            }
        }

        missing
    }

    /// Fail with [`ConfigError::Incomplete`] if anything required is missing
    pub fn ensure_complete(&self) -> ConfigResult<()> {
        let missing = self.missing_mappings();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Incomplete { missing })
        }
    }

    /// Non-fatal findings: lanes that can never trigger, odd mappings
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        for mapping in &self.telemetry {
            if !seen.insert(&mapping.entity_id) {
                warnings.push(format!("telemetry: {} mapped more than once", mapping.entity_id));
            }
            if mapping.level.is_none() {
                warnings.push(format!(
                    "telemetry: {} has no level; it only counts toward house averages",
                    mapping.entity_id
                ));
            }
        }

        for (key, zone) in &self.zones {
            if zone.enabled && !zone.is_runnable() {
                warnings.push(format!("zones.{}: enabled without triggers or outputs", key));
            }
            if zone.enabled
                && zone.rooms.is_empty()
                && zone.triggers.contains(&ZoneTrigger::HumidityHigh)
            {
                warnings.push(format!("zones.{}: humidity_high needs rooms", key));
            }
        }
        for (level, aq) in &self.aq {
            if aq.enabled && !aq.is_runnable() {
                warnings.push(format!("aq.{}: enabled without triggers or outputs", level));
            }
        }
        for (level, humidifier) in &self.humidifiers {
            if humidifier.enabled && !humidifier.is_runnable() {
                warnings.push(format!("humidifiers.{}: enabled without outputs", level));
            }
        }
        for (idx, alert) in self.alerts.iter().enumerate() {
            if alert.enabled && alert.lights.is_empty() && alert.trigger_type != AlertTrigger::CoEmergency {
                warnings.push(format!("alerts.{}: no lights to flash", idx));
            }
        }

        warnings
    }
}
