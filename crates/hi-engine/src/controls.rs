//! Control switches
//!
//! Four operator switches that sit outside the lane logic: a master enable,
//! a manual override, and two isolation switches that keep the engine
//! deciding while suppressing commands to one class of actuator.

use hi_config::ControlDefaults;
use hi_core::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSwitch {
    Enabled,
    ManualOverride,
    IsolateFanOutputs,
    IsolateHumidifierOutputs,
}

impl ControlSwitch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlSwitch::Enabled => "enabled",
            ControlSwitch::ManualOverride => "manual_override",
            ControlSwitch::IsolateFanOutputs => "isolate_fan_outputs",
            ControlSwitch::IsolateHumidifierOutputs => "isolate_humidifier_outputs",
        }
    }
}

impl fmt::Display for ControlSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlSwitch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "enabled" => Ok(ControlSwitch::Enabled),
            "manual_override" => Ok(ControlSwitch::ManualOverride),
            "isolate_fan_outputs" => Ok(ControlSwitch::IsolateFanOutputs),
            "isolate_humidifier_outputs" => Ok(ControlSwitch::IsolateHumidifierOutputs),
            other => Err(format!("unknown control switch '{}'", other)),
        }
    }
}

/// Values of the four switches at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSwitches {
    pub enabled: bool,
    pub manual_override: bool,
    pub isolate_fan_outputs: bool,
    pub isolate_humidifier_outputs: bool,
}

impl Default for ControlSwitches {
    fn default() -> Self {
        ControlDefaults::default().into()
    }
}

impl From<ControlDefaults> for ControlSwitches {
    fn from(d: ControlDefaults) -> Self {
        Self {
            enabled: d.enabled,
            manual_override: d.manual_override,
            isolate_fan_outputs: d.isolate_fan_outputs,
            isolate_humidifier_outputs: d.isolate_humidifier_outputs,
        }
    }
}

impl ControlSwitches {
    pub fn get(&self, switch: ControlSwitch) -> bool {
        match switch {
            ControlSwitch::Enabled => self.enabled,
            ControlSwitch::ManualOverride => self.manual_override,
            ControlSwitch::IsolateFanOutputs => self.isolate_fan_outputs,
            ControlSwitch::IsolateHumidifierOutputs => self.isolate_humidifier_outputs,
        }
    }

    fn slot(&mut self, switch: ControlSwitch) -> &mut bool {
        match switch {
            ControlSwitch::Enabled => &mut self.enabled,
            ControlSwitch::ManualOverride => &mut self.manual_override,
            ControlSwitch::IsolateFanOutputs => &mut self.isolate_fan_outputs,
            ControlSwitch::IsolateHumidifierOutputs => &mut self.isolate_humidifier_outputs,
        }
    }

    /// Whether commands to this actuator are currently suppressed
    ///
    /// Isolation covers the configured ventilation and humidifier outputs
    /// only; alert lights and their power plugs are never isolated.
    pub fn isolates(&self, actuator: &EntityId, ventilation: &[EntityId], humidifiers: &[EntityId]) -> bool {
        (self.isolate_fan_outputs && ventilation.contains(actuator))
            || (self.isolate_humidifier_outputs && humidifiers.contains(actuator))
    }
}

/// Switches shared between the cycle runner and the command surface
#[derive(Debug, Clone, Default)]
pub struct SharedControls {
    inner: Arc<RwLock<ControlSwitches>>,
}

impl SharedControls {
    pub fn new(initial: ControlSwitches) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn snapshot(&self) -> ControlSwitches {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Set a switch; returns whether the value changed
    pub fn set(&self, switch: ControlSwitch, on: bool) -> bool {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slot = guard.slot(switch);
        let changed = *slot != on;
        *slot = on;
        if changed {
            info!(switch = %switch, on, "Control switch changed");
        }
        changed
    }
}
