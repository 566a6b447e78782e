//! Configuration for Humidity Intelligence
//!
//! The engine reads one YAML document (`humidity_intelligence.yaml`) from its
//! config directory. Two custom tags are supported:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR [fallback]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use hi_config::HiConfig;
//!
//! // Parse, clamp to bounds, and refuse incomplete mappings
//! let config = HiConfig::load("/config")?;
//! ```

mod engine_config;
mod error;
mod lanes;
mod loader;
mod validate;

pub use engine_config::{
    parse_time, ControlDefaults, EngineSettings, HiConfig, OutsideAction, PresenceDefault,
    PresenceGateConfig, TelemetryMapping, TimeGateConfig, TimeWindow, CONFIG_FILE,
};
pub use error::{ConfigError, ConfigResult};
pub use lanes::{
    AlertConfig, AlertTrigger, AqLevelConfig, AqThresholds, AqTrigger, FlashMode,
    HumidifierConfig, ZoneConfig, ZoneKey, ZoneThresholds, ZoneTrigger, MAX_ALERTS,
    UI_LABEL_MAX_CHARS,
};
pub use loader::{load_yaml, YamlLoader};
pub use validate::{PAUSE_MINUTES_BOUNDS, RUN_DURATION_BOUNDS};
