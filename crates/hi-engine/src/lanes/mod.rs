//! Lane evaluators
//!
//! Each evaluator reads the cycle's [`LaneInputs`] and returns a
//! [`LaneOutcome`] when its lane wants to run. Evaluators that keep state
//! take the previous [`LaneMemory`](crate::memory::LaneMemory) part they need
//! and return the next one; none of them touch actuators.

pub mod air_quality;
pub mod alert;
pub mod co_emergency;
pub mod humidifier;
pub mod zone;

use hi_config::{HiConfig, ZoneKey};
use hi_core::{EntityId, FanLevel, Level};
use hi_telemetry::TelemetrySnapshot;
use serde::{Deserialize, Serialize};

use crate::clock::CycleClock;
use crate::lane::Lane;
use crate::output::OutputRequest;

/// Everything a lane may look at during one cycle
#[derive(Debug, Clone, Copy)]
pub struct LaneInputs<'a> {
    pub config: &'a HiConfig,
    pub snapshot: &'a TelemetrySnapshot,
    pub clock: CycleClock,
}

/// Per-level air-quality activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqLevelDetail {
    pub level: Level,
    pub output_level: FanLevel,
    pub outputs: Vec<EntityId>,
    /// Trigger lines, or the run-window note when only the window holds
    pub triggers: Vec<String>,
}

/// What a triggered lane saw, kept for reason text and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "lane", rename_all = "snake_case")]
pub enum LaneDetail {
    CoEmergency {
        peak_ppm: Option<f64>,
        start_threshold: f64,
        clear_threshold: f64,
        outputs: Vec<EntityId>,
    },
    Alert {
        labels: Vec<String>,
        /// Alert slots flashed this cycle
        flashed: Vec<usize>,
    },
    Zone {
        key: ZoneKey,
        label: String,
        output_level: FanLevel,
        outputs: Vec<EntityId>,
        triggers: Vec<String>,
    },
    AirQuality {
        levels: Vec<AqLevelDetail>,
    },
    Normal,
}

/// A lane that wants to run this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneOutcome {
    pub lane: Lane,
    pub requests: Vec<OutputRequest>,
    pub detail: LaneDetail,
}

impl LaneOutcome {
    pub fn normal() -> Self {
        Self {
            lane: Lane::Normal,
            requests: Vec::new(),
            detail: LaneDetail::Normal,
        }
    }

    /// Runtime mode name
    pub fn mode(&self) -> String {
        match &self.detail {
            LaneDetail::CoEmergency { .. } => "co_emergency".to_string(),
            LaneDetail::Alert { .. } => "alert".to_string(),
            LaneDetail::Zone { key, .. } => key.mode().to_string(),
            LaneDetail::AirQuality { .. } => "air_quality".to_string(),
            LaneDetail::Normal => "normal".to_string(),
        }
    }

    /// Runtime mode as shown on a dashboard
    pub fn display(&self) -> String {
        match &self.detail {
            LaneDetail::CoEmergency { .. } => "CO EMERGENCY".to_string(),
            LaneDetail::Alert { .. } => "ALERT".to_string(),
            LaneDetail::Zone { label, .. } => label.clone(),
            LaneDetail::AirQuality { .. } => "AIR QUALITY".to_string(),
            LaneDetail::Normal => "NORMAL".to_string(),
        }
    }
}

/// Idle baseline: every fan output to auto, and humidifiers off when asked
pub fn idle_requests(config: &HiConfig, humidifiers_off: bool) -> Vec<OutputRequest> {
    let mut requests: Vec<OutputRequest> = config
        .all_fan_outputs()
        .iter()
        .map(|id| OutputRequest::ventilation(id, Lane::Normal, FanLevel::Auto))
        .collect();
    if humidifiers_off {
        requests.extend(config.all_humidifier_outputs().into_iter().map(|id| {
            OutputRequest::new(id, Lane::Normal, crate::output::OutputCommand::Power(false))
        }));
    }
    requests
}
