//! State carried by lanes from one cycle to the next
//!
//! Lane evaluation is a pure function of the snapshot, the configuration and
//! the previous [`LaneMemory`]; it returns the next memory instead of
//! mutating shared state.

use chrono::{DateTime, Utc};
use hi_core::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CO emergency latch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoLatch {
    pub latched: bool,
    /// When every CO reading first dropped below the clear threshold
    pub below_since: Option<DateTime<Utc>>,
}

/// One air-quality run window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AqRun {
    pub started_at: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl AqRun {
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}

/// Everything lanes remember between cycles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneMemory {
    pub co: CoLatch,
    pub aq_runs: BTreeMap<Level, AqRun>,
    /// Whether each level's triggers held last cycle
    pub aq_triggered: BTreeMap<Level, bool>,
    pub humidifier_on: BTreeMap<Level, bool>,
    /// Last flash per alert slot
    pub alert_flashed_at: BTreeMap<usize, DateTime<Utc>>,
}

impl LaneMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_air_quality(&mut self) {
        self.aq_runs.clear();
        self.aq_triggered.clear();
    }

    pub fn clear_humidifiers(&mut self) {
        self.humidifier_on.clear();
    }

    /// Forget everything a safe state resets; the CO latch survives
    pub fn reset_to_idle(&mut self) {
        self.clear_air_quality();
        self.clear_humidifiers();
    }

    pub fn humidifier_active(&self, level: Level) -> bool {
        self.humidifier_on.get(&level).copied().unwrap_or(false)
    }
}
