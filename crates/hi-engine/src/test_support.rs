//! Helpers shared by unit tests

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hi_config::HiConfig;
use hi_telemetry::{SnapshotBuilder, TelemetryHistory, TelemetrySnapshot, TelemetryStore};

use crate::clock::CycleClock;

/// Winter morning; the seasonal band is 45-55 %
pub fn make_test_clock(hour: u32, minute: u32) -> CycleClock {
    let local = NaiveDate::from_ymd_opt(2025, 1, 15)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap();
    CycleClock::new(Utc.from_utc_datetime(&local), local)
}

pub fn make_test_config(yaml: &str) -> HiConfig {
    HiConfig::from_yaml_str(yaml).unwrap()
}

/// Snapshot built through the real store and builder
pub fn make_test_snapshot(config: &HiConfig, states: &[(&str, &str)], now: DateTime<Utc>) -> TelemetrySnapshot {
    let store = TelemetryStore::new();
    for (entity, state) in states {
        store.set(entity.parse().unwrap(), *state, None, now);
    }
    let mut history = TelemetryHistory::new();
    SnapshotBuilder::from_config(config).build(&store, &mut history, now)
}
