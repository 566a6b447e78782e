//! Shared harness for engine scenario tests
//!
//! A [`TestHouse`] wires an [`Engine`] to a real telemetry store and a
//! recording actuator, with a clock the test moves by hand.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use hi_config::HiConfig;
use hi_core::EntityId;
use hi_engine::{CycleClock, Engine, OutputCommand, RecordingActuator, RuntimeState};
use hi_telemetry::{SharedTelemetryStore, TelemetryStore};
use std::path::Path;
use std::sync::Arc;

/// Load a fixture from `tests/fixtures/`
pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);

    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture '{}' from {:?}: {}", name, path, e))
}

pub fn load_config_fixture(name: &str) -> HiConfig {
    HiConfig::from_yaml_str(&load_fixture(name))
        .unwrap_or_else(|e| panic!("Failed to parse fixture '{}': {}", name, e))
}

pub fn id(s: &str) -> EntityId {
    s.parse().unwrap()
}

/// Engine plus the pieces a test needs to poke at
pub struct TestHouse {
    pub engine: Engine,
    pub store: SharedTelemetryStore,
    pub actuator: Arc<RecordingActuator>,
    pub now: DateTime<Utc>,
}

impl TestHouse {
    /// Winter house (January, band 45-55 %) at the given local time
    pub fn new(fixture: &str, hour: u32, minute: u32) -> Self {
        Self::with_actuator(fixture, hour, minute, RecordingActuator::new())
    }

    pub fn with_actuator(fixture: &str, hour: u32, minute: u32, actuator: RecordingActuator) -> Self {
        let store: SharedTelemetryStore = Arc::new(TelemetryStore::new());
        let actuator = Arc::new(actuator);
        let engine = Engine::new(load_config_fixture(fixture), store.clone(), actuator.clone()).unwrap();
        let local = NaiveDate::from_ymd_opt(2025, 1, 15)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap();

        Self {
            engine,
            store,
            actuator,
            now: Utc.from_utc_datetime(&local),
        }
    }

    /// Report states at the current time
    pub fn set(&self, states: &[(&str, &str)]) {
        for (entity, state) in states {
            self.store.set(id(entity), *state, None, self.now);
        }
    }

    pub fn advance(&mut self, minutes: i64) {
        self.now = self.now + Duration::minutes(minutes);
    }

    pub async fn cycle(&mut self) -> Arc<RuntimeState> {
        self.engine.run_cycle(CycleClock::at_utc(self.now)).await
    }

    /// Commands received by one actuator since the last drain
    pub fn sent_to(&self, actuator: &str) -> Vec<OutputCommand> {
        let actuator = id(actuator);
        self.actuator
            .sent()
            .into_iter()
            .filter(|(a, _)| *a == actuator)
            .map(|(_, c)| c)
            .collect()
    }
}
