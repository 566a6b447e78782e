//! Self-check and diagnostics dump

use chrono::{DateTime, Utc};
use hi_config::HiConfig;
use hi_core::EntityId;
use hi_telemetry::{Availability, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::{CycleIssue, EngineError, EngineResult};
use crate::resolver::unconfigured_lanes;
use crate::runtime_state::RuntimeState;

pub const DEFAULT_DIAGNOSTICS_FILE: &str = "humidity_intelligence_diagnostics.json";

/// Unusable sensor as reported by the self-check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorProblem {
    pub entity_id: EntityId,
    pub availability: Availability,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCheckReport {
    /// True when nothing below needs attention
    pub ok: bool,
    pub telemetry_count: usize,
    pub missing_mappings: Vec<String>,
    pub warnings: Vec<String>,
    /// Mapped sensors that never reported
    pub missing_entities: Vec<EntityId>,
    /// Mapped sensors that are stale or unavailable
    pub unusable_sensors: Vec<SensorProblem>,
    pub unconfigured_lanes: Vec<CycleIssue>,
}

/// Check configuration completeness against the latest snapshot
pub fn self_check(config: &HiConfig, snapshot: Option<&TelemetrySnapshot>) -> SelfCheckReport {
    let mut missing_entities = Vec::new();
    let mut unusable_sensors = Vec::new();

    if let Some(snapshot) = snapshot {
        for reading in snapshot.unusable() {
            if reading.availability == Availability::Missing {
                missing_entities.push(reading.entity_id.clone());
            } else {
                unusable_sensors.push(SensorProblem {
                    entity_id: reading.entity_id.clone(),
                    availability: reading.availability,
                    last_updated: reading.last_updated,
                });
            }
        }
    }

    let missing_mappings = config.missing_mappings();
    let warnings = config.warnings();
    let unconfigured = unconfigured_lanes(config);

    SelfCheckReport {
        ok: missing_mappings.is_empty()
            && missing_entities.is_empty()
            && unusable_sensors.is_empty()
            && unconfigured.is_empty(),
        telemetry_count: config.telemetry.len(),
        missing_mappings,
        warnings,
        missing_entities,
        unusable_sensors,
        unconfigured_lanes: unconfigured,
    }
}

/// Everything needed to understand what the engine is doing
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsDump<'a> {
    pub generated_at: DateTime<Utc>,
    pub version: &'static str,
    pub config: &'a HiConfig,
    pub runtime_state: &'a RuntimeState,
    pub snapshot: Option<&'a TelemetrySnapshot>,
    pub self_check: SelfCheckReport,
}

impl<'a> DiagnosticsDump<'a> {
    pub fn new(
        config: &'a HiConfig,
        runtime_state: &'a RuntimeState,
        snapshot: Option<&'a TelemetrySnapshot>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            generated_at,
            version: env!("CARGO_PKG_VERSION"),
            config,
            runtime_state,
            snapshot,
            self_check: self_check(config, snapshot),
        }
    }

    pub fn to_json(&self) -> EngineResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Write the dump as pretty JSON to `dir/filename`
    ///
    /// The content goes to `filename.tmp` first and is renamed into place, so
    /// a reader never sees a partial file.
    #[instrument(skip(self, dir))]
    pub async fn write_to(&self, dir: &Path, filename: &str) -> EngineResult<PathBuf> {
        let path = dir.join(filename);
        let temp_path = dir.join(format!("{}.tmp", filename));
        let content = serde_json::to_string_pretty(self)?;

        let written = match fs::write(&temp_path, content).await {
            Ok(()) => fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(source) = written {
            // Best effort
            let _ = fs::remove_file(&temp_path).await;
            return Err(EngineError::DiagnosticsWrite { path, source });
        }

        info!(path = %path.display(), "Diagnostics written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_test_clock, make_test_config, make_test_snapshot};

    const CONFIG: &str = r#"
telemetry:
  - entity_id: sensor.lounge_humidity
    sensor_type: humidity
    level: level1
  - entity_id: sensor.landing_humidity
    sensor_type: humidity
    level: level2
  - entity_id: sensor.kitchen_humidity
    sensor_type: humidity
    level: level1
zones:
  zone1:
    enabled: true
    triggers: [humidity_high]
"#;

    #[test]
    fn test_self_check_reports_missing_and_unusable() {
        let config = make_test_config(CONFIG);
        let clock = make_test_clock(9, 0);
        let snapshot = make_test_snapshot(
            &config,
            &[("sensor.lounge_humidity", "52"), ("sensor.landing_humidity", "unavailable")],
            clock.now,
        );

        let report = self_check(&config, Some(&snapshot));
        assert!(!report.ok);
        assert_eq!(report.telemetry_count, 3);
        assert_eq!(report.missing_entities, vec!["sensor.kitchen_humidity".parse().unwrap()]);
        assert_eq!(report.unusable_sensors.len(), 1);
        assert_eq!(report.unusable_sensors[0].availability, Availability::Unavailable);
        assert_eq!(report.unconfigured_lanes.len(), 1);
        assert!(report.missing_mappings.is_empty());
    }

    #[test]
    fn test_self_check_before_first_cycle() {
        let config = make_test_config(
            "telemetry:\n  - entity_id: sensor.lounge_humidity\n    sensor_type: humidity\n    level: level1\n",
        );
        let report = self_check(&config, None);
        assert!(report.ok);
        assert!(report.missing_entities.is_empty());
    }

    #[tokio::test]
    async fn test_dump_written_as_json() {
        let config = make_test_config(CONFIG);
        let clock = make_test_clock(9, 0);
        let snapshot = make_test_snapshot(&config, &[("sensor.lounge_humidity", "52")], clock.now);
        let state = RuntimeState::initial();
        let dump = DiagnosticsDump::new(&config, &state, Some(&snapshot), clock.now);

        let dir = tempfile::tempdir().unwrap();
        let path = dump.write_to(dir.path(), DEFAULT_DIAGNOSTICS_FILE).await.unwrap();
        assert!(!dir.path().join("humidity_intelligence_diagnostics.json.tmp").exists());
        let content = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert_eq!(value["runtime_state"]["mode"], "normal");
        assert_eq!(value["snapshot"]["house_humidity"], 52.0);
        assert_eq!(value["self_check"]["telemetry_count"], 3);
        assert!(value["config"]["zones"]["zone1"].is_object());
    }

    #[tokio::test]
    async fn test_dump_to_missing_dir_fails() {
        let config = make_test_config(CONFIG);
        let state = RuntimeState::initial();
        let dump = DiagnosticsDump::new(&config, &state, None, make_test_clock(9, 0).now);
        let err = dump
            .write_to(Path::new("/nonexistent/hi-diagnostics"), DEFAULT_DIAGNOSTICS_FILE)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DiagnosticsWrite { .. }));
    }

    #[tokio::test]
    async fn test_dump_replaces_existing_file_whole() {
        let config = make_test_config(CONFIG);
        let state = RuntimeState::initial();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hi_dump.json");
        std::fs::write(&target, "x".repeat(100_000)).unwrap();

        let dump = DiagnosticsDump::new(&config, &state, None, make_test_clock(9, 0).now);
        dump.write_to(dir.path(), "hi_dump.json").await.unwrap();

        let content = std::fs::read_to_string(&target).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["runtime_state"]["mode"], "normal");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["hi_dump.json".to_string()]);
    }
}
