//! Per-cycle telemetry snapshot
//!
//! A [`TelemetrySnapshot`] is built once at the start of every cycle from the
//! store and never changes afterwards. Lanes, the gate and the diagnostics all
//! read the same snapshot, so a cycle sees one consistent set of values.

use chrono::{DateTime, Duration, Utc};
use hi_config::{HiConfig, TelemetryMapping};
use hi_core::{round1, EntityId, Level, RiskTier, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use crate::history::TelemetryHistory;
use crate::physics::{condensation_tier, dew_point, mould_level, mould_tier};
use crate::store::TelemetryStore;

/// Why a reading can or cannot be used this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    /// Last report older than the staleness threshold
    Stale,
    /// Reported, but unavailable/unknown or not numeric
    Unavailable,
    /// Never reported
    Missing,
}

/// One mapped sensor as seen by this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub entity_id: EntityId,
    pub kind: SensorKind,
    pub level: Option<Level>,
    pub room: Option<String>,
    pub value: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
    pub availability: Availability,
}

impl SensorReading {
    /// The value, only when it may feed metrics
    pub fn usable(&self) -> Option<f64> {
        match self.availability {
            Availability::Available => self.value,
            _ => None,
        }
    }
}

/// Raw state of a presence entity; `None` when missing or unavailable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceReading {
    pub entity_id: EntityId,
    pub state: Option<String>,
}

/// Derived values for one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMetrics {
    pub room: String,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub dew_point: Option<f64>,
    pub spread: Option<f64>,
    pub condensation: Option<RiskTier>,
    pub mould_level: Option<u8>,
    pub mould: Option<RiskTier>,
}

/// Immutable view of all telemetry for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub taken_at: DateTime<Utc>,
    pub readings: Vec<SensorReading>,
    pub presence: Vec<PresenceReading>,
    /// Raw states of binary entities watched by alerts
    pub watched: BTreeMap<EntityId, Option<String>>,
    pub rooms: Vec<RoomMetrics>,
    pub house_humidity: Option<f64>,
    pub humidity_mean_7d: Option<f64>,
    pub humidity_drift: Option<f64>,
    pub temperature_slopes: BTreeMap<EntityId, f64>,
    /// Display names of entities that appear in reason text
    #[serde(skip)]
    pub display_names: BTreeMap<EntityId, String>,
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(round1(values.iter().sum::<f64>() / values.len() as f64))
}

impl TelemetrySnapshot {
    /// Usable values of one kind, in mapping order
    pub fn values(&self, kind: SensorKind) -> Vec<f64> {
        self.readings
            .iter()
            .filter(|r| r.kind == kind)
            .filter_map(SensorReading::usable)
            .collect()
    }

    /// Average of one kind on a level, or house-wide for `None`
    pub fn level_avg(&self, kind: SensorKind, level: Option<Level>) -> Option<f64> {
        let values: Vec<f64> = self
            .readings
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| level.is_none() || r.level == level)
            .filter_map(SensorReading::usable)
            .collect();
        average(&values)
    }

    /// Average of one kind over the named rooms (case-insensitive)
    pub fn rooms_avg(&self, kind: SensorKind, rooms: &[String]) -> Option<f64> {
        let wanted: BTreeSet<String> = rooms.iter().map(|r| r.trim().to_lowercase()).collect();
        if wanted.is_empty() {
            return None;
        }
        let values: Vec<f64> = self
            .readings
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| {
                r.room
                    .as_ref()
                    .is_some_and(|room| wanted.contains(&room.trim().to_lowercase()))
            })
            .filter_map(SensorReading::usable)
            .collect();
        average(&values)
    }

    /// Smallest dew-point spread of any room
    pub fn worst_spread(&self) -> Option<f64> {
        self.rooms
            .iter()
            .filter_map(|r| r.spread)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Highest mould score of any room, 0 when no room has one
    pub fn worst_mould_level(&self) -> u8 {
        self.rooms.iter().filter_map(|r| r.mould_level).max().unwrap_or(0)
    }

    pub fn worst_condensation(&self) -> Option<RiskTier> {
        self.rooms.iter().filter_map(|r| r.condensation).max()
    }

    pub fn worst_mould(&self) -> Option<RiskTier> {
        self.rooms.iter().filter_map(|r| r.mould).max()
    }

    /// Raw state of a presence or watched entity
    pub fn state_of(&self, entity_id: &EntityId) -> Option<&str> {
        if let Some(state) = self.watched.get(entity_id) {
            return state.as_deref();
        }
        self.presence
            .iter()
            .find(|p| &p.entity_id == entity_id)
            .and_then(|p| p.state.as_deref())
    }

    /// Readings excluded from metrics this cycle
    pub fn unusable(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings
            .iter()
            .filter(|r| r.availability != Availability::Available)
    }

    pub fn display_name(&self, entity_id: &EntityId) -> String {
        self.display_names
            .get(entity_id)
            .cloned()
            .unwrap_or_else(|| entity_id.to_string())
    }
}

/// Builds snapshots for a fixed telemetry mapping
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    mapping: Vec<TelemetryMapping>,
    presence: Vec<EntityId>,
    watched: Vec<EntityId>,
    named: Vec<EntityId>,
    staleness: Duration,
}

impl SnapshotBuilder {
    pub fn new(mapping: Vec<TelemetryMapping>, staleness: Duration) -> Self {
        Self {
            mapping,
            presence: Vec::new(),
            watched: Vec::new(),
            named: Vec::new(),
            staleness,
        }
    }

    /// Builder covering every entity the configuration refers to
    pub fn from_config(config: &HiConfig) -> Self {
        let mut builder = Self::new(
            config.telemetry.clone(),
            Duration::minutes(i64::from(config.engine.staleness_minutes)),
        );
        builder.presence = config.presence_gate.entities.clone();
        builder.watched = config
            .alerts
            .iter()
            .filter_map(|a| a.custom_trigger.clone())
            .collect();

        let mut named: BTreeSet<EntityId> = config.all_fan_outputs().into_iter().collect();
        named.extend(config.all_humidifier_outputs());
        named.extend(config.presence_gate.entities.iter().cloned());
        for alert in &config.alerts {
            named.extend(alert.lights.iter().cloned());
            named.extend(alert.outputs.iter().cloned());
            named.extend(alert.power_entity.iter().cloned());
        }
        builder.named = named.into_iter().collect();
        builder
    }

    /// Entities whose changes should trigger an early cycle
    pub fn sources(&self) -> BTreeSet<EntityId> {
        self.mapping
            .iter()
            .map(|m| m.entity_id.clone())
            .chain(self.presence.iter().cloned())
            .chain(self.watched.iter().cloned())
            .collect()
    }

    /// Read the store, derive metrics, and feed the rolling history
    #[instrument(skip(self, store, history))]
    pub fn build(
        &self,
        store: &TelemetryStore,
        history: &mut TelemetryHistory,
        now: DateTime<Utc>,
    ) -> TelemetrySnapshot {
        let readings: Vec<SensorReading> = self
            .mapping
            .iter()
            .map(|m| self.read(store, m, now))
            .collect();

        let presence = self
            .presence
            .iter()
            .map(|id| PresenceReading {
                entity_id: id.clone(),
                state: store.get(id).filter(|s| s.is_available()).map(|s| s.state),
            })
            .collect();

        let watched = self
            .watched
            .iter()
            .map(|id| (id.clone(), store.get(id).filter(|s| s.is_available()).map(|s| s.state)))
            .collect();

        let rooms = room_metrics(&readings);

        let display_names = self
            .named
            .iter()
            .chain(self.mapping.iter().map(|m| &m.entity_id))
            .filter_map(|id| {
                store
                    .get(id)
                    .and_then(|s| s.friendly_name)
                    .map(|name| (id.clone(), name))
            })
            .collect();

        for reading in &readings {
            if let (SensorKind::Temperature, Some(value)) = (reading.kind, reading.usable()) {
                history.slopes.record(&reading.entity_id, value, now);
            }
        }

        let house_values: Vec<f64> = readings
            .iter()
            .filter(|r| r.kind == SensorKind::Humidity)
            .filter_map(SensorReading::usable)
            .collect();
        let house_humidity = average(&house_values);
        if let Some(current) = house_humidity {
            history.humidity.record(current, now);
        }
        let humidity_mean_7d = history.humidity.mean().map(round1);
        let humidity_drift = match (house_humidity, humidity_mean_7d) {
            (Some(current), Some(mean)) => Some(round1(current - mean)),
            _ => None,
        };

        let snapshot = TelemetrySnapshot {
            taken_at: now,
            readings,
            presence,
            watched,
            rooms,
            house_humidity,
            humidity_mean_7d,
            humidity_drift,
            temperature_slopes: history.slopes.slopes(),
            display_names,
        };

        debug!(
            readings = snapshot.readings.len(),
            unusable = snapshot.unusable().count(),
            house_humidity = ?snapshot.house_humidity,
            "Built telemetry snapshot"
        );
        snapshot
    }

    fn read(&self, store: &TelemetryStore, mapping: &TelemetryMapping, now: DateTime<Utc>) -> SensorReading {
        let stored = store.get(&mapping.entity_id);
        let (value, last_updated, availability) = match stored {
            None => (None, None, Availability::Missing),
            Some(state) => {
                let value = state.numeric();
                let availability = if value.is_none() {
                    Availability::Unavailable
                } else if now - state.last_updated > self.staleness {
                    Availability::Stale
                } else {
                    Availability::Available
                };
                (value, Some(state.last_updated), availability)
            }
        };

        SensorReading {
            entity_id: mapping.entity_id.clone(),
            kind: mapping.sensor_type,
            level: mapping.level,
            room: mapping.room.clone(),
            value,
            last_updated,
            availability,
        }
    }
}

/// Group humidity and temperature by room and derive dew-point metrics
///
/// A room without both a usable humidity and temperature still reports its
/// humidity; its dew-point metrics stay `None`.
fn room_metrics(readings: &[SensorReading]) -> Vec<RoomMetrics> {
    struct Acc {
        label: String,
        humidity: Vec<f64>,
        temperature: Vec<f64>,
    }

    let mut rooms: BTreeMap<String, Acc> = BTreeMap::new();
    for reading in readings {
        let Some(room) = reading.room.as_deref().map(str::trim).filter(|r| !r.is_empty()) else {
            continue;
        };
        let acc = rooms.entry(room.to_lowercase()).or_insert_with(|| Acc {
            label: room.to_string(),
            humidity: Vec::new(),
            temperature: Vec::new(),
        });
        match (reading.kind, reading.usable()) {
            (SensorKind::Humidity, Some(v)) => acc.humidity.push(v),
            (SensorKind::Temperature, Some(v)) => acc.temperature.push(v),
            _ => {}
        }
    }

    rooms
        .into_values()
        .map(|acc| {
            let humidity = average(&acc.humidity);
            let temperature = average(&acc.temperature);
            let dew = match (temperature, humidity) {
                (Some(t), Some(rh)) => dew_point(t, rh),
                _ => None,
            };
            let spread = match (temperature, dew) {
                (Some(t), Some(dp)) => Some(t - dp),
                _ => None,
            };
            let mould_score = match (humidity, spread) {
                (Some(rh), Some(s)) => Some(mould_level(rh, s)),
                _ => None,
            };
            RoomMetrics {
                room: acc.label,
                humidity,
                temperature,
                dew_point: dew,
                spread,
                condensation: spread.map(condensation_tier),
                mould_level: mould_score,
                mould: mould_score.map(mould_tier),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
    }

    fn map(entity: &str, kind: SensorKind, level: Option<Level>, room: Option<&str>) -> TelemetryMapping {
        TelemetryMapping {
            entity_id: entity.parse().unwrap(),
            sensor_type: kind,
            level,
            room: room.map(str::to_string),
        }
    }

    fn make_test_builder() -> SnapshotBuilder {
        SnapshotBuilder::new(
            vec![
                map("sensor.kitchen_humidity", SensorKind::Humidity, Some(Level::Level1), Some("Kitchen")),
                map("sensor.kitchen_temperature", SensorKind::Temperature, Some(Level::Level1), Some("Kitchen")),
                map("sensor.lounge_humidity", SensorKind::Humidity, Some(Level::Level1), Some("Lounge")),
                map("sensor.bathroom_humidity", SensorKind::Humidity, Some(Level::Level2), Some("Bathroom")),
                map("sensor.landing_iaq", SensorKind::Iaq, Some(Level::Level2), None),
            ],
            Duration::minutes(60),
        )
    }

    fn set(store: &TelemetryStore, entity: &str, state: &str, at: DateTime<Utc>) {
        store.set(entity.parse().unwrap(), state, None, at);
    }

    #[test]
    fn test_averages_and_rooms() {
        let store = TelemetryStore::new();
        set(&store, "sensor.kitchen_humidity", "70", t0());
        set(&store, "sensor.kitchen_temperature", "20", t0());
        set(&store, "sensor.lounge_humidity", "50", t0());
        set(&store, "sensor.bathroom_humidity", "61", t0());
        set(&store, "sensor.landing_iaq", "80", t0());

        let mut history = TelemetryHistory::new();
        let snapshot = make_test_builder().build(&store, &mut history, t0());

        assert_eq!(snapshot.house_humidity, Some(60.3));
        assert_eq!(snapshot.level_avg(SensorKind::Humidity, Some(Level::Level1)), Some(60.0));
        assert_eq!(snapshot.level_avg(SensorKind::Iaq, Some(Level::Level1)), None);
        assert_eq!(
            snapshot.rooms_avg(SensorKind::Humidity, &["kitchen".to_string()]),
            Some(70.0)
        );

        // Only the kitchen has a humidity+temperature pair
        assert_eq!(snapshot.rooms.len(), 3);
        let kitchen = snapshot.rooms.iter().find(|r| r.room == "Kitchen").unwrap();
        assert!(kitchen.spread.is_some());
        let lounge = snapshot.rooms.iter().find(|r| r.room == "Lounge").unwrap();
        assert_eq!(lounge.humidity, Some(50.0));
        assert_eq!(lounge.dew_point, None);
        assert_eq!(lounge.condensation, None);

        // 20 °C at 70 % leaves a spread of about 5.6 °C
        let spread = snapshot.worst_spread().unwrap();
        assert!((spread - 5.6).abs() < 0.1, "{}", spread);
        assert_eq!(snapshot.worst_condensation(), Some(RiskTier::Watch));
        assert_eq!(snapshot.worst_mould_level(), 1);
    }

    #[test]
    fn test_stale_and_missing_excluded_but_reported() {
        let store = TelemetryStore::new();
        set(&store, "sensor.kitchen_humidity", "70", t0() - Duration::minutes(61));
        set(&store, "sensor.lounge_humidity", "unavailable", t0());
        set(&store, "sensor.bathroom_humidity", "48", t0());

        let mut history = TelemetryHistory::new();
        let snapshot = make_test_builder().build(&store, &mut history, t0());

        assert_eq!(snapshot.house_humidity, Some(48.0));
        let availability: Vec<Availability> = snapshot.readings.iter().map(|r| r.availability).collect();
        assert_eq!(
            availability,
            vec![
                Availability::Stale,
                Availability::Missing,
                Availability::Unavailable,
                Availability::Available,
                Availability::Missing,
            ]
        );
        assert_eq!(snapshot.unusable().count(), 4);
        assert_eq!(snapshot.readings[0].value, Some(70.0));
    }

    #[test]
    fn test_history_drift() {
        let store = TelemetryStore::new();
        let builder = make_test_builder();
        let mut history = TelemetryHistory::new();

        set(&store, "sensor.lounge_humidity", "50", t0());
        builder.build(&store, &mut history, t0());

        let later = t0() + Duration::minutes(5);
        set(&store, "sensor.lounge_humidity", "56", later);
        let snapshot = builder.build(&store, &mut history, later);

        assert_eq!(snapshot.humidity_mean_7d, Some(53.0));
        assert_eq!(snapshot.humidity_drift, Some(3.0));
    }

    #[test]
    fn test_slopes_recorded_for_temperatures() {
        let store = TelemetryStore::new();
        set(&store, "sensor.kitchen_temperature", "20", t0());
        let mut history = TelemetryHistory::new();
        let snapshot = make_test_builder().build(&store, &mut history, t0());

        let sensor: EntityId = "sensor.kitchen_temperature".parse().unwrap();
        assert_eq!(snapshot.temperature_slopes.get(&sensor), Some(&0.0));
    }

    #[test]
    fn test_sources_cover_mapping() {
        let builder = make_test_builder();
        assert_eq!(builder.sources().len(), 5);
    }
}
