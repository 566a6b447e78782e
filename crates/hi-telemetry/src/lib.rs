//! Telemetry for Humidity Intelligence
//!
//! - [`TelemetryStore`]: last-known raw state per entity, with change notifications
//! - [`SnapshotBuilder`] / [`TelemetrySnapshot`]: the immutable per-cycle view
//! - [`physics`]: dew point, condensation and mould tiers, seasonal targets
//! - [`TelemetryHistory`]: rolling 7-day humidity mean and temperature slopes

mod history;
pub mod physics;
mod snapshot;
mod store;

pub use history::{HumidityHistory, SlopeTracker, TelemetryHistory};
pub use snapshot::{
    Availability, PresenceReading, RoomMetrics, SensorReading, SnapshotBuilder, TelemetrySnapshot,
};
pub use store::{SharedTelemetryStore, TelemetryChange, TelemetryState, TelemetryStore};
