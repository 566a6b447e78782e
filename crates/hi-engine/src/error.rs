//! Engine errors and per-cycle issues

use hi_core::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lane::Lane;

/// Errors that stop the engine from being built or a command from running
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] hi_config::ConfigError),

    #[error("failed to write diagnostics to {path}: {source}")]
    DiagnosticsWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize diagnostics: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Problems found during one cycle
///
/// None of these abort the cycle. They are carried in that cycle's runtime
/// state and, where they change behaviour, mentioned in its reason text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleIssue {
    /// A mapped sensor was excluded from metrics
    StaleTelemetry {
        entity_id: EntityId,
        availability: hi_telemetry::Availability,
    },

    /// Every presence entity was unavailable; the default presence was used
    AmbiguousPresence { assumed: hi_config::PresenceDefault },

    /// A lane is enabled but can never trigger
    UnconfiguredLane { lane: Lane, detail: String },

    /// An actuator refused a command
    ActuatorCommandRejected { actuator: EntityId, error: String },
}
