//! Hook into the external presentation layer
//!
//! The dashboard lives outside this workspace. `refresh_ui` re-emits the
//! current runtime state and hands it to a [`PresentationHook`], which maps
//! the engine's outputs onto whatever placeholders the dashboard uses.

use async_trait::async_trait;
use hi_config::HiConfig;
use hi_engine::RuntimeState;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::registry::ServiceError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PresentationError {
    #[error("presentation layer unreachable: {0}")]
    Unreachable(String),

    #[error("entity mapping failed: {0}")]
    Mapping(String),
}

impl From<PresentationError> for ServiceError {
    fn from(err: PresentationError) -> Self {
        ServiceError::CallFailed(err.to_string())
    }
}

#[async_trait]
pub trait PresentationHook: Send + Sync {
    /// Rebuild the entity mapping; the returned value is passed back to the caller
    async fn refresh(&self, config: &HiConfig, state: &RuntimeState) -> Result<serde_json::Value, PresentationError>;
}

/// Hook that reports the entities a dashboard would bind to
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityMapHook;

#[async_trait]
impl PresentationHook for EntityMapHook {
    async fn refresh(&self, config: &HiConfig, state: &RuntimeState) -> Result<serde_json::Value, PresentationError> {
        let sensors: Vec<String> = config.telemetry.iter().map(|m| m.entity_id.to_string()).collect();
        let outputs: Vec<String> = state.outputs.keys().map(ToString::to_string).collect();
        debug!(sensors = sensors.len(), outputs = outputs.len(), "Entity map rebuilt");
        Ok(json!({
            "sensors": sensors,
            "outputs": outputs,
            "mode": state.mode,
        }))
    }
}
