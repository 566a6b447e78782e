//! Humidity Intelligence rule engine
//!
//! One cycle runs a fixed pipeline over an immutable telemetry snapshot:
//!
//! - [`pause`]: a paused engine publishes state and sends nothing
//! - [`controls`]: the enable, manual-override and isolation switches
//! - [`gate`]: time window plus presence, with the configured outside action
//! - [`resolver`]: picks the single active [`Lane`] by fixed precedence
//! - [`arbiter`]: one assignment per actuator, higher lanes win
//! - [`actuator`]: fire-and-forget command dispatch behind a trait
//! - [`runtime_state`]: the published [`RuntimeState`]
//!
//! [`Engine`] owns the state carried between cycles and drives them.

pub mod actuator;
pub mod arbiter;
pub mod clock;
pub mod controls;
pub mod cycle;
pub mod diagnostics;
mod engine;
mod error;
pub mod gate;
mod lane;
pub mod lanes;
pub mod memory;
pub mod output;
pub mod pause;
pub mod reason;
pub mod resolver;
pub mod runtime_state;

#[cfg(test)]
mod test_support;

pub use actuator::{Actuator, ActuatorError, RecordingActuator, SharedActuator};
pub use arbiter::{Arbitration, DeferredRequest, DispatchStatus, OutputAssignment};
pub use clock::CycleClock;
pub use controls::{ControlSwitch, ControlSwitches, SharedControls};
pub use diagnostics::{self_check, DiagnosticsDump, SelfCheckReport, DEFAULT_DIAGNOSTICS_FILE};
pub use engine::Engine;
pub use error::{CycleIssue, EngineError, EngineResult};
pub use lane::Lane;
pub use output::{OutputCommand, OutputRequest};
pub use pause::{PauseController, PauseState};
pub use runtime_state::{GateSummary, RuntimeMetrics, RuntimePublisher, RuntimeState};
