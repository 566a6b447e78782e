//! The engine: owns cycle state and drives one cycle at a time
//!
//! [`Engine::run_cycle`] builds the telemetry snapshot, lets
//! [`decide`](crate::cycle::decide) work out the cycle, sends the resulting
//! commands and publishes the runtime state. The engine is the only writer of
//! lane memory and of the runtime state; taking `&mut self` keeps cycles from
//! overlapping.

use hi_config::HiConfig;
use hi_core::EntityId;
use hi_telemetry::{SharedTelemetryStore, SnapshotBuilder, TelemetryHistory, TelemetrySnapshot};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::actuator::{dispatch, SharedActuator};
use crate::clock::CycleClock;
use crate::controls::{ControlSwitches, SharedControls};
use crate::cycle::{decide, CycleInputs};
use crate::error::{CycleIssue, EngineResult};
use crate::lanes::co_emergency::CoSettings;
use crate::memory::LaneMemory;
use crate::pause::PauseController;
use crate::reason::describe_outputs;
use crate::runtime_state::{RuntimePublisher, RuntimeState};

pub struct Engine {
    config: Arc<HiConfig>,
    builder: SnapshotBuilder,
    store: SharedTelemetryStore,
    actuator: SharedActuator,
    publisher: RuntimePublisher,
    pause: PauseController,
    controls: SharedControls,
    memory: LaneMemory,
    history: TelemetryHistory,
    cycle: u64,
    /// Latest snapshot, shared with the diagnostics commands
    snapshots: Arc<watch::Sender<Option<Arc<TelemetrySnapshot>>>>,
    /// Outputs covered by the fan isolation switch
    ventilation: Vec<EntityId>,
    humidifiers: Vec<EntityId>,
}

impl Engine {
    /// Build an engine; fails when the configuration is incomplete
    pub fn new(config: HiConfig, store: SharedTelemetryStore, actuator: SharedActuator) -> EngineResult<Self> {
        config.ensure_complete()?;
        let mut ventilation = config.all_fan_outputs();
        for id in CoSettings::from_config(&config).outputs {
            if !ventilation.contains(&id) {
                ventilation.push(id);
            }
        }
        let humidifiers = config.all_humidifier_outputs();
        let controls = SharedControls::new(ControlSwitches::from(config.controls));

        Ok(Self {
            builder: SnapshotBuilder::from_config(&config),
            config: Arc::new(config),
            store,
            actuator,
            publisher: RuntimePublisher::new(),
            pause: PauseController::new(),
            controls,
            memory: LaneMemory::new(),
            history: TelemetryHistory::new(),
            cycle: 0,
            snapshots: Arc::new(watch::channel(None).0),
            ventilation,
            humidifiers,
        })
    }

    pub fn config(&self) -> Arc<HiConfig> {
        self.config.clone()
    }

    pub fn publisher(&self) -> RuntimePublisher {
        self.publisher.clone()
    }

    pub fn pause_controller(&self) -> PauseController {
        self.pause.clone()
    }

    pub fn controls(&self) -> SharedControls {
        self.controls.clone()
    }

    pub fn actuator(&self) -> SharedActuator {
        self.actuator.clone()
    }

    pub fn store(&self) -> SharedTelemetryStore {
        self.store.clone()
    }

    pub fn memory(&self) -> &LaneMemory {
        &self.memory
    }

    /// Snapshot of the most recent cycle
    pub fn last_snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.snapshots.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<TelemetrySnapshot>>> {
        self.snapshots.subscribe()
    }

    /// Entities whose changes should trigger an early cycle
    pub fn sources(&self) -> BTreeSet<EntityId> {
        self.builder.sources()
    }

    /// Run one full cycle and publish its runtime state
    #[instrument(skip(self, clock), fields(cycle = self.cycle + 1))]
    pub async fn run_cycle(&mut self, clock: CycleClock) -> Arc<RuntimeState> {
        let snapshot = Arc::new(self.builder.build(&self.store, &mut self.history, clock.now));
        let pause = self.pause.current(clock.now);
        let controls = self.controls.snapshot();

        let decision = decide(CycleInputs {
            cycle: self.cycle + 1,
            config: &self.config,
            snapshot: &snapshot,
            clock,
            pause,
            controls,
            memory: &self.memory,
        });

        let mut state = decision.state;
        if let Some(mut table) = decision.table {
            let (ventilation, humidifiers) = (&self.ventilation, &self.humidifiers);
            let issues = dispatch(&mut table, self.actuator.as_ref(), |id| {
                controls.isolates(id, ventilation, humidifiers)
            })
            .await;

            let rejected: Vec<EntityId> = issues
                .iter()
                .filter_map(|issue| match issue {
                    CycleIssue::ActuatorCommandRejected { actuator, .. } => Some(actuator.clone()),
                    _ => None,
                })
                .collect();
            if !rejected.is_empty() {
                warn!(rejected = rejected.len(), "Cycle finished with rejected commands");
                state.reason = format!(
                    "{} Output command rejected for {}.",
                    state.reason,
                    describe_outputs(&snapshot, &rejected)
                );
            }
            state.issues.extend(issues);
            state.outputs = table.assignments;
            state.deferred = table.deferred;
        }

        self.memory = decision.memory;
        self.cycle += 1;
        self.snapshots.send_replace(Some(snapshot));

        info!(
            mode = %state.mode,
            active_lane = ?state.active_lane,
            outputs = state.outputs.len(),
            gate_blocked = state.gate.blocked,
            "Cycle complete"
        );
        self.publisher.publish(state)
    }
}
