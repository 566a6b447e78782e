//! One evaluation cycle, without side effects
//!
//! [`decide`] runs the fixed pipeline (pause, control lock, gate, resolver,
//! arbiter) over an immutable snapshot and returns the runtime state to
//! publish, the commands to send and the next lane memory. Identical inputs
//! give identical output.

use chrono::{Datelike, DateTime, Utc};
use hi_config::{HiConfig, OutsideAction};
use hi_telemetry::TelemetrySnapshot;
use tracing::{debug, instrument};

use crate::arbiter::{arbitrate, Arbitration};
use crate::clock::CycleClock;
use crate::controls::ControlSwitches;
use crate::error::CycleIssue;
use crate::gate::evaluate_gate;
use crate::lanes::{idle_requests, LaneDetail, LaneInputs};
use crate::memory::LaneMemory;
use crate::pause::PauseState;
use crate::reason::{
    lane_reason, pause_reason, with_isolation_notice, CONTROL_DISABLED_REASON, MANUAL_OVERRIDE_REASON,
};
use crate::resolver::resolve;
use crate::runtime_state::{GateSummary, RuntimeMetrics, RuntimeState};

/// Inputs of one cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs<'a> {
    pub cycle: u64,
    pub config: &'a HiConfig,
    pub snapshot: &'a TelemetrySnapshot,
    pub clock: CycleClock,
    pub pause: PauseState,
    pub controls: ControlSwitches,
    pub memory: &'a LaneMemory,
}

/// What a cycle decided
#[derive(Debug, Clone, PartialEq)]
pub struct CycleDecision {
    /// Runtime state with every assignment still pending
    pub state: RuntimeState,
    /// Commands to send; `None` when outputs are held
    pub table: Option<Arbitration>,
    pub memory: LaneMemory,
}

fn base_state(inputs: &CycleInputs<'_>) -> RuntimeState {
    let now = inputs.clock.now;
    let issues = inputs
        .snapshot
        .unusable()
        .map(|r| CycleIssue::StaleTelemetry {
            entity_id: r.entity_id.clone(),
            availability: r.availability,
        })
        .collect();

    let mut state = RuntimeState::initial();
    state.cycle = inputs.cycle;
    state.evaluated_at = Some(now);
    state.controls = inputs.controls;
    state.paused = inputs.pause.is_active(now);
    state.pause_resume_at = inputs.pause.resume_at.filter(|_| state.paused);
    state.co_emergency_active = inputs.memory.co.latched;
    state.humidifiers_active = inputs.memory.humidifier_on.clone();
    state.aq_run_until = run_until(inputs.memory, now);
    state.metrics = RuntimeMetrics::from_snapshot(inputs.snapshot, inputs.clock.local.month());
    state.issues = issues;
    state
}

fn run_until(memory: &LaneMemory, now: DateTime<Utc>) -> std::collections::BTreeMap<hi_core::Level, DateTime<Utc>> {
    memory
        .aq_runs
        .iter()
        .filter(|(_, run)| run.is_running(now))
        .map(|(level, run)| (*level, run.until))
        .collect()
}

/// Idle table and reset memory for a safe state
fn safe_state(config: &HiConfig, memory: &LaneMemory, at: DateTime<Utc>) -> (Arbitration, LaneMemory) {
    let mut table = Arbitration::new();
    table.apply_all(&idle_requests(config, true), at);
    let mut memory = memory.clone();
    memory.reset_to_idle();
    (table, memory)
}

#[instrument(skip_all, fields(cycle = inputs.cycle))]
pub fn decide(inputs: CycleInputs<'_>) -> CycleDecision {
    let now = inputs.clock.now;
    let config = inputs.config;
    let mut state = base_state(&inputs);

    if state.paused {
        state.mode = "paused".to_string();
        state.mode_display = "PAUSED".to_string();
        state.reason = with_isolation_notice(
            pause_reason(inputs.pause.remaining_minutes(now)),
            &inputs.controls,
        );
        debug!("Cycle skipped while paused");
        return CycleDecision {
            state,
            table: None,
            memory: inputs.memory.clone(),
        };
    }

    if !inputs.controls.enabled {
        let (table, memory) = safe_state(config, inputs.memory, now);
        state.reason = with_isolation_notice(CONTROL_DISABLED_REASON.to_string(), &inputs.controls);
        state.outputs_held = false;
        state.humidifiers_active = memory.humidifier_on.clone();
        state.aq_run_until.clear();
        return CycleDecision {
            state,
            table: Some(table),
            memory,
        };
    }

    if inputs.controls.manual_override {
        let mut memory = inputs.memory.clone();
        memory.reset_to_idle();
        state.reason = with_isolation_notice(MANUAL_OVERRIDE_REASON.to_string(), &inputs.controls);
        state.humidifiers_active = memory.humidifier_on.clone();
        state.aq_run_until.clear();
        return CycleDecision {
            state,
            table: None,
            memory,
        };
    }

    let verdict = evaluate_gate(config, inputs.snapshot, inputs.clock.local.time());
    state.gate = GateSummary::from(&verdict);
    let ambiguity = verdict.ambiguity_note();
    if let Some(assumed) = verdict.presence.as_ref().and_then(|p| p.assumed) {
        state.issues.push(CycleIssue::AmbiguousPresence { assumed });
    }
    let annotate = |reason: String| -> String {
        let reason = match &ambiguity {
            Some(note) => format!("{} {}", reason, note),
            None => reason,
        };
        with_isolation_notice(reason, &inputs.controls)
    };

    if verdict.blocked {
        state.mode = "global_gate".to_string();
        state.mode_display = "GLOBAL GATE".to_string();
        state.reason = annotate(verdict.reason.clone().unwrap_or_default());
        return match verdict.action {
            OutsideAction::HoldOutputs => CycleDecision {
                state,
                table: None,
                memory: inputs.memory.clone(),
            },
            _ => {
                let (table, memory) = safe_state(config, inputs.memory, now);
                state.outputs_held = false;
                state.humidifiers_active = memory.humidifier_on.clone();
                state.aq_run_until.clear();
                CycleDecision {
                    state,
                    table: Some(table),
                    memory,
                }
            }
        };
    }

    let lane_inputs = LaneInputs {
        config,
        snapshot: inputs.snapshot,
        clock: inputs.clock,
    };
    let resolution = resolve(&lane_inputs, inputs.memory);
    let mut baseline = idle_requests(config, false);
    if resolution.active.lane.holds_air_quality_outputs() {
        let held = config.aq_only_outputs();
        baseline.retain(|r| !held.contains(&r.actuator));
    }
    let table = arbitrate(&resolution, &baseline, now);

    state.mode = resolution.active.mode();
    state.mode_display = resolution.active.display();
    state.active_lane = Some(resolution.active.lane);
    state.reason = annotate(lane_reason(&resolution.active, &resolution.humidifiers, inputs.snapshot));
    state.outputs_held = false;
    state.suppressed_lanes = resolution.suppressed.clone();
    state.co_emergency_active = resolution.memory.co.latched;
    state.active_alerts = match &resolution.active.detail {
        LaneDetail::Alert { labels, .. } => labels.clone(),
        _ => Vec::new(),
    };
    state.humidifiers_active = resolution.memory.humidifier_on.clone();
    state.aq_run_until = run_until(&resolution.memory, now);
    state.issues.extend(resolution.issues.iter().cloned());

    debug!(
        lane = %resolution.active.lane,
        assignments = table.len(),
        deferred = table.deferred.len(),
        "Cycle decided"
    );

    CycleDecision {
        state,
        table: Some(table),
        memory: resolution.memory,
    }
}

