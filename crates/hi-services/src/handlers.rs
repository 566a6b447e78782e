//! Humidity Intelligence services
//!
//! [`register_services`] installs every service on a [`ServiceRegistry`].
//! Handlers never run a cycle themselves: they change shared state and ask
//! the cycle runner for an early evaluation.

use chrono::{Duration, Utc};
use hi_config::{HiConfig, PAUSE_MINUTES_BOUNDS};
use hi_core::{Context, EntityId};
use hi_engine::{
    ControlSwitch, DiagnosticsDump, OutputCommand, PauseController, RuntimePublisher, SharedActuator, SharedControls,
    DEFAULT_DIAGNOSTICS_FILE,
};
use hi_telemetry::TelemetrySnapshot;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::presentation::PresentationHook;
use crate::registry::{ServiceCall, ServiceError, ServiceRegistry, ServiceResult};

pub const SERVICE_PAUSE_CONTROL: &str = "pause_control";
pub const SERVICE_RESUME_CONTROL: &str = "resume_control";
pub const SERVICE_SELF_CHECK: &str = "self_check";
pub const SERVICE_DUMP_DIAGNOSTICS: &str = "dump_diagnostics";
pub const SERVICE_REFRESH_UI: &str = "refresh_ui";
pub const SERVICE_SET_SWITCH: &str = "set_switch";
pub const SERVICE_REQUEST_EVALUATE: &str = "request_evaluate";
pub const SERVICE_FLASH_LIGHTS: &str = "flash_lights";

const DEFAULT_FLASH_RGB: (u8, u8, u8) = (255, 0, 0);
const DEFAULT_FLASH_SECONDS: u32 = 10;

/// Delay between powering an alert light's supply and flashing it
const POWER_SETTLE: std::time::Duration = std::time::Duration::from_millis(500);

/// Request for an out-of-schedule cycle
#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    pub context: Context,
    pub reason: &'static str,
}

/// Handles on engine state shared with the services
#[derive(Clone)]
pub struct ServiceContext {
    pub config: Arc<HiConfig>,
    pub pause: PauseController,
    pub controls: SharedControls,
    pub publisher: RuntimePublisher,
    pub snapshots: watch::Receiver<Option<Arc<TelemetrySnapshot>>>,
    pub evaluate: mpsc::Sender<EvaluateRequest>,
    /// Commands from services go straight to the engine's actuator
    pub actuator: SharedActuator,
    /// Directory diagnostics files are written to
    pub diagnostics_dir: PathBuf,
    pub presentation: Option<Arc<dyn PresentationHook>>,
}

impl ServiceContext {
    /// Queue an evaluation; a full queue means one is already pending
    fn request_evaluation(&self, context: Context, reason: &'static str) -> Result<bool, ServiceError> {
        match self.evaluate.try_send(EvaluateRequest { context, reason }) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(reason, "Evaluation already pending");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(ServiceError::CallFailed("cycle runner is not running".to_string()))
            }
        }
    }

    fn latest_snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.snapshots.borrow().clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PauseData {
    #[serde(default)]
    minutes: Option<u32>,
    #[serde(default)]
    until_resumed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DumpData {
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SwitchData {
    switch: ControlSwitch,
    on: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlashData {
    #[serde(default)]
    power_entity: Option<EntityId>,
    lights: Vec<EntityId>,
    #[serde(default)]
    color: Option<Vec<u8>>,
    #[serde(default = "default_flash_seconds")]
    duration: u32,
    #[serde(default)]
    flash_count: Option<u32>,
}

fn default_flash_seconds() -> u32 {
    DEFAULT_FLASH_SECONDS
}

impl FlashData {
    /// First three colour channels; red when fewer are given
    fn rgb(&self) -> (u8, u8, u8) {
        match self.color.as_deref() {
            Some([r, g, b, ..]) => (*r, *g, *b),
            _ => DEFAULT_FLASH_RGB,
        }
    }

    /// Each flash takes a second, so an explicit count replaces the duration
    fn duration_secs(&self) -> u32 {
        self.flash_count.unwrap_or(self.duration).max(1)
    }
}

/// Plain file name ending in `.json`, no path components
fn valid_filename(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*\.json$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
        && !name.contains("..")
}

async fn pause_control(ctx: ServiceContext, call: ServiceCall) -> ServiceResult {
    let data: PauseData = call.parse()?;
    let now = Utc::now();

    let duration = if data.until_resumed {
        None
    } else {
        let (min, max) = PAUSE_MINUTES_BOUNDS;
        let minutes = data.minutes.unwrap_or(ctx.config.engine.default_pause_minutes);
        if !(min..=max).contains(&minutes) {
            return Err(ServiceError::InvalidData(format!(
                "minutes must be between {} and {}, got {}",
                min, max, minutes
            )));
        }
        Some(Duration::minutes(i64::from(minutes)))
    };

    let state = ctx.pause.pause(duration, now);
    info!(context_id = %call.context.id, resume_at = ?state.resume_at, "Pause requested");
    ctx.request_evaluation(call.context, SERVICE_PAUSE_CONTROL)?;

    Ok(json!({
        "paused": true,
        "resume_at": state.resume_at,
        "remaining_minutes": state.remaining_minutes(now),
    }))
}

async fn resume_control(ctx: ServiceContext, call: ServiceCall) -> ServiceResult {
    let was_paused = ctx.pause.resume();
    info!(context_id = %call.context.id, was_paused, "Resume requested");
    ctx.request_evaluation(call.context, SERVICE_RESUME_CONTROL)?;
    Ok(json!({ "paused": false, "was_paused": was_paused }))
}

async fn self_check(ctx: ServiceContext, _call: ServiceCall) -> ServiceResult {
    let snapshot = ctx.latest_snapshot();
    let report = hi_engine::self_check(&ctx.config, snapshot.as_deref());
    if !report.ok {
        warn!(
            missing = report.missing_entities.len(),
            unusable = report.unusable_sensors.len(),
            "Self-check found problems"
        );
    }
    serde_json::to_value(report).map_err(|e| ServiceError::CallFailed(e.to_string()))
}

async fn dump_diagnostics(ctx: ServiceContext, call: ServiceCall) -> ServiceResult {
    let data: DumpData = call.parse()?;
    let filename = data.filename.unwrap_or_else(|| DEFAULT_DIAGNOSTICS_FILE.to_string());
    if !valid_filename(&filename) {
        return Err(ServiceError::InvalidData(format!(
            "filename must be a plain .json file name, got '{}'",
            filename
        )));
    }

    let state = ctx.publisher.current();
    let snapshot = ctx.latest_snapshot();
    let dump = DiagnosticsDump::new(&ctx.config, &state, snapshot.as_deref(), Utc::now());
    let path = dump
        .write_to(&ctx.diagnostics_dir, &filename)
        .await
        .map_err(|e| ServiceError::CallFailed(e.to_string()))?;
    let diagnostics = dump.to_json().map_err(|e| ServiceError::CallFailed(e.to_string()))?;

    Ok(json!({
        "path": path.display().to_string(),
        "diagnostics": diagnostics,
    }))
}

async fn refresh_ui(ctx: ServiceContext, _call: ServiceCall) -> ServiceResult {
    ctx.publisher.republish();
    let state = ctx.publisher.current();

    let mapping = match &ctx.presentation {
        Some(hook) => Some(hook.refresh(&ctx.config, &state).await?),
        None => None,
    };

    Ok(json!({
        "cycle": state.cycle,
        "mode": state.mode,
        "mapping": mapping,
    }))
}

async fn set_switch(ctx: ServiceContext, call: ServiceCall) -> ServiceResult {
    let data: SwitchData = call.parse()?;
    let changed = ctx.controls.set(data.switch, data.on);
    if changed {
        ctx.request_evaluation(call.context, SERVICE_SET_SWITCH)?;
    }
    Ok(json!({
        "switch": data.switch,
        "on": data.on,
        "changed": changed,
    }))
}

async fn flash_lights(ctx: ServiceContext, call: ServiceCall) -> ServiceResult {
    let data: FlashData = call.parse()?;
    if data.lights.is_empty() {
        return Err(ServiceError::InvalidData("lights must name at least one light".to_string()));
    }

    let mut rejected = Vec::new();
    if let Some(power) = &data.power_entity {
        match ctx.actuator.send(power, &OutputCommand::Power(true)).await {
            Ok(()) => tokio::time::sleep(POWER_SETTLE).await,
            Err(e) => {
                warn!(entity_id = %power, error = %e, "Failed to power alert lights");
                rejected.push(json!({ "entity_id": power, "error": e.to_string() }));
            }
        }
    }

    let command = OutputCommand::Flash {
        rgb: data.rgb(),
        duration_secs: data.duration_secs(),
    };
    let mut flashed = Vec::new();
    for light in &data.lights {
        match ctx.actuator.send(light, &command).await {
            Ok(()) => flashed.push(light.clone()),
            Err(e) => {
                warn!(entity_id = %light, error = %e, "Light refused flash");
                rejected.push(json!({ "entity_id": light, "error": e.to_string() }));
            }
        }
    }
    info!(
        context_id = %call.context.id,
        flashed = flashed.len(),
        rejected = rejected.len(),
        command = %command,
        "Flash requested"
    );

    Ok(json!({
        "command": command,
        "flashed": flashed,
        "rejected": rejected,
    }))
}

async fn request_evaluate(ctx: ServiceContext, call: ServiceCall) -> ServiceResult {
    let queued = ctx.request_evaluation(call.context, SERVICE_REQUEST_EVALUATE)?;
    Ok(json!({ "queued": queued }))
}

macro_rules! register {
    ($registry:expr, $ctx:expr, $name:expr, $desc:expr, $handler:ident) => {{
        let ctx = $ctx.clone();
        $registry.register($name, Some($desc), move |call: ServiceCall| $handler(ctx.clone(), call));
    }};
}

/// Install every service
pub fn register_services(registry: &ServiceRegistry, ctx: ServiceContext) {
    register!(registry, ctx, SERVICE_PAUSE_CONTROL, "Pause automation for a number of minutes", pause_control);
    register!(registry, ctx, SERVICE_RESUME_CONTROL, "Resume automation", resume_control);
    register!(registry, ctx, SERVICE_SELF_CHECK, "Report missing and stale telemetry", self_check);
    register!(registry, ctx, SERVICE_DUMP_DIAGNOSTICS, "Write diagnostics JSON", dump_diagnostics);
    register!(registry, ctx, SERVICE_REFRESH_UI, "Re-emit state and rebuild the entity map", refresh_ui);
    register!(registry, ctx, SERVICE_SET_SWITCH, "Set a control switch", set_switch);
    register!(registry, ctx, SERVICE_REQUEST_EVALUATE, "Run a cycle as soon as possible", request_evaluate);
    register!(registry, ctx, SERVICE_FLASH_LIGHTS, "Flash lights, optionally powering them first", flash_lights);
}
