//! Humidity Intelligence server
//!
//! Loads `humidity_intelligence.yaml` from the config directory (first
//! argument, else `HI_CONFIG_DIR`, else the working directory), then runs
//! the cycle loop until interrupted. Telemetry and service calls arrive as
//! JSON lines on stdin.

mod actuator;
mod cycle_runner;
mod feed;

use anyhow::{bail, Context as _, Result};
use hi_config::{ConfigError, HiConfig};
use hi_engine::Engine;
use hi_services::{register_services, EntityMapHook, ServiceContext, ServiceRegistry};
use hi_telemetry::TelemetryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::actuator::TracingActuator;
use crate::cycle_runner::CycleRunner;

/// Pending evaluation requests; one is enough to guarantee a cycle
const EVALUATE_QUEUE: usize = 1;

fn config_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HI_CONFIG_DIR").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_config(dir: &Path) -> Result<HiConfig> {
    match HiConfig::load(dir) {
        Ok(config) => Ok(config),
        Err(ConfigError::Incomplete { missing }) => {
            for item in &missing {
                error!(missing = %item, "Configuration incomplete");
            }
            bail!("configuration is incomplete ({} missing mappings)", missing.len())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load configuration from {}", dir.display())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let dir = config_dir();
    info!(config_dir = %dir.display(), version = env!("CARGO_PKG_VERSION"), "Starting Humidity Intelligence");

    let config = load_config(&dir)?;
    for warning in config.warnings() {
        warn!(warning = %warning, "Configuration warning");
    }

    let store = Arc::new(TelemetryStore::new());
    let engine = Engine::new(config, store.clone(), Arc::new(TracingActuator::new()))?;

    let (evaluate, requests) = mpsc::channel(EVALUATE_QUEUE);
    let registry = Arc::new(ServiceRegistry::new());
    register_services(
        &registry,
        ServiceContext {
            config: engine.config(),
            pause: engine.pause_controller(),
            controls: engine.controls(),
            publisher: engine.publisher(),
            snapshots: engine.snapshots(),
            evaluate,
            actuator: engine.actuator(),
            diagnostics_dir: dir.clone(),
            presentation: Some(Arc::new(EntityMapHook)),
        },
    );
    info!(services = registry.service_count(), "Services registered");

    let runner = CycleRunner::new();
    let cycles = runner
        .start(engine, requests)
        .context("cycle runner failed to start")?;

    let feed_store = store.clone();
    let feed_registry = registry.clone();
    let feed = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = feed::run_feed(stdin, tokio::io::stdout(), &feed_store, &feed_registry).await {
            error!(error = %e, "Feed stopped");
        }
    });

    info!("Humidity Intelligence is running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    feed.abort();
    runner.stop();
    let engine = cycles.await.context("cycle runner panicked")?;
    info!(cycles = engine.publisher().current().cycle, "Stopped");

    Ok(())
}
