//! Recurring cycle driver
//!
//! A single task owns the [`Engine`] and runs one cycle at a time, started
//! by whichever comes first: the interval tick, a change to a source entity,
//! an evaluation request from the command surface, or the one-shot startup
//! recheck. Triggers that pile up while a cycle runs are folded into the
//! next one.

use hi_engine::{CycleClock, Engine};
use hi_services::EvaluateRequest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct CycleRunner {
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl CycleRunner {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Spawn the cycle task; the engine is handed back when it stops
    ///
    /// Returns `None` if the runner is already running.
    pub fn start(&self, mut engine: Engine, mut requests: mpsc::Receiver<EvaluateRequest>) -> Option<JoinHandle<Engine>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Cycle runner already running");
            return None;
        }

        let config = engine.config();
        let period = Duration::from_secs(u64::from(config.engine.interval_minutes) * 60);
        let recheck_after = Duration::from_secs(config.engine.startup_recheck_seconds);
        let sources = engine.sources();
        let mut changes = engine.store().subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let running = self.running.clone();

        info!(
            interval_minutes = config.engine.interval_minutes,
            sources = sources.len(),
            "Starting cycle runner"
        );

        Some(tokio::spawn(async move {
            // First tick completes immediately: the cycle at start
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let recheck = tokio::time::sleep(recheck_after);
            tokio::pin!(recheck);
            let mut recheck_done = false;

            loop {
                let trigger = tokio::select! {
                    _ = ticker.tick() => "interval",
                    _ = &mut recheck, if !recheck_done => {
                        recheck_done = true;
                        "startup_recheck"
                    }
                    change = changes.recv() => match change {
                        Ok(change) if sources.contains(&change.entity_id) => "telemetry",
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Cycle runner lagged by {} telemetry changes", n);
                            "telemetry"
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Telemetry store closed, stopping cycle runner");
                            break;
                        }
                    },
                    Some(request) = requests.recv() => {
                        debug!(context_id = %request.context.id, reason = request.reason, "Evaluation requested");
                        "request"
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                };

                // Fold everything queued so far into this cycle
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                while requests.try_recv().is_ok() {}

                let state = engine.run_cycle(CycleClock::system()).await;
                debug!(trigger, cycle = state.cycle, mode = %state.mode, "Cycle finished");
            }

            running.store(false, Ordering::SeqCst);
            info!("Cycle runner stopped");
            engine
        }))
    }

    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        info!("Stopping cycle runner");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for CycleRunner {
    fn default() -> Self {
        Self::new()
    }
}
