//! Scheduler - one independent worker task per target
//!
//! Workers start with a random delay so a large registry does not probe
//! everything at once. Reloads are applied as a diff: unchanged targets keep
//! running untouched, changed targets receive their new descriptor without
//! losing counters, removed targets are stopped and forgotten.

mod worker;

pub use worker::TargetStatus;
pub(crate) use worker::run_probe;

use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capability::{HistoryStore, Prober};
use crate::dispatch::DispatcherHandle;
use crate::error::EngineError;
use crate::health::TargetState;
use crate::stats::EngineStats;
use crate::target::{Registry, RegistryDiff, Target, TargetId};
use worker::{Worker, WorkerContext};

/// How long a stopping worker may take before it is aborted
const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound of the random delay before a worker's first check
    pub startup_jitter: Duration,
    /// Distinct error strings kept per target for DOWN alerts
    pub error_samples: usize,
    /// Resume counters from the history store on start
    pub restore_state: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            startup_jitter: Duration::from_secs(2),
            error_samples: 3,
            restore_state: true,
        }
    }
}

struct WorkerHandle {
    target_tx: watch::Sender<Arc<Target>>,
    status_rx: watch::Receiver<TargetStatus>,
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

pub struct Scheduler {
    context: Arc<WorkerContext>,
    config: SchedulerConfig,
    registry: Arc<Registry>,
    workers: HashMap<TargetId, WorkerHandle>,
    running: bool,
}

impl Scheduler {
    pub fn new(
        prober: Arc<dyn Prober>,
        store: Arc<dyn HistoryStore>,
        dispatcher: DispatcherHandle,
        stats: Arc<EngineStats>,
        config: SchedulerConfig,
    ) -> Self {
        let context = Arc::new(WorkerContext {
            prober,
            store,
            dispatcher,
            stats,
            error_samples: config.error_samples,
        });

        Self {
            context,
            config,
            registry: Arc::new(Registry::empty()),
            workers: HashMap::new(),
            running: false,
        }
    }

    /// Spawn a worker for every target in `registry`
    pub async fn start(&mut self, registry: Registry) -> Result<(), EngineError> {
        if self.running {
            return Err(EngineError::AlreadyStarted);
        }
        self.running = true;

        info!("Scheduling {} targets", registry.len());
        for target in registry.iter() {
            let state = if self.config.restore_state {
                self.restored_state(&target.id).await
            } else {
                TargetState::new()
            };
            self.spawn_worker(Arc::clone(target), state);
        }
        self.registry = Arc::new(registry);
        Ok(())
    }

    /// Swap in a new registry, applying only what changed
    pub async fn reload(&mut self, registry: Registry) -> Result<RegistryDiff, EngineError> {
        if !self.running {
            return Err(EngineError::NotRunning);
        }

        let diff = self.registry.diff(&registry);

        for id in &diff.removed {
            self.stop_worker(id).await;
            self.context.dispatcher.forget(id);
            if let Err(e) = self.context.store.discard_state(id).await {
                warn!(target_name = %id, error = %e, "Failed to discard stored state");
            }
        }

        for target in &diff.changed {
            if let Some(worker) = self.workers.get(&target.id) {
                worker.target_tx.send_replace(Arc::clone(target));
            }
        }

        for target in &diff.added {
            self.spawn_worker(Arc::clone(target), TargetState::new());
        }

        info!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            changed = diff.changed.len(),
            unchanged = diff.unchanged,
            "Registry reloaded"
        );

        self.registry = Arc::new(registry);
        Ok(diff)
    }

    /// Cancel every timer and in-flight check, then wait for the workers
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        let workers: Vec<_> = self.workers.drain().collect();
        info!("Stopping {} target workers", workers.len());
        join_all(workers.into_iter().map(|(id, worker)| shutdown_worker(id, worker))).await;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The registry snapshot currently being scheduled
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Latest published status of every target, ordered by name
    pub fn statuses(&self) -> Vec<TargetStatus> {
        let mut statuses: Vec<_> = self
            .workers
            .values()
            .map(|w| w.status_rx.borrow().clone())
            .collect();
        statuses.sort_by(|a, b| a.target.id.cmp(&b.target.id));
        statuses
    }

    pub fn status(&self, id: &TargetId) -> Option<TargetStatus> {
        self.workers.get(id).map(|w| w.status_rx.borrow().clone())
    }

    async fn restored_state(&self, id: &TargetId) -> TargetState {
        match self.context.store.current_state(id).await {
            Ok(Some(state)) => {
                debug!(target_name = %id, health = %state.health, "Restored target state");
                state
            }
            Ok(None) => TargetState::new(),
            Err(e) => {
                warn!(target_name = %id, error = %e, "Could not restore state, starting UNKNOWN");
                TargetState::new()
            }
        }
    }

    fn spawn_worker(&mut self, target: Arc<Target>, state: TargetState) {
        let id = target.id.clone();
        let (target_tx, target_rx) = watch::channel(target);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let (worker, status_rx) = Worker::new(target_rx, state, Arc::clone(&self.context));

        let delay = startup_jitter(self.config.startup_jitter);
        let join = tokio::spawn(worker.run(delay, shutdown_rx));

        self.workers.insert(id, WorkerHandle { target_tx, status_rx, shutdown, join });
    }

    async fn stop_worker(&mut self, id: &TargetId) {
        if let Some(worker) = self.workers.remove(id) {
            shutdown_worker(id.clone(), worker).await;
        }
    }
}

async fn shutdown_worker(id: TargetId, worker: WorkerHandle) {
    let WorkerHandle { shutdown, mut join, .. } = worker;
    let _ = shutdown.send(());

    match tokio::time::timeout(WORKER_STOP_TIMEOUT, &mut join).await {
        Ok(Ok(())) => debug!(target_name = %id, "Worker stopped"),
        Ok(Err(e)) => error!(target_name = %id, error = %e, "Worker task failed"),
        Err(_) => {
            join.abort();
            let _ = join.await;
            warn!(target_name = %id, "Worker did not stop in time, aborted");
        }
    }
}

fn startup_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
