//! The monitoring engine: one scheduler and one alert dispatcher sharing a
//! prober, a history store and a set of notification channels.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::capability::{HistoryStore, NotificationChannel, Prober};
use crate::dispatch::{AlertDispatcher, AlertRecord, DispatcherHandle, RetryPolicy};
use crate::error::{EngineError, StoreError};
use crate::scheduler::{Scheduler, SchedulerConfig, TargetStatus};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::target::{Registry, RegistryDiff, TargetId};
use crate::types::CheckResult;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub startup_jitter: Duration,
    pub error_samples: usize,
    pub restore_state: bool,
    /// How long `stop` waits for queued alerts before abandoning them
    pub dispatch_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            startup_jitter: scheduler.startup_jitter,
            error_samples: scheduler.error_samples,
            restore_state: scheduler.restore_state,
            dispatch_grace: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            startup_jitter: self.startup_jitter,
            error_samples: self.error_samples,
            restore_state: self.restore_state,
        }
    }
}

pub struct Engine {
    scheduler: Scheduler,
    dispatcher: Option<AlertDispatcher>,
    alerts: DispatcherHandle,
    store: Arc<dyn HistoryStore>,
    stats: Arc<EngineStats>,
    channel_names: Vec<String>,
    dispatch_grace: Duration,
}

impl Engine {
    /// Build the engine and spawn its dispatcher. Must be called from within
    /// a tokio runtime.
    pub fn new(
        prober: Arc<dyn Prober>,
        store: Arc<dyn HistoryStore>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        config: EngineConfig,
    ) -> Self {
        let stats = Arc::new(EngineStats::new());
        let channel_names = channels.iter().map(|c| c.name().to_string()).collect();
        let dispatcher =
            AlertDispatcher::spawn(channels, config.retry.clone(), Arc::clone(&store), Arc::clone(&stats));
        let alerts = dispatcher.handle();
        let scheduler = Scheduler::new(
            prober,
            Arc::clone(&store),
            dispatcher.handle(),
            Arc::clone(&stats),
            config.scheduler(),
        );

        Self {
            scheduler,
            dispatcher: Some(dispatcher),
            alerts,
            store,
            stats,
            channel_names,
            dispatch_grace: config.dispatch_grace,
        }
    }

    /// Start monitoring every target in `registry`
    pub async fn start(&mut self, registry: Registry) -> Result<(), EngineError> {
        if self.dispatcher.is_none() {
            return Err(EngineError::Stopped);
        }
        self.check_routes(&registry)?;
        self.scheduler.start(registry).await?;
        info!(channels = self.channel_names.len(), "Monitoring engine started");
        Ok(())
    }

    /// Replace the target set.
    ///
    /// A registry that routes to unknown channels is rejected and the current
    /// one keeps running.
    pub async fn reload(&mut self, registry: Registry) -> Result<RegistryDiff, EngineError> {
        if self.dispatcher.is_none() {
            return Err(EngineError::Stopped);
        }
        if let Err(e) = self.check_routes(&registry) {
            warn!(error = %e, "Rejected target reload, keeping current targets");
            return Err(e);
        }
        self.scheduler.reload(registry).await
    }

    /// Stop every worker, then give pending alerts the grace period
    pub async fn stop(&mut self) {
        self.scheduler.stop().await;
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown(self.dispatch_grace).await;
            info!("Monitoring engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Current state and last result of every target
    pub fn snapshot(&self) -> Vec<TargetStatus> {
        self.scheduler.statuses()
    }

    pub fn status(&self, target: &TargetId) -> Option<TargetStatus> {
        self.scheduler.status(target)
    }

    /// Most recent check results for `target`, newest first
    pub async fn recent(&self, target: &TargetId, limit: usize) -> Result<Vec<CheckResult>, StoreError> {
        self.store.recent(target, limit).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertRecord> {
        self.alerts.subscribe()
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.scheduler.registry()
    }

    fn check_routes(&self, registry: &Registry) -> Result<(), EngineError> {
        registry
            .check_routes(self.channel_names.iter().map(String::as_str))
            .map_err(EngineError::from)
    }
}
