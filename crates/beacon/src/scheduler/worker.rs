use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, error, info, warn};

use crate::capability::{HistoryStore, Prober};
use crate::dispatch::DispatcherHandle;
use crate::error::ProbeError;
use crate::health::{ErrorSamples, Health, TargetState};
use crate::stats::EngineStats;
use crate::target::Target;
use crate::types::CheckResult;

/// Read-only view of one target, published after every check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub target: Target,
    pub state: TargetState,
    pub last_result: Option<CheckResult>,
}

/// Collaborators shared by every worker
pub(crate) struct WorkerContext {
    pub prober: Arc<dyn Prober>,
    pub store: Arc<dyn HistoryStore>,
    pub dispatcher: DispatcherHandle,
    pub stats: Arc<EngineStats>,
    pub error_samples: usize,
}

/// Drives the checks of a single target.
///
/// The worker is the only owner of its [`TargetState`]: results are handled
/// one at a time, in completion order, inside this task.
pub(crate) struct Worker {
    target: Arc<Target>,
    state: TargetState,
    samples: ErrorSamples,
    last_result: Option<CheckResult>,
    context: Arc<WorkerContext>,
    target_rx: watch::Receiver<Arc<Target>>,
    status_tx: watch::Sender<TargetStatus>,
}

impl Worker {
    pub fn new(
        target_rx: watch::Receiver<Arc<Target>>,
        state: TargetState,
        context: Arc<WorkerContext>,
    ) -> (Self, watch::Receiver<TargetStatus>) {
        let target = Arc::clone(&target_rx.borrow());
        let (status_tx, status_rx) = watch::channel(TargetStatus {
            target: target.as_ref().clone(),
            state: state.clone(),
            last_result: None,
        });
        let samples = ErrorSamples::new(context.error_samples);

        let worker = Self {
            target,
            state,
            samples,
            last_result: None,
            context,
            target_rx,
            status_tx,
        };
        (worker, status_rx)
    }

    pub async fn run(mut self, initial_delay: Duration, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = ticker(initial_delay, self.target.interval);
        let mut in_flight: Option<JoinHandle<CheckResult>> = None;

        debug!(
            target_name = %self.target.id,
            interval = ?self.target.interval,
            delay = ?initial_delay,
            "Target worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                changed = self.target_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = Arc::clone(&self.target_rx.borrow_and_update());
                    if next.interval != self.target.interval {
                        ticker = ticker_after(next.interval);
                    }
                    debug!(target_name = %next.id, "Target configuration updated");
                    self.target = next;
                    self.publish();
                }

                joined = wait_for(&mut in_flight) => {
                    in_flight = None;
                    let result = self.completed(joined);
                    self.process(result).await;
                }

                _ = ticker.tick() => {
                    if in_flight.is_some() {
                        self.context.stats.record_skipped_overlap();
                        debug!(target_name = %self.target.id, "Previous check still running, skipping tick");
                        continue;
                    }
                    in_flight = Some(self.spawn_probe());
                }
            }
        }

        if let Some(probe) = in_flight.take() {
            probe.abort();
            // The probe task must be gone before the worker exits
            let _ = probe.await;
        }
        debug!(target_name = %self.target.id, "Target worker stopped");
    }

    /// Run the probe in its own task, against the descriptor current now
    fn spawn_probe(&self) -> JoinHandle<CheckResult> {
        let prober = Arc::clone(&self.context.prober);
        let target = Arc::clone(&self.target);
        tokio::spawn(async move { run_probe(prober.as_ref(), &target).await })
    }

    fn completed(&self, joined: Result<CheckResult, JoinError>) -> CheckResult {
        joined.unwrap_or_else(|e| {
            CheckResult::failure(&self.target, ProbeError::Task(e.to_string()).to_string())
        })
    }

    /// State machine, then history, then (maybe) an alert
    async fn process(&mut self, result: CheckResult) {
        self.context.stats.record_check(result.is_success());
        self.samples.record(&result);
        let transition = self.state.observe(self.target.thresholds, &result);

        if let Err(e) = self.context.store.append(&result).await {
            self.context.stats.record_storage_failure();
            error!(target_name = %self.target.id, error = %e, "Failed to append check result");
        }

        if let Some(mut transition) = transition {
            transition.error_samples = self.samples.snapshot();
            self.context.stats.record_transition();
            match transition.to {
                Health::Down => warn!(
                    target_name = %transition.target,
                    from = %transition.from,
                    error = result.error.as_deref().unwrap_or(""),
                    "Target is DOWN"
                ),
                _ => info!(
                    target_name = %transition.target,
                    from = %transition.from,
                    "Target is {}",
                    transition.to
                ),
            }
            self.state.last_alert_at = Some(Utc::now());
            self.context.dispatcher.notify(transition, &self.target);
        } else {
            debug!(
                target_name = %self.target.id,
                success = result.is_success(),
                latency_ms = ?result.latency_ms,
                failures = self.state.consecutive_failures,
                successes = self.state.consecutive_successes,
                "Check completed"
            );
        }

        if let Err(e) = self.context.store.save_state(&self.target.id, &self.state).await {
            self.context.stats.record_storage_failure();
            error!(target_name = %self.target.id, error = %e, "Failed to save target state");
        }

        self.last_result = Some(result);
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(TargetStatus {
            target: self.target.as_ref().clone(),
            state: self.state.clone(),
            last_result: self.last_result.clone(),
        });
    }
}

/// Probe `target` once, bounded by its timeout.
///
/// Every outcome, including a timeout, becomes exactly one [`CheckResult`].
pub(crate) async fn run_probe(prober: &dyn Prober, target: &Target) -> CheckResult {
    let started = Instant::now();
    match timeout(target.timeout, prober.probe(target)).await {
        Ok(Ok(outcome)) => CheckResult::success(target, outcome.latency_ms, outcome.status_code),
        Ok(Err(e)) => {
            let elapsed = started.elapsed().as_millis() as u64;
            let result = CheckResult::failure(target, e.to_string()).with_latency(elapsed);
            match e {
                ProbeError::Status(code) => result.with_status_code(code),
                _ => result,
            }
        }
        Err(_) => CheckResult::failure(target, ProbeError::Timeout.to_string())
            .with_latency(target.timeout.as_millis() as u64),
    }
}

async fn wait_for(probe: &mut Option<JoinHandle<CheckResult>>) -> Result<CheckResult, JoinError> {
    match probe {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn ticker(initial_delay: Duration, period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + initial_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// New cadence starts one full period from now
fn ticker_after(period: Duration) -> Interval {
    ticker(period, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ProbeOutcome;
    use async_trait::async_trait;

    struct FixedProber(Result<ProbeOutcome, ProbeError>, Duration);

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _target: &Target) -> Result<ProbeOutcome, ProbeError> {
            tokio::time::sleep(self.1).await;
            self.0.clone()
        }
    }

    fn target() -> Target {
        Target::http("site", "https://example.com").with_timeout(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success() {
        let prober = FixedProber(Ok(ProbeOutcome { latency_ms: 12, status_code: Some(204) }), Duration::ZERO);
        let result = run_probe(&prober, &target()).await;
        assert!(result.is_success());
        assert_eq!(result.status_code, Some(204));
        assert_eq!(result.latency_ms, Some(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_keeps_detail() {
        let prober = FixedProber(Err(ProbeError::Status(503)), Duration::from_millis(30));
        let result = run_probe(&prober, &target()).await;
        assert!(!result.is_success());
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.error.as_deref(), Some("HTTP check failed with status code: 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_becomes_failure() {
        let prober = FixedProber(Ok(ProbeOutcome { latency_ms: 1, status_code: None }), Duration::from_secs(60));
        let started = Instant::now();
        let result = run_probe(&prober, &target()).await;

        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert_eq!(result.latency_ms, Some(5000));
        assert!(started.elapsed() < Duration::from_secs(6));
    }
}
