//! Alert dispatcher - turns confirmed transitions into notifications
//!
//! The dispatcher is responsible for:
//! - Accepting transitions without ever blocking the caller
//! - Dropping alerts for a health that was already alerted
//! - Fanning out to every routed channel with independent retries
//! - Keeping alerts for one target in transition order
//!
//! Each target gets its own lane task. A lane handles one alert at a time,
//! which gives per-target ordering and at most one pending send per target.

pub mod payload;
pub mod record;
pub mod retry;

pub use payload::AlertPayload;
pub use record::{AlertRecord, ChannelDelivery, DeliveryOutcome};
pub use retry::RetryPolicy;

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capability::{HistoryStore, NotificationChannel};
use crate::health::{Health, Transition};
use crate::stats::EngineStats;
use crate::target::{Target, TargetId};

enum Command {
    Notify(Job),
    Forget(TargetId),
    Shutdown { grace: Duration },
}

struct Job {
    transition: Transition,
    routes: Option<Vec<String>>,
}

struct Lane {
    tx: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<()>,
}

/// Everything a lane needs to deliver alerts
struct LaneContext {
    channels: Vec<Arc<dyn NotificationChannel>>,
    retry: RetryPolicy,
    store: Arc<dyn HistoryStore>,
    stats: Arc<EngineStats>,
    records: broadcast::Sender<AlertRecord>,
}

/// Cheap, cloneable entry point used by target workers
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Command>,
    records: broadcast::Sender<AlertRecord>,
}

impl DispatcherHandle {
    /// Queue a transition for delivery. Never waits on delivery.
    pub fn notify(&self, transition: Transition, target: &Target) {
        let job = Job { transition, routes: target.channels.clone() };
        if self.tx.send(Command::Notify(job)).is_err() {
            warn!(target_name = %target.id, "Alert dispatcher is shut down, dropping transition");
        }
    }

    /// Stop delivering anything for `target`, including queued alerts
    pub fn forget(&self, target: &TargetId) {
        let _ = self.tx.send(Command::Forget(target.clone()));
    }

    /// Receive every completed alert record
    pub fn subscribe(&self) -> broadcast::Receiver<AlertRecord> {
        self.records.subscribe()
    }
}

/// Owner of the dispatcher's router task
pub struct AlertDispatcher {
    handle: DispatcherHandle,
    router: JoinHandle<()>,
}

impl AlertDispatcher {
    /// Spawn the dispatcher router on the current runtime
    pub fn spawn(
        channels: Vec<Arc<dyn NotificationChannel>>,
        retry: RetryPolicy,
        store: Arc<dyn HistoryStore>,
        stats: Arc<EngineStats>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (records, _) = broadcast::channel(256);

        let context = Arc::new(LaneContext {
            channels,
            retry,
            store,
            stats,
            records: records.clone(),
        });

        let router = tokio::spawn(route(rx, context));

        Self { handle: DispatcherHandle { tx, records }, router }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop accepting alerts and let queued deliveries finish within `grace`.
    ///
    /// Deliveries still running after the grace period are abandoned.
    pub async fn shutdown(self, grace: Duration) {
        if self.handle.tx.send(Command::Shutdown { grace }).is_err() {
            debug!("Alert dispatcher router already stopped");
        }
        if let Err(e) = self.router.await {
            error!(error = %e, "Alert dispatcher router failed");
        }
    }
}

async fn route(mut rx: mpsc::UnboundedReceiver<Command>, context: Arc<LaneContext>) {
    let mut lanes: HashMap<TargetId, Lane> = HashMap::new();
    let mut grace = Duration::ZERO;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Notify(job) => {
                let target = job.transition.target.clone();
                let lane = lanes
                    .entry(target.clone())
                    .or_insert_with(|| spawn_lane(target, Arc::clone(&context)));
                if lane.tx.send(job).is_err() {
                    warn!("Alert lane closed unexpectedly, dropping transition");
                }
            }
            Command::Forget(target) => {
                if let Some(lane) = lanes.remove(&target) {
                    lane.handle.abort();
                    debug!(target_name = %target, "Dropped alert lane");
                }
            }
            Command::Shutdown { grace: g } => {
                grace = g;
                break;
            }
        }
    }

    drain(lanes, grace).await;
}

/// Close every lane and wait up to `grace` for queued alerts to go out
async fn drain(lanes: HashMap<TargetId, Lane>, grace: Duration) {
    if lanes.is_empty() {
        return;
    }

    let mut handles = Vec::with_capacity(lanes.len());
    for (_, lane) in lanes {
        drop(lane.tx);
        handles.push(lane.handle);
    }

    let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    if tokio::time::timeout(grace, join_all(handles)).await.is_err() {
        let pending = aborts.iter().filter(|a| !a.is_finished()).count();
        for abort in aborts {
            abort.abort();
        }
        warn!(pending, "Grace period elapsed, abandoning in-flight alert deliveries");
    } else {
        info!("All alert deliveries finished");
    }
}

fn spawn_lane(target: TargetId, context: Arc<LaneContext>) -> Lane {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_lane(target, rx, context));
    Lane { tx, handle }
}

async fn run_lane(target: TargetId, mut rx: mpsc::UnboundedReceiver<Job>, context: Arc<LaneContext>) {
    // Health most recently alerted for this target
    let mut last_alerted: Option<Health> = None;

    while let Some(job) = rx.recv().await {
        let health = job.transition.to;
        if last_alerted == Some(health) {
            context.stats.record_deduplicated();
            debug!(target_name = %target, health = %health, "Alert already sent for this state, skipping");
            continue;
        }
        last_alerted = Some(health);

        let record = deliver(&context, &job).await;

        if let Err(e) = context.store.record_alert(&record).await {
            context.stats.record_storage_failure();
            error!(target_name = %target, error = %e, "Failed to record alert");
        }
        let _ = context.records.send(record);
    }
}

async fn deliver(context: &LaneContext, job: &Job) -> AlertRecord {
    let payload = AlertPayload::from_transition(&job.transition);
    let mut deliveries = Vec::new();

    let selected: Vec<&Arc<dyn NotificationChannel>> = match &job.routes {
        None => context.channels.iter().collect(),
        Some(routes) => {
            let mut selected = Vec::with_capacity(routes.len());
            for name in routes {
                match context.channels.iter().find(|c| c.name() == name) {
                    Some(channel) => selected.push(channel),
                    None => deliveries.push(ChannelDelivery {
                        channel: name.clone(),
                        outcome: DeliveryOutcome::Skipped {
                            reason: "channel not configured".to_string(),
                        },
                    }),
                }
            }
            selected
        }
    };

    if selected.is_empty() {
        warn!(target_name = %payload.target, "No notification channels for alert");
    }

    let sends = selected
        .into_iter()
        .map(|channel| send_with_retry(&**channel, &payload, &context.retry));
    for delivery in join_all(sends).await {
        context.stats.record_delivery(delivery.is_delivered());
        deliveries.push(delivery);
    }

    info!(
        target_name = %payload.target,
        from = %payload.previous,
        to = %payload.current,
        channels = deliveries.len(),
        "Alert dispatched"
    );

    AlertRecord {
        target: payload.target.clone(),
        health: payload.current,
        timestamp: Utc::now(),
        deliveries,
    }
}

async fn send_with_retry(
    channel: &dyn NotificationChannel,
    payload: &AlertPayload,
    retry: &RetryPolicy,
) -> ChannelDelivery {
    let mut attempt = 1;
    loop {
        match channel.send(payload).await {
            Ok(()) => {
                debug!(target_name = %payload.target, channel = channel.name(), attempt, "Alert delivered");
                return ChannelDelivery {
                    channel: channel.name().to_string(),
                    outcome: DeliveryOutcome::Delivered { attempts: attempt },
                };
            }
            Err(e) if e.is_retryable() && retry.should_retry(attempt) => {
                let delay = retry.backoff(attempt);
                warn!(
                    target_name = %payload.target,
                    channel = channel.name(),
                    attempt,
                    error = %e,
                    "Alert delivery failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    target_name = %payload.target,
                    channel = channel.name(),
                    attempts = attempt,
                    error = %e,
                    "Alert delivery failed"
                );
                return ChannelDelivery {
                    channel: channel.name().to_string(),
                    outcome: DeliveryOutcome::Failed { attempts: attempt, error: e.to_string() },
                };
            }
        }
    }
}
