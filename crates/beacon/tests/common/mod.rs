//! Scripted collaborators shared by the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use beacon::{
    AlertPayload, DeliveryError, EngineConfig, HistoryStore, NotificationChannel, ProbeError,
    ProbeOutcome, Prober, RetryPolicy, StoreError, Target,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Step = Result<ProbeOutcome, ProbeError>;

pub fn up() -> Step {
    Ok(ProbeOutcome { latency_ms: 20, status_code: Some(200) })
}

pub fn down(error: &str) -> Step {
    Err(ProbeError::Connect(error.to_string()))
}

/// Replays a per-target script, then repeats a fallback step forever
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(fallback: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, target: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(target.to_string(), steps.into_iter().collect());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(target.id.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        step
    }
}

/// Never answers for the targets it was told to hang on; every other target
/// is up. Counts hung probes that are still alive.
pub struct HangingProber {
    hang: HashSet<String>,
    live: Arc<AtomicUsize>,
}

impl HangingProber {
    pub fn new(hang: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            hang: hang.into_iter().map(str::to_string).collect(),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Prober for HangingProber {
    async fn probe(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        if !self.hang.contains(target.id.as_str()) {
            return up();
        }
        let _guard = LiveGuard::new(&self.live);
        std::future::pending().await
    }
}

/// Channel that keeps every payload it was given
pub struct RecordingChannel {
    name: String,
    sent: Mutex<Vec<AlertPayload>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), sent: Mutex::new(Vec::new()) })
    }

    pub fn sent(&self) -> Vec<AlertPayload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_for(&self, target: &str) -> Vec<AlertPayload> {
        self.sent().into_iter().filter(|p| p.target.as_str() == target).collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// History store whose writes always fail
pub struct BrokenStore;

#[async_trait]
impl HistoryStore for BrokenStore {
    async fn append(&self, _result: &beacon::CheckResult) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn save_state(&self, _target: &beacon::TargetId, _state: &beacon::TargetState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        startup_jitter: Duration::ZERO,
        error_samples: 3,
        restore_state: true,
        dispatch_grace: Duration::from_secs(5),
        retry: RetryPolicy::none(),
    }
}

pub fn http(name: &str, interval: u64, failure: u32, recovery: u32) -> Target {
    Target::http(name, format!("https://{name}.example.com"))
        .with_interval(Duration::from_secs(interval))
        .with_timeout(Duration::from_secs(5))
        .with_thresholds(failure, recovery)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
