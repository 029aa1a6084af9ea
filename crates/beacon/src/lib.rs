//! Beacon - uptime monitoring engine
//!
//! Periodically probes a set of targets, debounces raw results into
//! confirmed UP/DOWN transitions and delivers each transition once to the
//! configured notification channels.

pub mod capability;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod health;
pub mod memory;
pub mod scheduler;
pub mod stats;
pub mod target;
pub mod types;

// Re-export main types
pub use capability::{HistoryStore, NotificationChannel, ProbeOutcome, Prober};
pub use dispatch::{AlertPayload, AlertRecord, ChannelDelivery, DeliveryOutcome, RetryPolicy};
pub use engine::{Engine, EngineConfig};
pub use error::{ConfigError, DeliveryError, EngineError, ProbeError, StoreError};
pub use health::{Health, TargetState, Transition};
pub use memory::MemoryHistory;
pub use scheduler::TargetStatus;
pub use stats::StatsSnapshot;
pub use target::{CheckKind, Registry, RegistryDiff, Target, TargetId, Thresholds};
pub use types::{CheckResult, Outcome};

/// Check a single target right now, outside any schedule
pub async fn check_once(prober: &dyn Prober, target: &Target) -> CheckResult {
    scheduler::run_probe(prober, target).await
}
