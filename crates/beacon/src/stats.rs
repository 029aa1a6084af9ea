use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide diagnostic counters
#[derive(Debug, Default)]
pub struct EngineStats {
    checks: AtomicU64,
    check_failures: AtomicU64,
    skipped_overlaps: AtomicU64,
    storage_failures: AtomicU64,
    transitions: AtomicU64,
    alerts_deduplicated: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub checks: u64,
    pub check_failures: u64,
    pub skipped_overlaps: u64,
    pub storage_failures: u64,
    pub transitions: u64,
    pub alerts_deduplicated: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check(&self, success: bool) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.check_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_skipped_overlap(&self) {
        self.skipped_overlaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.alerts_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.deliveries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            check_failures: self.check_failures.load(Ordering::Relaxed),
            skipped_overlaps: self.skipped_overlaps.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            alerts_deduplicated: self.alerts_deduplicated.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}
