//! Capabilities the engine consumes but does not implement.
//!
//! Probers, history stores and notification channels are shared between
//! every target's pipeline, so implementations must be safe for concurrent
//! use.

use async_trait::async_trait;

use crate::dispatch::{AlertPayload, AlertRecord};
use crate::error::{DeliveryError, ProbeError, StoreError};
use crate::health::TargetState;
use crate::target::{Target, TargetId};
use crate::types::CheckResult;

/// What a successful probe measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub latency_ms: u64,
    pub status_code: Option<u16>,
}

/// Performs one health check against a target.
///
/// The scheduler enforces the target's timeout by dropping the returned
/// future, so implementations must be cancel-safe.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> Result<ProbeOutcome, ProbeError>;
}

/// Durable check history plus a current-state snapshot per target
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one check result. Called once per attempt, never retried.
    async fn append(&self, result: &CheckResult) -> Result<(), StoreError>;

    /// Last persisted state for `target`, used to resume after a restart
    async fn current_state(&self, _target: &TargetId) -> Result<Option<TargetState>, StoreError> {
        Ok(None)
    }

    async fn save_state(&self, _target: &TargetId, _state: &TargetState) -> Result<(), StoreError> {
        Ok(())
    }

    /// Drop the persisted state of a target removed from the registry
    async fn discard_state(&self, _target: &TargetId) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_alert(&self, _record: &AlertRecord) -> Result<(), StoreError> {
        Ok(())
    }

    /// Most recent results for `target`, newest first
    async fn recent(&self, _target: &TargetId, _limit: usize) -> Result<Vec<CheckResult>, StoreError> {
        Ok(Vec::new())
    }
}

/// Delivers alert payloads to one destination.
///
/// `send` may be retried with the same payload and must tolerate that.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, payload: &AlertPayload) -> Result<(), DeliveryError>;
}
