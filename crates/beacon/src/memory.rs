//! In-memory [`HistoryStore`], used when no database is configured and in
//! tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

use crate::capability::HistoryStore;
use crate::dispatch::AlertRecord;
use crate::error::StoreError;
use crate::health::TargetState;
use crate::target::TargetId;
use crate::types::CheckResult;

/// Keeps the last `capacity` results per target
#[derive(Debug)]
pub struct MemoryHistory {
    capacity: usize,
    results: RwLock<HashMap<TargetId, VecDeque<CheckResult>>>,
    states: RwLock<HashMap<TargetId, TargetState>>,
    alerts: RwLock<VecDeque<AlertRecord>>,
}

impl MemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            results: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            alerts: RwLock::new(VecDeque::new()),
        }
    }

    /// Alert records, newest first
    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.iter().rev().cloned().collect()
    }

    /// Seed a persisted state, as if written by an earlier run
    pub async fn insert_state(&self, target: TargetId, state: TargetState) {
        self.states.write().await.insert(target, state);
    }

    pub async fn len(&self, target: &TargetId) -> usize {
        self.results.read().await.get(target).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, result: &CheckResult) -> Result<(), StoreError> {
        let mut results = self.results.write().await;
        let entries = results.entry(result.target.clone()).or_default();
        entries.push_back(result.clone());
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(())
    }

    async fn current_state(&self, target: &TargetId) -> Result<Option<TargetState>, StoreError> {
        Ok(self.states.read().await.get(target).cloned())
    }

    async fn save_state(&self, target: &TargetId, state: &TargetState) -> Result<(), StoreError> {
        self.states.write().await.insert(target.clone(), state.clone());
        Ok(())
    }

    async fn discard_state(&self, target: &TargetId) -> Result<(), StoreError> {
        self.states.write().await.remove(target);
        Ok(())
    }

    async fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        let mut alerts = self.alerts.write().await;
        alerts.push_back(record.clone());
        while alerts.len() > self.capacity {
            alerts.pop_front();
        }
        Ok(())
    }

    async fn recent(&self, target: &TargetId, limit: usize) -> Result<Vec<CheckResult>, StoreError> {
        let results = self.results.read().await;
        Ok(results
            .get(target)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
