use async_trait::async_trait;
use beacon::{AlertRecord, CheckResult, HistoryStore, StoreError, TargetId, TargetState};
use chrono::{DateTime, Utc};
use libsql::params;
use std::path::Path;

use crate::error::Result;
use crate::models::{StoredState, alert_from_row, check_from_row, state_from_row, to_millis};
use crate::pool::{LibsqlPool, PooledConnection, open_pool};

/// Connections kept open by [`LibsqlHistory::open`]
const DEFAULT_POOL_SIZE: usize = 8;

const CHECK_COLUMNS: &str = "target, address, ok, latency_ms, status_code, error, ts";
const STATE_COLUMNS: &str = "target, health, consecutive_failures, consecutive_successes, last_transition_at, last_alert_at, updated_at";

/// Check history, target states and alert records in a local libsql database
#[derive(Clone)]
pub struct LibsqlHistory {
    pool: LibsqlPool,
}

impl LibsqlHistory {
    /// Open the database at `path`, creating and migrating it as needed
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_pool(open_pool(path, DEFAULT_POOL_SIZE).await?))
    }

    pub fn from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get().await?)
    }

    pub async fn insert_check(&self, result: &CheckResult) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO checks (target, address, ok, latency_ms, status_code, error, ts) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                result.target.to_string(),
                result.address.clone(),
                if result.is_success() { 1 } else { 0 },
                result.latency_ms.map(|v| v as i64),
                result.status_code.map(|v| v as i64),
                result.error.clone(),
                to_millis(result.timestamp)
            ],
        )
        .await?;
        Ok(())
    }

    /// Most recent checks for `target`, newest first
    pub async fn recent_checks(&self, target: &TargetId, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {CHECK_COLUMNS} FROM checks WHERE target = ? ORDER BY ts DESC, id DESC LIMIT ?"),
                params![target.to_string(), limit as i64],
            )
            .await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(check_from_row(&row)?);
        }
        Ok(checks)
    }

    /// Most recent checks across every target, newest first
    pub async fn latest_checks(&self, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {CHECK_COLUMNS} FROM checks ORDER BY ts DESC, id DESC LIMIT ?"),
                params![limit as i64],
            )
            .await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(check_from_row(&row)?);
        }
        Ok(checks)
    }

    pub async fn state(&self, target: &TargetId) -> Result<Option<StoredState>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {STATE_COLUMNS} FROM target_states WHERE target = ?"),
                params![target.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(state_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Persisted state of every target, ordered by name
    pub async fn states(&self) -> Result<Vec<StoredState>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {STATE_COLUMNS} FROM target_states ORDER BY target"), ())
            .await?;

        let mut states = Vec::new();
        while let Some(row) = rows.next().await? {
            states.push(state_from_row(&row)?);
        }
        Ok(states)
    }

    pub async fn upsert_state(&self, target: &TargetId, state: &TargetState) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO target_states (target, health, consecutive_failures, consecutive_successes, last_transition_at, last_alert_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(target) DO UPDATE SET
                health = excluded.health,
                consecutive_failures = excluded.consecutive_failures,
                consecutive_successes = excluded.consecutive_successes,
                last_transition_at = excluded.last_transition_at,
                last_alert_at = excluded.last_alert_at,
                updated_at = excluded.updated_at",
            params![
                target.to_string(),
                state.health.as_str().to_string(),
                state.consecutive_failures as i64,
                state.consecutive_successes as i64,
                state.last_transition_at.map(to_millis),
                state.last_alert_at.map(to_millis),
                to_millis(Utc::now())
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_state(&self, target: &TargetId) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute("DELETE FROM target_states WHERE target = ?", params![target.to_string()])
            .await?;
        Ok(())
    }

    pub async fn insert_alert(&self, record: &AlertRecord) -> Result<()> {
        let deliveries = serde_json::to_string(&record.deliveries)?;
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO alerts (target, health, ts, deliveries) VALUES (?, ?, ?, ?)",
            params![
                record.target.to_string(),
                record.health.as_str().to_string(),
                to_millis(record.timestamp),
                deliveries
            ],
        )
        .await?;
        Ok(())
    }

    /// Most recent alerts across every target, newest first
    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT target, health, ts, deliveries FROM alerts ORDER BY ts DESC, id DESC LIMIT ?",
                params![limit as i64],
            )
            .await?;

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(alert_from_row(&row)?);
        }
        Ok(alerts)
    }

    /// Delete checks recorded before `cutoff`, returning how many went
    pub async fn delete_checks_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn().await?;
        Ok(conn
            .execute("DELETE FROM checks WHERE ts < ?", params![to_millis(cutoff)])
            .await?)
    }

    pub async fn delete_alerts_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn().await?;
        Ok(conn
            .execute("DELETE FROM alerts WHERE ts < ?", params![to_millis(cutoff)])
            .await?)
    }
}

#[async_trait]
impl HistoryStore for LibsqlHistory {
    async fn append(&self, result: &CheckResult) -> std::result::Result<(), StoreError> {
        Ok(self.insert_check(result).await?)
    }

    async fn current_state(&self, target: &TargetId) -> std::result::Result<Option<TargetState>, StoreError> {
        Ok(self.state(target).await?.map(|stored| stored.state))
    }

    async fn save_state(&self, target: &TargetId, state: &TargetState) -> std::result::Result<(), StoreError> {
        Ok(self.upsert_state(target, state).await?)
    }

    async fn discard_state(&self, target: &TargetId) -> std::result::Result<(), StoreError> {
        Ok(self.delete_state(target).await?)
    }

    async fn record_alert(&self, record: &AlertRecord) -> std::result::Result<(), StoreError> {
        Ok(self.insert_alert(record).await?)
    }

    async fn recent(&self, target: &TargetId, limit: usize) -> std::result::Result<Vec<CheckResult>, StoreError> {
        Ok(self.recent_checks(target, limit).await?)
    }
}
