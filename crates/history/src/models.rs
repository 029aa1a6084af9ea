//! Conversions between stored rows and engine types.

use beacon::{AlertRecord, CheckResult, ChannelDelivery, Health, Outcome, TargetId, TargetState};
use chrono::{DateTime, Utc};
use libsql::Row;
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};

/// Persisted state of one target, as read back for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub target: TargetId,
    #[serde(flatten)]
    pub state: TargetState,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(table: &'static str, ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| HistoryError::Corrupt {
        table,
        reason: format!("timestamp out of range: {ms}"),
    })
}

fn parse_health(table: &'static str, raw: &str) -> Result<Health> {
    raw.parse()
        .map_err(|reason| HistoryError::Corrupt { table, reason })
}

/// `SELECT target, address, ok, latency_ms, status_code, error, ts FROM checks`
pub(crate) fn check_from_row(row: &Row) -> Result<CheckResult> {
    let ok: i64 = row.get(2)?;
    let latency_ms: Option<i64> = row.get(3)?;
    let status_code: Option<i64> = row.get(4)?;

    Ok(CheckResult {
        target: TargetId::new(row.get::<String>(0)?),
        address: row.get(1)?,
        timestamp: from_millis("checks", row.get(6)?)?,
        outcome: if ok != 0 { Outcome::Success } else { Outcome::Failure },
        latency_ms: latency_ms.map(|v| v.max(0) as u64),
        status_code: status_code.and_then(|v| u16::try_from(v).ok()),
        error: row.get(5)?,
    })
}

/// `SELECT target, health, consecutive_failures, consecutive_successes,
/// last_transition_at, last_alert_at, updated_at FROM target_states`
pub(crate) fn state_from_row(row: &Row) -> Result<StoredState> {
    let health: String = row.get(1)?;
    let last_transition_at: Option<i64> = row.get(4)?;
    let last_alert_at: Option<i64> = row.get(5)?;

    let state = TargetState {
        health: parse_health("target_states", &health)?,
        consecutive_failures: row.get::<i64>(2)?.clamp(0, u32::MAX as i64) as u32,
        consecutive_successes: row.get::<i64>(3)?.clamp(0, u32::MAX as i64) as u32,
        last_transition_at: last_transition_at.map(|ms| from_millis("target_states", ms)).transpose()?,
        last_alert_at: last_alert_at.map(|ms| from_millis("target_states", ms)).transpose()?,
    };

    Ok(StoredState {
        target: TargetId::new(row.get::<String>(0)?),
        state,
        updated_at: from_millis("target_states", row.get(6)?)?,
    })
}

/// `SELECT target, health, ts, deliveries FROM alerts`
pub(crate) fn alert_from_row(row: &Row) -> Result<AlertRecord> {
    let health: String = row.get(1)?;
    let deliveries: String = row.get(3)?;

    Ok(AlertRecord {
        target: TargetId::new(row.get::<String>(0)?),
        health: parse_health("alerts", &health)?,
        timestamp: from_millis("alerts", row.get(2)?)?,
        deliveries: serde_json::from_str::<Vec<ChannelDelivery>>(&deliveries)?,
    })
}
