//! Periodic deletion of old checks and alerts.
//!
//! Target states are never expired; they are dropped when a target leaves
//! the registry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::LibsqlHistory;

/// How often the background cleanup runs
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Longest horizon honoured; larger values are clamped to it
const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep check results
    pub check_days: i64,
    /// Days to keep alert records
    pub alert_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { check_days: 30, alert_days: 30 }
    }
}

impl RetentionPolicy {
    /// Same horizon for checks and alerts
    pub fn days(days: i64) -> Self {
        Self { check_days: days, alert_days: days }
    }
}

/// Rows removed by one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub checks: u64,
    pub alerts: u64,
}

pub struct RetentionCleanup {
    history: LibsqlHistory,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(history: LibsqlHistory, policy: RetentionPolicy) -> Self {
        Self { history, policy }
    }

    pub async fn cleanup_expired(&self) -> Result<CleanupReport> {
        let now = Utc::now();
        let check_cutoff = cutoff(now, self.policy.check_days);
        let alert_cutoff = cutoff(now, self.policy.alert_days);

        debug!(%check_cutoff, %alert_cutoff, "Starting retention cleanup");

        let report = CleanupReport {
            checks: self.history.delete_checks_before(check_cutoff).await?,
            alerts: self.history.delete_alerts_before(alert_cutoff).await?,
        };

        info!(
            checks = report.checks,
            alerts = report.alerts,
            "Retention cleanup completed"
        );
        Ok(report)
    }

    /// Start background cleanup task (runs every hour, first pass immediately)
    pub fn start_periodic_cleanup(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                interval.tick().await;
                if let Err(e) = self.cleanup_expired().await {
                    warn!(error = %e, "Periodic retention cleanup failed");
                }
            }
        })
    }
}

/// Oldest timestamp kept when keeping `days` days; negative counts as zero
fn cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    ChronoDuration::try_days(days.clamp(0, MAX_RETENTION_DAYS))
        .and_then(|horizon| now.checked_sub_signed(horizon))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
