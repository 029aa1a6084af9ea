use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::target::{Target, TargetId};

/// Outcome of a single check attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// Result of a monitoring check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the target that was checked
    pub target: TargetId,

    /// URL or `host:port` that was checked
    pub address: String,

    /// When the check completed
    pub timestamp: DateTime<Utc>,

    pub outcome: Outcome,

    /// Response time in milliseconds, when one was measured
    pub latency_ms: Option<u64>,

    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,

    /// Error detail (if the check failed)
    pub error: Option<String>,
}

impl CheckResult {
    /// Create a successful result for `target`
    pub fn success(target: &Target, latency_ms: u64, status_code: Option<u16>) -> Self {
        Self {
            target: target.id.clone(),
            address: target.address.clone(),
            timestamp: Utc::now(),
            outcome: Outcome::Success,
            latency_ms: Some(latency_ms),
            status_code,
            error: None,
        }
    }

    /// Create a failed result for `target`
    pub fn failure(target: &Target, error: impl Into<String>) -> Self {
        Self {
            target: target.id.clone(),
            address: target.address.clone(),
            timestamp: Utc::now(),
            outcome: Outcome::Failure,
            latency_ms: None,
            status_code: None,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_builders() {
        let target = Target::http("site", "https://example.com");

        let ok = CheckResult::success(&target, 42, Some(200));
        assert!(ok.is_success());
        assert_eq!(ok.latency_ms, Some(42));
        assert_eq!(ok.error, None);

        let failed = CheckResult::failure(&target, "timeout").with_latency(5000);
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("timeout"));
        assert_eq!(failed.latency_ms, Some(5000));
        assert_eq!(failed.address, "https://example.com");
    }
}
