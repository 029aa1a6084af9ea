use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::health::{Health, Transition};
use crate::target::TargetId;

/// Human-readable alert composed from a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub target: TargetId,
    pub address: String,
    pub previous: Health,
    pub current: Health,
    pub at: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    /// Last error detail, only set for DOWN alerts
    pub error: Option<String>,
    #[serde(default)]
    pub error_samples: Vec<String>,
}

impl AlertPayload {
    pub fn from_transition(transition: &Transition) -> Self {
        let result = &transition.result;
        let down = transition.to == Health::Down;
        Self {
            target: transition.target.clone(),
            address: result.address.clone(),
            previous: transition.from,
            current: transition.to,
            at: transition.at,
            latency_ms: result.latency_ms,
            status_code: result.status_code,
            error: if down { result.error.clone() } else { None },
            error_samples: if down { transition.error_samples.clone() } else { Vec::new() },
        }
    }

    /// Short subject line, e.g. for e-mail
    pub fn subject(&self) -> String {
        format!("Monitor: {} {}", self.target, self.current)
    }

    /// One-line summary of what the confirming check observed
    pub fn details(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        match (self.status_code, self.latency_ms) {
            (Some(code), Some(latency)) => format!("HTTP {code} in {latency}ms"),
            (None, Some(latency)) => format!("responded in {latency}ms"),
            (Some(code), None) => format!("HTTP {code}"),
            (None, None) => "no details".to_string(),
        }
    }

    /// Full message body
    pub fn body(&self) -> String {
        let mut text = format!(
            "[{}] {} -> {}\n{}",
            self.target,
            self.address,
            self.current,
            self.details()
        );

        // Only worth listing when they add something beyond the last error
        if self.error_samples.len() > 1 {
            text.push_str("\nRecent errors:");
            for sample in &self.error_samples {
                let _ = write!(text, "\n  - {sample}");
            }
        }

        let _ = write!(text, "\nAt: {}", self.at.to_rfc3339());
        text
    }
}
