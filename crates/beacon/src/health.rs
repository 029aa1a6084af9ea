//! Health state machine.
//!
//! Confirmed health is a tagged state plus two consecutive-result counters.
//! [`TargetState::observe`] is a pure function of the current state, the
//! thresholds and one new result, so the debounce logic is testable without
//! timers. A target whose results oscillate faster than its thresholds never
//! produces a transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::target::{TargetId, Thresholds};
use crate::types::CheckResult;

/// Confirmed health of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Up,
    Down,
    #[default]
    Unknown,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Up => "up",
            Health::Down => "down",
            Health::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Up => write!(f, "UP"),
            Health::Down => write!(f, "DOWN"),
            Health::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for Health {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Health::Up),
            "down" => Ok(Health::Down),
            "unknown" => Ok(Health::Unknown),
            other => Err(format!("unknown health state: {other}")),
        }
    }
}

/// Per-target mutable record, owned by exactly one worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    pub health: Health,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_transition_at: Option<DateTime<Utc>>,
    /// When an alert for the current health was last handed to the dispatcher
    pub last_alert_at: Option<DateTime<Utc>>,
}

/// A confirmed change of health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub target: TargetId,
    pub from: Health,
    pub to: Health,
    pub at: DateTime<Utc>,
    /// The check result that confirmed the change
    pub result: CheckResult,
    /// Distinct recent error strings from the failing streak (may be empty)
    #[serde(default)]
    pub error_samples: Vec<String>,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one check result through the state machine.
    ///
    /// Returns the transition when this result confirms a health change.
    pub fn observe(&mut self, thresholds: Thresholds, result: &CheckResult) -> Option<Transition> {
        let confirmed = if result.is_success() {
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.consecutive_failures = 0;
            (self.health != Health::Up && self.consecutive_successes >= thresholds.recovery)
                .then_some(Health::Up)
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_successes = 0;
            (self.health != Health::Down && self.consecutive_failures >= thresholds.failure)
                .then_some(Health::Down)
        };

        let to = confirmed?;
        let from = self.health;
        self.health = to;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.last_transition_at = Some(result.timestamp);
        self.last_alert_at = None;

        Some(Transition {
            target: result.target.clone(),
            from,
            to,
            at: result.timestamp,
            result: result.clone(),
            error_samples: Vec::new(),
        })
    }
}

/// Bounded set of distinct error strings from the current failing streak
#[derive(Debug, Clone, Default)]
pub struct ErrorSamples {
    capacity: usize,
    samples: VecDeque<String>,
}

impl ErrorSamples {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, samples: VecDeque::with_capacity(capacity) }
    }

    /// Track `result`; a success ends the streak and clears the samples
    pub fn record(&mut self, result: &CheckResult) {
        if result.is_success() {
            self.samples.clear();
            return;
        }
        if self.capacity == 0 {
            return;
        }
        let Some(error) = result.error.as_ref() else {
            return;
        };

        self.samples.retain(|existing| existing != error);
        self.samples.push_back(error.clone());
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.samples.iter().cloned().collect()
    }
}
