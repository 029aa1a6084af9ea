//! Target descriptors and the registry snapshot they live in.
//!
//! A [`Target`] never changes once loaded. Reloading configuration builds a
//! new [`Registry`] which the scheduler diffs against the running one.

pub mod registry;
pub mod validation;

pub use registry::{Registry, RegistryDiff};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unique identity of a monitored target (its configured name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Type of check to perform against a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// HTTP or HTTPS GET; the URL scheme decides whether TLS is used
    #[default]
    Http,
    /// Plain TCP connect to `host:port`
    Tcp,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Http => write!(f, "http"),
            CheckKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// Consecutive-result thresholds that confirm a health change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Consecutive failures required to declare DOWN
    pub failure: u32,
    /// Consecutive successes required to declare UP
    pub recovery: u32,
}

impl Thresholds {
    pub const fn new(failure: u32, recovery: u32) -> Self {
        Self { failure, recovery }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { failure: 2, recovery: 1 }
    }
}

/// A monitored endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,

    /// URL for HTTP checks, `host:port` for TCP checks
    pub address: String,

    pub kind: CheckKind,

    #[serde(with = "duration_millis")]
    pub interval: Duration,

    #[serde(with = "duration_millis")]
    pub timeout: Duration,

    pub thresholds: Thresholds,

    /// Channel names to notify; `None` routes to every configured channel
    #[serde(default)]
    pub channels: Option<Vec<String>>,
}

impl Target {
    /// Create an HTTP target with default cadence and thresholds
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, url, CheckKind::Http)
    }

    /// Create a TCP target with default cadence and thresholds
    pub fn tcp(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self::new(name, addr, CheckKind::Tcp)
    }

    pub fn new(name: impl Into<String>, address: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            id: TargetId::new(name),
            address: address.into(),
            kind,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
            thresholds: Thresholds::default(),
            channels: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_thresholds(mut self, failure: u32, recovery: u32) -> Self {
        self.thresholds = Thresholds::new(failure, recovery);
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
