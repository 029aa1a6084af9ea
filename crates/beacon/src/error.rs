//! Error taxonomy for the monitoring engine.
//!
//! Check, storage and delivery failures are routine and never stop the
//! engine. Configuration failures reject a reload. Only [`EngineError`]
//! is fatal.

use thiserror::Error;

/// A single health check did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP check failed with status code: {0}")]
    Status(u16),

    #[error("TCP connection failed: {0}")]
    Connect(String),

    #[error("probe task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

/// The history store could not complete an operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history backend error: {0}")]
    Backend(String),

    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// A notification channel could not deliver an alert.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("channel not configured: {0}")]
    NotConfigured(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("channel rejected alert: {0}")]
    Rejected(String),
}

impl DeliveryError {
    /// Transport errors may succeed on a later attempt; the rest will not
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transport(_))
    }
}

/// The target list could not be turned into a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target name must not be empty")]
    EmptyName,

    #[error("duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("target {target} routes to unknown channel {channel}")]
    UnknownChannel { target: String, channel: String },
}

impl ConfigError {
    pub(crate) fn invalid(target: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget { target: target.to_string(), reason: reason.into() }
    }
}

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine is not running")]
    NotRunning,

    #[error("engine has been stopped")]
    Stopped,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
