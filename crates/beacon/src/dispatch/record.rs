use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::Health;
use crate::target::TargetId;

/// What happened when an alert was sent to one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: String },
    /// The route names a channel that is not configured
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDelivery {
    pub channel: String,
    pub outcome: DeliveryOutcome,
}

impl ChannelDelivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}

/// One dispatched alert and its per-channel outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub target: TargetId,
    pub health: Health,
    pub timestamp: DateTime<Utc>,
    pub deliveries: Vec<ChannelDelivery>,
}

impl AlertRecord {
    pub fn delivered_to(&self, channel: &str) -> bool {
        self.deliveries.iter().any(|d| d.channel == channel && d.is_delivered())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelDelivery> {
        self.deliveries
            .iter()
            .filter(|d| matches!(d.outcome, DeliveryOutcome::Failed { .. }))
    }
}
