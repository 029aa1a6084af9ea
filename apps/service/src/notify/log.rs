use async_trait::async_trait;
use beacon::{AlertPayload, DeliveryError, Health, NotificationChannel};

/// Writes alerts to the service log
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), DeliveryError> {
        match payload.current {
            Health::Down => tracing::warn!(
                channel = %self.name,
                target_name = %payload.target,
                "{}",
                payload.body()
            ),
            _ => tracing::info!(
                channel = %self.name,
                target_name = %payload.target,
                "{}",
                payload.body()
            ),
        }
        Ok(())
    }
}
