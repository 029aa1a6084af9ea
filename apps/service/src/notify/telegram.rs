use async_trait::async_trait;
use beacon::{AlertPayload, DeliveryError, NotificationChannel};
use serde_json::json;

use super::{http_failure, request_failure};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Sends the alert body as a Telegram bot message
pub struct TelegramChannel {
    name: String,
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramChannel {
    pub fn new(name: String, client: reqwest::Client, token: Option<String>, chat_id: Option<String>) -> Self {
        if token.is_none() || chat_id.is_none() {
            tracing::warn!(channel = %name, "Telegram token or chat id missing, alerts will not be sent");
        }
        Self { name, client, api_base: TELEGRAM_API.to_string(), token, chat_id }
    }

    /// Point at another Bot API server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), DeliveryError> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            return Err(DeliveryError::NotConfigured(self.name.clone()));
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), token);
        let response = self
            .client
            .post(url)
            .json(&json!({ "chat_id": chat_id, "text": payload.body() }))
            .send()
            .await
            .map_err(request_failure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_failure(status, body));
        }

        tracing::debug!(channel = %self.name, target_name = %payload.target, "Telegram notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon::{CheckResult, Target, TargetState, Thresholds};

    fn payload() -> AlertPayload {
        let target = Target::http("shop", "https://shop.example.com");
        let mut state = TargetState::new();
        let transition = state
            .observe(Thresholds::new(1, 1), &CheckResult::success(&target, 40, Some(200)))
            .unwrap();
        AlertPayload::from_transition(&transition)
    }

    #[tokio::test]
    async fn test_missing_credentials_are_not_retried() {
        let channel = TelegramChannel::new("tg".into(), reqwest::Client::new(), None, Some("42".into()));
        let err = channel.send(&payload()).await.unwrap_err();
        assert_eq!(err, DeliveryError::NotConfigured("tg".into()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let channel = TelegramChannel::new("tg".into(), reqwest::Client::new(), Some("t0k".into()), Some("42".into()))
            .with_api_base(base);
        let err = channel.send(&payload()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
