//! Notification channels built from the `[[channels]]` config section.

pub mod email;
pub mod log;
pub mod telegram;
pub mod webhook;

use beacon::{DeliveryError, NotificationChannel};
use reqwest::StatusCode;
use std::env;
use std::sync::Arc;

use crate::config::{ChannelConfig, ChannelKind};

pub use email::{EmailChannel, EmailSettings};
pub use log::LogChannel;
pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;

/// Instantiate every configured channel, filling missing credentials from
/// the environment
pub fn build_channels(configs: &[ChannelConfig]) -> anyhow::Result<Vec<Arc<dyn NotificationChannel>>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::with_capacity(configs.len());
    for config in configs {
        let name = config.name.clone();
        let channel: Arc<dyn NotificationChannel> = match &config.kind {
            ChannelKind::Telegram { token, chat_id, api_base } => {
                let mut telegram = TelegramChannel::new(
                    name,
                    client.clone(),
                    token.clone().or_else(|| env_var("TELEGRAM_TOKEN")),
                    chat_id.clone().or_else(|| env_var("TELEGRAM_CHAT_ID")),
                );
                if let Some(api_base) = api_base {
                    telegram = telegram.with_api_base(api_base.clone());
                }
                Arc::new(telegram)
            }
            ChannelKind::Email { smtp_host, smtp_port, username, password, from, to } => {
                let settings = EmailSettings {
                    smtp_host: smtp_host.clone().or_else(|| env_var("SMTP_HOST")),
                    smtp_port: smtp_port
                        .or_else(|| env_var("SMTP_PORT").and_then(|p| p.parse().ok()))
                        .unwrap_or(587),
                    username: username.clone().or_else(|| env_var("SMTP_USER")),
                    password: password.clone().or_else(|| env_var("SMTP_PASS")),
                    from: from.clone().or_else(|| env_var("SMTP_FROM")),
                    to: to.clone().or_else(|| env_var("EMAIL_TO")),
                };
                Arc::new(EmailChannel::new(name, settings)?)
            }
            ChannelKind::Webhook { url, headers } => {
                Arc::new(WebhookChannel::new(name, client.clone(), url.clone(), headers.clone()))
            }
            ChannelKind::Log => Arc::new(LogChannel::new(name)),
        };
        channels.push(channel);
    }

    Ok(channels)
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// Classify a failed HTTP send: server trouble and rate limits may pass on
/// retry, other client errors will not
pub(crate) fn http_failure(status: StatusCode, body: String) -> DeliveryError {
    let message = if body.is_empty() { status.to_string() } else { format!("{status}: {body}") };
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        DeliveryError::Transport(message)
    } else {
        DeliveryError::Rejected(message)
    }
}

pub(crate) fn request_failure(error: reqwest::Error) -> DeliveryError {
    DeliveryError::Transport(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_failure_classification() {
        assert!(http_failure(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(http_failure(StatusCode::TOO_MANY_REQUESTS, "slow down".into()).is_retryable());
        assert!(!http_failure(StatusCode::BAD_REQUEST, "chat not found".into()).is_retryable());
        assert_eq!(
            http_failure(StatusCode::FORBIDDEN, "nope".into()),
            DeliveryError::Rejected("403 Forbidden: nope".into())
        );
    }

    #[tokio::test]
    async fn test_build_channels_keeps_names_and_order() {
        let configs = vec![
            ChannelConfig { name: "stdout".into(), kind: ChannelKind::Log },
            ChannelConfig {
                name: "hooks".into(),
                kind: ChannelKind::Webhook { url: "http://127.0.0.1:9/".into(), headers: Default::default() },
            },
        ];

        let channels = build_channels(&configs).unwrap();
        let names: Vec<_> = channels.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["stdout", "hooks"]);
    }
}
