use async_trait::async_trait;
use beacon::{AlertPayload, DeliveryError, NotificationChannel};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Used when neither `from` nor a username is configured
const DEFAULT_FROM: &str = "monitor@example.com";

#[derive(Debug, Clone, Default)]
pub struct EmailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    /// Comma-separated recipients
    pub to: Option<String>,
}

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

/// Sends alerts over SMTP with STARTTLS
pub struct EmailChannel {
    name: String,
    mailer: Option<Mailer>,
}

impl EmailChannel {
    /// Without a host or recipients the channel is created but every send
    /// fails as not configured
    pub fn new(name: String, settings: EmailSettings) -> anyhow::Result<Self> {
        let (Some(host), Some(to)) = (settings.smtp_host.as_deref(), settings.to.as_deref()) else {
            tracing::warn!(channel = %name, "SMTP host or recipient missing, alerts will not be sent");
            return Ok(Self { name, mailer: None });
        };

        let from = settings
            .from
            .as_deref()
            .or(settings.username.as_deref())
            .unwrap_or(DEFAULT_FROM)
            .parse::<Mailbox>()?;
        let to = to
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::parse::<Mailbox>)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(settings.smtp_port)
            .timeout(Some(Duration::from_secs(10)));
        if let (Some(user), Some(pass)) = (settings.username, settings.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self { name, mailer: Some(Mailer { transport: builder.build(), from, to }) })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), DeliveryError> {
        let Some(mailer) = &self.mailer else {
            return Err(DeliveryError::NotConfigured(self.name.clone()));
        };

        let mut message = Message::builder().from(mailer.from.clone()).subject(payload.subject());
        for recipient in &mailer.to {
            message = message.to(recipient.clone());
        }
        let message = message
            .body(payload.body())
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;

        mailer.transport.send(message).await.map_err(|e| {
            if e.is_permanent() {
                DeliveryError::Rejected(e.to_string())
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        tracing::debug!(channel = %self.name, target_name = %payload.target, "Email notification sent");
        Ok(())
    }
}
