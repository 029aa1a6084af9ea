use async_trait::async_trait;
use beacon::{AlertPayload, DeliveryError, NotificationChannel};
use std::collections::HashMap;

use super::{http_failure, request_failure};

/// POSTs the alert as JSON to a fixed URL
pub struct WebhookChannel {
    name: String,
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookChannel {
    pub fn new(name: String, client: reqwest::Client, url: String, headers: HashMap<String, String>) -> Self {
        Self { name, client, url, headers }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "target": payload.target,
            "address": payload.address,
            "state": payload.current,
            "previous": payload.previous,
            "timestamp": payload.at.to_rfc3339(),
            "latency_ms": payload.latency_ms,
            "status_code": payload.status_code,
            "error": payload.error,
            "error_samples": payload.error_samples,
            "subject": payload.subject(),
            "text": payload.body(),
        });

        let mut request = self.client.post(&self.url).json(&body);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(request_failure)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(http_failure(status, text));
        }

        tracing::debug!(channel = %self.name, url = %self.url, "Webhook notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon::{CheckResult, Health, Target, TargetState, Thresholds};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Answer every request with `status_line`, forwarding the raw request
    async fn serve(status_line: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (format!("http://{address}/hook"), rx)
    }

    /// Read headers, then as much body as `content-length` announces
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&raw);
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let expected = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if body.len() >= expected {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    fn payload() -> AlertPayload {
        let target = Target::http("shop", "https://shop.example.com");
        let mut state = TargetState::new();
        let transition = state
            .observe(Thresholds::new(1, 1), &CheckResult::failure(&target, "timeout"))
            .unwrap();
        AlertPayload::from_transition(&transition)
    }

    #[tokio::test]
    async fn test_webhook_posts_json_with_headers() {
        let (url, mut requests) = serve("200 OK").await;
        let headers = HashMap::from([("X-Token".to_string(), "abc".to_string())]);
        let channel = WebhookChannel::new("hooks".into(), reqwest::Client::new(), url, headers);

        channel.send(&payload()).await.unwrap();

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.to_ascii_lowercase().contains("x-token: abc"));

        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["target"], "shop");
        assert_eq!(json["address"], "https://shop.example.com");
        assert_eq!(json["state"], serde_json::to_value(Health::Down).unwrap());
        assert_eq!(json["previous"], serde_json::to_value(Health::Unknown).unwrap());
        assert_eq!(json["error"], "timeout");
        assert_eq!(json["subject"], "Monitor: shop DOWN");
        assert_eq!(json["text"], "[shop] https://shop.example.com -> DOWN\ntimeout");
    }

    #[tokio::test]
    async fn test_webhook_server_error_is_retryable() {
        let (url, _requests) = serve("502 Bad Gateway").await;
        let channel = WebhookChannel::new("hooks".into(), reqwest::Client::new(), url, HashMap::new());

        let err = channel.send(&payload()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_webhook_client_error_is_rejected() {
        let (url, _requests) = serve("404 Not Found").await;
        let channel = WebhookChannel::new("hooks".into(), reqwest::Client::new(), url, HashMap::new());

        let err = channel.send(&payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(_)));
    }
}
