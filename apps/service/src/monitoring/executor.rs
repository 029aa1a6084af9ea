use async_trait::async_trait;
use beacon::{CheckKind, ProbeError, ProbeOutcome, Prober, Target};

use super::checker::{Checker, HttpChecker, TcpChecker};

/// Runs the checker matching each target's kind
pub struct CheckExecutor {
    http_checker: HttpChecker,
    tcp_checker: TcpChecker,
}

impl CheckExecutor {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self { http_checker: HttpChecker::new()?, tcp_checker: TcpChecker })
    }
}

#[async_trait]
impl Prober for CheckExecutor {
    async fn probe(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        let checker: &dyn Checker = match target.kind {
            CheckKind::Http => &self.http_checker,
            CheckKind::Tcp => &self.tcp_checker,
        };

        let (latency_ms, status_code) = checker.check(&target.address, target.timeout).await?;
        Ok(ProbeOutcome { latency_ms, status_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection
    async fn serve(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{address}/")
    }

    #[tokio::test]
    async fn test_http_success_and_redirect_are_up() {
        let executor = CheckExecutor::new().unwrap();

        let ok = Target::http("ok", serve("204 No Content").await);
        let outcome = executor.probe(&ok).await.unwrap();
        assert_eq!(outcome.status_code, Some(204));

        let moved = Target::http("moved", serve("304 Not Modified").await);
        assert_eq!(executor.probe(&moved).await.unwrap().status_code, Some(304));
    }

    #[tokio::test]
    async fn test_http_server_error_is_down() {
        let executor = CheckExecutor::new().unwrap();
        let target = Target::http("broken", serve("503 Service Unavailable").await);

        let err = executor.probe(&target).await.unwrap_err();
        assert_eq!(err, ProbeError::Status(503));
        assert_eq!(err.to_string(), "HTTP check failed with status code: 503");
    }

    #[tokio::test]
    async fn test_tcp_target_uses_tcp_checker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = Target::tcp("db", listener.local_addr().unwrap().to_string());

        let outcome = CheckExecutor::new().unwrap().probe(&target).await.unwrap();
        assert_eq!(outcome.status_code, None);
    }
}
