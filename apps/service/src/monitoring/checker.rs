use beacon::ProbeError;
use std::time::{Duration, Instant};

/// Checker trait for the different kinds of health check
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform the check and return latency in milliseconds and optional status code
    async fn check(&self, address: &str, timeout: Duration) -> Result<(u64, Option<u16>), ProbeError>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, address: &str, timeout: Duration) -> Result<(u64, Option<u16>), ProbeError> {
        let start = Instant::now();

        let response = self
            .client
            .get(address)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::Request(e.to_string())
                }
            })?;

        let latency = start.elapsed().as_millis() as u64;
        let status = response.status();

        // Consider 2xx and 3xx as success
        if status.is_success() || status.is_redirection() {
            Ok((latency, Some(status.as_u16())))
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// TCP port checker
pub struct TcpChecker;

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, address: &str, timeout: Duration) -> Result<(u64, Option<u16>), ProbeError> {
        let start = Instant::now();

        tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address))
            .await
            .map_err(|_| ProbeError::Timeout)?
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        let latency = start.elapsed().as_millis() as u64;
        Ok((latency, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_check_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let (latency, status) = TcpChecker.check(&address, Duration::from_secs(2)).await.unwrap();
        assert!(latency < 2000);
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn test_tcp_check_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpChecker.check(&address, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect(_)));
    }

    #[tokio::test]
    async fn test_http_check_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker = HttpChecker::new().unwrap();
        let err = checker
            .check(&format!("http://127.0.0.1:{port}/"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Request(_)));
    }
}
