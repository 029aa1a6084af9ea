//! Target validation applied whenever a registry is built.

use std::time::Duration;
use url::{Host, Url};

use super::{CheckKind, Target};
use crate::error::ConfigError;

const MAX_INTERVAL: Duration = Duration::from_secs(86400); // 24 hours
const MAX_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes

/// Validate a single target descriptor
pub fn validate_target(target: &Target) -> Result<(), ConfigError> {
    let name = target.id.as_str();
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyName);
    }

    match target.kind {
        CheckKind::Http => validate_http_address(name, &target.address)?,
        CheckKind::Tcp => validate_tcp_address(name, &target.address)?,
    }

    validate_interval(name, target.interval)?;
    validate_timeout(name, target.timeout)?;

    if target.thresholds.failure == 0 {
        return Err(ConfigError::invalid(name, "failure_threshold must be at least 1"));
    }
    if target.thresholds.recovery == 0 {
        return Err(ConfigError::invalid(name, "recovery_threshold must be at least 1"));
    }

    if target.timeout > target.interval {
        tracing::warn!(
            target_name = %name,
            "Timeout {:?} exceeds interval {:?}; slow checks will skip ticks",
            target.timeout,
            target.interval
        );
    }

    Ok(())
}

fn validate_http_address(name: &str, address: &str) -> Result<(), ConfigError> {
    let url = Url::parse(address)
        .map_err(|e| ConfigError::invalid(name, format!("invalid URL {address}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::invalid(name, format!("invalid scheme for HTTP check: {other}")));
        }
    }

    if url.host_str().is_none() {
        return Err(ConfigError::invalid(name, format!("URL has no host: {address}")));
    }

    if url.port() == Some(0) {
        return Err(ConfigError::invalid(name, "port 0 is not valid"));
    }

    Ok(())
}

fn validate_tcp_address(name: &str, address: &str) -> Result<(), ConfigError> {
    // host:port; IPv6 literals must be bracketed
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::invalid(name, "TCP target must be in format host:port"))?;

    if host.is_empty() || host == "[]" {
        return Err(ConfigError::invalid(name, "TCP target has an empty host"));
    }
    Host::parse(host).map_err(|e| ConfigError::invalid(name, format!("invalid host in {address}: {e}")))?;

    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::invalid(name, format!("invalid port number in {address}")))?;
    if port == 0 {
        return Err(ConfigError::invalid(name, "port 0 is not valid"));
    }

    Ok(())
}

fn validate_interval(name: &str, interval: Duration) -> Result<(), ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::invalid(name, "check interval must be greater than zero"));
    }
    if interval > MAX_INTERVAL {
        return Err(ConfigError::invalid(
            name,
            format!("check interval too long: {:?} (maximum: {:?})", interval, MAX_INTERVAL),
        ));
    }
    Ok(())
}

fn validate_timeout(name: &str, timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::invalid(name, "timeout must be greater than zero"));
    }
    if timeout > MAX_TIMEOUT {
        return Err(ConfigError::invalid(
            name,
            format!("timeout too long: {:?} (maximum: {:?})", timeout, MAX_TIMEOUT),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_target() {
        assert!(validate_target(&Target::http("a", "https://example.com")).is_ok());
        assert!(validate_target(&Target::http("a", "http://example.com:8080/health")).is_ok());
        assert!(validate_target(&Target::http("a", "http://localhost:3000")).is_ok());

        assert!(validate_target(&Target::http("a", "ftp://example.com")).is_err());
        assert!(validate_target(&Target::http("a", "not a url")).is_err());
        assert!(validate_target(&Target::http("a", "http://example.com:0")).is_err());
    }

    #[test]
    fn test_validate_tcp_target() {
        assert!(validate_target(&Target::tcp("a", "example.com:5432")).is_ok());
        assert!(validate_target(&Target::tcp("a", "[::1]:22")).is_ok());
        assert!(validate_target(&Target::tcp("a", "10.0.0.5:6379")).is_ok());

        assert!(validate_target(&Target::tcp("a", "example.com")).is_err());
        assert!(validate_target(&Target::tcp("a", "example.com:")).is_err());
        assert!(validate_target(&Target::tcp("a", ":80")).is_err());
        assert!(validate_target(&Target::tcp("a", "example.com:0")).is_err());
    }

    #[test]
    fn test_tcp_ipv6_host_must_be_bracketed() {
        assert!(validate_target(&Target::tcp("a", "::1:22")).is_err());
        assert!(validate_target(&Target::tcp("a", "fe80::1:443")).is_err());
        assert!(validate_target(&Target::tcp("a", "[fe80::1]:443")).is_ok());
        assert!(validate_target(&Target::tcp("a", "[not-an-ip]:443")).is_err());
    }

    #[test]
    fn test_validate_thresholds() {
        let target = Target::http("a", "https://example.com").with_thresholds(0, 1);
        assert!(matches!(validate_target(&target), Err(ConfigError::InvalidTarget { .. })));

        let target = Target::http("a", "https://example.com").with_thresholds(1, 0);
        assert!(validate_target(&target).is_err());

        let target = Target::http("a", "https://example.com").with_thresholds(1, 1);
        assert!(validate_target(&target).is_ok());
    }

    #[test]
    fn test_validate_cadence() {
        let base = Target::http("a", "https://example.com");
        assert!(validate_target(&base.clone().with_interval(Duration::ZERO)).is_err());
        assert!(validate_target(&base.clone().with_interval(Duration::from_secs(100_000))).is_err());
        assert!(validate_target(&base.clone().with_timeout(Duration::ZERO)).is_err());
        assert!(validate_target(&base.clone().with_timeout(Duration::from_secs(600))).is_err());
        assert!(validate_target(&base.with_interval(Duration::from_secs(1))).is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            validate_target(&Target::http("  ", "https://example.com")),
            Err(ConfigError::EmptyName)
        );
    }
}
