//! Healthcheck against a running querysim server.
//!
//! Used by container healthchecks via `querysim healthcheck`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;

/// Upper bound for the complete healthcheck request.
const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests `/health` from the server at the configured address.
///
/// Fails if the server cannot be reached or responds with a non-success status.
pub async fn healthcheck(config: Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(HEALTHCHECK_TIMEOUT)
        .build()?;
    let url = health_url(config.http_addr);

    tracing::debug!("sending healthcheck request to {}", url);
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("server at {} is unreachable", config.http_addr))?;
    if !response.status().is_success() {
        anyhow::bail!("Bad Status: {}", response.status());
    }

    tracing::info!("OK");
    Ok(())
}

/// Builds the health URL, connecting to loopback when bound to all interfaces.
fn health_url(mut addr: SocketAddr) -> String {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => addr.set_ip(Ipv4Addr::LOCALHOST.into()),
        IpAddr::V6(ip) if ip.is_unspecified() => addr.set_ip(Ipv6Addr::LOCALHOST.into()),
        _ => (),
    }

    format!("http://{addr}/health")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_addresses_use_loopback() {
        let v4 = SocketAddr::from(([0, 0, 0, 0], 8080));
        assert_eq!(health_url(v4), "http://127.0.0.1:8080/health");

        let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, 8080));
        assert_eq!(health_url(v6), "http://[::1]:8080/health");

        let explicit = SocketAddr::from(([10, 0, 0, 1], 9000));
        assert_eq!(health_url(explicit), "http://10.0.0.1:9000/health");
    }
}
