// Single-shot reachability probes

use crate::config::{Config, ProbeMethod};
use crate::monitor::ProbeResult;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, ICMP};
use tokio::net::TcpStream;
use tokio::time::timeout;

const ICMP_PAYLOAD: [u8; 56] = [0u8; 56];

/// One bounded reachability check. Implementations never retry and never
/// fail: an error or timeout is reported as a `Down` result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, target: &str) -> ProbeResult;
}

/// ICMP echo probe
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    timeout: Duration,
}

impl IcmpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn echo(&self, target: &str) -> ProbeResult {
        let ip = match resolve(target).await {
            Ok(ip) => ip,
            Err(e) => return ProbeResult::down(target, e),
        };

        let config = match ip {
            IpAddr::V4(_) => PingConfig::default(),
            IpAddr::V6(_) => PingConfig::builder().kind(ICMP::V6).build(),
        };
        let client = match PingClient::new(&config) {
            Ok(client) => client,
            Err(e) => {
                // Usually missing CAP_NET_RAW or a restrictive ping_group_range
                tracing::warn!("Cannot open ICMP socket for {}: {}", target, e);
                return ProbeResult::down(target, format!("ICMP socket error: {}", e));
            }
        };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &ICMP_PAYLOAD).await {
            Ok((_, rtt)) => ProbeResult::up(
                target,
                rtt.as_secs_f64() * 1000.0,
                format!("ICMP reply from {}", ip),
            ),
            Err(e) => ProbeResult::down(target, format!("No ICMP reply from {}: {}", ip, e)),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for IcmpProbe {
    async fn probe(&self, target: &str) -> ProbeResult {
        // Resolution counts against the same budget as the echo itself
        match timeout(self.timeout, self.echo(target)).await {
            Ok(result) => result,
            Err(_) => ProbeResult::down(
                target,
                format!("Request timed out after {}ms", self.timeout.as_millis()),
            ),
        }
    }
}

/// TCP connect probe for hosts that filter ICMP
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, target: &str) -> ProbeResult {
        let start = Instant::now();
        match timeout(self.timeout, TcpStream::connect((target, self.port))).await {
            Ok(Ok(_stream)) => ProbeResult::up(
                target,
                start.elapsed().as_secs_f64() * 1000.0,
                format!("TCP handshake on port {} succeeded", self.port),
            ),
            Ok(Err(e)) => ProbeResult::down(
                target,
                format!("TCP connect to port {} failed: {}", self.port, e),
            ),
            Err(_) => ProbeResult::down(
                target,
                format!("TCP connect to port {} timed out after {}ms", self.port, self.timeout.as_millis()),
            ),
        }
    }
}

/// Build the configured probe. Assumes `Config::validate_probe` passed.
pub fn build_probe(config: &Config) -> Box<dyn ReachabilityProbe> {
    match (config.probe.method, config.probe.port) {
        (ProbeMethod::Tcp, Some(port)) => Box::new(TcpProbe::new(port, config.probe_timeout())),
        _ => Box::new(IcmpProbe::new(config.probe_timeout())),
    }
}

async fn resolve(host: &str) -> Result<IpAddr, String> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| format!("DNS resolution failed for {}: {}", host, e))?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| format!("No IP address found for {}", host))
}
