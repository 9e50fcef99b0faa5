//! TCP Reachability Probe
//!
//! Opens (and immediately closes) a TCP connection to a dependency such as
//! a database or cache. Cheap enough to run on every readiness call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use crate::ports::DependencyProbe;

/// Probe that succeeds when `address` accepts a TCP connection.
#[derive(Debug)]
pub struct TcpProbe {
    address: String,
    pings_ok: AtomicU64,
    pings_failed: AtomicU64,
    last_latency_ms: AtomicU64,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            pings_ok: AtomicU64::new(0),
            pings_failed: AtomicU64::new(0),
            last_latency_ms: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self, timeout: Duration) -> anyhow::Result<()> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.address))
            .await
            .with_context(|| format!("connect to {} timed out", self.address))?
            .with_context(|| format!("connect to {} failed", self.address))?;
        drop(stream);
        Ok(())
    }
}

#[async_trait]
impl DependencyProbe for TcpProbe {
    async fn ping(&self, timeout: Duration) -> anyhow::Result<()> {
        let start = Instant::now();
        let result = self.connect(timeout).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_latency_ms.store(elapsed_ms, Ordering::Relaxed);

        match &result {
            Ok(()) => {
                self.pings_ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.pings_failed.fetch_add(1, Ordering::Relaxed);
                debug!(address = %self.address, error = %e, "TCP probe failed");
            }
        }
        result
    }

    fn stats(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("address".to_string(), serde_json::json!(self.address)),
            (
                "pings_ok".to_string(),
                serde_json::json!(self.pings_ok.load(Ordering::Relaxed)),
            ),
            (
                "pings_failed".to_string(),
                serde_json::json!(self.pings_failed.load(Ordering::Relaxed)),
            ),
            (
                "last_latency_ms".to_string(),
                serde_json::json!(self.last_latency_ms.load(Ordering::Relaxed)),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let probe = TcpProbe::new(address.clone());

        probe.ping(Duration::from_secs(1)).await.unwrap();

        let stats = probe.stats();
        assert_eq!(stats["address"], serde_json::json!(address));
        assert_eq!(stats["pings_ok"], 1);
        assert_eq!(stats["pings_failed"], 0);
    }

    #[tokio::test]
    async fn test_ping_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = TcpProbe::new(address);
        assert!(probe.ping(Duration::from_secs(1)).await.is_err());
        assert_eq!(probe.stats()["pings_failed"], 1);
    }
}
