//! Dependency Probe Port - Readiness Check Interface
//!
//! Anything the health aggregator can ping with a deadline and ask for a
//! point-in-time statistics snapshot: database pools, caches, downstream
//! services.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// Trait for dependencies that take part in readiness checks.
///
/// The aggregator always wraps `ping` in its own timeout; `timeout` is passed
/// so implementors can bound their own I/O with the same budget.
#[async_trait]
pub trait DependencyProbe: Send + Sync + 'static {
    /// Check that the dependency is reachable.
    ///
    /// # Errors
    /// Returns an error if the dependency cannot be reached.
    async fn ping(&self, timeout: Duration) -> anyhow::Result<()>;

    /// Point-in-time statistics. Best effort, not validated.
    fn stats(&self) -> HashMap<String, serde_json::Value>;
}
