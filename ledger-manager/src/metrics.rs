//! Metrics collection for observability
//!
//! Prometheus counters for the sync protocol, kept on a registry owned by
//! each [`SyncMetrics`] so several managers can live in one process.
//!
//! # Metrics
//!
//! - `ledger_sync_reloads_total` - Completed reloads
//! - `ledger_sync_conflicts_total` - Reloads that reset to the remote ledger
//! - `ledger_sync_persists_total` - Persist calls that wrote to storage
//! - `ledger_sync_unpersisted_total` - Writes whose events did not land
//! - `ledger_sync_remote_events_total` - Remote events picked up by reloads
//! - `ledger_sync_local_events_total` - Local events replayed by reloads

use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Sync metrics collector
#[derive(Clone, Debug)]
pub struct SyncMetrics {
    /// Completed reloads
    pub reloads_total: IntCounter,

    /// Reloads that hit a replay conflict
    pub conflicts_total: IntCounter,

    /// Writes issued by persist
    pub persists_total: IntCounter,

    /// Writes that did not persist every local event
    pub unpersisted_total: IntCounter,

    /// Remote events seen past the common prefix
    pub remote_events_total: IntCounter,

    /// Local events seen past the common prefix
    pub local_events_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl SyncMetrics {
    /// Create new metrics collector
    pub fn new() -> crate::Result<Self> {
        let registry = Arc::new(Registry::new());
        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        Ok(Self {
            reloads_total: counter("ledger_sync_reloads_total", "Completed ledger reloads")?,
            conflicts_total: counter(
                "ledger_sync_conflicts_total",
                "Reloads that reset to the remote ledger",
            )?,
            persists_total: counter("ledger_sync_persists_total", "Ledger writes issued by persist")?,
            unpersisted_total: counter(
                "ledger_sync_unpersisted_total",
                "Writes whose local events did not reach storage",
            )?,
            remote_events_total: counter(
                "ledger_sync_remote_events_total",
                "Remote events picked up by reloads",
            )?,
            local_events_total: counter(
                "ledger_sync_local_events_total",
                "Local events replayed by reloads",
            )?,
            registry,
        })
    }

    /// Record a finished reload
    pub fn record_reload(&self, remote_changes: usize, local_changes: usize, conflict: bool) {
        self.reloads_total.inc();
        self.remote_events_total.inc_by(remote_changes as u64);
        self.local_events_total.inc_by(local_changes as u64);
        if conflict {
            self.conflicts_total.inc();
        }
    }

    /// Record a storage write
    pub fn record_persist(&self) {
        self.persists_total.inc();
    }

    /// Record a write that lost local events
    pub fn record_unpersisted(&self) {
        self.unpersisted_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = SyncMetrics::new().unwrap();
        assert_eq!(metrics.reloads_total.get(), 0);
        assert_eq!(metrics.registry().gather().len(), 6);
    }

    #[test]
    fn test_instances_do_not_share_a_registry() {
        let first = SyncMetrics::new().unwrap();
        let second = SyncMetrics::new().unwrap();
        first.record_persist();
        assert_eq!(first.persists_total.get(), 1);
        assert_eq!(second.persists_total.get(), 0);
    }

    #[test]
    fn test_record_reload() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.record_reload(3, 2, false);
        metrics.record_reload(0, 1, true);
        assert_eq!(metrics.reloads_total.get(), 2);
        assert_eq!(metrics.remote_events_total.get(), 3);
        assert_eq!(metrics.local_events_total.get(), 3);
        assert_eq!(metrics.conflicts_total.get(), 1);
    }
}
