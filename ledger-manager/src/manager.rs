//! Reload and persist protocol
//!
//! The manager owns a local ledger that may carry events the storage has
//! not seen yet. Both logs are compared by their longest common prefix:
//! whatever follows it on the remote side is new remote history, whatever
//! follows it locally is pending local work.
//!
//! A reload rebuilds the ledger from the remote log and replays the pending
//! local events on top. If any of them no longer applies, all of them are
//! dropped and the manager continues from the remote ledger alone.

use crate::{
    storage::{FileStorage, LedgerStorage},
    Config, Result, SyncError, SyncMetrics,
};
use ledger_core::{Ledger, LedgerEvent};
use std::fmt;
use std::sync::Arc;

/// Outcome of a reload or persist
#[derive(Debug)]
pub struct SyncResult {
    /// Why the sync did not fully succeed
    pub error: Option<SyncError>,

    /// Remote events past the common prefix
    pub remote_changes: Vec<LedgerEvent>,

    /// Local events past the common prefix
    pub local_changes: Vec<LedgerEvent>,
}

/// Keeps a local ledger in sync with a [`LedgerStorage`]
pub struct LedgerManager {
    ledger: Ledger,
    storage: Arc<dyn LedgerStorage>,
    metrics: Option<SyncMetrics>,
}

impl fmt::Debug for LedgerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerManager")
            .field("ledger", &self.ledger)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl LedgerManager {
    /// Manager starting from an empty ledger
    pub fn new(storage: Arc<dyn LedgerStorage>) -> Self {
        Self::with_ledger(storage, Ledger::new())
    }

    /// Manager starting from `ledger`
    ///
    /// The ledger's config, clock and id source are kept across reloads.
    pub fn with_ledger(storage: Arc<dyn LedgerStorage>, ledger: Ledger) -> Self {
        Self {
            ledger,
            storage,
            metrics: None,
        }
    }

    /// Manager over the file at `config.ledger_path`
    ///
    /// Attaches a fresh [`SyncMetrics`] when `metrics_enabled` is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = FileStorage::with_config(&config.ledger_path, config.ledger.clone());
        let manager = Self::with_ledger(
            Arc::new(storage),
            Ledger::with_config(config.ledger.clone()),
        );
        if config.metrics_enabled {
            return Ok(manager.with_metrics(SyncMetrics::new()?));
        }
        Ok(manager)
    }

    /// Record sync outcomes in `metrics`
    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current local ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Local ledger for issuing commands
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Sync metrics, when enabled
    pub fn metrics(&self) -> Option<&SyncMetrics> {
        self.metrics.as_ref()
    }

    /// Rebase pending local events onto the stored ledger.
    ///
    /// Storage failures and a remote log that does not replay are raised.
    /// A local event that no longer applies is reported in the result, and
    /// the manager is reset to the remote ledger.
    pub async fn reload_ledger(&mut self) -> Result<SyncResult> {
        let remote = self.storage.read().await?;
        let remote_log = remote.event_log();
        let local_log = self.ledger.event_log();

        let common = remote_log
            .iter()
            .zip(local_log)
            .take_while(|(r, l)| r == l)
            .count();
        let remote_changes = remote_log[common..].to_vec();
        let local_changes = local_log[common..].to_vec();

        let mut base = self.ledger.cleared();
        base.replay(remote_log.iter().cloned())?;

        let mut rebased = base.clone();
        let error = match rebased.replay(local_changes.iter().cloned()) {
            Ok(()) => {
                self.ledger = rebased;
                None
            }
            Err(err) => {
                let err = SyncError::ReplayConflict(err);
                tracing::warn!(
                    remote_changes = remote_changes.len(),
                    local_changes = local_changes.len(),
                    error = %err,
                    "Local changes dropped"
                );
                self.ledger = base;
                Some(err)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_reload(remote_changes.len(), local_changes.len(), error.is_some());
        }
        tracing::info!(
            common_prefix = common,
            remote_changes = remote_changes.len(),
            local_changes = local_changes.len(),
            "Ledger reloaded"
        );

        Ok(SyncResult {
            error,
            remote_changes,
            local_changes,
        })
    }

    /// Reload, write the ledger to storage, then reload again to verify.
    ///
    /// On success the result describes the first reload, i.e. what was
    /// written.
    pub async fn persist(&mut self) -> Result<SyncResult> {
        let reloaded = self.reload_ledger().await?;
        if reloaded.error.is_some() {
            return Ok(reloaded);
        }

        self.storage.write(&self.ledger).await?;
        if let Some(metrics) = &self.metrics {
            metrics.record_persist();
        }

        let verified = self.reload_ledger().await?;
        if verified.error.is_some() {
            return Ok(verified);
        }
        if !verified.local_changes.is_empty() {
            tracing::warn!(
                local_changes = verified.local_changes.len(),
                "Ledger write did not persist local changes"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_unpersisted();
            }
            return Ok(SyncResult {
                error: Some(SyncError::Unpersisted),
                ..verified
            });
        }

        tracing::info!(
            events = self.ledger.event_log().len(),
            written = reloaded.local_changes.len(),
            "Ledger persisted"
        );
        Ok(reloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use ledger_core::{IdentityType, ManualClock, SequentialIds};

    fn local_ledger() -> Ledger {
        Ledger::new()
            .with_clock(Arc::new(ManualClock::ticking(1_000, 1)))
            .with_id_source(Arc::new(SequentialIds::default()))
    }

    #[tokio::test]
    async fn test_from_config_honours_metrics_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config {
            ledger_path: dir.path().join("ledger.json"),
            ..Config::default()
        };

        let mut manager = LedgerManager::from_config(&config).unwrap();
        manager.reload_ledger().await.unwrap();
        assert_eq!(manager.metrics().unwrap().reloads_total.get(), 1);

        config.metrics_enabled = false;
        let mut manager = LedgerManager::from_config(&config).unwrap();
        let result = manager.reload_ledger().await.unwrap();
        assert!(result.error.is_none());
        assert!(manager.metrics().is_none());
    }

    #[tokio::test]
    async fn test_reload_picks_up_remote_events() {
        let mut remote = local_ledger();
        remote.create_identity(IdentityType::User, "alice").unwrap();
        let storage = Arc::new(MemoryStorage::from_ledger(&remote));

        let mut manager = LedgerManager::new(storage);
        let result = manager.reload_ledger().await.unwrap();

        assert!(result.error.is_none());
        assert_eq!(result.remote_changes.len(), 1);
        assert!(result.local_changes.is_empty());
        assert_eq!(manager.ledger().event_log(), remote.event_log());
    }

    #[tokio::test]
    async fn test_reload_keeps_pending_local_events() {
        let mut remote = local_ledger();
        remote.create_identity(IdentityType::User, "alice").unwrap();
        let storage = Arc::new(MemoryStorage::from_ledger(&remote));

        let mut local = remote.clone();
        local.create_identity(IdentityType::User, "bob").unwrap();
        let mut manager = LedgerManager::with_ledger(storage, local.clone());
        let result = manager.reload_ledger().await.unwrap();

        assert!(result.error.is_none());
        assert!(result.remote_changes.is_empty());
        assert_eq!(result.local_changes.len(), 1);
        assert_eq!(manager.ledger().state(), local.state());
    }

    #[tokio::test]
    async fn test_metrics_follow_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = LedgerManager::with_ledger(storage.clone(), local_ledger())
            .with_metrics(SyncMetrics::new().unwrap());
        manager
            .ledger_mut()
            .create_identity(IdentityType::User, "alice")
            .unwrap();

        let result = manager.persist().await.unwrap();
        assert!(result.error.is_none());
        assert_eq!(result.local_changes.len(), 1);
        assert_eq!(storage.events().len(), 1);

        let metrics = manager.metrics().unwrap();
        assert_eq!(metrics.reloads_total.get(), 2);
        assert_eq!(metrics.persists_total.get(), 1);
        assert_eq!(metrics.local_events_total.get(), 1);
        assert_eq!(metrics.unpersisted_total.get(), 0);
    }
}
