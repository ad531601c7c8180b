use super::LedgerStorage;
use crate::Result;
use async_trait::async_trait;
use ledger_core::{Ledger, LedgerEvent};
use parking_lot::Mutex;

/// Storage holding the event log in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    events: Mutex<Vec<LedgerEvent>>,
    config: ledger_core::Config,
}

impl MemoryStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage seeded with the event log of `ledger`
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self {
            events: Mutex::new(ledger.event_log().to_vec()),
            config: ledger.config().clone(),
        }
    }

    /// Copy of the stored events
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn read(&self) -> Result<Ledger> {
        let events = self.events();
        let mut ledger = Ledger::with_config(self.config.clone());
        ledger.replay(events)?;
        Ok(ledger)
    }

    async fn write(&self, ledger: &Ledger) -> Result<()> {
        let events = ledger.event_log().to_vec();
        tracing::debug!(events = events.len(), "Ledger stored in memory");
        *self.events.lock() = events;
        Ok(())
    }
}
