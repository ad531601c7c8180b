//! Ledger storage port
//!
//! A storage hands out whole, replayed ledgers and accepts whole ledgers
//! back. Implementations decide how much of the log they actually move.

mod file;
mod memory;

pub use file::{FileStorage, LedgerFile};
pub use memory::MemoryStorage;

use crate::Result;
use async_trait::async_trait;
use ledger_core::Ledger;

/// Shared home of a ledger
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Load and replay the stored ledger
    async fn read(&self) -> Result<Ledger>;

    /// Store the full event log of `ledger`
    async fn write(&self, ledger: &Ledger) -> Result<()>;
}
