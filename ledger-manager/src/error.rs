//! Error types for the ledger manager

use thiserror::Error;

/// Result type for manager and storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Manager errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error while replaying a stored log
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a sync call
///
/// Returned inside [`SyncResult`](crate::SyncResult) rather than raised, so
/// callers still see which events changed on each side.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A local event no longer applies on top of the remote ledger
    #[error("Unable to apply local changes: {0}, resetting to remote ledger")]
    ReplayConflict(ledger_core::Error),

    /// Local events are missing from storage after a write
    #[error("Some local changes have not been persisted")]
    Unpersisted,
}
