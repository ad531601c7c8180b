//! Grain Ledger Manager
//!
//! Keeps a local ledger in sync with a shared stored copy.
//!
//! # Architecture
//!
//! - **Storage Port**: [`LedgerStorage`] reads and writes whole ledgers
//! - **Prefix Sync**: local and remote logs are compared by common prefix
//! - **Reset on Conflict**: local events that no longer apply are dropped
//! - **Verified Persist**: every write is re-read to confirm it landed
//!
//! # Example
//!
//! ```
//! use ledger_core::IdentityType;
//! use ledger_manager::{LedgerManager, MemoryStorage};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut manager = LedgerManager::new(Arc::new(MemoryStorage::new()));
//! manager.ledger_mut().create_identity(IdentityType::User, "alice")?;
//!
//! let result = manager.persist().await?;
//! assert!(result.error.is_none());
//! # Ok::<(), ledger_manager::Error>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod storage;

// Re-exports
pub use config::Config;
pub use error::{Error, Result, SyncError};
pub use manager::{LedgerManager, SyncResult};
pub use metrics::SyncMetrics;
pub use storage::{FileStorage, LedgerFile, LedgerStorage, MemoryStorage};
