//! Grain Ledger Core
//!
//! Append-only event ledger of identities and grain balances.
//!
//! # Architecture
//!
//! - **Event Sourcing**: All state is derived from the event log
//! - **Fixed Point**: Grain is an integer count of attograin (10^-18)
//! - **Atomic Commands**: A rejected command never changes state
//! - **Pure Policies**: Allocations are computed from cred, then applied
//!
//! # Invariants
//!
//! - Grain conservation: transfers move grain, only distributions mint it
//! - Deterministic replay: Same events → same state
//! - Append-only: Events never modified or deleted
//! - Monotone time: event timestamps never decrease

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod account;
pub mod address;
pub mod clock;
pub mod config;
pub mod cred_view;
pub mod currency;
pub mod distribution;
pub mod error;
pub mod event;
pub mod event_log;
pub mod grain;
pub mod id;
pub mod identity;
pub mod ledger;
pub mod policy;

// Re-exports
pub use account::{Account, AllocationReceipt};
pub use address::NodeAddress;
pub use clock::{Clock, ManualClock, SystemClock, TimestampMs};
pub use config::{Config, TimestampOrdering};
pub use cred_view::{CredGraph, CredGrainView, CredParticipant, CredTable, Interval};
pub use currency::{Currency, EthAddress, EvmChainId, PayoutAddress, ProtocolChain};
pub use distribution::{apply_distributions, compute_distribution, Distribution, DistributionConfig};
pub use error::{Error, Result};
pub use event::{Action, EventVersion, LedgerEvent, TransferGrain};
pub use grain::{split_budget, Grain};
pub use id::{
    AllocationId, DistributionId, EventId, Id, IdSource, IdentityId, RandomIds, SequentialIds,
};
pub use identity::{Alias, Identity, IdentityType, Name};
pub use ledger::{Ledger, LedgerState};
pub use policy::{compute_allocation, Allocation, AllocationPolicy, GrainReceipt, PolicyIdentity};
