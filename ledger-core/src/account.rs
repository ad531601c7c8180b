//! Accounts: an identity plus its grain holdings

use crate::{
    clock::TimestampMs,
    currency::{CurrencyKey, PayoutAddress},
    grain::{Grain, ZERO},
    id::AllocationId,
    identity::Identity,
    policy::GrainReceipt,
    Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One receipt credited to an account, tagged with its allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationReceipt {
    /// Allocation the receipt came from
    pub allocation_id: AllocationId,
    /// Recipient and amount
    pub grain_receipt: GrainReceipt,
    /// Cred timestamp of the enclosing distribution
    pub cred_timestamp_ms: TimestampMs,
}

/// Ledger account, one per live identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Current identity value
    pub identity: Identity,
    /// Spendable grain
    pub balance: Grain,
    /// Lifetime grain received from distributions
    pub paid: Grain,
    /// Receipts sorted by `cred_timestamp_ms`
    pub allocation_history: Vec<AllocationReceipt>,
    /// Whether the account may send and receive grain
    pub active: bool,
    /// Payout address per currency
    pub payout_addresses: BTreeMap<CurrencyKey, PayoutAddress>,
}

impl Account {
    /// Fresh inactive account with nothing paid
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            balance: ZERO,
            paid: ZERO,
            allocation_history: Vec::new(),
            active: false,
            payout_addresses: BTreeMap::new(),
        }
    }

    /// Sum of every receipt in the allocation history
    pub fn history_total(&self) -> Result<Grain> {
        self.allocation_history
            .iter()
            .try_fold(ZERO, |acc, r| acc.checked_add(r.grain_receipt.amount))
    }

    /// Credit a distribution receipt.
    ///
    /// Nothing changes when either total would overflow. The history stays
    /// sorted by cred timestamp, ties keeping insertion order.
    pub(crate) fn credit(&mut self, receipt: AllocationReceipt) -> Result<()> {
        let amount = receipt.grain_receipt.amount;
        let paid = self.paid.checked_add(amount)?;
        let balance = self.balance.checked_add(amount)?;
        self.paid = paid;
        self.balance = balance;
        let at = self
            .allocation_history
            .partition_point(|r| r.cred_timestamp_ms <= receipt.cred_timestamp_ms);
        self.allocation_history.insert(at, receipt);
        Ok(())
    }
}
