//! Replayed ledger state and per-action handlers
//!
//! Each handler validates everything it needs before touching any field, so
//! a rejected action leaves the state exactly as it was.

use crate::{
    account::{Account, AllocationReceipt},
    address::NodeAddress,
    clock::TimestampMs,
    distribution::Distribution,
    event::{
        AddAlias, ChangeIdentityType, CreateIdentity, DistributeGrain, LedgerEvent,
        MergeIdentities, RenameIdentity, SetPayoutAddress, ToggleActivation, TransferGrain,
    },
    grain::Grain,
    id::{AllocationId, DistributionId, IdentityId},
    identity::{identity_prefix, innate_address, Identity, Name},
    Error, Result,
};
use std::collections::{HashMap, HashSet};

/// Everything derived from the event log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    pub(super) accounts: HashMap<IdentityId, Account>,
    /// Live identities in creation order
    pub(super) account_order: Vec<IdentityId>,
    /// Merged-away id -> surviving id, kept flat
    pub(super) merged_into: HashMap<IdentityId, IdentityId>,
    pub(super) address_owner: HashMap<NodeAddress, IdentityId>,
    pub(super) name_owner: HashMap<Name, IdentityId>,
    pub(super) lowercase_names: HashMap<String, IdentityId>,
    pub(super) distributions: Vec<Distribution>,
    pub(super) distribution_index: HashMap<DistributionId, usize>,
    /// Allocation id -> (distribution index, allocation index)
    pub(super) allocation_index: HashMap<AllocationId, (usize, usize)>,
    pub(super) event_log: Vec<LedgerEvent>,
    pub(super) latest_timestamp: Option<TimestampMs>,
    pub(super) last_distribution_timestamp: Option<TimestampMs>,
}

impl LedgerState {
    /// Follow merges to the live id
    pub(super) fn resolve(&self, id: IdentityId) -> IdentityId {
        self.merged_into.get(&id).copied().unwrap_or(id)
    }

    pub(super) fn account(&self, id: IdentityId) -> Result<&Account> {
        self.accounts
            .get(&self.resolve(id))
            .ok_or_else(|| Error::NotFound(format!("no account for identity {id}")))
    }

    fn account_mut(&mut self, id: IdentityId) -> Result<&mut Account> {
        let id = self.resolve(id);
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("no account for identity {id}")))
    }

    fn check_name_free(&self, name: &Name, owner: Option<IdentityId>) -> Result<()> {
        if self.name_owner.contains_key(name) {
            return Err(Error::Conflict(format!("name already taken: {name}")));
        }
        match self.lowercase_names.get(&name.to_lowercase()) {
            Some(holder) if Some(*holder) != owner => Err(Error::Conflict(format!(
                "name {name} conflicts with an existing name differing only in case"
            ))),
            _ => Ok(()),
        }
    }

    pub(super) fn create_identity(&mut self, action: &CreateIdentity) -> Result<()> {
        let identity = &action.identity;
        if identity.address != innate_address(identity.id) {
            return Err(Error::Validation(format!(
                "identity {} does not carry its innate address",
                identity.id
            )));
        }
        if !identity.aliases.is_empty() {
            return Err(Error::Validation(format!(
                "new identity {} must not have aliases",
                identity.id
            )));
        }
        if self.accounts.contains_key(&identity.id) || self.merged_into.contains_key(&identity.id) {
            return Err(Error::Conflict(format!("identity {} already exists", identity.id)));
        }
        self.check_name_free(&identity.name, None)?;
        if let Some(owner) = self.address_owner.get(&identity.address) {
            return Err(Error::Conflict(format!(
                "address {} already claimed by identity {owner}",
                identity.address
            )));
        }

        self.name_owner.insert(identity.name.clone(), identity.id);
        self.lowercase_names.insert(identity.name.to_lowercase(), identity.id);
        self.address_owner.insert(identity.address.clone(), identity.id);
        self.account_order.push(identity.id);
        self.accounts.insert(identity.id, Account::new(identity.clone()));
        Ok(())
    }

    pub(super) fn rename_identity(&mut self, action: &RenameIdentity) -> Result<()> {
        let account = self.account(action.identity_id)?;
        let id = account.identity.id;
        let old_name = account.identity.name.clone();
        if old_name == action.new_name {
            return Err(Error::Conflict(format!("identity {id} already has name {old_name}")));
        }
        self.check_name_free(&action.new_name, Some(id))?;

        self.name_owner.remove(&old_name);
        self.lowercase_names.remove(&old_name.to_lowercase());
        self.name_owner.insert(action.new_name.clone(), id);
        self.lowercase_names.insert(action.new_name.to_lowercase(), id);
        let account = self.account_mut(id)?;
        account.identity = Identity {
            name: action.new_name.clone(),
            ..account.identity.clone()
        };
        Ok(())
    }

    pub(super) fn change_identity_type(&mut self, action: &ChangeIdentityType) -> Result<()> {
        let account = self.account(action.identity_id)?;
        if account.identity.subtype == action.new_type {
            return Err(Error::Conflict(format!(
                "identity {} already has type {}",
                account.identity.id, action.new_type
            )));
        }

        let account = self.account_mut(action.identity_id)?;
        account.identity = Identity {
            subtype: action.new_type,
            ..account.identity.clone()
        };
        Ok(())
    }

    pub(super) fn add_alias(&mut self, action: &AddAlias) -> Result<()> {
        let account = self.account(action.identity_id)?;
        let id = account.identity.id;
        let address = &action.alias.address;
        if account.identity.addresses().any(|a| a == address) {
            return Err(Error::Conflict(format!("identity {id} already has alias {address}")));
        }
        if let Some(owner) = self.address_owner.get(address) {
            return Err(Error::Conflict(format!(
                "alias {address} already bound to identity {owner}"
            )));
        }
        if address.has_prefix(&identity_prefix()) {
            return Err(Error::Validation(format!(
                "cannot add identity address {address} as an alias"
            )));
        }

        self.address_owner.insert(address.clone(), id);
        let account = self.account_mut(id)?;
        let mut aliases = account.identity.aliases.clone();
        aliases.push(action.alias.clone());
        account.identity = Identity {
            aliases,
            ..account.identity.clone()
        };
        Ok(())
    }

    pub(super) fn merge_identities(&mut self, action: &MergeIdentities) -> Result<()> {
        let base = self.account(action.base)?;
        let target = self.account(action.target)?;
        let base_id = base.identity.id;
        let target_id = target.identity.id;
        if base_id == target_id {
            return Err(Error::Conflict(format!("cannot merge identity {base_id} with itself")));
        }

        // Build the merged account before mutating anything
        let mut merged = base.clone();
        merged.paid = base.paid.checked_add(target.paid)?;
        merged.balance = base.balance.checked_add(target.balance)?;
        let mut aliases = base.identity.aliases.clone();
        aliases.extend(target.identity.aliases.iter().cloned());
        aliases.push(target.identity.merge_alias());
        merged.identity = Identity {
            aliases,
            ..base.identity.clone()
        };
        merged
            .allocation_history
            .extend(target.allocation_history.iter().cloned());
        merged.allocation_history.sort_by_key(|r| r.cred_timestamp_ms);
        let mut payout_addresses = target.payout_addresses.clone();
        payout_addresses.extend(base.payout_addresses.clone());
        merged.payout_addresses = payout_addresses;
        let target_name = target.identity.name.clone();

        self.name_owner.remove(&target_name);
        self.lowercase_names.remove(&target_name.to_lowercase());
        for owner in self.address_owner.values_mut() {
            if *owner == target_id {
                *owner = base_id;
            }
        }
        for survivor in self.merged_into.values_mut() {
            if *survivor == target_id {
                *survivor = base_id;
            }
        }
        self.merged_into.insert(target_id, base_id);
        self.account_order.retain(|id| *id != target_id);
        self.accounts.remove(&target_id);
        self.accounts.insert(base_id, merged);
        Ok(())
    }

    pub(super) fn toggle_activation(&mut self, action: &ToggleActivation) -> Result<()> {
        let account = self.account_mut(action.identity_id)?;
        account.active = !account.active;
        Ok(())
    }

    pub(super) fn distribute_grain(&mut self, action: &DistributeGrain) -> Result<()> {
        let distribution = &action.distribution;
        if self.distribution_index.contains_key(&distribution.id) {
            return Err(Error::Conflict(format!(
                "distribution {} already exists",
                distribution.id
            )));
        }
        let mut allocation_ids = HashSet::new();
        for allocation in &distribution.allocations {
            if self.allocation_index.contains_key(&allocation.id)
                || !allocation_ids.insert(allocation.id)
            {
                return Err(Error::Conflict(format!(
                    "allocation {} already exists",
                    allocation.id
                )));
            }
            allocation.validate()?;
        }

        // Per-account totals, so overflow is caught before any credit
        let mut credits: HashMap<IdentityId, Grain> = HashMap::new();
        for receipt in distribution.allocations.iter().flat_map(|a| &a.receipts) {
            let account = self.account(receipt.id)?;
            if !account.active {
                return Err(Error::Inactive(format!(
                    "attempted to distribute grain to inactive account {}",
                    receipt.id
                )));
            }
            let total = credits.entry(account.identity.id).or_default();
            *total = total.checked_add(receipt.amount)?;
        }
        for (id, total) in &credits {
            let account = self.account(*id)?;
            account.balance.checked_add(*total)?;
            account.paid.checked_add(*total)?;
        }

        let index = self.distributions.len();
        for (position, allocation) in distribution.allocations.iter().enumerate() {
            self.allocation_index.insert(allocation.id, (index, position));
            for receipt in &allocation.receipts {
                let account = self.account_mut(receipt.id)?;
                account.credit(AllocationReceipt {
                    allocation_id: allocation.id,
                    grain_receipt: receipt.clone(),
                    cred_timestamp_ms: distribution.cred_timestamp,
                })?;
            }
        }
        self.distribution_index.insert(distribution.id, index);
        self.distributions.push(distribution.clone());
        self.last_distribution_timestamp = Some(
            self.last_distribution_timestamp
                .map_or(distribution.cred_timestamp, |ts| ts.max(distribution.cred_timestamp)),
        );
        Ok(())
    }

    pub(super) fn transfer_grain(&mut self, action: &TransferGrain) -> Result<()> {
        let sender = self.account(action.from)?;
        let recipient = self.account(action.to)?;
        if !sender.active {
            return Err(Error::Inactive(format!(
                "attempted to transfer grain from inactive account {}",
                action.from
            )));
        }
        if !recipient.active {
            return Err(Error::Inactive(format!(
                "attempted to transfer grain to inactive account {}",
                action.to
            )));
        }
        if action.amount.is_negative() {
            return Err(Error::Economic(format!(
                "cannot transfer negative grain amount {}",
                action.amount
            )));
        }
        if action.amount > sender.balance {
            return Err(Error::InsufficientBalance {
                amount: action.amount,
                balance: sender.balance,
            });
        }
        let from = sender.identity.id;
        let to = recipient.identity.id;
        if from == to {
            return Ok(());
        }
        let sender_balance = sender.balance.checked_sub(action.amount)?;
        let recipient_balance = recipient.balance.checked_add(action.amount)?;

        self.account_mut(from)?.balance = sender_balance;
        self.account_mut(to)?.balance = recipient_balance;
        Ok(())
    }

    pub(super) fn set_payout_address(&mut self, action: &SetPayoutAddress) -> Result<()> {
        self.account(action.account_id)?;
        let key = action.currency.key()?;

        let account = self.account_mut(action.account_id)?;
        match &action.payout_address {
            Some(address) => {
                account.payout_addresses.insert(key, address.clone());
            }
            None => {
                account.payout_addresses.remove(&key);
            }
        }
        Ok(())
    }

    /// Check the structural invariants that must hold after every event
    pub fn check_invariants(&self) -> Result<()> {
        let mut lowercase = HashSet::new();
        for id in &self.account_order {
            let account = self
                .accounts
                .get(id)
                .ok_or_else(|| Error::Validation(format!("account order lists missing {id}")))?;
            if account.balance.is_negative() || account.paid.is_negative() {
                return Err(Error::Validation(format!("account {id} holds negative grain")));
            }
            if account.history_total()? != account.paid {
                return Err(Error::Validation(format!(
                    "account {id} paid {} differs from its allocation history",
                    account.paid
                )));
            }
            if !account
                .allocation_history
                .windows(2)
                .all(|w| w[0].cred_timestamp_ms <= w[1].cred_timestamp_ms)
            {
                return Err(Error::Validation(format!("account {id} history is unsorted")));
            }
            if !lowercase.insert(account.identity.name.to_lowercase()) {
                return Err(Error::Validation(format!(
                    "name {} is not unique",
                    account.identity.name
                )));
            }
            for address in account.identity.addresses() {
                if self.address_owner.get(address) != Some(id) {
                    return Err(Error::Validation(format!(
                        "address {address} of {id} is not bound to it"
                    )));
                }
            }
        }
        if self.accounts.len() != self.account_order.len() {
            return Err(Error::Validation("account table and order disagree".into()));
        }
        for distribution in &self.distributions {
            for allocation in &distribution.allocations {
                allocation.validate()?;
            }
        }
        if !self
            .event_log
            .windows(2)
            .all(|w| w[0].ledger_timestamp <= w[1].ledger_timestamp)
        {
            return Err(Error::Validation("event timestamps decrease".into()));
        }
        Ok(())
    }
}
