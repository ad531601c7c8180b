//! The ledger state machine
//!
//! Every mutation goes through one event: a command builds an [`Action`],
//! stamps it with the clock and id source, and applies it with
//! [`Ledger::apply_event`]. Replaying the event log from scratch rebuilds the
//! same [`LedgerState`].
//!
//! # Example
//!
//! ```
//! use ledger_core::{IdentityType, Ledger};
//!
//! let mut ledger = Ledger::new();
//! let alice = ledger.create_identity(IdentityType::User, "alice")?;
//! ledger.activate(alice)?;
//!
//! let replayed = Ledger::parse(&ledger.serialize()?)?;
//! assert_eq!(replayed.state(), ledger.state());
//! # Ok::<(), ledger_core::Error>(())
//! ```

mod state;


pub use state::LedgerState;

use crate::{
    account::Account,
    address::NodeAddress,
    clock::{Clock, SystemClock, TimestampMs},
    currency::{Currency, PayoutAddress},
    distribution::Distribution,
    event::{
        Action, AddAlias, ChangeIdentityType, CreateIdentity, DistributeGrain, EventVersion,
        LedgerEvent, MergeIdentities, RenameIdentity, SetPayoutAddress, ToggleActivation,
        TransferGrain,
    },
    event_log,
    id::{AllocationId, DistributionId, IdSource, IdentityId, RandomIds},
    identity::{Alias, Identity, IdentityType, Name},
    policy::Allocation,
    Config, Error, Result,
};
use std::fmt;
use std::sync::Arc;

/// Event-sourced grain ledger
#[derive(Clone)]
pub struct Ledger {
    /// State rebuilt from the event log
    state: LedgerState,

    /// Configuration
    config: Config,

    /// Timestamps for new events
    clock: Arc<dyn Clock>,

    /// Ids for new identities and events
    ids: Arc<dyn IdSource>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("accounts", &self.state.accounts.len())
            .field("events", &self.state.event_log.len())
            .finish_non_exhaustive()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Empty ledger with default configuration, wall clock and random ids
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Empty ledger with `config`
    pub fn with_config(config: Config) -> Self {
        Self {
            state: LedgerState::default(),
            config,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
        }
    }

    /// Set the timestamp source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the id source
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Empty ledger sharing this ledger's config, clock and id source
    pub fn cleared(&self) -> Self {
        Self {
            state: LedgerState::default(),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
        }
    }

    /// Replay an event log into a fresh default ledger
    pub fn from_event_log(events: impl IntoIterator<Item = LedgerEvent>) -> Result<Self> {
        let mut ledger = Self::new();
        ledger.replay(events)?;
        Ok(ledger)
    }

    /// Parse a serialized event log and replay it
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_event_log(event_log::parse(text)?)
    }

    /// Serialize the event log
    pub fn serialize(&self) -> Result<String> {
        event_log::serialize(&self.state.event_log)
    }

    /// Apply events in order, stopping at the first failure
    pub fn replay(&mut self, events: impl IntoIterator<Item = LedgerEvent>) -> Result<()> {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(())
    }

    // Queries

    /// Replayed state
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Id source used for new identities and events
    pub fn id_source(&self) -> Arc<dyn IdSource> {
        Arc::clone(&self.ids)
    }

    /// Live accounts in creation order
    pub fn accounts(&self) -> Vec<&Account> {
        self.state
            .account_order
            .iter()
            .filter_map(|id| self.state.accounts.get(id))
            .collect()
    }

    /// Account for `id`, following merges
    pub fn account(&self, id: IdentityId) -> Result<&Account> {
        self.state.account(id)
    }

    /// Account owning `address`, innate or aliased, including merged history
    pub fn account_by_address(&self, address: &NodeAddress) -> Option<&Account> {
        let owner = self.state.address_owner.get(address)?;
        self.state.account(*owner).ok()
    }

    /// Account with exactly this name (case-sensitive)
    pub fn account_by_name(&self, name: &str) -> Result<Option<&Account>> {
        let name = Name::parse(name)?;
        Ok(self
            .state
            .name_owner
            .get(&name)
            .and_then(|id| self.state.accounts.get(id)))
    }

    /// Whether `name` can be used by a new identity (case-insensitive)
    pub fn name_available(&self, name: &str) -> Result<bool> {
        let name = Name::parse(name)?;
        Ok(!self.state.lowercase_names.contains_key(&name.to_lowercase()))
    }

    /// Allocation by id
    pub fn allocation(&self, id: AllocationId) -> Result<&Allocation> {
        let (d, a) = self
            .state
            .allocation_index
            .get(&id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no allocation {id}")))?;
        Ok(&self.state.distributions[d].allocations[a])
    }

    /// Distribution by id
    pub fn distribution(&self, id: DistributionId) -> Result<&Distribution> {
        let index = self
            .state
            .distribution_index
            .get(&id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no distribution {id}")))?;
        Ok(&self.state.distributions[index])
    }

    /// Distribution containing the allocation `id`
    pub fn distribution_by_allocation_id(&self, id: AllocationId) -> Result<&Distribution> {
        let (d, _) = self
            .state
            .allocation_index
            .get(&id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no distribution for allocation {id}")))?;
        Ok(&self.state.distributions[d])
    }

    /// Distributions in commit order
    pub fn distributions(&self) -> &[Distribution] {
        &self.state.distributions
    }

    /// Every processed event, oldest first
    pub fn event_log(&self) -> &[LedgerEvent] {
        &self.state.event_log
    }

    /// Largest cred timestamp of any distribution; `None` before the first
    pub fn last_distribution_timestamp(&self) -> Option<TimestampMs> {
        self.state.last_distribution_timestamp
    }

    /// Timestamp of the latest processed event
    pub fn latest_timestamp(&self) -> Option<TimestampMs> {
        self.state.latest_timestamp
    }

    /// Check structural invariants over the whole state
    pub fn check_invariants(&self) -> Result<()> {
        self.state.check_invariants()
    }

    // Commands

    /// Create an inactive identity named `name`
    pub fn create_identity(&mut self, subtype: IdentityType, name: &str) -> Result<IdentityId> {
        let name = Name::parse(name)?;
        let identity = Identity::new(self.ids.next_id(), subtype, name);
        let id = identity.id;
        self.emit(Action::CreateIdentity(CreateIdentity { identity }))?;
        Ok(id)
    }

    /// Rename an identity
    pub fn rename_identity(&mut self, id: IdentityId, new_name: &str) -> Result<()> {
        let new_name = Name::parse(new_name)?;
        self.emit(Action::RenameIdentity(RenameIdentity { identity_id: id, new_name }))
    }

    /// Change an identity's subtype
    pub fn change_identity_type(&mut self, id: IdentityId, new_type: IdentityType) -> Result<()> {
        self.emit(Action::ChangeIdentityType(ChangeIdentityType { identity_id: id, new_type }))
    }

    /// Bind `alias` to an identity
    pub fn add_alias(&mut self, id: IdentityId, alias: Alias) -> Result<()> {
        self.emit(Action::AddAlias(AddAlias { identity_id: id, alias }))
    }

    /// Fold `target` into `base`
    pub fn merge_identities(&mut self, base: IdentityId, target: IdentityId) -> Result<()> {
        self.emit(Action::MergeIdentities(MergeIdentities { base, target }))
    }

    /// Activate an account; no event when already active
    pub fn activate(&mut self, id: IdentityId) -> Result<()> {
        self.set_active(id, true)
    }

    /// Deactivate an account; no event when already inactive
    pub fn deactivate(&mut self, id: IdentityId) -> Result<()> {
        self.set_active(id, false)
    }

    fn set_active(&mut self, id: IdentityId, active: bool) -> Result<()> {
        let account = self.account(id)?;
        if account.active == active {
            return Ok(());
        }
        let identity_id = account.identity.id;
        self.emit(Action::ToggleActivation(ToggleActivation { identity_id }))
    }

    /// Mint grain according to `distribution`
    pub fn distribute_grain(&mut self, distribution: Distribution) -> Result<()> {
        self.emit(Action::DistributeGrain(DistributeGrain { distribution }))
    }

    /// Move grain between two active accounts
    pub fn transfer_grain(&mut self, transfer: TransferGrain) -> Result<()> {
        self.emit(Action::TransferGrain(transfer))
    }

    /// Set, or with `None` clear, the payout address for `currency`
    pub fn set_payout_address(
        &mut self,
        id: IdentityId,
        currency: Currency,
        payout_address: Option<PayoutAddress>,
    ) -> Result<()> {
        self.emit(Action::SetPayoutAddress(SetPayoutAddress {
            account_id: id,
            currency,
            payout_address,
        }))
    }

    // Event processing

    fn emit(&mut self, action: Action) -> Result<()> {
        let event = LedgerEvent {
            action,
            ledger_timestamp: self.clock.now_ms(),
            version: EventVersion::V1,
            uuid: self.ids.next_id(),
        };
        self.apply_event(event)
    }

    /// Validate and apply one event, appending it to the log.
    ///
    /// On error the ledger is unchanged.
    pub fn apply_event(&mut self, event: LedgerEvent) -> Result<()> {
        if let Some(latest) = self.state.latest_timestamp {
            if !self
                .config
                .timestamp_ordering
                .accepts(event.ledger_timestamp, latest)
            {
                tracing::debug!(
                    event_id = %event.uuid,
                    timestamp = event.ledger_timestamp,
                    latest,
                    "Event out of order"
                );
                return Err(Error::OutOfOrder {
                    timestamp: event.ledger_timestamp,
                    latest,
                });
            }
        }

        let state = &mut self.state;
        let outcome = match &event.action {
            Action::CreateIdentity(a) => state.create_identity(a),
            Action::RenameIdentity(a) => state.rename_identity(a),
            Action::ChangeIdentityType(a) => state.change_identity_type(a),
            Action::AddAlias(a) => state.add_alias(a),
            Action::MergeIdentities(a) => state.merge_identities(a),
            Action::ToggleActivation(a) => state.toggle_activation(a),
            Action::DistributeGrain(a) => state.distribute_grain(a),
            Action::TransferGrain(a) => state.transfer_grain(a),
            Action::SetPayoutAddress(a) => state.set_payout_address(a),
        };
        if let Err(err) = outcome {
            tracing::debug!(
                event_id = %event.uuid,
                action = event.action.kind(),
                error = %err,
                "Event rejected"
            );
            return Err(err.in_command(event.action.command()));
        }

        tracing::debug!(
            event_id = %event.uuid,
            action = event.action.kind(),
            ledger_timestamp = event.ledger_timestamp,
            "Event applied"
        );
        self.state.latest_timestamp = Some(event.ledger_timestamp);
        self.state.event_log.push(event);
        Ok(())
    }
}
