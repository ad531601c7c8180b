//! Ledger events and actions
//!
//! Every ledger mutation is recorded as one [`LedgerEvent`]. The JSON shape of
//! these types is the on-disk format, so field names and tag strings must not
//! change.

use crate::{
    clock::TimestampMs,
    currency::{Currency, PayoutAddress},
    distribution::Distribution,
    grain::Grain,
    id::{EventId, IdentityId},
    identity::{Alias, Identity, IdentityType, Name},
};
use serde::{Deserialize, Serialize};

/// Register a new identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentity {
    /// The identity, with its innate address and no aliases
    pub identity: Identity,
}

/// Rename an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameIdentity {
    /// Identity to rename
    pub identity_id: IdentityId,
    /// New name
    pub new_name: Name,
}

/// Change an identity's subtype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeIdentityType {
    /// Identity to change
    pub identity_id: IdentityId,
    /// New subtype
    pub new_type: IdentityType,
}

/// Bind an alias to an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAlias {
    /// Identity receiving the alias
    pub identity_id: IdentityId,
    /// Alias to bind
    pub alias: Alias,
}

/// Fold `target` into `base`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeIdentities {
    /// Surviving identity
    pub base: IdentityId,
    /// Identity merged away
    pub target: IdentityId,
}

/// Flip an account between active and inactive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleActivation {
    /// Account to toggle
    pub identity_id: IdentityId,
}

/// Mint grain according to a distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeGrain {
    /// Distribution to apply
    pub distribution: Distribution,
}

/// Move grain between accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferGrain {
    /// Sender
    pub from: IdentityId,
    /// Recipient
    pub to: IdentityId,
    /// Amount moved
    pub amount: Grain,
    /// Optional note
    pub memo: Option<String>,
}

/// Set or clear the payout address for a currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPayoutAddress {
    /// Account to update
    pub account_id: IdentityId,
    /// Currency the address applies to
    pub currency: Currency,
    /// New address, or `None` to remove
    pub payout_address: Option<PayoutAddress>,
}

/// Ledger mutation, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// `CREATE_IDENTITY`
    CreateIdentity(CreateIdentity),
    /// `RENAME_IDENTITY`
    RenameIdentity(RenameIdentity),
    /// `CHANGE_IDENTITY_TYPE`
    ChangeIdentityType(ChangeIdentityType),
    /// `ADD_ALIAS`
    AddAlias(AddAlias),
    /// `MERGE_IDENTITIES`
    MergeIdentities(MergeIdentities),
    /// `TOGGLE_ACTIVATION`
    ToggleActivation(ToggleActivation),
    /// `DISTRIBUTE_GRAIN`
    DistributeGrain(DistributeGrain),
    /// `TRANSFER_GRAIN`
    TransferGrain(TransferGrain),
    /// `SET_PAYOUT_ADDRESS`
    SetPayoutAddress(SetPayoutAddress),
}

impl Action {
    /// Wire tag of this action
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateIdentity(_) => "CREATE_IDENTITY",
            Action::RenameIdentity(_) => "RENAME_IDENTITY",
            Action::ChangeIdentityType(_) => "CHANGE_IDENTITY_TYPE",
            Action::AddAlias(_) => "ADD_ALIAS",
            Action::MergeIdentities(_) => "MERGE_IDENTITIES",
            Action::ToggleActivation(_) => "TOGGLE_ACTIVATION",
            Action::DistributeGrain(_) => "DISTRIBUTE_GRAIN",
            Action::TransferGrain(_) => "TRANSFER_GRAIN",
            Action::SetPayoutAddress(_) => "SET_PAYOUT_ADDRESS",
        }
    }

    /// Name of the ledger command that emits this action, used in errors
    pub(crate) fn command(&self) -> &'static str {
        match self {
            Action::CreateIdentity(_) => "create_identity",
            Action::RenameIdentity(_) => "rename_identity",
            Action::ChangeIdentityType(_) => "change_identity_type",
            Action::AddAlias(_) => "add_alias",
            Action::MergeIdentities(_) => "merge_identities",
            Action::ToggleActivation(_) => "toggle_activation",
            Action::DistributeGrain(_) => "distribute_grain",
            Action::TransferGrain(_) => "transfer_grain",
            Action::SetPayoutAddress(_) => "set_payout_address",
        }
    }
}

/// Event schema version. Only `"1"` exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventVersion {
    /// Version 1
    #[default]
    #[serde(rename = "1")]
    V1,
}

/// One entry of the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// The mutation
    pub action: Action,
    /// When the event was created, in ms since the epoch
    pub ledger_timestamp: TimestampMs,
    /// Schema version
    pub version: EventVersion,
    /// Event id
    pub uuid: EventId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{IdSource, SequentialIds};

    #[test]
    fn test_event_wire_shape() {
        let ids = SequentialIds::default();
        let event = LedgerEvent {
            action: Action::ToggleActivation(ToggleActivation { identity_id: ids.next_id() }),
            ledger_timestamp: 42,
            version: EventVersion::V1,
            uuid: ids.next_id(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["version"], "1");
        assert_eq!(value["ledgerTimestamp"], 42);
        assert_eq!(value["action"]["type"], "TOGGLE_ACTIVATION");
        assert!(value["action"]["identityId"].is_string());
        assert_eq!(value["uuid"].as_str().unwrap().len(), 22);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let ids = SequentialIds::default();
        let json = format!(
            r#"{{"action":{{"type":"TOGGLE_ACTIVATION","identityId":"{}"}},"ledgerTimestamp":1,"version":"2","uuid":"{}"}}"#,
            ids.next_id(),
            ids.next_id()
        );
        assert!(serde_json::from_str::<LedgerEvent>(&json).is_err());
    }

    #[test]
    fn test_transfer_memo_optional() {
        let ids = SequentialIds::default();
        let json = format!(
            r#"{{"type":"TRANSFER_GRAIN","from":"{}","to":"{}","amount":"5"}}"#,
            ids.next_id(),
            ids.next_id()
        );
        let action: Action = serde_json::from_str(&json).unwrap();
        match action {
            Action::TransferGrain(t) => {
                assert_eq!(t.amount, Grain::from_integer(5));
                assert_eq!(t.memo, None);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
}
