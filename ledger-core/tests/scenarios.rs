//! Seeded end-to-end ledger scenarios

use ledger_core::{
    grain::ONE,
    policy::{BalancedPolicy, ImmediatePolicy},
    split_budget, Allocation, AllocationPolicy, Distribution, Grain, GrainReceipt, IdSource,
    IdentityId, IdentityType, Ledger, ManualClock, PolicyIdentity, SequentialIds, TransferGrain,
};
use std::sync::Arc;

fn grain(s: &str) -> Grain {
    s.parse().unwrap()
}

fn new_ledger() -> Ledger {
    Ledger::new()
        .with_clock(Arc::new(ManualClock::ticking(1_600_000_000_000, 1)))
        .with_id_source(Arc::new(SequentialIds::default()))
}

fn immediate_distribution(
    ledger: &Ledger,
    cred_timestamp: i64,
    receipts: &[(IdentityId, &str)],
) -> Distribution {
    let ids = ledger.id_source();
    let receipts: Vec<GrainReceipt> = receipts
        .iter()
        .map(|(id, amount)| GrainReceipt { id: *id, amount: grain(amount) })
        .collect();
    Distribution {
        id: ids.next_id(),
        cred_timestamp,
        allocations: vec![Allocation {
            id: ids.next_id(),
            policy: AllocationPolicy::Immediate(ImmediatePolicy {
                budget: receipts.iter().map(|r| r.amount).sum(),
                num_intervals_lookback: 1,
            }),
            receipts,
        }],
    }
}

/// alice and bob, both active
fn alice_and_bob() -> (Ledger, IdentityId, IdentityId) {
    let mut ledger = new_ledger();
    let a = ledger.create_identity(IdentityType::User, "A").unwrap();
    let b = ledger.create_identity(IdentityType::User, "B").unwrap();
    ledger.activate(a).unwrap();
    ledger.activate(b).unwrap();
    (ledger, a, b)
}

#[test]
fn test_transfer_with_sufficient_balance() {
    let (mut ledger, a, b) = alice_and_bob();
    let distribution = immediate_distribution(&ledger, 1, &[(a, "3"), (b, "7")]);
    ledger.distribute_grain(distribution).unwrap();

    ledger
        .transfer_grain(TransferGrain {
            from: a,
            to: b,
            amount: grain("2"),
            memo: Some("gift".into()),
        })
        .unwrap();

    let alice = ledger.account(a).unwrap();
    assert_eq!(alice.balance, grain("1"));
    assert_eq!(alice.paid, grain("3"));
    let bob = ledger.account(b).unwrap();
    assert_eq!(bob.balance, grain("9"));
    assert_eq!(bob.paid, grain("7"));
}

#[test]
fn test_transfer_failing_on_insufficient_balance() {
    let (mut ledger, a, b) = alice_and_bob();
    let distribution = immediate_distribution(&ledger, 1, &[(a, "3"), (b, "7")]);
    ledger.distribute_grain(distribution).unwrap();
    ledger
        .transfer_grain(TransferGrain { from: a, to: b, amount: grain("2"), memo: None })
        .unwrap();

    let before = ledger.serialize().unwrap();
    let state = ledger.state().clone();
    let err = ledger
        .transfer_grain(TransferGrain { from: a, to: b, amount: grain("2"), memo: None })
        .unwrap_err();

    assert_eq!(err.to_string(), "insufficient balance for transfer: 2 > 1");
    assert_eq!(ledger.serialize().unwrap(), before);
    assert_eq!(ledger.state(), &state);
}

#[test]
fn test_merge_preserves_balance_and_paid() {
    let (mut ledger, a, b) = alice_and_bob();
    let first = immediate_distribution(&ledger, 1, &[(a, "100")]);
    ledger.distribute_grain(first).unwrap();
    let second = immediate_distribution(&ledger, 2, &[(b, "10")]);
    ledger.distribute_grain(second).unwrap();
    let b_address = ledger.account(b).unwrap().identity.address.clone();

    ledger.merge_identities(a, b).unwrap();

    let merged = ledger.account(a).unwrap();
    assert_eq!(merged.balance, grain("110"));
    assert_eq!(merged.paid, grain("110"));
    assert_eq!(ledger.account_by_address(&b_address), Some(merged));
    assert!(ledger.account_by_name("B").unwrap().is_none());
    assert!(ledger.account_by_name("A").unwrap().is_some());
}

#[test]
fn test_balanced_policy_equalizes_lifetime_fairness() {
    let ids = SequentialIds::default();
    let a = ids.next_id();
    let b = ids.next_id();
    let identities = vec![
        PolicyIdentity { id: a, paid: grain("0"), cred: vec![1.0, 1.0] },
        PolicyIdentity { id: b, paid: grain("30"), cred: vec![3.0, 0.0] },
    ];
    let policy = AllocationPolicy::Balanced(BalancedPolicy {
        budget: grain("20"),
        num_intervals_lookback: 0,
    });

    let allocation = ledger_core::compute_allocation(&policy, &identities, ids.next_id()).unwrap();

    assert_eq!(
        allocation.receipts,
        vec![
            GrainReceipt { id: a, amount: grain("20") },
            GrainReceipt { id: b, amount: grain("0") },
        ]
    );
}

#[test]
fn test_split_budget_exact_under_pathological_shares() {
    let pieces = split_budget(ONE, &[1.0, 1e100, 1.0]).unwrap();
    assert_eq!(pieces.len(), 3);
    assert_eq!(pieces.iter().sum::<Grain>(), ONE);
}
