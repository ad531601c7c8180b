//! Ledger benchmarks
//!
//! Budget splitting, command throughput and event log replay.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ledger_core::{
    grain::ONE, policy::ImmediatePolicy, split_budget, Allocation, AllocationPolicy, Distribution,
    Grain, GrainReceipt, IdSource, IdentityType, Ledger, ManualClock, SequentialIds,
    TransferGrain,
};
use std::sync::Arc;

/// Ledger with `accounts` active identities, one distribution and a chain of transfers
fn populated_ledger(accounts: usize) -> Ledger {
    let mut ledger = Ledger::new()
        .with_clock(Arc::new(ManualClock::ticking(1, 1)))
        .with_id_source(Arc::new(SequentialIds::default()));
    let ids: Vec<_> = (0..accounts)
        .map(|i| {
            let id = ledger
                .create_identity(IdentityType::User, &format!("user-{i}"))
                .expect("create");
            ledger.activate(id).expect("activate");
            id
        })
        .collect();

    let source = ledger.id_source();
    let receipts: Vec<GrainReceipt> = ids
        .iter()
        .map(|id| GrainReceipt { id: *id, amount: ONE })
        .collect();
    let budget = receipts.iter().map(|r| r.amount).sum();
    ledger
        .distribute_grain(Distribution {
            id: source.next_id(),
            cred_timestamp: 0,
            allocations: vec![Allocation {
                id: source.next_id(),
                policy: AllocationPolicy::Immediate(ImmediatePolicy {
                    budget,
                    num_intervals_lookback: 1,
                }),
                receipts,
            }],
        })
        .expect("distribute");

    for pair in ids.windows(2) {
        ledger
            .transfer_grain(TransferGrain {
                from: pair[0],
                to: pair[1],
                amount: Grain::from_attos(1),
                memo: None,
            })
            .expect("transfer");
    }
    ledger
}

fn bench_split_budget(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_budget");

    for count in [10usize, 100, 1_000] {
        let shares: Vec<f64> = (0..count).map(|i| (i % 7 + 1) as f64).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &shares, |b, shares| {
            b.iter(|| split_budget(black_box(ONE), black_box(shares)))
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for accounts in [10usize, 100] {
        let ledger = populated_ledger(accounts);
        let events = ledger.event_log().to_vec();
        let text = ledger.serialize().expect("serialize");
        group.throughput(Throughput::Elements(events.len() as u64));

        group.bench_with_input(BenchmarkId::new("events", accounts), &events, |b, events| {
            b.iter(|| Ledger::from_event_log(black_box(events.clone())))
        });
        group.bench_with_input(BenchmarkId::new("parse", accounts), &text, |b, text| {
            b.iter(|| Ledger::parse(black_box(text)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_split_budget, bench_replay);
criterion_main!(benches);
