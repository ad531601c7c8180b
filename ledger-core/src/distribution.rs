//! Distributions: allocations committed together at one cred timestamp

use crate::{
    clock::TimestampMs,
    cred_view::{CredGraph, CredGrainParticipant, CredGrainView},
    grain::{Grain, ZERO},
    id::{DistributionId, IdSource},
    ledger::Ledger,
    policy::{compute_allocation, Allocation, AllocationPolicy, PolicyIdentity},
    Result,
};
use serde::{Deserialize, Serialize};

/// Allocations applied to the ledger as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    /// Stable id, assigned at computation time
    pub id: DistributionId,
    /// End of the cred interval the distribution pays for
    pub cred_timestamp: TimestampMs,
    /// Allocations, one per policy
    pub allocations: Vec<Allocation>,
}

impl Distribution {
    /// Total grain minted
    pub fn total(&self) -> Result<Grain> {
        self.allocations
            .iter()
            .try_fold(ZERO, |acc, a| acc.checked_add(a.total()?))
    }
}

/// Policies and scheduling for [`apply_distributions`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionConfig {
    /// One allocation is computed per policy
    pub policies: Vec<AllocationPolicy>,
    /// Distribute for the latest complete interval even if it was already
    /// paid, instead of catching up on every unpaid interval
    #[serde(default)]
    pub allow_multiple_distributions_per_interval: bool,
}

/// Compute a distribution over the active participants of `view`.
///
/// Only intervals ending at or before `effective_timestamp` are considered.
pub fn compute_distribution(
    policies: &[AllocationPolicy],
    view: &CredGrainView,
    effective_timestamp: TimestampMs,
    ids: &dyn IdSource,
) -> Result<Distribution> {
    let scoped = view.with_time_scope(TimestampMs::MIN, effective_timestamp)?;
    let recipients: Vec<&CredGrainParticipant> = scoped.active_participants().collect();

    let allocations = policies
        .iter()
        .map(|policy| {
            let inputs = policy_inputs(policy, &recipients)?;
            compute_allocation(policy, &inputs, ids.next_id())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Distribution {
        id: ids.next_id(),
        cred_timestamp: effective_timestamp,
        allocations,
    })
}

fn policy_inputs(
    policy: &AllocationPolicy,
    participants: &[&CredGrainParticipant],
) -> Result<Vec<PolicyIdentity>> {
    let lookback = match policy {
        AllocationPolicy::Balanced(p) if p.num_intervals_lookback > 0 => {
            Some(p.num_intervals_lookback as usize)
        }
        _ => None,
    };
    participants
        .iter()
        .map(|p| {
            let (cred, paid) = match lookback {
                Some(n) => {
                    let from = p.cred_per_interval.len().saturating_sub(n);
                    let paid = p.grain_earned_per_interval[from..]
                        .iter()
                        .try_fold(ZERO, |acc, g| acc.checked_add(*g))?;
                    (p.cred_per_interval[from..].to_vec(), paid)
                }
                None => (p.cred_per_interval.clone(), p.grain_earned),
            };
            Ok(PolicyIdentity { id: p.identity.id, paid, cred })
        })
        .collect()
}

/// Distribute grain for every complete interval not yet paid.
///
/// An interval is complete when it ends at or before `current_timestamp`.
/// With `allow_multiple_distributions_per_interval` only the latest complete
/// interval is paid, whether or not it already was. Each distribution is
/// computed against the ledger as left by the previous one.
pub fn apply_distributions(
    config: &DistributionConfig,
    graph: &dyn CredGraph,
    ledger: &mut Ledger,
    current_timestamp: TimestampMs,
) -> Result<Vec<Distribution>> {
    let complete: Vec<TimestampMs> = graph
        .intervals()
        .iter()
        .map(|i| i.end_time_ms)
        .filter(|end| *end <= current_timestamp)
        .collect();

    let targets: Vec<TimestampMs> = if config.allow_multiple_distributions_per_interval {
        complete.last().copied().into_iter().collect()
    } else {
        let paid_through = ledger.last_distribution_timestamp();
        complete
            .into_iter()
            .filter(|end| paid_through.map_or(true, |last| *end > last))
            .collect()
    };

    let ids = ledger.id_source();
    let mut applied = Vec::with_capacity(targets.len());
    for effective_timestamp in targets {
        let view = CredGrainView::new(graph, ledger)?;
        let distribution = compute_distribution(&config.policies, &view, effective_timestamp, &*ids)?;
        ledger.distribute_grain(distribution.clone())?;
        tracing::info!(
            distribution_id = %distribution.id,
            cred_timestamp = effective_timestamp,
            allocations = distribution.allocations.len(),
            "Distribution applied"
        );
        applied.push(distribution);
    }
    Ok(applied)
}
