//! Allocation policies
//!
//! A policy turns per-identity cred history and lifetime payouts into grain
//! receipts. Computation is pure: the same policy, inputs and allocation id
//! always produce the same allocation, and its receipts always sum exactly
//! to the policy budget.

use crate::{
    grain::{split_budget, Grain, ZERO},
    id::{AllocationId, IdentityId},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Grain owed to one identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrainReceipt {
    /// Recipient
    pub id: IdentityId,
    /// Amount
    pub amount: Grain,
}

fn default_immediate_lookback() -> u32 {
    1
}

/// Split by cred earned in the most recent intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmediatePolicy {
    /// Grain to distribute
    pub budget: Grain,
    /// How many trailing intervals of cred count, at least 1
    #[serde(default = "default_immediate_lookback")]
    pub num_intervals_lookback: u32,
}

/// Pay identities toward their fair share of all grain ever distributed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancedPolicy {
    /// Grain to distribute
    pub budget: Grain,
    /// Trailing intervals considered when building inputs; 0 means all
    #[serde(default)]
    pub num_intervals_lookback: u32,
}

/// Split by exponentially discounted cred.
///
/// `discount` is the fraction of weight lost per interval of age: cred from
/// `k` intervals ago counts `(1 - discount)^k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecentPolicy {
    /// Grain to distribute
    pub budget: Grain,
    /// Per-interval decay, in `[0, 1]`
    pub discount: f64,
}

/// Like balanced, but only for identities underpaid by at least `threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderpaidPolicy {
    /// Grain to distribute
    pub budget: Grain,
    /// Minimum underpayment to qualify
    pub threshold: Grain,
    /// Applied to each underpayment before splitting, in `(0, 1]`
    pub exponent: f64,
}

/// Entire budget to a single recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialPolicy {
    /// Grain to distribute
    pub budget: Grain,
    /// Reason for the payment
    pub memo: String,
    /// Recipient
    pub recipient: IdentityId,
}

/// How an allocation's budget is split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policyType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationPolicy {
    /// See [`ImmediatePolicy`]
    Immediate(ImmediatePolicy),
    /// See [`BalancedPolicy`]
    Balanced(BalancedPolicy),
    /// See [`RecentPolicy`]
    Recent(RecentPolicy),
    /// See [`UnderpaidPolicy`]
    Underpaid(UnderpaidPolicy),
    /// See [`SpecialPolicy`]
    Special(SpecialPolicy),
}

impl AllocationPolicy {
    /// Budget to distribute
    pub fn budget(&self) -> Grain {
        match self {
            AllocationPolicy::Immediate(p) => p.budget,
            AllocationPolicy::Balanced(p) => p.budget,
            AllocationPolicy::Recent(p) => p.budget,
            AllocationPolicy::Underpaid(p) => p.budget,
            AllocationPolicy::Special(p) => p.budget,
        }
    }

    /// Wire tag
    pub fn kind(&self) -> &'static str {
        match self {
            AllocationPolicy::Immediate(_) => "IMMEDIATE",
            AllocationPolicy::Balanced(_) => "BALANCED",
            AllocationPolicy::Recent(_) => "RECENT",
            AllocationPolicy::Underpaid(_) => "UNDERPAID",
            AllocationPolicy::Special(_) => "SPECIAL",
        }
    }

    /// Check policy parameters
    pub fn validate(&self) -> Result<()> {
        if self.budget().is_negative() {
            return Err(Error::Policy(format!(
                "{} budget must be non-negative, got {}",
                self.kind(),
                self.budget()
            )));
        }
        match self {
            AllocationPolicy::Immediate(p) if p.num_intervals_lookback == 0 => Err(Error::Policy(
                "IMMEDIATE numIntervalsLookback must be at least 1".into(),
            )),
            AllocationPolicy::Recent(p) if !(0.0..=1.0).contains(&p.discount) => Err(
                Error::Policy(format!("RECENT discount must be in [0, 1], got {}", p.discount)),
            ),
            AllocationPolicy::Underpaid(p) if p.threshold.is_negative() => Err(Error::Policy(
                format!("UNDERPAID threshold must be non-negative, got {}", p.threshold),
            )),
            AllocationPolicy::Underpaid(p) if !(p.exponent > 0.0 && p.exponent <= 1.0) => Err(
                Error::Policy(format!("UNDERPAID exponent must be in (0, 1], got {}", p.exponent)),
            ),
            _ => Ok(()),
        }
    }
}

/// Receipts produced by one policy in one distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Stable id, assigned at computation time
    pub id: AllocationId,
    /// Policy that produced the receipts
    pub policy: AllocationPolicy,
    /// One receipt per recipient
    pub receipts: Vec<GrainReceipt>,
}

impl Allocation {
    /// Total of all receipts
    pub fn total(&self) -> Result<Grain> {
        self.receipts
            .iter()
            .try_fold(ZERO, |acc, r| acc.checked_add(r.amount))
    }

    /// Check the policy, receipt signs and budget exactness
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if let Some(r) = self.receipts.iter().find(|r| r.amount.is_negative()) {
            return Err(Error::Economic(format!(
                "allocation {} has negative receipt {} for {}",
                self.id, r.amount, r.id
            )));
        }
        let total = self.total()?;
        if total != self.policy.budget() {
            return Err(Error::Validation(format!(
                "allocation {} receipts sum to {}, budget is {}",
                self.id,
                total,
                self.policy.budget()
            )));
        }
        Ok(())
    }
}

/// Policy input for one identity
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyIdentity {
    /// Identity
    pub id: IdentityId,
    /// Grain paid so far
    pub paid: Grain,
    /// Cred per interval, oldest first
    pub cred: Vec<f64>,
}

struct ProcessedIdentity<'a> {
    paid: Grain,
    cred: &'a [f64],
    lifetime_cred: f64,
}

fn process_identities(identities: &[PolicyIdentity]) -> Result<Vec<ProcessedIdentity<'_>>> {
    let first = identities
        .first()
        .ok_or_else(|| Error::Policy("must have at least one identity to allocate grain".into()))?;
    let num_intervals = first.cred.len();
    let mut seen = HashSet::with_capacity(identities.len());
    let mut processed = Vec::with_capacity(identities.len());
    for identity in identities {
        if !seen.insert(identity.id) {
            return Err(Error::Policy(format!("duplicate identity {}", identity.id)));
        }
        if identity.cred.len() != num_intervals {
            return Err(Error::Policy(format!(
                "identity {} has {} intervals of cred, expected {}",
                identity.id,
                identity.cred.len(),
                num_intervals
            )));
        }
        if identity.cred.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(Error::Policy(format!(
                "identity {} has negative or non-finite cred",
                identity.id
            )));
        }
        if identity.paid.is_negative() {
            return Err(Error::Policy(format!(
                "identity {} has negative paid {}",
                identity.id, identity.paid
            )));
        }
        processed.push(ProcessedIdentity {
            paid: identity.paid,
            cred: &identity.cred,
            lifetime_cred: identity.cred.iter().sum(),
        });
    }
    let total: f64 = processed.iter().map(|p| p.lifetime_cred).sum();
    if !(total > 0.0) {
        return Err(Error::Policy(format!("total cred must be positive, got {total}")));
    }
    Ok(processed)
}

/// Compute the allocation `policy` assigns to `identities`
pub fn compute_allocation(
    policy: &AllocationPolicy,
    identities: &[PolicyIdentity],
    id: AllocationId,
) -> Result<Allocation> {
    policy.validate()?;
    let processed = process_identities(identities)?;
    let budget = policy.budget();

    let amounts = match policy {
        AllocationPolicy::Special(p) => return special_allocation(policy, p, identities, id),
        _ if budget == ZERO => vec![ZERO; identities.len()],
        AllocationPolicy::Immediate(p) => split(
            policy,
            budget,
            &immediate_shares(&processed, p.num_intervals_lookback),
        )?,
        AllocationPolicy::Balanced(_) => {
            split(policy, budget, &balanced_shares(&processed, budget)?)?
        }
        AllocationPolicy::Recent(p) => split(policy, budget, &recent_shares(&processed, p.discount))?,
        AllocationPolicy::Underpaid(p) => split(
            policy,
            budget,
            &underpaid_shares(&processed, budget, p.threshold, p.exponent)?,
        )?,
    };
    let receipts = identities
        .iter()
        .zip(amounts)
        .map(|(identity, amount)| GrainReceipt { id: identity.id, amount })
        .collect();

    let allocation = Allocation { id, policy: policy.clone(), receipts };
    allocation.validate()?;
    Ok(allocation)
}

fn special_allocation(
    policy: &AllocationPolicy,
    special: &SpecialPolicy,
    identities: &[PolicyIdentity],
    id: AllocationId,
) -> Result<Allocation> {
    if !identities.iter().any(|i| i.id == special.recipient) {
        return Err(Error::Policy(format!(
            "SPECIAL recipient {} is not among the identities",
            special.recipient
        )));
    }
    let allocation = Allocation {
        id,
        policy: policy.clone(),
        receipts: vec![GrainReceipt { id: special.recipient, amount: special.budget }],
    };
    allocation.validate()?;
    Ok(allocation)
}

fn split(policy: &AllocationPolicy, budget: Grain, shares: &[f64]) -> Result<Vec<Grain>> {
    split_budget(budget, shares)
        .map_err(|e| Error::Policy(format!("{} allocation failed: {e}", policy.kind())))
}

fn immediate_shares(identities: &[ProcessedIdentity<'_>], lookback: u32) -> Vec<f64> {
    identities
        .iter()
        .map(|i| {
            let from = i.cred.len().saturating_sub(lookback as usize);
            i.cred[from..].iter().sum()
        })
        .collect()
}

fn recent_shares(identities: &[ProcessedIdentity<'_>], discount: f64) -> Vec<f64> {
    let retained = 1.0 - discount;
    identities
        .iter()
        .map(|i| {
            let last = i.cred.len().saturating_sub(1);
            i.cred
                .iter()
                .enumerate()
                .map(|(t, c)| c * retained.powi((last - t) as i32))
                .sum()
        })
        .collect()
}

/// `max(0, fair share - paid)` per identity
fn underpayments(identities: &[ProcessedIdentity<'_>], budget: Grain) -> Result<Vec<Grain>> {
    let total_cred: f64 = identities.iter().map(|i| i.lifetime_cred).sum();
    let total_paid = identities
        .iter()
        .try_fold(ZERO, |acc, i| acc.checked_add(i.paid))?;
    let target_total = total_paid.checked_add(budget)?;
    let per_cred = target_total.multiply_float(1.0 / total_cred)?;
    identities
        .iter()
        .map(|i| {
            let target = per_cred.multiply_float(i.lifetime_cred)?;
            let under = target.checked_sub(i.paid)?;
            Ok(if under.is_negative() { ZERO } else { under })
        })
        .collect()
}

fn balanced_shares(identities: &[ProcessedIdentity<'_>], budget: Grain) -> Result<Vec<f64>> {
    let shares: Vec<f64> = underpayments(identities, budget)?
        .into_iter()
        .map(|u| u.attos() as f64)
        .collect();
    if shares.iter().all(|s| *s == 0.0) {
        return Err(Error::Policy(format!(
            "BALANCED: no identity is underpaid with a budget of {budget}"
        )));
    }
    Ok(shares)
}

fn underpaid_shares(
    identities: &[ProcessedIdentity<'_>],
    budget: Grain,
    threshold: Grain,
    exponent: f64,
) -> Result<Vec<f64>> {
    let shares: Vec<f64> = underpayments(identities, budget)?
        .into_iter()
        .map(|u| {
            if u == ZERO || u < threshold {
                0.0
            } else {
                (u.attos() as f64).powf(exponent)
            }
        })
        .collect();
    if shares.iter().all(|s| *s == 0.0) {
        return Err(Error::Policy(format!(
            "UNDERPAID: no identity is underpaid by at least {threshold}"
        )));
    }
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grain::ONE;
    use crate::id::{IdSource, SequentialIds};

    fn identity(ids: &SequentialIds, paid: i64, cred: &[f64]) -> PolicyIdentity {
        PolicyIdentity {
            id: ids.next_id(),
            paid: Grain::from_integer(paid),
            cred: cred.to_vec(),
        }
    }

    fn amounts(allocation: &Allocation) -> Vec<i128> {
        allocation.receipts.iter().map(|r| r.amount.attos()).collect()
    }

    #[test]
    fn test_immediate_uses_latest_interval() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[100.0, 1.0]), identity(&ids, 0, &[0.0, 3.0])];
        let policy = AllocationPolicy::Immediate(ImmediatePolicy {
            budget: Grain::from_integer(400),
            num_intervals_lookback: 1,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![100, 300]);
    }

    #[test]
    fn test_immediate_lookback() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[3.0, 1.0]), identity(&ids, 0, &[0.0, 4.0])];
        let policy = AllocationPolicy::Immediate(ImmediatePolicy {
            budget: Grain::from_integer(80),
            num_intervals_lookback: 2,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![40, 40]);
    }

    #[test]
    fn test_balanced_equalizes_lifetime() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[1.0, 1.0]), identity(&ids, 30, &[3.0, 0.0])];
        let policy = AllocationPolicy::Balanced(BalancedPolicy {
            budget: Grain::from_integer(20),
            num_intervals_lookback: 0,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![20, 0]);
    }

    #[test]
    fn test_recent_full_discount_uses_last_interval() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[50.0, 1.0]), identity(&ids, 0, &[0.0, 1.0])];
        let policy = AllocationPolicy::Recent(RecentPolicy {
            budget: Grain::from_integer(10),
            discount: 1.0,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![5, 5]);
    }

    #[test]
    fn test_recent_no_discount_uses_lifetime() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[3.0, 0.0]), identity(&ids, 0, &[0.0, 1.0])];
        let policy = AllocationPolicy::Recent(RecentPolicy {
            budget: Grain::from_integer(100),
            discount: 0.0,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![75, 25]);
    }

    #[test]
    fn test_underpaid_threshold() {
        let ids = SequentialIds::default();
        // Fair share after distribution is 50 each; underpayments 50 and 10.
        let people = vec![identity(&ids, 0, &[1.0]), identity(&ids, 40, &[1.0])];
        let policy = AllocationPolicy::Underpaid(UnderpaidPolicy {
            budget: Grain::from_integer(60),
            threshold: Grain::from_integer(20),
            exponent: 1.0,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![60, 0]);

        let policy = AllocationPolicy::Underpaid(UnderpaidPolicy {
            budget: Grain::from_integer(60),
            threshold: Grain::from_integer(1000),
            exponent: 1.0,
        });
        assert!(matches!(
            compute_allocation(&policy, &people, ids.next_id()),
            Err(Error::Policy(_))
        ));
    }

    #[test]
    fn test_balanced_pays_nobody_over_target() {
        let ids = SequentialIds::default();
        // One attograin split over two equal identities floors every target to 0.
        let people = vec![identity(&ids, 0, &[1.0]), identity(&ids, 0, &[1.0])];
        let policy = AllocationPolicy::Balanced(BalancedPolicy {
            budget: Grain::from_attos(1),
            num_intervals_lookback: 0,
        });
        assert!(matches!(
            compute_allocation(&policy, &people, ids.next_id()),
            Err(Error::Policy(_))
        ));
    }

    #[test]
    fn test_recent_partial_discount() {
        let ids = SequentialIds::default();
        // Weights 0.25, 0.5, 1 from oldest to newest: both score 2.
        let people = vec![
            identity(&ids, 0, &[8.0, 0.0, 0.0]),
            identity(&ids, 0, &[0.0, 2.0, 1.0]),
        ];
        let policy = AllocationPolicy::Recent(RecentPolicy {
            budget: Grain::from_integer(100),
            discount: 0.5,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![50, 50]);
    }

    #[test]
    fn test_underpaid_exponent_flattens_shares() {
        let ids = SequentialIds::default();
        // Targets 200 and 600 after the distribution; underpayments 100 and 400.
        let people = vec![identity(&ids, 100, &[1.0]), identity(&ids, 200, &[3.0])];
        let underpaid = |exponent| {
            AllocationPolicy::Underpaid(UnderpaidPolicy {
                budget: Grain::from_integer(500),
                threshold: ZERO,
                exponent,
            })
        };

        let linear = compute_allocation(&underpaid(1.0), &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&linear), vec![100, 400]);

        // sqrt(100) : sqrt(400) = 1 : 2
        let root = compute_allocation(&underpaid(0.5), &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&root), vec![166, 334]);
    }

    #[test]
    fn test_special() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[1.0]), identity(&ids, 0, &[1.0])];
        let policy = AllocationPolicy::Special(SpecialPolicy {
            budget: ONE,
            memo: "thanks".into(),
            recipient: people[1].id,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(allocation.receipts, vec![GrainReceipt { id: people[1].id, amount: ONE }]);

        let policy = AllocationPolicy::Special(SpecialPolicy {
            budget: ONE,
            memo: "thanks".into(),
            recipient: ids.next_id(),
        });
        assert!(compute_allocation(&policy, &people, ids.next_id()).is_err());
    }

    #[test]
    fn test_zero_budget_yields_zero_receipts() {
        let ids = SequentialIds::default();
        let people = vec![identity(&ids, 0, &[1.0]), identity(&ids, 0, &[2.0])];
        let policy = AllocationPolicy::Balanced(BalancedPolicy {
            budget: ZERO,
            num_intervals_lookback: 0,
        });
        let allocation = compute_allocation(&policy, &people, ids.next_id()).unwrap();
        assert_eq!(amounts(&allocation), vec![0, 0]);
    }

    #[test]
    fn test_invalid_inputs() {
        let ids = SequentialIds::default();
        let policy = AllocationPolicy::Immediate(ImmediatePolicy {
            budget: ONE,
            num_intervals_lookback: 1,
        });
        assert!(compute_allocation(&policy, &[], ids.next_id()).is_err());

        let ragged = vec![identity(&ids, 0, &[1.0]), identity(&ids, 0, &[1.0, 2.0])];
        assert!(compute_allocation(&policy, &ragged, ids.next_id()).is_err());

        let no_cred = vec![identity(&ids, 0, &[0.0])];
        assert!(compute_allocation(&policy, &no_cred, ids.next_id()).is_err());

        let bad_discount = AllocationPolicy::Recent(RecentPolicy { budget: ONE, discount: 1.5 });
        let people = vec![identity(&ids, 0, &[1.0])];
        assert!(compute_allocation(&bad_discount, &people, ids.next_id()).is_err());
    }

    #[test]
    fn test_policy_wire_format() {
        let json = r#"{"policyType":"IMMEDIATE","budget":"100"}"#;
        let policy: AllocationPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(
            policy,
            AllocationPolicy::Immediate(ImmediatePolicy {
                budget: Grain::from_integer(100),
                num_intervals_lookback: 1,
            })
        );

        let json = r#"{"policyType":"RECENT","budget":"1","discount":0.5}"#;
        assert!(serde_json::from_str::<AllocationPolicy>(json).is_ok());
        // Decay-rate encodings are not accepted.
        let json = r#"{"policyType":"RECENT","budget":"1","discount":0.5,"decay":0.5}"#;
        assert!(serde_json::from_str::<AllocationPolicy>(json).is_err());
    }

    #[test]
    fn test_allocation_validate_budget() {
        let ids = SequentialIds::default();
        let recipient = ids.next_id();
        let mut allocation = Allocation {
            id: ids.next_id(),
            policy: AllocationPolicy::Special(SpecialPolicy {
                budget: Grain::from_integer(10),
                memo: String::new(),
                recipient,
            }),
            receipts: vec![GrainReceipt { id: recipient, amount: Grain::from_integer(10) }],
        };
        assert!(allocation.validate().is_ok());
        allocation.receipts[0].amount = Grain::from_integer(9);
        assert!(matches!(allocation.validate(), Err(Error::Validation(_))));
    }
}
