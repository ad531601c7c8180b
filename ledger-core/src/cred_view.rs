//! Cred and grain side by side
//!
//! Cred scores come from outside the ledger as a table of per-interval cred
//! for each identity. [`CredGrainView`] joins that table with the ledger's
//! accounts so that grain earned can be compared to cred interval by
//! interval.

use crate::{
    account::AllocationReceipt,
    clock::TimestampMs,
    grain::{Grain, ZERO},
    id::IdentityId,
    identity::Identity,
    ledger::Ledger,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Time window `(start_time_ms, end_time_ms]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    /// Exclusive start
    pub start_time_ms: TimestampMs,
    /// Inclusive end
    pub end_time_ms: TimestampMs,
}

impl Interval {
    /// Whether `timestamp` falls in this interval
    pub fn contains(&self, timestamp: TimestampMs) -> bool {
        self.start_time_ms < timestamp && timestamp <= self.end_time_ms
    }
}

/// Cred scores for one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredParticipant {
    /// Identity
    pub id: IdentityId,
    /// Total cred
    pub cred: f64,
    /// Cred per interval, aligned with [`CredGraph::intervals`]
    pub cred_per_interval: Vec<f64>,
}

/// Source of cred scores
pub trait CredGraph {
    /// Intervals in time order
    fn intervals(&self) -> &[Interval];

    /// Scored identities
    fn participants(&self) -> &[CredParticipant];
}

/// In-memory [`CredGraph`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredTable {
    intervals: Vec<Interval>,
    participants: Vec<CredParticipant>,
}

impl CredTable {
    /// Build a table.
    ///
    /// Intervals must be non-empty windows in increasing order and every
    /// participant must have one cred value per interval.
    pub fn new(intervals: Vec<Interval>, participants: Vec<CredParticipant>) -> Result<Self> {
        if let Some(bad) = intervals.iter().find(|i| i.start_time_ms >= i.end_time_ms) {
            return Err(Error::Validation(format!("empty interval {bad:?}")));
        }
        if intervals
            .windows(2)
            .any(|w| w[1].start_time_ms < w[0].end_time_ms)
        {
            return Err(Error::Validation("intervals overlap or are out of order".into()));
        }
        for participant in &participants {
            if participant.cred_per_interval.len() != intervals.len() {
                return Err(Error::Validation(format!(
                    "participant {} has {} intervals of cred, expected {}",
                    participant.id,
                    participant.cred_per_interval.len(),
                    intervals.len()
                )));
            }
        }
        Ok(Self { intervals, participants })
    }
}

impl CredGraph for CredTable {
    fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    fn participants(&self) -> &[CredParticipant] {
        &self.participants
    }
}

/// One account joined with its cred
#[derive(Debug, Clone, PartialEq)]
pub struct CredGrainParticipant {
    /// Identity
    pub identity: Identity,
    /// Whether the account is active
    pub active: bool,
    /// Cred over the view's intervals
    pub cred: f64,
    /// Cred per interval
    pub cred_per_interval: Vec<f64>,
    /// Grain earned over the view's intervals
    pub grain_earned: Grain,
    /// Grain earned per interval
    pub grain_earned_per_interval: Vec<Grain>,
}

/// Accounts joined with a cred graph
#[derive(Debug, Clone, PartialEq)]
pub struct CredGrainView {
    intervals: Vec<Interval>,
    participants: Vec<CredGrainParticipant>,
}

impl CredGrainView {
    /// Join every live account of `ledger` with its scores in `graph`.
    ///
    /// Fails when an account has no participant in the graph.
    pub fn new(graph: &dyn CredGraph, ledger: &Ledger) -> Result<Self> {
        let intervals = graph.intervals().to_vec();
        let scores: HashMap<IdentityId, &CredParticipant> =
            graph.participants().iter().map(|p| (p.id, p)).collect();

        let participants = ledger
            .accounts()
            .into_iter()
            .map(|account| {
                let id = account.identity.id;
                let scores = scores.get(&id).ok_or_else(|| {
                    Error::NotFound(format!("no cred participant for account {id}"))
                })?;
                Ok(CredGrainParticipant {
                    identity: account.identity.clone(),
                    active: account.active,
                    cred: scores.cred,
                    cred_per_interval: scores.cred_per_interval.clone(),
                    grain_earned: account.paid,
                    grain_earned_per_interval: grain_per_interval(
                        &account.allocation_history,
                        &intervals,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            participants = participants.len(),
            intervals = intervals.len(),
            "Built cred grain view"
        );
        Ok(Self { intervals, participants })
    }

    /// Intervals covered by this view
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Every joined account, in ledger order
    pub fn participants(&self) -> &[CredGrainParticipant] {
        &self.participants
    }

    /// Joined accounts that are active
    pub fn active_participants(&self) -> impl Iterator<Item = &CredGrainParticipant> {
        self.participants.iter().filter(|p| p.active)
    }

    /// Cred summed across participants, per interval
    pub fn total_cred_per_interval(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.intervals.len()];
        for participant in &self.participants {
            for (total, cred) in totals.iter_mut().zip(&participant.cred_per_interval) {
                *total += cred;
            }
        }
        totals
    }

    /// Grain summed across participants, per interval
    pub fn total_grain_per_interval(&self) -> Result<Vec<Grain>> {
        let mut totals = vec![ZERO; self.intervals.len()];
        for participant in &self.participants {
            for (total, grain) in totals.iter_mut().zip(&participant.grain_earned_per_interval) {
                *total = total.checked_add(*grain)?;
            }
        }
        Ok(totals)
    }

    /// View over the intervals lying entirely within `[start_ms, end_ms]`
    pub fn with_time_scope(&self, start_ms: TimestampMs, end_ms: TimestampMs) -> Result<Self> {
        let from = self
            .intervals
            .iter()
            .position(|i| i.start_time_ms >= start_ms)
            .unwrap_or(self.intervals.len());
        let to = self
            .intervals
            .iter()
            .rposition(|i| i.end_time_ms <= end_ms)
            .map_or(0, |i| i + 1);
        let range = from..to.max(from);

        let participants = self
            .participants
            .iter()
            .map(|p| {
                let cred_per_interval = p.cred_per_interval[range.clone()].to_vec();
                let grain_earned_per_interval = p.grain_earned_per_interval[range.clone()].to_vec();
                Ok(CredGrainParticipant {
                    identity: p.identity.clone(),
                    active: p.active,
                    cred: cred_per_interval.iter().sum(),
                    grain_earned: grain_earned_per_interval
                        .iter()
                        .try_fold(ZERO, |acc, g| acc.checked_add(*g))?,
                    cred_per_interval,
                    grain_earned_per_interval,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            intervals: self.intervals[range].to_vec(),
            participants,
        })
    }
}

/// Bucket receipts by interval with one pass over the sorted history
fn grain_per_interval(history: &[AllocationReceipt], intervals: &[Interval]) -> Result<Vec<Grain>> {
    let mut totals = vec![ZERO; intervals.len()];
    let mut cursor = 0;
    for receipt in history {
        let timestamp = receipt.cred_timestamp_ms;
        while cursor < intervals.len() && intervals[cursor].end_time_ms < timestamp {
            cursor += 1;
        }
        let Some(interval) = intervals.get(cursor) else {
            break;
        };
        if interval.contains(timestamp) {
            totals[cursor] = totals[cursor].checked_add(receipt.grain_receipt.amount)?;
        }
    }
    Ok(totals)
}
