//! Conviction accumulation, decay, and the per-voter stake ledger.
//!
//! Conviction behind a proposal is a time-decaying quantity: staking adds an
//! undamped contribution immediately, and the accumulated value then retains
//! `decay_rate / 10_000` of itself per elapsed time-unit until the next
//! touch. Decay over a gap of `n` units is computed in closed form with
//! fixed-point fast exponentiation, so sweeping a long-idle proposal costs
//! O(log n) instead of O(n).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use agora_core::{Amount, MemberId};

use crate::proposal::{Proposal, ProposalId};
use crate::{GovernanceError, GovernanceResult};

/// Fixed-point scale for decay rates: a rate of 9_500 retains 95% per unit.
pub const DECAY_SCALE: u64 = 10_000;

/// `rate^n` in fixed point, truncating at each squaring step.
fn retention_pow(decay_rate: u32, mut n: u64) -> u128 {
    let scale = DECAY_SCALE as u128;
    let mut base = decay_rate as u128;
    let mut acc = scale;
    while n > 0 {
        if n & 1 == 1 {
            acc = acc * base / scale;
        }
        base = base * base / scale;
        n >>= 1;
    }
    acc
}

/// Conviction after `elapsed` time-units, given a stake held constant over
/// the whole interval.
///
/// Closed form of the per-unit recurrence `c' = floor(c * r) + stake`:
///
/// ```text
/// c[n] = c * r^n + stake * (1 - r^n) / (1 - r)
/// ```
///
/// With `stake = 0` this is pure exponential decay, which is how the ledger
/// ages existing conviction between touches; the accrual term describes the
/// trajectory toward the `stake / (1 - r)` asymptote when stake is held.
pub fn decay_conviction(conviction: u64, stake: u64, elapsed: u64, decay_rate: u32) -> u64 {
    if elapsed == 0 {
        return conviction;
    }

    let scale = DECAY_SCALE as u128;
    let r = decay_rate as u128;
    let rn = retention_pow(decay_rate, elapsed);

    let decayed = conviction as u128 * rn / scale;
    let accrued = if stake == 0 {
        0
    } else {
        stake as u128 * (scale - rn) / (scale - r)
    };

    (decayed + accrued).min(u64::MAX as u128) as u64
}

/// The asymptote conviction approaches under constant held stake.
pub fn conviction_ceiling(stake: u64, decay_rate: u32) -> u64 {
    let scale = DECAY_SCALE as u128;
    let ceiling = stake as u128 * scale / (scale - decay_rate as u128);
    ceiling.min(u64::MAX as u128) as u64
}

/// A voter's standing commitment to one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Tokens locked behind the proposal
    pub stake: Amount,
    /// Conviction attributable to this voter, as of `last_update_time`
    pub conviction: u64,
    /// Time-unit of the last decay-and-update
    pub last_update_time: u64,
    /// Time-unit of the first stake
    pub first_staked_time: u64,
}

/// Per-voter totals across all proposals, backing the shared balance pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterAggregate {
    /// Sum of locked stake across proposals
    pub total_stake: Amount,
    /// Sum of last-recorded conviction across proposals
    pub total_conviction: u64,
}

/// Owns every [`VoteRecord`] and [`VoterAggregate`], and enforces the one
/// shared-resource invariant: a voter's locked stake never exceeds their
/// token balance.
///
/// All methods are synchronous and take `&mut self`; the lifecycle manager
/// wraps the ledger in a single lock so each operation is one transaction.
#[derive(Debug, Default)]
pub struct ConvictionLedger {
    votes: HashMap<(ProposalId, MemberId), VoteRecord>,
    voters: HashMap<MemberId, VoterAggregate>,
}

impl ConvictionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens a voter can still stake, given their current balance.
    pub fn available_tokens(&self, voter: &MemberId, balance: Amount) -> Amount {
        let locked = self
            .voters
            .get(voter)
            .map(|agg| agg.total_stake)
            .unwrap_or(Amount::ZERO);
        balance.saturating_sub(locked)
    }

    /// The vote record for a (proposal, voter) pair, if any.
    pub fn vote(&self, proposal: ProposalId, voter: &MemberId) -> Option<&VoteRecord> {
        self.votes.get(&(proposal, voter.clone()))
    }

    /// A voter's aggregate lock totals, if they have any standing stake.
    pub fn voter_aggregate(&self, voter: &MemberId) -> Option<&VoterAggregate> {
        self.voters.get(voter)
    }

    /// Lock additional stake behind a proposal.
    ///
    /// Decays the voter's existing record to `now`, adds the stake as a
    /// fresh undamped contribution, and folds the change into the
    /// proposal's aggregate (which is itself decayed to `now` first).
    pub fn add_conviction(
        &mut self,
        proposal: &mut Proposal,
        voter: &MemberId,
        stake_delta: Amount,
        balance: Amount,
        decay_rate: u32,
        now: u64,
    ) -> GovernanceResult<()> {
        let available = self.available_tokens(voter, balance);
        if stake_delta > available {
            return Err(GovernanceError::InsufficientBalance {
                available,
                requested: stake_delta,
            });
        }

        // Age the proposal aggregate before folding in the new stake.
        Self::sweep(proposal, decay_rate, now);

        let record = self
            .votes
            .entry((proposal.id, voter.clone()))
            .or_insert(VoteRecord {
                stake: Amount::ZERO,
                conviction: 0,
                last_update_time: now,
                first_staked_time: now,
            });

        let old_conviction = record.conviction;
        record.conviction = decay_conviction(
            record.conviction,
            0,
            now.saturating_sub(record.last_update_time),
            decay_rate,
        );
        record.last_update_time = now;
        record.stake = record.stake.saturating_add(stake_delta);
        record.conviction = record.conviction.saturating_add(stake_delta.value());
        let new_conviction = record.conviction;

        let aggregate = self.voters.entry(voter.clone()).or_default();
        aggregate.total_stake = aggregate.total_stake.saturating_add(stake_delta);
        aggregate.total_conviction = aggregate
            .total_conviction
            .saturating_sub(old_conviction)
            .saturating_add(new_conviction);

        // Both the record and the aggregate are decayed to `now`, so the
        // aggregate grows by exactly the fresh stake contribution.
        proposal.current_conviction = proposal
            .current_conviction
            .saturating_add(stake_delta.value());
        proposal.total_stake = proposal.total_stake.saturating_add(stake_delta);
        proposal.max_conviction = proposal.max_conviction.max(proposal.current_conviction);
        proposal.last_update_time = now;

        debug!(
            "Voter {} staked {} on proposal {}, conviction {} -> {}",
            voter, stake_delta, proposal.id, old_conviction, new_conviction
        );
        Ok(())
    }

    /// Withdraw a voter's entire stake from a proposal.
    ///
    /// Full withdrawal only: the record is decayed to `now`, its conviction
    /// is subtracted from the proposal aggregate, the stake returns to the
    /// voter's available pool, and the record is deleted.
    pub fn remove_conviction(
        &mut self,
        proposal: &mut Proposal,
        voter: &MemberId,
        decay_rate: u32,
        now: u64,
    ) -> GovernanceResult<Amount> {
        let record = self.votes.remove(&(proposal.id, voter.clone())).ok_or(
            GovernanceError::VoteNotFound {
                proposal: proposal.id,
                voter: voter.clone(),
            },
        )?;

        Self::sweep(proposal, decay_rate, now);

        let decayed = decay_conviction(
            record.conviction,
            0,
            now.saturating_sub(record.last_update_time),
            decay_rate,
        );

        proposal.current_conviction = proposal.current_conviction.saturating_sub(decayed);
        proposal.total_stake = proposal.total_stake.saturating_sub(record.stake);
        proposal.last_update_time = now;

        if let Some(aggregate) = self.voters.get_mut(voter) {
            aggregate.total_stake = aggregate.total_stake.saturating_sub(record.stake);
            aggregate.total_conviction =
                aggregate.total_conviction.saturating_sub(record.conviction);
            if aggregate.total_stake.is_zero() {
                self.voters.remove(voter);
            }
        }

        debug!(
            "Voter {} withdrew {} from proposal {}, releasing {} conviction",
            voter, record.stake, proposal.id, decayed
        );
        Ok(record.stake)
    }

    /// Decay a proposal's aggregate conviction from its last update to `now`.
    ///
    /// The aggregate is decayed as a whole rather than per vote record;
    /// individual records are aged exactly on their own add/remove calls.
    /// Sweeping at an unchanged time-unit is a no-op, so repeated sweeps are
    /// idempotent.
    pub fn sweep(proposal: &mut Proposal, decay_rate: u32, now: u64) {
        if now <= proposal.last_update_time {
            return;
        }

        let elapsed = now - proposal.last_update_time;
        proposal.current_conviction =
            decay_conviction(proposal.current_conviction, 0, elapsed, decay_rate);
        proposal.last_update_time = now;
    }

    /// Number of standing vote records across all proposals.
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}
