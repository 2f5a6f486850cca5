//! The proposal lifecycle state machine.
//!
//! [`GovernanceManager`] owns the whole mutable engine state (proposal store
//! and conviction ledger) behind a single lock, so every public operation is
//! one atomic transaction: decay-then-mutate sequences can never interleave
//! and no caller observes partial state. This replaces the transactional
//! guarantees a chain host would provide for free.
//!
//! Expiry is pull-based: a proposal left alone past the inactivity window
//! stays nominally `Active` until some maintenance caller invokes
//! [`Governance::expire_inactive`]. Embedders that want automatic expiry
//! schedule that call themselves.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use agora_core::{Amount, Clock, MemberId, RoleSet};
use agora_economic::BalanceOracle;

use crate::conviction::{ConvictionLedger, VoteRecord};
use crate::execution::{ExecutionDispatcher, TreasuryRelay};
use crate::proposal::{Proposal, ProposalId, ProposalStatus, ProposalStore, ProposalSubmission};
use crate::threshold::required_conviction;
use crate::{GovernanceError, GovernanceParams, GovernanceResult, ParameterUpdate};

/// A voter's position across the whole system, including the derived
/// available-token figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSummary {
    /// Stake locked across all proposals
    pub total_stake: Amount,
    /// Sum of last-recorded conviction across proposals
    pub total_conviction: u64,
    /// Spendable balance reported by the token ledger
    pub balance: Amount,
    /// Balance minus locked stake
    pub available_tokens: Amount,
}

/// The public governance API.
#[async_trait]
pub trait Governance: Send + Sync {
    /// Create a new proposal. The proposer's balance must meet the
    /// minimum-stake gate.
    async fn create_proposal(
        &self,
        proposer: &MemberId,
        submission: ProposalSubmission,
    ) -> GovernanceResult<ProposalId>;

    /// Lock additional stake behind a proposal.
    async fn add_conviction(
        &self,
        voter: &MemberId,
        proposal: ProposalId,
        stake: Amount,
    ) -> GovernanceResult<()>;

    /// Withdraw a voter's entire stake from a proposal. Returns the
    /// released amount.
    async fn remove_conviction(
        &self,
        voter: &MemberId,
        proposal: ProposalId,
    ) -> GovernanceResult<Amount>;

    /// Execute a proposal whose conviction has crossed its threshold.
    /// Succeeds at most once per proposal.
    async fn execute_proposal(&self, proposal: ProposalId) -> GovernanceResult<()>;

    /// Decay the aggregate conviction of each listed proposal to the
    /// current time-unit. Returns how many proposals were swept; unknown or
    /// terminal proposals are skipped.
    async fn sweep(&self, proposals: &[ProposalId]) -> GovernanceResult<usize>;

    /// Expire listed proposals that have been untouched for longer than the
    /// inactivity window. Returns the ids that transitioned.
    async fn expire_inactive(&self, proposals: &[ProposalId])
        -> GovernanceResult<Vec<ProposalId>>;

    /// Look up a proposal.
    async fn get_proposal(&self, proposal: ProposalId) -> GovernanceResult<Option<Proposal>>;

    /// Look up a vote record.
    async fn get_vote(
        &self,
        proposal: ProposalId,
        voter: &MemberId,
    ) -> GovernanceResult<Option<VoteRecord>>;

    /// A voter's aggregate position, including available tokens.
    async fn get_voter_aggregate(&self, voter: &MemberId) -> GovernanceResult<VoterSummary>;

    /// Current engine parameters.
    async fn get_parameters(&self) -> GovernanceResult<GovernanceParams>;

    /// All proposals, ordered by id.
    async fn list_proposals(&self) -> GovernanceResult<Vec<Proposal>>;
}

/// Mutable engine state; one lock, one transaction boundary.
#[derive(Debug, Default)]
struct GovernanceState {
    proposals: ProposalStore,
    ledger: ConvictionLedger,
}

/// The conviction-voting governance engine.
pub struct GovernanceManager {
    state: RwLock<GovernanceState>,
    params: Arc<RwLock<GovernanceParams>>,
    admins: RwLock<RoleSet>,
    oracle: Arc<dyn BalanceOracle>,
    dispatcher: ExecutionDispatcher,
    clock: Arc<dyn Clock>,
}

impl GovernanceManager {
    /// Create a new manager over the given collaborators.
    pub fn new(
        oracle: Arc<dyn BalanceOracle>,
        relay: Arc<dyn TreasuryRelay>,
        clock: Arc<dyn Clock>,
        params: GovernanceParams,
        admins: RoleSet,
    ) -> GovernanceResult<Self> {
        params.validate()?;
        let params = Arc::new(RwLock::new(params));
        let dispatcher = ExecutionDispatcher::new(relay, params.clone());

        Ok(Self {
            state: RwLock::new(GovernanceState::default()),
            params,
            admins: RwLock::new(admins),
            oracle,
            dispatcher,
            clock,
        })
    }

    /// Kill-switch check, first on every non-admin mutating call.
    async fn ensure_enabled(&self) -> GovernanceResult<()> {
        if self.params.read().await.system_enabled {
            Ok(())
        } else {
            Err(GovernanceError::SystemDisabled)
        }
    }

    async fn ensure_admin(&self, caller: &MemberId) -> GovernanceResult<()> {
        if self.admins.read().await.contains(caller) {
            Ok(())
        } else {
            Err(GovernanceError::PermissionDenied(format!(
                "{} is not an administrator",
                caller
            )))
        }
    }

    /// Flip the kill-switch. Admin-only, and deliberately exempt from the
    /// switch itself so a disabled system can be re-enabled.
    pub async fn toggle_enabled(&self, caller: &MemberId, enabled: bool) -> GovernanceResult<()> {
        self.ensure_admin(caller).await?;
        let mut params = self.params.write().await;
        params.system_enabled = enabled;
        info!("Governance system {} by {}", if enabled { "enabled" } else { "disabled" }, caller);
        Ok(())
    }

    /// Apply a validated parameter update. Admin-only.
    pub async fn update_parameters(
        &self,
        caller: &MemberId,
        update: ParameterUpdate,
    ) -> GovernanceResult<()> {
        self.ensure_admin(caller).await?;
        let mut params = self.params.write().await;
        update.apply(&mut params)?;
        info!("Parameters updated by {}: {:?}", caller, *params);
        Ok(())
    }

    /// Grant the administrator role. Admin-only.
    pub async fn grant_admin(&self, caller: &MemberId, member: MemberId) -> GovernanceResult<()> {
        self.ensure_admin(caller).await?;
        let mut admins = self.admins.write().await;
        if admins.grant(member.clone()) {
            info!("{} granted admin to {}", caller, member);
        }
        Ok(())
    }

    /// Revoke the administrator role. Admin-only; the last administrator
    /// cannot be removed.
    pub async fn revoke_admin(&self, caller: &MemberId, member: &MemberId) -> GovernanceResult<()> {
        self.ensure_admin(caller).await?;
        let mut admins = self.admins.write().await;
        if admins.len() == 1 && admins.contains(member) {
            return Err(GovernanceError::PermissionDenied(
                "cannot revoke the last administrator".to_string(),
            ));
        }
        if admins.revoke(member) {
            info!("{} revoked admin from {}", caller, member);
        }
        Ok(())
    }
}

#[async_trait]
impl Governance for GovernanceManager {
    async fn create_proposal(
        &self,
        proposer: &MemberId,
        submission: ProposalSubmission,
    ) -> GovernanceResult<ProposalId> {
        self.ensure_enabled().await?;
        submission.validate()?;

        let (min_stake, base_threshold) = {
            let params = self.params.read().await;
            (params.min_stake, params.base_threshold)
        };

        let balance = self.oracle.get_balance(proposer).await?;
        if balance < min_stake {
            return Err(GovernanceError::InsufficientBalance {
                available: balance,
                requested: min_stake,
            });
        }

        let required = required_conviction(submission.class, base_threshold);
        let now = self.clock.now();
        let class = submission.class;

        let mut state = self.state.write().await;
        let id = state
            .proposals
            .insert_with(|id| Proposal::new(id, submission, proposer.clone(), required, now));

        info!(
            "Proposal {} ({:?}) created by {} at t={}, requires {} conviction",
            id, class, proposer, now, required
        );
        Ok(id)
    }

    async fn add_conviction(
        &self,
        voter: &MemberId,
        proposal: ProposalId,
        stake: Amount,
    ) -> GovernanceResult<()> {
        self.ensure_enabled().await?;
        if stake.is_zero() {
            return Err(GovernanceError::ZeroStake);
        }

        let decay_rate = self.params.read().await.decay_rate;
        let balance = self.oracle.get_balance(voter).await?;
        let now = self.clock.now();

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let record = state
            .proposals
            .get_mut(proposal)
            .ok_or(GovernanceError::ProposalNotFound(proposal))?;

        if !record.is_active() {
            return Err(GovernanceError::ProposalNotActive(proposal, record.status));
        }

        state
            .ledger
            .add_conviction(record, voter, stake, balance, decay_rate, now)
    }

    async fn remove_conviction(
        &self,
        voter: &MemberId,
        proposal: ProposalId,
    ) -> GovernanceResult<Amount> {
        self.ensure_enabled().await?;

        let decay_rate = self.params.read().await.decay_rate;
        let now = self.clock.now();

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let record = state
            .proposals
            .get_mut(proposal)
            .ok_or(GovernanceError::ProposalNotFound(proposal))?;

        if !record.is_active() {
            return Err(GovernanceError::ProposalNotActive(proposal, record.status));
        }

        state.ledger.remove_conviction(record, voter, decay_rate, now)
    }

    async fn execute_proposal(&self, proposal: ProposalId) -> GovernanceResult<()> {
        self.ensure_enabled().await?;

        let decay_rate = self.params.read().await.decay_rate;
        let now = self.clock.now();

        let executed = {
            let mut state = self.state.write().await;
            let record = state
                .proposals
                .get_mut(proposal)
                .ok_or(GovernanceError::ProposalNotFound(proposal))?;

            match record.status {
                ProposalStatus::Active => {}
                ProposalStatus::Executed => {
                    return Err(GovernanceError::AlreadyExecuted(proposal))
                }
                ProposalStatus::Expired => {
                    return Err(GovernanceError::ProposalNotActive(proposal, record.status))
                }
            }
            if record.executed_at.is_some() {
                return Err(GovernanceError::AlreadyExecuted(proposal));
            }

            ConvictionLedger::sweep(record, decay_rate, now);
            if !record.meets_threshold() {
                return Err(GovernanceError::ConvictionBelowThreshold {
                    proposal,
                    current: record.current_conviction,
                    required: record.required_conviction,
                });
            }

            // Flip before dispatch: re-entrant callers now see Executed and
            // can never reach a second dispatch.
            record.status = ProposalStatus::Executed;
            record.executed_at = Some(now);
            info!(
                "Proposal {} executed at t={} with {} conviction (required {})",
                proposal, now, record.current_conviction, record.required_conviction
            );
            record.clone()
        };

        self.dispatcher.dispatch(&executed).await
    }

    async fn sweep(&self, proposals: &[ProposalId]) -> GovernanceResult<usize> {
        self.ensure_enabled().await?;

        let decay_rate = self.params.read().await.decay_rate;
        let now = self.clock.now();

        let mut state = self.state.write().await;
        let mut swept = 0;
        for &id in proposals {
            match state.proposals.get_mut(id) {
                Some(record) if record.is_active() => {
                    ConvictionLedger::sweep(record, decay_rate, now);
                    swept += 1;
                }
                Some(record) => {
                    debug!("Skipping sweep of proposal {} ({:?})", id, record.status);
                }
                None => {
                    warn!("Sweep requested for unknown proposal {}", id);
                }
            }
        }
        Ok(swept)
    }

    async fn expire_inactive(
        &self,
        proposals: &[ProposalId],
    ) -> GovernanceResult<Vec<ProposalId>> {
        self.ensure_enabled().await?;

        let window = self.params.read().await.max_inactive_blocks;
        let now = self.clock.now();

        let mut state = self.state.write().await;
        let mut expired = Vec::new();
        for &id in proposals {
            match state.proposals.get_mut(id) {
                Some(record) if record.is_active() && record.is_inactive(now, window) => {
                    record.status = ProposalStatus::Expired;
                    info!(
                        "Proposal {} expired at t={} after {} units of inactivity",
                        id,
                        now,
                        now.saturating_sub(record.last_update_time)
                    );
                    expired.push(id);
                }
                Some(_) => {}
                None => {
                    warn!("Expiry requested for unknown proposal {}", id);
                }
            }
        }
        Ok(expired)
    }

    async fn get_proposal(&self, proposal: ProposalId) -> GovernanceResult<Option<Proposal>> {
        let state = self.state.read().await;
        Ok(state.proposals.get(proposal).cloned())
    }

    async fn get_vote(
        &self,
        proposal: ProposalId,
        voter: &MemberId,
    ) -> GovernanceResult<Option<VoteRecord>> {
        let state = self.state.read().await;
        Ok(state.ledger.vote(proposal, voter).cloned())
    }

    async fn get_voter_aggregate(&self, voter: &MemberId) -> GovernanceResult<VoterSummary> {
        let balance = self.oracle.get_balance(voter).await?;
        let state = self.state.read().await;
        let aggregate = state.ledger.voter_aggregate(voter).cloned().unwrap_or_default();

        Ok(VoterSummary {
            total_stake: aggregate.total_stake,
            total_conviction: aggregate.total_conviction,
            balance,
            available_tokens: balance.saturating_sub(aggregate.total_stake),
        })
    }

    async fn get_parameters(&self) -> GovernanceResult<GovernanceParams> {
        Ok(self.params.read().await.clone())
    }

    async fn list_proposals(&self) -> GovernanceResult<Vec<Proposal>> {
        let state = self.state.read().await;
        Ok(state.proposals.list())
    }
}
