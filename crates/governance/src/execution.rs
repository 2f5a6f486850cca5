//! Class-dispatched execution of passed proposals.
//!
//! By the time a proposal reaches the dispatcher its status has already been
//! flipped to `Executed`, so every handler is idempotent on entry: a
//! re-entrant call can never reach a second dispatch for the same proposal.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use agora_core::{Amount, MemberId};

use crate::proposal::{ParameterKey, Proposal, ProposalAction, ProposalId};
use crate::{GovernanceError, GovernanceParams, GovernanceResult, DECAY_SCALE};

/// Description of an action to be carried out by the external
/// multi-signature relay.
///
/// The host environment disallows arbitrary dynamic invocation, so contract
/// proposals never execute in-process; they are handed to the relay for
/// separately-authorized execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unique id of this relayed action
    pub id: String,
    /// Proposal that authorized the action
    pub proposal_id: ProposalId,
    /// Target module or contract address
    pub target: String,
    /// Opaque payload forwarded verbatim
    pub payload: Vec<u8>,
}

/// The external treasury / multi-signature execution boundary.
#[async_trait]
pub trait TreasuryRelay: Send + Sync {
    /// Pay out a treasury grant authorized by a funding proposal.
    async fn execute_grant(
        &self,
        recipient: &MemberId,
        amount: Amount,
        proposal_id: ProposalId,
    ) -> GovernanceResult<()>;

    /// Hand a descriptor to the relay for separately-authorized execution.
    /// Returns the relay's action id.
    async fn propose_relayed_action(&self, descriptor: ActionDescriptor) -> GovernanceResult<String>;
}

/// Routes an executed proposal to the handler for its class.
pub struct ExecutionDispatcher {
    relay: Arc<dyn TreasuryRelay>,
    params: Arc<RwLock<GovernanceParams>>,
}

impl ExecutionDispatcher {
    /// Create a dispatcher over the given relay and parameter store.
    pub fn new(relay: Arc<dyn TreasuryRelay>, params: Arc<RwLock<GovernanceParams>>) -> Self {
        Self { relay, params }
    }

    /// Carry out the effect of a proposal whose threshold was crossed.
    pub async fn dispatch(&self, proposal: &Proposal) -> GovernanceResult<()> {
        match &proposal.action {
            None => {
                // General proposals have no effect beyond the status change.
                info!("Proposal {} executed (signalling only)", proposal.id);
                Ok(())
            }
            Some(ProposalAction::Funding { recipient, amount }) => {
                info!(
                    "Proposal {} executing treasury grant of {} to {}",
                    proposal.id, amount, recipient
                );
                self.relay
                    .execute_grant(recipient, *amount, proposal.id)
                    .await
            }
            Some(ProposalAction::Parameter { key, value }) => {
                self.apply_parameter(proposal.id, *key, *value).await
            }
            Some(ProposalAction::Contract { target, payload }) => {
                let descriptor = ActionDescriptor {
                    id: Uuid::new_v4().to_string(),
                    proposal_id: proposal.id,
                    target: target.clone(),
                    payload: payload.clone(),
                };
                let action_id = self.relay.propose_relayed_action(descriptor).await?;
                info!(
                    "Proposal {} forwarded to relay as action {}",
                    proposal.id, action_id
                );
                Ok(())
            }
        }
    }

    /// Apply a parameter-change payload to the governance configuration.
    async fn apply_parameter(
        &self,
        proposal_id: ProposalId,
        key: ParameterKey,
        value: u64,
    ) -> GovernanceResult<()> {
        let mut params = self.params.write().await;
        let mut updated = params.clone();

        match key {
            ParameterKey::DecayRate => {
                if value >= DECAY_SCALE {
                    return Err(GovernanceError::InvalidParameter(format!(
                        "decay_rate must be below {}, got {}",
                        DECAY_SCALE, value
                    )));
                }
                updated.decay_rate = value as u32;
            }
            ParameterKey::BaseThreshold => updated.base_threshold = value,
            ParameterKey::MinStake => updated.min_stake = Amount::new(value),
            ParameterKey::MaxInactiveBlocks => updated.max_inactive_blocks = value,
        }

        updated.validate()?;
        info!(
            "Proposal {} set parameter {:?} to {}",
            proposal_id, key, value
        );
        *params = updated;
        Ok(())
    }
}

/// A relay that only logs and records the calls it receives.
///
/// Useful in tests and as a stand-in while no real treasury module is
/// wired up.
#[derive(Default)]
pub struct LoggingRelay {
    grants: Mutex<Vec<(MemberId, Amount, ProposalId)>>,
    actions: Mutex<Vec<ActionDescriptor>>,
}

impl LoggingRelay {
    /// Create a new logging relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants received so far.
    pub async fn grants(&self) -> Vec<(MemberId, Amount, ProposalId)> {
        self.grants.lock().await.clone()
    }

    /// Relayed actions received so far.
    pub async fn actions(&self) -> Vec<ActionDescriptor> {
        self.actions.lock().await.clone()
    }
}

#[async_trait]
impl TreasuryRelay for LoggingRelay {
    async fn execute_grant(
        &self,
        recipient: &MemberId,
        amount: Amount,
        proposal_id: ProposalId,
    ) -> GovernanceResult<()> {
        info!(
            "Would grant {} to {} for proposal {}",
            amount, recipient, proposal_id
        );
        self.grants
            .lock()
            .await
            .push((recipient.clone(), amount, proposal_id));
        Ok(())
    }

    async fn propose_relayed_action(&self, descriptor: ActionDescriptor) -> GovernanceResult<String> {
        if descriptor.payload.is_empty() {
            warn!(
                "Relayed action {} for proposal {} has an empty payload",
                descriptor.id, descriptor.proposal_id
            );
        }
        let action_id = descriptor.id.clone();
        self.actions.lock().await.push(descriptor);
        Ok(action_id)
    }
}
