//! Conviction-voting governance engine for Agora.
//!
//! Voting power here is not a snapshot: conviction accumulates continuously
//! while a member's stake stays committed to a proposal, decays whenever the
//! stake is reduced or left untouched, and a proposal becomes executable once
//! its accumulated conviction crosses a class-specific threshold.
//!
//! The crate is organized around the flow of a proposal:
//!
//! - [`conviction`]: the decay math and the per-(proposal, voter) stake
//!   ledger with per-voter lock totals
//! - [`proposal`]: proposal records, typed execution payloads, and the
//!   owned id-keyed store
//! - [`threshold`]: class-to-required-conviction scaling
//! - [`lifecycle`]: the [`GovernanceManager`] state machine orchestrating
//!   creation, decay sweeps, expiry, and execution
//! - [`execution`]: class-dispatched execution handlers and the external
//!   treasury/multi-signature relay boundary

pub mod conviction;
pub mod execution;
pub mod lifecycle;
pub mod proposal;
pub mod threshold;

pub use conviction::{decay_conviction, ConvictionLedger, VoteRecord, VoterAggregate, DECAY_SCALE};
pub use execution::{ActionDescriptor, ExecutionDispatcher, LoggingRelay, TreasuryRelay};
pub use lifecycle::{Governance, GovernanceManager, VoterSummary};
pub use proposal::{
    ParameterKey, Proposal, ProposalAction, ProposalClass, ProposalId, ProposalStatus,
    ProposalStore, ProposalSubmission,
};
pub use threshold::required_conviction;

use agora_core::{Amount, MemberId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for governance operations.
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// The governance kill-switch is off
    #[error("Governance system is disabled")]
    SystemDisabled,

    /// Caller lacks the required role
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No proposal with the given id
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// Proposal exists but is no longer accepting mutations
    #[error("Proposal {0} is not active (status: {1:?})")]
    ProposalNotActive(ProposalId, ProposalStatus),

    /// Execution was already carried out
    #[error("Proposal {0} has already been executed")]
    AlreadyExecuted(ProposalId),

    /// No vote record for the (proposal, voter) pair
    #[error("No vote by {voter} on proposal {proposal}")]
    VoteNotFound {
        /// Proposal the withdrawal targeted
        proposal: ProposalId,
        /// Voter with no standing stake
        voter: MemberId,
    },

    /// Stake exceeds the voter's unlocked tokens
    #[error("Insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance {
        /// Balance minus existing stake locks
        available: Amount,
        /// Stake the call tried to lock
        requested: Amount,
    },

    /// Stake amounts must be positive
    #[error("Stake amount must be positive")]
    ZeroStake,

    /// Accumulated conviction has not crossed the proposal's threshold
    #[error("Proposal {proposal} has {current} conviction, {required} required")]
    ConvictionBelowThreshold {
        /// Proposal whose execution was attempted
        proposal: ProposalId,
        /// Conviction after decaying to the current time-unit
        current: u64,
        /// Threshold fixed at creation
        required: u64,
    },

    /// Malformed proposal at creation time
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// Rejected configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failure reported by the token-ledger boundary
    #[error("Ledger error: {0}")]
    Economic(#[from] agora_economic::EconomicError),

    /// Failure reported by the treasury/governance relay
    #[error("Relay error: {0}")]
    Relay(String),
}

/// Result type for governance operations.
pub type GovernanceResult<T> = std::result::Result<T, GovernanceError>;

/// Tunable parameters of the conviction engine.
///
/// All mutations flow through the admin surface or through executed
/// `Parameter` proposals; both paths validate with [`GovernanceParams::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Per-time-unit conviction retention, scaled by [`DECAY_SCALE`]
    /// (9_500 = retain 95% each unit). Must be below the scale.
    pub decay_rate: u32,
    /// Required conviction for a General proposal; other classes scale up
    /// from this value.
    pub base_threshold: u64,
    /// Minimum spendable balance required to create a proposal.
    pub min_stake: Amount,
    /// Time-units of inactivity after which a proposal may be expired.
    pub max_inactive_blocks: u64,
    /// Kill-switch: when false, every non-admin mutating call is refused.
    pub system_enabled: bool,
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            decay_rate: 9_500,            // retain 95% per time-unit
            base_threshold: 1_000_000,
            min_stake: Amount::new(1_000),
            max_inactive_blocks: 20_000,
            system_enabled: true,
        }
    }
}

impl GovernanceParams {
    /// Check that the parameter set is internally consistent.
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.decay_rate as u64 >= DECAY_SCALE {
            return Err(GovernanceError::InvalidParameter(format!(
                "decay_rate must be below {}, got {}",
                DECAY_SCALE, self.decay_rate
            )));
        }
        if self.base_threshold == 0 {
            return Err(GovernanceError::InvalidParameter(
                "base_threshold must be positive".to_string(),
            ));
        }
        if self.max_inactive_blocks == 0 {
            return Err(GovernanceError::InvalidParameter(
                "max_inactive_blocks must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial parameter update applied by the admin surface.
///
/// `None` fields are left untouched. The kill-switch has its own call and is
/// deliberately absent here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// New conviction retention rate, scaled by [`DECAY_SCALE`].
    pub decay_rate: Option<u32>,
    /// New base threshold.
    pub base_threshold: Option<u64>,
    /// New proposal-creation stake gate.
    pub min_stake: Option<Amount>,
    /// New inactivity window.
    pub max_inactive_blocks: Option<u64>,
}

impl ParameterUpdate {
    /// Apply the update to a parameter set, validating the result.
    pub fn apply(&self, params: &mut GovernanceParams) -> GovernanceResult<()> {
        let mut updated = params.clone();
        if let Some(decay_rate) = self.decay_rate {
            updated.decay_rate = decay_rate;
        }
        if let Some(base_threshold) = self.base_threshold {
            updated.base_threshold = base_threshold;
        }
        if let Some(min_stake) = self.min_stake {
            updated.min_stake = min_stake;
        }
        if let Some(max_inactive_blocks) = self.max_inactive_blocks {
            updated.max_inactive_blocks = max_inactive_blocks;
        }
        updated.validate()?;
        *params = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(GovernanceParams::default().validate().is_ok());
    }

    #[test]
    fn test_decay_rate_must_stay_below_scale() {
        let params = GovernanceParams {
            decay_rate: 10_000,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(GovernanceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parameter_update_is_all_or_nothing() {
        let mut params = GovernanceParams::default();
        let update = ParameterUpdate {
            decay_rate: Some(9_000),
            base_threshold: Some(0), // invalid
            ..Default::default()
        };

        assert!(update.apply(&mut params).is_err());
        // Nothing applied, including the valid field
        assert_eq!(params.decay_rate, 9_500);
        assert_eq!(params.base_threshold, 1_000_000);
    }

    #[test]
    fn test_parameter_update_partial() {
        let mut params = GovernanceParams::default();
        let update = ParameterUpdate {
            min_stake: Some(Amount::new(5_000)),
            ..Default::default()
        };

        update.apply(&mut params).unwrap();
        assert_eq!(params.min_stake, Amount::new(5_000));
        assert_eq!(params.decay_rate, 9_500);
    }
}
