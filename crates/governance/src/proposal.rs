//! Proposal records, typed execution payloads, and the id-keyed store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agora_core::{Amount, MemberId};

use crate::{GovernanceError, GovernanceResult, DECAY_SCALE};

/// Unique, monotonically assigned proposal identifier.
pub type ProposalId = u64;

/// The category of a proposal, determining its execution path and its
/// conviction threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalClass {
    /// Signalling only; no external effect on execution
    General,
    /// Treasury grant to a recipient
    Funding,
    /// Change to a governance parameter
    Parameter,
    /// Action relayed to the external multi-signature executor
    Contract,
}

/// Lifecycle status of a proposal.
///
/// `Active` is the only state accepting stake mutations; the other two are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Accumulating conviction
    Active,
    /// Threshold crossed and execution dispatched
    Executed,
    /// Inactive beyond the configured window
    Expired,
}

/// A governance parameter addressable by `Parameter` proposals.
///
/// Being an enum, unknown keys cannot survive proposal creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKey {
    /// Per-time-unit conviction retention (scaled)
    DecayRate,
    /// Base conviction threshold
    BaseThreshold,
    /// Proposal-creation balance gate
    MinStake,
    /// Inactivity window in time-units
    MaxInactiveBlocks,
}

/// Typed execution payload, fixed at proposal creation.
///
/// Replaces runtime string parsing: the payload is validated against the
/// proposal class when the proposal is created, so execution never has to
/// interpret encoded key/value lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalAction {
    /// Grant tokens from the treasury
    Funding {
        /// Recipient of the grant
        recipient: MemberId,
        /// Grant size in smallest token units
        amount: Amount,
    },
    /// Update one governance parameter
    Parameter {
        /// Parameter to change
        key: ParameterKey,
        /// New raw value, interpreted per key
        value: u64,
    },
    /// Describe an action for the external multi-signature relay
    Contract {
        /// Target module or contract address
        target: String,
        /// Opaque payload forwarded verbatim to the relay
        payload: Vec<u8>,
    },
}

impl ProposalAction {
    /// The proposal class this payload belongs to.
    pub fn class(&self) -> ProposalClass {
        match self {
            ProposalAction::Funding { .. } => ProposalClass::Funding,
            ProposalAction::Parameter { .. } => ProposalClass::Parameter,
            ProposalAction::Contract { .. } => ProposalClass::Contract,
        }
    }

    /// Check payload values whose bounds are fixed constants.
    ///
    /// Parameter values are fully checkable at creation time, so an
    /// out-of-range value never reaches execution: a proposal that passed
    /// this check cannot fail parameter validation after its status has
    /// been flipped to `Executed`.
    pub fn validate(&self) -> GovernanceResult<()> {
        match self {
            ProposalAction::Parameter {
                key: ParameterKey::DecayRate,
                value,
            } if *value >= DECAY_SCALE => Err(GovernanceError::InvalidProposal(format!(
                "decay_rate must be below {}, got {}",
                DECAY_SCALE, value
            ))),
            ProposalAction::Parameter {
                key: ParameterKey::BaseThreshold,
                value: 0,
            } => Err(GovernanceError::InvalidProposal(
                "base_threshold must be positive".to_string(),
            )),
            ProposalAction::Parameter {
                key: ParameterKey::MaxInactiveBlocks,
                value: 0,
            } => Err(GovernanceError::InvalidProposal(
                "max_inactive_blocks must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Fields supplied by the proposer at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSubmission {
    /// Short human-readable title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Reference link (forum thread, document)
    pub link: String,
    /// Proposal class
    pub class: ProposalClass,
    /// Execution payload; required for every class except `General`
    pub action: Option<ProposalAction>,
}

impl ProposalSubmission {
    /// Check class/payload agreement and payload value bounds: `General`
    /// proposals carry no payload, every other class carries exactly the
    /// payload of its own kind, and the payload itself passes
    /// [`ProposalAction::validate`].
    pub fn validate(&self) -> GovernanceResult<()> {
        match (self.class, &self.action) {
            (ProposalClass::General, None) => Ok(()),
            (ProposalClass::General, Some(_)) => Err(GovernanceError::InvalidProposal(
                "general proposals do not carry an action payload".to_string(),
            )),
            (class, Some(action)) if action.class() == class => action.validate(),
            (class, Some(action)) => Err(GovernanceError::InvalidProposal(format!(
                "{:?} proposal carries a {:?} payload",
                class,
                action.class()
            ))),
            (class, None) => Err(GovernanceError::InvalidProposal(format!(
                "{:?} proposals require an action payload",
                class
            ))),
        }
    }
}

/// A proposal under conviction voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique identifier
    pub id: ProposalId,
    /// Short human-readable title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Reference link
    pub link: String,
    /// Member who created the proposal
    pub proposer: MemberId,
    /// Proposal class
    pub class: ProposalClass,
    /// Current lifecycle status
    pub status: ProposalStatus,
    /// Time-unit of creation
    pub created_at: u64,
    /// Aggregate conviction, decayed as of `last_update_time`
    pub current_conviction: u64,
    /// Highest aggregate conviction ever observed
    pub max_conviction: u64,
    /// Sum of all stake currently locked behind this proposal
    pub total_stake: Amount,
    /// Time-unit of the last conviction update or sweep
    pub last_update_time: u64,
    /// Conviction required for execution, fixed at creation
    pub required_conviction: u64,
    /// Time-unit of execution, set at most once
    pub executed_at: Option<u64>,
    /// Typed execution payload, absent for `General` proposals
    pub action: Option<ProposalAction>,
}

impl Proposal {
    /// Create a new active proposal.
    pub fn new(
        id: ProposalId,
        submission: ProposalSubmission,
        proposer: MemberId,
        required_conviction: u64,
        now: u64,
    ) -> Self {
        Self {
            id,
            title: submission.title,
            description: submission.description,
            link: submission.link,
            proposer,
            class: submission.class,
            status: ProposalStatus::Active,
            created_at: now,
            current_conviction: 0,
            max_conviction: 0,
            total_stake: Amount::ZERO,
            last_update_time: now,
            required_conviction,
            executed_at: None,
            action: submission.action,
        }
    }

    /// Whether the proposal still accepts stake mutations.
    pub fn is_active(&self) -> bool {
        self.status == ProposalStatus::Active
    }

    /// Whether accumulated conviction has crossed the threshold.
    pub fn meets_threshold(&self) -> bool {
        self.current_conviction >= self.required_conviction
    }

    /// Whether the proposal has been untouched for longer than the window.
    pub fn is_inactive(&self, now: u64, max_inactive_blocks: u64) -> bool {
        now.saturating_sub(self.last_update_time) > max_inactive_blocks
    }
}

/// Owned store of proposals, keyed by their monotonic id.
#[derive(Debug, Default)]
pub struct ProposalStore {
    proposals: HashMap<ProposalId, Proposal>,
    next_id: ProposalId,
}

impl ProposalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and insert a new proposal built from it.
    pub fn insert_with(&mut self, build: impl FnOnce(ProposalId) -> Proposal) -> ProposalId {
        let id = self.next_id;
        self.next_id += 1;
        let proposal = build(id);
        debug_assert_eq!(proposal.id, id);
        self.proposals.insert(id, proposal);
        id
    }

    /// Look up a proposal.
    pub fn get(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    /// Look up a proposal for mutation.
    pub fn get_mut(&mut self, id: ProposalId) -> Option<&mut Proposal> {
        self.proposals.get_mut(&id)
    }

    /// All proposals, ordered by id.
    pub fn list(&self) -> Vec<Proposal> {
        let mut proposals: Vec<Proposal> = self.proposals.values().cloned().collect();
        proposals.sort_by_key(|p| p.id);
        proposals
    }

    /// Number of stored proposals.
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}
