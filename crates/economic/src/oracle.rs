//! Read-only balance queries against the host token ledger.

use async_trait::async_trait;

use agora_core::{Amount, MemberId};

use crate::Result;

/// Read-only view of a member's spendable token balance.
///
/// The governance engine calls this on every stake and proposal-creation
/// path; implementations are expected to be cheap and side-effect free.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Get the spendable balance of a member.
    ///
    /// Members unknown to the ledger report a zero balance rather than an
    /// error, so that the engine's balance gates fail uniformly.
    async fn get_balance(&self, member: &MemberId) -> Result<Amount>;
}
