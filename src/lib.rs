//! Agora: conviction-voting governance for decentralized organizations.
//!
//! This facade crate re-exports the member crates and offers a convenience
//! constructor for a fully in-memory engine, which is the configuration
//! tests and single-process deployments use.
//!
//! - [`core`]: identities, amounts, and the time-unit clock
//! - [`economic`]: the balance-oracle boundary and an in-memory token
//!   ledger
//! - [`governance`]: the conviction engine itself (proposals, decay,
//!   thresholds, lifecycle, execution)

use tracing_subscriber::EnvFilter;

pub use agora_core as core;
pub use agora_economic as economic;
pub use agora_governance as governance;

use std::sync::Arc;

use agora_core::{MemberId, RoleSet, SystemClock};
use agora_economic::TokenLedger;
use agora_governance::{GovernanceManager, GovernanceParams, GovernanceResult, LoggingRelay};

/// Initialize structured logging from `RUST_LOG`, defaulting to `info`.
///
/// Call once at process startup; library code only emits `tracing` events
/// and never installs a subscriber itself.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// A fully in-memory engine and the collaborators it was built over.
pub struct InMemoryEngine {
    /// The governance engine.
    pub manager: GovernanceManager,
    /// Token ledger backing balance queries.
    pub ledger: Arc<TokenLedger>,
    /// Relay that records dispatched actions instead of executing them.
    pub relay: Arc<LoggingRelay>,
}

/// Build an engine over an in-memory token ledger, the wall clock, and a
/// logging relay.
pub fn in_memory_engine(
    params: GovernanceParams,
    admins: impl IntoIterator<Item = MemberId>,
) -> GovernanceResult<InMemoryEngine> {
    let ledger = Arc::new(TokenLedger::new());
    let relay = Arc::new(LoggingRelay::new());

    let manager = GovernanceManager::new(
        ledger.clone(),
        relay.clone(),
        Arc::new(SystemClock::new()),
        params,
        RoleSet::with_members(admins),
    )?;

    Ok(InMemoryEngine {
        manager,
        ledger,
        relay,
    })
}
