//! Token ledger boundary for the Agora governance toolkit.
//!
//! The governance engine treats the fungible-token ledger as an external
//! collaborator and only ever queries spendable balances. This crate defines
//! that boundary ([`BalanceOracle`]) and provides an in-memory reference
//! ledger ([`TokenLedger`]) for tests, demos, and single-process embeddings.

mod ledger;
mod oracle;

pub use ledger::TokenLedger;
pub use oracle::BalanceOracle;

use thiserror::Error;

/// Error types for ledger operations.
#[derive(Error, Debug)]
pub enum EconomicError {
    /// Account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account already exists
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// Spendable balance too low for the requested operation
    #[error("Insufficient funds for {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account attempting to spend
        account: String,
        /// Spendable balance at the time of the call
        balance: u64,
        /// Amount the call tried to move
        requested: u64,
    },

    /// Arithmetic overflow in balance accounting
    #[error("Balance overflow for account: {0}")]
    BalanceOverflow(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, EconomicError>;
