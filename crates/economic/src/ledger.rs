//! In-memory reference implementation of the token ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use agora_core::{Amount, MemberId};

use crate::{BalanceOracle, EconomicError, Result};

/// A simple in-memory token ledger.
///
/// Stands in for the host chain's fungible-token module in tests and
/// single-process deployments. Balances are plain spendable amounts; the
/// governance engine tracks its own virtual stake locks on top of them.
#[derive(Debug, Default)]
pub struct TokenLedger {
    accounts: RwLock<HashMap<MemberId, Amount>>,
}

impl TokenLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account with an opening balance.
    pub async fn create_account(&self, member: MemberId, balance: Amount) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&member) {
            return Err(EconomicError::AccountAlreadyExists(member.to_string()));
        }

        info!("Created account {} with balance {}", member, balance);
        accounts.insert(member, balance);
        Ok(())
    }

    /// Credit tokens to an account, creating it if necessary.
    pub async fn mint(&self, member: &MemberId, amount: Amount) -> Result<Amount> {
        let mut accounts = self.accounts.write().await;
        let balance = accounts.entry(member.clone()).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| EconomicError::BalanceOverflow(member.to_string()))?;

        debug!("Minted {} to {}, new balance {}", amount, member, balance);
        Ok(*balance)
    }

    /// Move tokens between two accounts.
    pub async fn transfer(&self, from: &MemberId, to: &MemberId, amount: Amount) -> Result<()> {
        let mut accounts = self.accounts.write().await;

        let source = *accounts
            .get(from)
            .ok_or_else(|| EconomicError::AccountNotFound(from.to_string()))?;

        let remaining = source
            .checked_sub(amount)
            .ok_or_else(|| EconomicError::InsufficientFunds {
                account: from.to_string(),
                balance: source.value(),
                requested: amount.value(),
            })?;

        let destination = *accounts.entry(to.clone()).or_insert(Amount::ZERO);
        let credited = destination
            .checked_add(amount)
            .ok_or_else(|| EconomicError::BalanceOverflow(to.to_string()))?;

        accounts.insert(from.clone(), remaining);
        accounts.insert(to.clone(), credited);

        debug!("Transferred {} from {} to {}", amount, from, to);
        Ok(())
    }

    /// Get the balance of an account. Unknown accounts report zero.
    pub async fn balance(&self, member: &MemberId) -> Amount {
        let accounts = self.accounts.read().await;
        accounts.get(member).copied().unwrap_or(Amount::ZERO)
    }
}

#[async_trait]
impl BalanceOracle for TokenLedger {
    async fn get_balance(&self, member: &MemberId) -> Result<Amount> {
        Ok(self.balance(member).await)
    }
}
