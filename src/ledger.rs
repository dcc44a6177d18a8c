//! Currency Ledger
//!
//! Boundary to the guild bank. The heist engine only asks for a balance,
//! withdraws entry fees and bail, and deposits loot; balance arithmetic
//! belongs to the bank behind this trait.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::balance::Balance;
use crate::core_types::{Credits, GuildId, MemberId};

/// Ledger error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Credits, available: Credits },

    #[error("Account not found")]
    AccountNotFound,

    #[error("Balance would overflow")]
    Overflow,

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of a member's bank account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub balance: Credits,
}

/// Currency ledger trait
///
/// Implementations must be safe to call concurrently for different members.
#[async_trait]
pub trait CurrencyLedger: Send + Sync {
    /// Get the member's account
    async fn get_account(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
    ) -> Result<Account, LedgerError>;

    /// Withdraw credits (debit). Fails with `InsufficientFunds` without side effects.
    async fn withdraw(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        amount: Credits,
    ) -> Result<Account, LedgerError>;

    /// Deposit credits (credit)
    async fn deposit(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        amount: Credits,
    ) -> Result<Account, LedgerError>;
}

/// In-process ledger backed by a DashMap of balances.
///
/// Accounts are opened implicitly: an unknown member has a zero balance.
pub struct MemoryLedger {
    accounts: DashMap<(GuildId, MemberId), Balance>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Open (or overwrite) an account with a starting balance
    pub fn open_account(&self, guild_id: GuildId, member_id: MemberId, credits: Credits) {
        self.accounts
            .insert((guild_id, member_id), Balance::with_credits(credits));
    }

    /// Number of open accounts across all guilds
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Current balance, zero for unknown members
    pub fn balance(&self, guild_id: GuildId, member_id: MemberId) -> Credits {
        self.accounts
            .get(&(guild_id, member_id))
            .map(|b| b.avail())
            .unwrap_or(0)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CurrencyLedger for MemoryLedger {
    async fn get_account(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
    ) -> Result<Account, LedgerError> {
        Ok(Account {
            balance: self.balance(guild_id, member_id),
        })
    }

    async fn withdraw(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        amount: Credits,
    ) -> Result<Account, LedgerError> {
        // Only deposits open accounts; a refused withdraw leaves no trace.
        let Some(mut entry) = self.accounts.get_mut(&(guild_id, member_id)) else {
            if amount == 0 {
                return Ok(Account { balance: 0 });
            }
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available: 0,
            });
        };
        entry.withdraw(amount)?;
        debug!(guild_id, member_id, amount, balance = entry.avail(), "Withdraw");
        Ok(Account {
            balance: entry.avail(),
        })
    }

    async fn deposit(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        amount: Credits,
    ) -> Result<Account, LedgerError> {
        let mut entry = self.accounts.entry((guild_id, member_id)).or_default();
        entry.deposit(amount)?;
        debug!(guild_id, member_id, amount, balance = entry.avail(), "Deposit");
        Ok(Account {
            balance: entry.avail(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_member_has_zero_balance() {
        let ledger = MemoryLedger::new();
        let account = ledger.get_account(1, 42).await.unwrap();
        assert_eq!(account.balance, 0);
    }

    #[tokio::test]
    async fn test_withdraw_and_deposit() {
        let ledger = MemoryLedger::new();
        ledger.open_account(1, 42, 1000);

        let account = ledger.withdraw(1, 42, 300).await.unwrap();
        assert_eq!(account.balance, 700);

        let account = ledger.deposit(1, 42, 50).await.unwrap();
        assert_eq!(account.balance, 750);
    }

    #[tokio::test]
    async fn test_withdraw_insufficient() {
        let ledger = MemoryLedger::new();
        ledger.open_account(1, 42, 10);

        let result = ledger.withdraw(1, 42, 100).await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds {
                needed: 100,
                available: 10
            })
        ));
        assert_eq!(ledger.balance(1, 42), 10);
    }

    #[tokio::test]
    async fn test_refused_withdraw_opens_no_account() {
        let ledger = MemoryLedger::new();
        for member_id in 1..=50 {
            let result = ledger.withdraw(1, member_id, 100).await;
            assert!(matches!(
                result,
                Err(LedgerError::InsufficientFunds {
                    needed: 100,
                    available: 0
                })
            ));
        }
        assert_eq!(ledger.account_count(), 0);

        ledger.deposit(1, 7, 5).await.unwrap();
        assert_eq!(ledger.account_count(), 1);
    }

    #[tokio::test]
    async fn test_accounts_are_per_guild() {
        let ledger = MemoryLedger::new();
        ledger.open_account(1, 42, 500);
        assert_eq!(ledger.balance(2, 42), 0);
    }
}
