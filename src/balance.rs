/// ENFORCED BALANCE TYPE - Used by the in-memory currency ledger
///
/// ALL balance mutations MUST go through these methods.
///
/// # Enforcement Strategy:
/// 1. Fields are PRIVATE - no direct access
/// 2. All mutations return Result - errors are explicit
/// 3. Version auto-increments - audit trail
/// 4. checked_add/sub - overflow protection
use serde::{Deserialize, Serialize};

use crate::core_types::Credits;
use crate::ledger::LedgerError;

/// Credit balance of one member in one guild
///
/// # Invariants (ENFORCED by private fields):
/// - avail never negative, never overflows
/// - version increments on every successful mutation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    avail: Credits, // PRIVATE - ONLY modified through deposit/withdraw
    version: u64,   // PRIVATE - incremented on deposit/withdraw
}

impl Balance {
    /// Create a balance holding `amount` credits
    pub const fn with_credits(amount: Credits) -> Self {
        Self {
            avail: amount,
            version: 0,
        }
    }

    /// Get available balance (read-only)
    #[inline(always)]
    pub const fn avail(&self) -> Credits {
        self.avail
    }

    /// Get version (read-only)
    #[inline(always)]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Deposit credits
    ///
    /// # Errors
    /// - `LedgerError::Overflow` on overflow
    pub fn deposit(&mut self, amount: Credits) -> Result<(), LedgerError> {
        self.avail = self
            .avail
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Withdraw credits
    ///
    /// # Errors
    /// - `LedgerError::InsufficientFunds` if avail < amount
    pub fn withdraw(&mut self, amount: Credits) -> Result<(), LedgerError> {
        if self.avail < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available: self.avail,
            });
        }
        self.avail -= amount;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_and_withdraw() {
        let mut balance = Balance::default();
        balance.deposit(500).unwrap();
        balance.withdraw(200).unwrap();
        assert_eq!(balance.avail(), 300);
        assert_eq!(balance.version(), 2);
    }

    #[test]
    fn test_withdraw_insufficient_keeps_balance() {
        let mut balance = Balance::with_credits(50);
        let err = balance.withdraw(100).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                needed: 100,
                available: 50
            }
        );
        assert_eq!(balance.avail(), 50);
        assert_eq!(balance.version(), 0);
    }

    #[test]
    fn test_deposit_overflow() {
        let mut balance = Balance::with_credits(Credits::MAX);
        assert_eq!(balance.deposit(1), Err(LedgerError::Overflow));
        assert_eq!(balance.avail(), Credits::MAX);
    }
}
