//! Simulated asset ledger.
//!
//! Stands in for the settlement layer's token contracts: balances per
//! `(account, token)`, atomic transfers, and an injectable failure so the
//! withdraw-revert-retry path can be exercised.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use shared_types::{Address, U256};

/// Transfer failures from the asset layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BankError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: U256, need: U256 },

    /// The token contract rejected the transfer.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Balances per `(account, token)` with atomic transfers.
#[derive(Default)]
pub struct TokenBank {
    accounts: RwLock<HashMap<(Address, Address), U256>>,
    /// When set, the next transfer fails with this reason.
    fail_next: Mutex<Option<String>>,
}

impl TokenBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air. Simulation setup only.
    pub fn mint(&self, account: Address, token: Address, amount: U256) {
        let mut accounts = self.accounts.write();
        let balance = accounts.entry((account, token)).or_insert_with(U256::zero);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: Address, token: Address) -> U256 {
        self.accounts
            .read()
            .get(&(account, token))
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// Atomically move `amount` of `token` between accounts.
    pub fn transfer(
        &self,
        from: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), BankError> {
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(BankError::Rejected(reason));
        }

        let mut accounts = self.accounts.write();
        let have = accounts
            .get(&(from, token))
            .copied()
            .unwrap_or_else(U256::zero);
        if have < amount {
            return Err(BankError::InsufficientFunds { have, need: amount });
        }

        accounts.insert((from, token), have - amount);
        let dest = accounts.entry((to, token)).or_insert_with(U256::zero);
        *dest = dest.saturating_add(amount);
        Ok(())
    }

    /// Make the next transfer fail, as a token contract would when paused
    /// or when an account is frozen.
    pub fn set_fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = Address([1u8; 20]);
    const BOB: Address = Address([2u8; 20]);
    const USDT: Address = Address([9u8; 20]);

    #[test]
    fn test_mint_and_transfer() {
        let bank = TokenBank::new();
        bank.mint(ALICE, USDT, U256::from(100u64));

        bank.transfer(ALICE, BOB, USDT, U256::from(40u64)).unwrap();
        assert_eq!(bank.balance_of(ALICE, USDT), U256::from(60u64));
        assert_eq!(bank.balance_of(BOB, USDT), U256::from(40u64));
    }

    #[test]
    fn test_overdraft_rejected() {
        let bank = TokenBank::new();
        bank.mint(ALICE, USDT, U256::from(10u64));

        let err = bank
            .transfer(ALICE, BOB, USDT, U256::from(11u64))
            .unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds { .. }));
        // Nothing moved.
        assert_eq!(bank.balance_of(ALICE, USDT), U256::from(10u64));
        assert_eq!(bank.balance_of(BOB, USDT), U256::zero());
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let bank = TokenBank::new();
        bank.mint(ALICE, USDT, U256::from(100u64));
        bank.set_fail_next("token paused");

        let err = bank
            .transfer(ALICE, BOB, USDT, U256::from(1u64))
            .unwrap_err();
        assert_eq!(err, BankError::Rejected("token paused".into()));

        // The failure is one-shot; a retry succeeds.
        bank.transfer(ALICE, BOB, USDT, U256::from(1u64)).unwrap();
    }
}
