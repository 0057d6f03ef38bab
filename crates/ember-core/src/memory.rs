//! In-memory collaborators for testing and simulation.
//!
//! [`MemoryToken`] keeps per-account balances and a single custody balance
//! for the vault. [`FixedAllocator`] authorizes exactly one account. Neither
//! is suitable for production use (no persistence, no real asset movement).

use std::collections::BTreeMap;

use crate::error::TransferError;
use crate::traits::{AllocatorAuthority, TokenTransfer};
use crate::types::AccountId;

/// In-memory token ledger for one asset.
#[derive(Clone, Debug, Default)]
pub struct MemoryToken {
    /// Asset symbol, for logs and reports.
    symbol: String,
    /// Balances held by accounts outside the vault.
    balances: BTreeMap<AccountId, u128>,
    /// Balance held by the vault.
    custody: u128,
}

impl MemoryToken {
    /// Create a token with no balances.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balances: BTreeMap::new(),
            custody: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Credit `amount` to `account` out of thin air.
    pub fn mint(&mut self, account: &AccountId, amount: u128) -> Result<(), TransferError> {
        let balance = self.balances.entry(*account).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("balance overflow".into()))?;
        Ok(())
    }

    /// Balance of an account outside the vault.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Balance held by the vault.
    pub fn custody(&self) -> u128 {
        self.custody
    }
}

impl TokenTransfer for MemoryToken {
    fn transfer_in(&mut self, from: &AccountId, amount: u128) -> Result<(), TransferError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(TransferError::InsufficientBalance { have, need: amount });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("custody overflow".into()))?;
        self.balances.insert(*from, have - amount);
        self.custody = custody;
        Ok(())
    }

    fn transfer_out(&mut self, to: &AccountId, amount: u128) -> Result<(), TransferError> {
        if self.custody < amount {
            return Err(TransferError::InsufficientBalance { have: self.custody, need: amount });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("balance overflow".into()))?;
        self.custody -= amount;
        self.balances.insert(*to, credited);
        Ok(())
    }
}

/// Authorizes a single allocator account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedAllocator(pub AccountId);

impl AllocatorAuthority for FixedAllocator {
    fn is_allocator(&self, account: &AccountId) -> bool {
        self.0 == *account
    }
}
