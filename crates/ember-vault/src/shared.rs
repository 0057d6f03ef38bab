//! Shared access to a vault from several threads.
//!
//! [`SharedVault`] puts the whole vault behind one `parking_lot::Mutex`.
//! Each call holds the lock for the full operation, so operations are
//! serialised and every caller observes either all or none of another
//! caller's operation.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use ember_core::error::VaultError;
use ember_core::traits::{AllocatorAuthority, TokenTransfer};
use ember_core::types::{AccountId, EpochSnapshot};

use crate::vault::{Vault, VaultTotals};

pub struct SharedVault<T: TokenTransfer, A: AllocatorAuthority> {
    inner: Arc<Mutex<Vault<T, A>>>,
}

impl<T: TokenTransfer, A: AllocatorAuthority> Clone for SharedVault<T, A> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: TokenTransfer, A: AllocatorAuthority> SharedVault<T, A> {
    pub fn new(vault: Vault<T, A>) -> Self {
        Self { inner: Arc::new(Mutex::new(vault)) }
    }

    /// Lock the vault for a sequence of calls that must not interleave.
    pub fn lock(&self) -> MutexGuard<'_, Vault<T, A>> {
        self.inner.lock()
    }

    pub fn stake(&self, account: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.inner.lock().stake(account, amount)
    }

    pub fn withdraw(&self, account: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.inner.lock().withdraw(account, amount)
    }

    pub fn claim_reward(&self, account: &AccountId) -> Result<u128, VaultError> {
        self.inner.lock().claim_reward(account)
    }

    pub fn fund_reserve(&self, from: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.inner.lock().fund_reserve(from, amount)
    }

    pub fn allocate_incentive(&self, caller: &AccountId, amount: u128) -> Result<EpochSnapshot, VaultError> {
        self.inner.lock().allocate_incentive(caller, amount)
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.inner.lock().balance_of(account)
    }

    pub fn earned(&self, account: &AccountId) -> Result<u128, VaultError> {
        self.inner.lock().earned(account)
    }

    pub fn claimable(&self, account: &AccountId) -> Result<u128, VaultError> {
        self.inner.lock().claimable(account)
    }

    pub fn current_epoch(&self) -> u64 {
        self.inner.lock().current_epoch()
    }

    pub fn totals(&self) -> VaultTotals {
        self.inner.lock().totals()
    }
}
