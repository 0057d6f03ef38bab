//! Trait interfaces for the Ember vault.
//!
//! These traits define the seams between the accounting core and its
//! collaborators:
//! - [`TokenTransfer`] — moves the stake and reward assets (external)
//! - [`AllocatorAuthority`] — decides who may allocate rewards (external)
//! - [`MultiplierCalculator`] — loyalty multiplier math (ember-multiplier implements)

use crate::error::{TransferError, VaultError};
use crate::ledger::EpochLedger;
use crate::math::{self, U256};
use crate::types::{AccountId, Member, MultiplierParams};

/// Token-transfer subsystem for one asset.
///
/// The vault holds assets in custody: `transfer_in` moves funds from an
/// account into custody, `transfer_out` moves funds from custody to an
/// account. Failures are propagated unchanged as
/// [`VaultError::TransferFailed`].
pub trait TokenTransfer: Send + Sync {
    /// Pull `amount` from `from` into vault custody.
    fn transfer_in(&mut self, from: &AccountId, amount: u128) -> Result<(), TransferError>;

    /// Pay `amount` from vault custody to `to`.
    fn transfer_out(&mut self, to: &AccountId, amount: u128) -> Result<(), TransferError>;
}

/// Authorization check for reward allocation.
pub trait AllocatorAuthority: Send + Sync {
    /// Whether `account` may call `allocate_incentive`.
    fn is_allocator(&self, account: &AccountId) -> bool;
}

/// Loyalty multiplier math.
///
/// A member's loyalty *level* counts accruing epochs in the current window,
/// weighted by balance. The factor for a level is
/// `min(base + rate × level, cap)` in basis points.
pub trait MultiplierCalculator: Send + Sync {
    /// Parameters in effect.
    fn params(&self) -> MultiplierParams;

    /// Multiplier factor in basis points for a loyalty level.
    fn factor_bps(&self, level: u64) -> u64;

    /// Σ `delta_e × factor_e` over the epochs `(from, to]`, where the first
    /// epoch is paid at `start_level` and each later epoch one level higher.
    ///
    /// The result is reward-per-share scaled by basis points, which for a
    /// dust-sized stake no longer fits in `u128`.
    fn weighted_span(
        &self,
        ledger: &EpochLedger,
        from: u64,
        to: u64,
        start_level: u64,
    ) -> Result<U256, VaultError>;

    /// Loyalty level of a member: `min(points / balance, loyalty_epochs)`.
    ///
    /// For an unchanged balance both terms equal the accruing epochs in the
    /// window. A top-up dilutes the first; the second bounds it after a
    /// withdrawal. Zero balance has level 0.
    fn loyalty_level(&self, member: &Member) -> u64 {
        if member.balance == 0 {
            return 0;
        }
        let weighted = member.multiplier_points / member.balance;
        weighted.min(member.loyalty_epochs as u128) as u64
    }

    /// Advance accrual by `epochs` accruing epochs at the member's balance.
    fn accrue(&self, member: &mut Member, epochs: u64) -> Result<(), VaultError> {
        if epochs == 0 || member.balance == 0 {
            return Ok(());
        }
        let gained = math::mul(member.balance, epochs as u128)?;
        member.multiplier_points = math::add(member.multiplier_points, gained)?;
        member.loyalty_epochs = member
            .loyalty_epochs
            .checked_add(epochs)
            .ok_or(VaultError::ArithmeticOverflow)?;
        Ok(())
    }
}
