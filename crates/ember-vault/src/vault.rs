//! The vault façade.
//!
//! [`Vault`] owns the epoch ledger, the member store, aggregate totals and
//! the collaborators. Every mutating operation follows the same shape:
//! validate, settle the caller on a copy, compute the new state, call the
//! token collaborator, and commit only if all of that succeeded. A failed
//! operation leaves the vault exactly as it was.
//!
//! Allocation appends one ledger snapshot and never touches member records.
//! Stake deposited during the still-open epoch is tracked in
//! [`VaultTotals::pending_deposits`] and excluded from that epoch's divisor.
//!
//! Base reward is always backed by the allocations it was divided from.
//! Loyalty bonuses are backed only by the bonus budget
//! ([`VaultTotals::bonus_budget`]); a claim pays as much bonus as the budget
//! covers and carries the rest forward.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ember_core::error::VaultError;
use ember_core::ledger::EpochLedger;
use ember_core::math;
use ember_core::members::MemberStore;
use ember_core::traits::{AllocatorAuthority, MultiplierCalculator, TokenTransfer};
use ember_core::types::{AccountId, EpochSnapshot, Member, MultiplierParams};
use ember_multiplier::MultiplierEngine;

use crate::config::VaultConfig;
use crate::events::VaultEvent;
use crate::settlement::{settle, Settlement};
use crate::state::VaultState;

/// Aggregates maintained in O(1) per operation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct VaultTotals {
    /// Σ member balances.
    pub total_staked: u128,
    /// Stake deposited during the open epoch, not yet eligible for rewards.
    pub pending_deposits: u128,
    /// Σ allocated reward amounts.
    pub total_allocated: u128,
    /// Allocations made while no stake was eligible.
    pub undistributed: u128,
    /// Reward booked to members at the 1.0× factor.
    pub base_booked: u128,
    /// Reward booked to members by the loyalty multiplier.
    pub bonus_booked: u128,
    /// Σ rewards paid out by claims.
    pub total_claimed: u128,
    /// Σ reward asset pulled in by [`Vault::fund_reserve`].
    pub reserve_funded: u128,
    /// Part of `total_claimed` that paid loyalty bonuses.
    pub bonus_paid: u128,
}

impl VaultTotals {
    /// Stake that shares the next allocation.
    pub fn eligible_stake(&self) -> Result<u128, VaultError> {
        math::sub(self.total_staked, self.pending_deposits)
    }

    /// Allocated reward that has not been booked to any member yet.
    pub fn unbooked(&self) -> Result<u128, VaultError> {
        let distributable = math::sub(self.total_allocated, self.undistributed)?;
        math::sub(distributable, self.base_booked)
    }

    /// Reward custody not owed as base reward: undistributed allocations and
    /// reserve funding, less bonuses already paid.
    ///
    /// Base reward paid so far never exceeds distributed allocations, so
    /// paying bonuses out of this budget never touches another member's base.
    pub fn bonus_budget(&self) -> Result<u128, VaultError> {
        math::sub(math::add(self.undistributed, self.reserve_funded)?, self.bonus_paid)
    }

    fn book(&mut self, settlement: &Settlement) -> Result<(), VaultError> {
        self.base_booked = math::add(self.base_booked, settlement.base)?;
        self.bonus_booked = math::add(self.bonus_booked, settlement.bonus)?;
        Ok(())
    }

    /// Replace one member's frozen contribution to `pending_deposits`.
    fn refreeze(&mut self, before: u128, after: u128) -> Result<(), VaultError> {
        self.pending_deposits = math::add(math::sub(self.pending_deposits, before)?, after)?;
        Ok(())
    }
}

/// External collaborators bound at initialization.
#[derive(Debug)]
struct Collaborators<T, A> {
    reward_asset: T,
    stake_asset: T,
    allocator: A,
}

/// A time-weighted staking vault.
pub struct Vault<T: TokenTransfer, A: AllocatorAuthority> {
    ledger: EpochLedger,
    members: MemberStore,
    totals: VaultTotals,
    multiplier: Arc<dyn MultiplierCalculator>,
    collaborators: Option<Collaborators<T, A>>,
    events: Vec<VaultEvent>,
}

impl<T: TokenTransfer, A: AllocatorAuthority> Vault<T, A> {
    /// Create an uninitialized vault with the default multiplier.
    pub fn new() -> Self {
        Self::with_multiplier(Arc::new(MultiplierEngine::default()))
    }

    /// Create an uninitialized vault with multiplier parameters from `config`.
    pub fn with_config(config: &VaultConfig) -> Result<Self, VaultError> {
        let engine = MultiplierEngine::new(config.multiplier)?;
        Ok(Self::with_multiplier(Arc::new(engine)))
    }

    /// Create an uninitialized vault with a custom multiplier calculator.
    pub fn with_multiplier(multiplier: Arc<dyn MultiplierCalculator>) -> Self {
        Self {
            ledger: EpochLedger::new(),
            members: MemberStore::new(),
            totals: VaultTotals::default(),
            multiplier,
            collaborators: None,
            events: Vec::new(),
        }
    }

    /// Bind the reward asset, stake asset and allocator authority.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyInitialized`] on a second call
    pub fn initialize(&mut self, reward_asset: T, stake_asset: T, allocator: A) -> Result<(), VaultError> {
        if self.collaborators.is_some() {
            warn!("rejected repeated initialize");
            return Err(VaultError::AlreadyInitialized);
        }
        self.collaborators = Some(Collaborators { reward_asset, stake_asset, allocator });
        self.events.push(VaultEvent::Initialized);
        info!("vault initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.collaborators.is_some()
    }

    // ------------------------------------------------------------------
    // Mutating operations
    // ------------------------------------------------------------------

    /// Deposit `amount` of the stake asset for `account`.
    ///
    /// The deposit earns nothing in the epoch that is open now. Balance held
    /// before the deposit keeps earning.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotInitialized`] before `initialize`
    /// - [`VaultError::InvalidAmount`] if `amount` is zero
    /// - [`VaultError::TransferFailed`] if the stake asset rejects the pull
    pub fn stake(&mut self, account: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.require_initialized()?;
        if amount == 0 {
            warn!(account = %account, "rejected zero stake");
            return Err(VaultError::InvalidAmount);
        }
        let epoch = self.ledger.current_index();
        let before = self.members.get_or_default(account);
        let settlement = self.settle_member(account, &before)?;

        let mut member = settlement.member;
        member.open_window(epoch);
        member.balance = math::add(member.balance, amount)?;

        let mut totals = self.totals;
        totals.book(&settlement)?;
        totals.total_staked = math::add(totals.total_staked, amount)?;
        totals.refreeze(before.frozen_balance(epoch), member.frozen_balance(epoch))?;

        self.collaborators_mut()?.stake_asset.transfer_in(account, amount)?;

        self.members.insert(*account, member);
        self.totals = totals;
        self.events.push(VaultEvent::Staked { account: *account, amount, epoch });
        info!(account = %account, amount, epoch, balance = member.balance, "staked");
        Ok(())
    }

    /// Withdraw `amount` of staked balance to `account`.
    ///
    /// Loyalty points are kept. A withdrawal during the deposit epoch comes
    /// out of the frozen deposit first.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotInitialized`] before `initialize`
    /// - [`VaultError::InvalidAmount`] if `amount` is zero or above the balance
    /// - [`VaultError::TransferFailed`] if the stake asset rejects the payout
    pub fn withdraw(&mut self, account: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.require_initialized()?;
        let before = self.members.get_or_default(account);
        if amount == 0 || amount > before.balance {
            warn!(account = %account, amount, balance = before.balance, "rejected withdrawal");
            return Err(VaultError::InvalidAmount);
        }
        let epoch = self.ledger.current_index();
        let settlement = self.settle_member(account, &before)?;

        let mut member = settlement.member;
        member.balance -= amount;
        if member.deposit_window_open() {
            member.eligible_balance = member.eligible_balance.min(member.balance);
        }

        let mut totals = self.totals;
        totals.book(&settlement)?;
        totals.total_staked = math::sub(totals.total_staked, amount)?;
        totals.refreeze(before.frozen_balance(epoch), member.frozen_balance(epoch))?;

        self.collaborators_mut()?.stake_asset.transfer_out(account, amount)?;

        self.members.insert(*account, member);
        self.totals = totals;
        self.events.push(VaultEvent::Withdrawn { account: *account, amount, epoch });
        info!(account = %account, amount, epoch, balance = member.balance, "withdrew");
        Ok(())
    }

    /// Pay out settled reward to `account` and reset its loyalty.
    ///
    /// The base part is always paid in full. The bonus part is paid up to
    /// the vault's bonus budget; any shortfall stays pending and can be
    /// claimed once the reserve is funded. Returns the amount paid. Unknown
    /// accounts claim 0 and no record is created.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotInitialized`] before `initialize`
    /// - [`VaultError::TransferFailed`] if the reward asset rejects the payout
    pub fn claim_reward(&mut self, account: &AccountId) -> Result<u128, VaultError> {
        self.require_initialized()?;
        let Some(before) = self.members.get(account).copied() else {
            debug!(account = %account, "claim by unknown account");
            return Ok(0);
        };
        let epoch = self.ledger.current_index();
        let settlement = self.settle_member(account, &before)?;

        let mut totals = self.totals;
        totals.book(&settlement)?;

        let mut member = settlement.member;
        let (payout, bonus) = payable(&member, &totals)?;
        member.pending_bonus -= bonus;
        member.pending_reward = member.pending_bonus;
        member.multiplier_points = 0;
        member.loyalty_epochs = 0;
        member.open_window(epoch);

        totals.total_claimed = math::add(totals.total_claimed, payout)?;
        totals.bonus_paid = math::add(totals.bonus_paid, bonus)?;
        totals.refreeze(before.frozen_balance(epoch), member.frozen_balance(epoch))?;

        if payout > 0 {
            self.collaborators_mut()?.reward_asset.transfer_out(account, payout)?;
        }

        self.members.insert(*account, member);
        self.totals = totals;
        self.events.push(VaultEvent::RewardClaimed { account: *account, amount: payout, epoch });
        if member.pending_bonus > 0 {
            warn!(account = %account, unpaid_bonus = member.pending_bonus, "bonus budget short, bonus carried forward");
        }
        info!(account = %account, amount = payout, bonus, epoch, "claimed reward");
        Ok(payout)
    }

    /// Add `amount` of the reward asset from `from` to the bonus budget.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotInitialized`] before `initialize`
    /// - [`VaultError::InvalidAmount`] if `amount` is zero
    /// - [`VaultError::TransferFailed`] if the reward asset rejects the pull
    pub fn fund_reserve(&mut self, from: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.require_initialized()?;
        if amount == 0 {
            warn!(account = %from, "rejected zero reserve funding");
            return Err(VaultError::InvalidAmount);
        }
        let mut totals = self.totals;
        totals.reserve_funded = math::add(totals.reserve_funded, amount)?;

        self.collaborators_mut()?.reward_asset.transfer_in(from, amount)?;

        self.totals = totals;
        let epoch = self.ledger.current_index();
        self.events.push(VaultEvent::ReserveFunded { account: *from, amount, epoch });
        info!(account = %from, amount, epoch, bonus_budget = totals.bonus_budget()?, "funded reserve");
        Ok(())
    }

    /// Close the current epoch with a reward of `amount`, pulled from `caller`.
    ///
    /// Appends exactly one snapshot, dividing `amount` over the eligible
    /// stake. With no eligible stake the amount is recorded as undistributed.
    /// A zero amount still closes the epoch.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotInitialized`] before `initialize`
    /// - [`VaultError::Unauthorized`] if `caller` is not the allocator
    /// - [`VaultError::TransferFailed`] if the reward asset rejects the pull
    pub fn allocate_incentive(&mut self, caller: &AccountId, amount: u128) -> Result<EpochSnapshot, VaultError> {
        let collab = self.collaborators.as_ref().ok_or(VaultError::NotInitialized)?;
        if !collab.allocator.is_allocator(caller) {
            warn!(caller = %caller, "rejected allocation from non-allocator");
            return Err(VaultError::Unauthorized(*caller));
        }

        let eligible = self.totals.eligible_stake()?;
        let snapshot = self.ledger.prepare_epoch(amount, eligible)?;

        let mut totals = self.totals;
        totals.total_allocated = math::add(totals.total_allocated, amount)?;
        if eligible == 0 {
            totals.undistributed = math::add(totals.undistributed, amount)?;
        }
        totals.pending_deposits = 0;

        if amount > 0 {
            self.collaborators_mut()?.reward_asset.transfer_in(caller, amount)?;
        }

        self.ledger.commit_epoch(snapshot)?;
        self.totals = totals;
        self.events.push(VaultEvent::IncentiveAllocated {
            epoch: snapshot.index,
            amount,
            eligible_stake: eligible,
        });
        info!(
            epoch = snapshot.index,
            amount,
            eligible_stake = eligible,
            reward_per_share = snapshot.reward_per_share_cumulative,
            "allocated incentive"
        );
        Ok(snapshot)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Staked balance of `account`.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.members.get(account).map_or(0, |m| m.balance)
    }

    /// Reward settled to `account` so far, base plus loyalty bonus.
    ///
    /// Includes bonus the budget does not cover yet; see
    /// [`claimable`](Self::claimable).
    pub fn earned(&self, account: &AccountId) -> Result<u128, VaultError> {
        Ok(self.settled_view(account)?.pending_reward)
    }

    /// What [`claim_reward`](Self::claim_reward) would pay `account` now:
    /// all base reward plus the bonus the budget covers.
    pub fn claimable(&self, account: &AccountId) -> Result<u128, VaultError> {
        let Some(member) = self.members.get(account) else {
            return Ok(0);
        };
        let settlement = settle(&self.ledger, self.multiplier.as_ref(), member)?;
        let mut totals = self.totals;
        totals.book(&settlement)?;
        Ok(payable(&settlement.member, &totals)?.0)
    }

    /// Loyalty points of `account` caught up to the latest epoch.
    pub fn get_multiplier_points(&self, account: &AccountId) -> Result<u128, VaultError> {
        Ok(self.settled_view(account)?.multiplier_points)
    }

    /// Multiplier factor of `account` in basis points, caught up to the
    /// latest epoch. 10 000 is 1.0×.
    pub fn get_multiplier(&self, account: &AccountId) -> Result<u64, VaultError> {
        let member = self.settled_view(account)?;
        Ok(self.multiplier.factor_bps(self.multiplier.loyalty_level(&member)))
    }

    /// Snapshot of epoch `index` (1-based).
    pub fn history(&self, index: u64) -> Result<EpochSnapshot, VaultError> {
        self.ledger.get_epoch(index)
    }

    /// Raw member record as last committed.
    pub fn members(&self, account: &AccountId) -> Option<Member> {
        self.members.get(account).copied()
    }

    /// Number of allocations so far.
    pub fn current_epoch(&self) -> u64 {
        self.ledger.current_index()
    }

    pub fn totals(&self) -> VaultTotals {
        self.totals
    }

    pub fn ledger(&self) -> &EpochLedger {
        &self.ledger
    }

    pub fn member_store(&self) -> &MemberStore {
        &self.members
    }

    pub fn multiplier_params(&self) -> MultiplierParams {
        self.multiplier.params()
    }

    /// Take all events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Collaborator access
    // ------------------------------------------------------------------

    pub fn reward_asset(&self) -> Option<&T> {
        self.collaborators.as_ref().map(|c| &c.reward_asset)
    }

    pub fn stake_asset(&self) -> Option<&T> {
        self.collaborators.as_ref().map(|c| &c.stake_asset)
    }

    /// Mutable reward asset, for hosts that fund or inspect custody directly.
    pub fn reward_asset_mut(&mut self) -> Option<&mut T> {
        self.collaborators.as_mut().map(|c| &mut c.reward_asset)
    }

    pub fn stake_asset_mut(&mut self) -> Option<&mut T> {
        self.collaborators.as_mut().map(|c| &mut c.stake_asset)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Capture ledger, members and totals.
    pub fn export_state(&self) -> VaultState {
        VaultState {
            ledger: self.ledger.clone(),
            members: self.members.clone(),
            totals: self.totals,
            multiplier: self.multiplier.params(),
        }
    }

    /// Replace ledger, members and totals with a previously exported state.
    ///
    /// Collaborators and buffered events are left untouched.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Snapshot`] if the state is internally inconsistent or
    ///   was taken with different multiplier parameters
    pub fn restore_state(&mut self, state: VaultState) -> Result<(), VaultError> {
        state.verify()?;
        if state.multiplier != self.multiplier.params() {
            return Err(VaultError::Snapshot(format!(
                "multiplier parameters differ: snapshot {:?}, vault {:?}",
                state.multiplier,
                self.multiplier.params()
            )));
        }
        info!(
            epoch = state.ledger.current_index(),
            members = state.members.len(),
            "restored vault state"
        );
        self.ledger = state.ledger;
        self.members = state.members;
        self.totals = state.totals;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_initialized(&self) -> Result<(), VaultError> {
        if self.collaborators.is_none() {
            return Err(VaultError::NotInitialized);
        }
        Ok(())
    }

    fn collaborators_mut(&mut self) -> Result<&mut Collaborators<T, A>, VaultError> {
        self.collaborators.as_mut().ok_or(VaultError::NotInitialized)
    }

    fn settle_member(&self, account: &AccountId, member: &Member) -> Result<Settlement, VaultError> {
        let settlement = settle(&self.ledger, self.multiplier.as_ref(), member)?;
        if !settlement.is_noop(member) {
            debug!(
                account = %account,
                from = member.checkpoint_index,
                to = settlement.member.checkpoint_index,
                base = settlement.base,
                bonus = settlement.bonus,
                points = settlement.member.multiplier_points,
                "settled"
            );
        }
        Ok(settlement)
    }

    fn settled_view(&self, account: &AccountId) -> Result<Member, VaultError> {
        match self.members.get(account) {
            Some(member) => Ok(settle(&self.ledger, self.multiplier.as_ref(), member)?.member),
            None => Ok(Member::default()),
        }
    }
}

/// Payout and bonus part of a claim by a settled `member`.
fn payable(member: &Member, totals: &VaultTotals) -> Result<(u128, u128), VaultError> {
    let base = math::sub(member.pending_reward, member.pending_bonus)?;
    let bonus = member.pending_bonus.min(totals.bonus_budget()?);
    Ok((math::add(base, bonus)?, bonus))
}

impl<T: TokenTransfer, A: AllocatorAuthority> Default for Vault<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::constants::{MULTIPLIER_BASE_BPS, UNIT};
    use ember_core::error::TransferError;
    use ember_core::memory::{FixedAllocator, MemoryToken};

    type TestVault = Vault<MemoryToken, FixedAllocator>;

    fn alice() -> AccountId {
        AccountId::from_label("alice")
    }

    fn bob() -> AccountId {
        AccountId::from_label("bob")
    }

    fn allocator() -> AccountId {
        AccountId::from_label("allocator")
    }

    /// Initialized vault; alice and bob hold 1000 stake, the allocator 1000 reward.
    fn vault() -> TestVault {
        let mut stake = MemoryToken::new("STK");
        stake.mint(&alice(), 1_000 * UNIT).unwrap();
        stake.mint(&bob(), 1_000 * UNIT).unwrap();
        let mut reward = MemoryToken::new("RWD");
        reward.mint(&allocator(), 1_000 * UNIT).unwrap();

        let mut v = TestVault::new();
        v.initialize(reward, stake, FixedAllocator(allocator())).unwrap();
        v
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    #[test]
    fn operations_require_initialize() {
        let mut v = TestVault::new();
        assert_eq!(v.stake(&alice(), UNIT), Err(VaultError::NotInitialized));
        assert_eq!(v.withdraw(&alice(), UNIT), Err(VaultError::NotInitialized));
        assert_eq!(v.claim_reward(&alice()), Err(VaultError::NotInitialized));
        assert_eq!(v.allocate_incentive(&allocator(), UNIT), Err(VaultError::NotInitialized));
        assert!(!v.is_initialized());
    }

    #[test]
    fn initialize_twice_fails() {
        let mut v = vault();
        let err = v.initialize(
            MemoryToken::new("RWD"),
            MemoryToken::new("STK"),
            FixedAllocator(allocator()),
        );
        assert_eq!(err, Err(VaultError::AlreadyInitialized));
        assert_eq!(v.drain_events(), vec![VaultEvent::Initialized]);
    }

    #[test]
    fn with_config_rejects_bad_params() {
        let cfg = VaultConfig {
            multiplier: MultiplierParams { base_bps: 0, ..MultiplierParams::default() },
            ..VaultConfig::default()
        };
        assert!(matches!(TestVault::with_config(&cfg), Err(VaultError::InvalidConfig(_))));
    }

    // ------------------------------------------------------------------
    // Stake
    // ------------------------------------------------------------------

    #[test]
    fn stake_moves_funds_and_freezes_deposit() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        assert_eq!(v.balance_of(&alice()), 10 * UNIT);
        assert_eq!(v.stake_asset().unwrap().custody(), 10 * UNIT);
        assert_eq!(v.totals().total_staked, 10 * UNIT);
        assert_eq!(v.totals().pending_deposits, 10 * UNIT);
        assert_eq!(v.totals().eligible_stake().unwrap(), 0);
    }

    #[test]
    fn zero_stake_rejected() {
        let mut v = vault();
        assert_eq!(v.stake(&alice(), 0), Err(VaultError::InvalidAmount));
        assert!(v.members(&alice()).is_none());
    }

    #[test]
    fn failed_stake_transfer_leaves_state() {
        let mut v = vault();
        let err = v.stake(&alice(), 2_000 * UNIT).unwrap_err();
        assert_eq!(
            err,
            VaultError::TransferFailed(TransferError::InsufficientBalance {
                have: 1_000 * UNIT,
                need: 2_000 * UNIT
            })
        );
        assert!(v.members(&alice()).is_none());
        assert_eq!(v.totals(), VaultTotals::default());
    }

    #[test]
    fn repeated_stake_in_one_epoch_stays_frozen() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), 0).unwrap();
        v.stake(&alice(), 5 * UNIT).unwrap();
        v.stake(&alice(), 5 * UNIT).unwrap();
        let m = v.members(&alice()).unwrap();
        assert_eq!(m.eligible_balance, 10 * UNIT);
        assert_eq!(v.totals().pending_deposits, 10 * UNIT);
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    #[test]
    fn allocation_by_non_allocator_rejected() {
        let mut v = vault();
        assert_eq!(v.allocate_incentive(&alice(), UNIT), Err(VaultError::Unauthorized(alice())));
        assert_eq!(v.current_epoch(), 0);
    }

    #[test]
    fn allocation_with_no_eligible_stake_is_undistributed() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        let snap = v.allocate_incentive(&allocator(), 5 * UNIT).unwrap();
        assert_eq!(snap.reward_per_share_cumulative, 0);
        assert_eq!(snap.total_staked_at_epoch, 0);
        assert_eq!(v.totals().undistributed, 5 * UNIT);
        assert_eq!(v.totals().pending_deposits, 0);
        assert_eq!(v.earned(&alice()).unwrap(), 0);
    }

    #[test]
    fn single_staker_captures_whole_allocation() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), 0).unwrap();
        v.allocate_incentive(&allocator(), 7 * UNIT).unwrap();
        assert_eq!(v.earned(&alice()).unwrap(), 7 * UNIT);
        assert_eq!(v.reward_asset().unwrap().custody(), 7 * UNIT);
    }

    #[test]
    fn zero_allocation_closes_epoch() {
        let mut v = vault();
        v.allocate_incentive(&allocator(), 0).unwrap();
        assert_eq!(v.current_epoch(), 1);
        assert_eq!(v.history(1).unwrap().reward_received, 0);
    }

    #[test]
    fn failed_allocation_transfer_appends_nothing() {
        let mut v = vault();
        let err = v.allocate_incentive(&allocator(), 5_000 * UNIT).unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed(_)));
        assert_eq!(v.current_epoch(), 0);
        assert_eq!(v.totals().total_allocated, 0);
    }

    // ------------------------------------------------------------------
    // Withdraw
    // ------------------------------------------------------------------

    #[test]
    fn withdraw_bounds() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        assert_eq!(v.withdraw(&alice(), 0), Err(VaultError::InvalidAmount));
        assert_eq!(v.withdraw(&alice(), 11 * UNIT), Err(VaultError::InvalidAmount));
        assert_eq!(v.withdraw(&bob(), UNIT), Err(VaultError::InvalidAmount));
    }

    #[test]
    fn withdraw_from_frozen_deposit_first() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), 0).unwrap();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.withdraw(&alice(), 15 * UNIT).unwrap();
        let m = v.members(&alice()).unwrap();
        assert_eq!(m.balance, 5 * UNIT);
        assert_eq!(m.eligible_balance, 5 * UNIT);
        assert_eq!(v.totals().pending_deposits, 0);
        assert_eq!(v.totals().eligible_stake().unwrap(), 5 * UNIT);
        assert_eq!(v.stake_asset().unwrap().balance_of(&alice()), 995 * UNIT);
    }

    #[test]
    fn withdraw_keeps_points() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        for _ in 0..4 {
            v.allocate_incentive(&allocator(), UNIT).unwrap();
        }
        v.withdraw(&alice(), 5 * UNIT).unwrap();
        assert_eq!(v.get_multiplier_points(&alice()).unwrap(), 30 * UNIT);
    }

    // ------------------------------------------------------------------
    // Claim
    // ------------------------------------------------------------------

    #[test]
    fn claim_by_unknown_account() {
        let mut v = vault();
        assert_eq!(v.claim_reward(&bob()), Ok(0));
        assert!(v.members(&bob()).is_none());
    }

    #[test]
    fn claim_pays_and_resets() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), 0).unwrap();
        for _ in 0..2 {
            v.allocate_incentive(&allocator(), 10 * UNIT).unwrap();
        }
        // Epochs 2, 3 at 1.0 and 1.0125.
        let earned = v.earned(&alice()).unwrap();
        assert_eq!(earned, 20 * UNIT + UNIT / 8);

        // The bonus comes from reserve.
        v.fund_reserve(&allocator(), UNIT).unwrap();
        assert_eq!(v.claimable(&alice()).unwrap(), earned);
        assert_eq!(v.claim_reward(&alice()).unwrap(), earned);
        assert_eq!(v.reward_asset().unwrap().balance_of(&alice()), earned);
        assert_eq!(v.earned(&alice()).unwrap(), 0);
        assert_eq!(v.get_multiplier(&alice()).unwrap(), MULTIPLIER_BASE_BPS);
        assert_eq!(v.get_multiplier_points(&alice()).unwrap(), 0);
        assert_eq!(v.totals().total_claimed, earned);
        assert_eq!(v.totals().bonus_booked, UNIT / 8);
        assert_eq!(v.totals().bonus_paid, UNIT / 8);
    }

    #[test]
    fn claim_without_reserve_pays_base_and_carries_bonus() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), 0).unwrap();
        for _ in 0..2 {
            v.allocate_incentive(&allocator(), 10 * UNIT).unwrap();
        }
        assert_eq!(v.earned(&alice()).unwrap(), 20 * UNIT + UNIT / 8);
        assert_eq!(v.claimable(&alice()).unwrap(), 20 * UNIT);

        assert_eq!(v.claim_reward(&alice()).unwrap(), 20 * UNIT);
        let m = v.members(&alice()).unwrap();
        assert_eq!(m.pending_reward, UNIT / 8);
        assert_eq!(m.pending_bonus, UNIT / 8);
        assert_eq!(m.multiplier_points, 0);
        assert_eq!(v.reward_asset().unwrap().custody(), 0);

        v.fund_reserve(&allocator(), UNIT).unwrap();
        assert_eq!(v.claim_reward(&alice()).unwrap(), UNIT / 8);
        assert_eq!(v.earned(&alice()).unwrap(), 0);
        assert_eq!(v.totals().total_claimed, 20 * UNIT + UNIT / 8);
        assert_eq!(v.totals().bonus_budget().unwrap(), UNIT - UNIT / 8);
    }

    #[test]
    fn undistributed_allocation_backs_bonus() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        // Epoch 1 has no eligible stake; its 10 stay in custody.
        for _ in 0..3 {
            v.allocate_incentive(&allocator(), 10 * UNIT).unwrap();
        }
        assert_eq!(v.totals().bonus_budget().unwrap(), 10 * UNIT);
        assert_eq!(v.claim_reward(&alice()).unwrap(), 20 * UNIT + UNIT / 8);
    }

    #[test]
    fn fund_reserve_bounds() {
        let mut v = vault();
        assert_eq!(v.fund_reserve(&allocator(), 0), Err(VaultError::InvalidAmount));
        let err = v.fund_reserve(&alice(), UNIT).unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed(_)));
        assert_eq!(v.totals(), VaultTotals::default());

        v.drain_events();
        v.fund_reserve(&allocator(), 3 * UNIT).unwrap();
        assert_eq!(v.totals().reserve_funded, 3 * UNIT);
        assert_eq!(v.reward_asset().unwrap().custody(), 3 * UNIT);
        assert_eq!(
            v.drain_events(),
            vec![VaultEvent::ReserveFunded { account: allocator(), amount: 3 * UNIT, epoch: 0 }]
        );
    }

    #[test]
    fn dust_stake_does_not_break_the_vault() {
        let mut v = vault();
        v.stake(&alice(), 1).unwrap();
        v.allocate_incentive(&allocator(), 0).unwrap();
        // One unit is the whole eligible stake: delta = 10^36.
        v.allocate_incentive(&allocator(), UNIT).unwrap();
        assert_eq!(v.earned(&alice()).unwrap(), UNIT);

        v.stake(&bob(), 10 * UNIT).unwrap();
        for _ in 0..3 {
            v.allocate_incentive(&allocator(), UNIT).unwrap();
        }
        assert!(v.get_multiplier(&alice()).unwrap() > MULTIPLIER_BASE_BPS);
        assert!(v.get_multiplier_points(&bob()).unwrap() > 0);
        assert_eq!(v.claimable(&alice()).unwrap(), 2 * UNIT);
        assert_eq!(v.claim_reward(&alice()).unwrap(), 2 * UNIT);
        assert!(v.members(&alice()).unwrap().pending_bonus > 0);
        v.withdraw(&alice(), 1).unwrap();
        assert!(v.claim_reward(&bob()).unwrap() > UNIT);
        v.withdraw(&bob(), 10 * UNIT).unwrap();
        assert_eq!(v.totals().total_staked, 0);
    }

    // ------------------------------------------------------------------
    // Views and events
    // ------------------------------------------------------------------

    #[test]
    fn views_do_not_mutate() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), UNIT).unwrap();
        v.allocate_incentive(&allocator(), UNIT).unwrap();
        let before = v.members(&alice()).unwrap();
        let first = v.earned(&alice()).unwrap();
        assert_eq!(v.earned(&alice()).unwrap(), first);
        assert_eq!(v.members(&alice()).unwrap(), before);
    }

    #[test]
    fn history_out_of_range() {
        let v = vault();
        assert_eq!(v.history(1), Err(VaultError::EpochOutOfRange { index: 1, len: 0 }));
    }

    #[test]
    fn events_are_drained_in_order() {
        let mut v = vault();
        v.drain_events();
        v.stake(&alice(), UNIT).unwrap();
        v.allocate_incentive(&allocator(), UNIT).unwrap();
        let events = v.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], VaultEvent::Staked { epoch: 0, .. }));
        assert!(matches!(events[1], VaultEvent::IncentiveAllocated { epoch: 1, .. }));
        assert!(v.drain_events().is_empty());
    }

    #[test]
    fn failed_operation_emits_nothing() {
        let mut v = vault();
        v.drain_events();
        let _ = v.stake(&alice(), 0);
        let _ = v.allocate_incentive(&bob(), UNIT);
        assert!(v.drain_events().is_empty());
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    #[test]
    fn export_then_restore() {
        let mut v = vault();
        v.stake(&alice(), 10 * UNIT).unwrap();
        v.allocate_incentive(&allocator(), UNIT).unwrap();
        let state = v.export_state();

        let mut fresh = vault();
        fresh.restore_state(state).unwrap();
        assert_eq!(fresh.balance_of(&alice()), 10 * UNIT);
        assert_eq!(fresh.current_epoch(), 1);
        assert_eq!(fresh.totals(), v.totals());
    }

    #[test]
    fn restore_rejects_other_params() {
        let v = vault();
        let mut state = v.export_state();
        state.multiplier.rate_per_epoch_bps = 1;
        let mut fresh = vault();
        assert!(matches!(fresh.restore_state(state), Err(VaultError::Snapshot(_))));
    }
}
