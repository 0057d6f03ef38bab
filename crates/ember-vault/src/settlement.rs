//! Reward settlement: lazily reconcile a member against the epoch ledger.
//!
//! Settlement is a pure function of the ledger, the multiplier calculator
//! and one member record. It never mutates anything; the vault commits the
//! returned record once every other step of an operation has succeeded.
//!
//! The span `(checkpoint_index, current_index]` is paid in two segments:
//!
//! 1. the deposit epoch `stake_epoch_index + 1`, if the member's deposit
//!    window is still open. Only `eligible_balance` earns here, at the
//!    factor of the member's current loyalty level, and no loyalty accrues.
//! 2. every later epoch, paid on the full balance at a factor that grows by
//!    one loyalty level per epoch.
//!
//! Both segments are closed forms over the ledger's prefix sums, so
//! settlement cost does not depend on how many epochs elapsed. The
//! factor-weighted sums are 256-bit; only the final payout must fit in
//! `u128`.

use ember_core::constants::REWARD_PRECISION;
use ember_core::error::VaultError;
use ember_core::ledger::EpochLedger;
use ember_core::math::{self, mul_div, mul_div_wide, U256};
use ember_core::traits::MultiplierCalculator;
use ember_core::types::Member;

/// Result of settling one member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// The member record reconciled up to the current epoch.
    pub member: Member,
    /// Reward booked at the 1.0× factor.
    pub base: u128,
    /// Reward booked on top of `base` by the loyalty multiplier.
    pub bonus: u128,
}

impl Settlement {
    /// Total reward added to `pending_reward`.
    pub fn booked(&self) -> u128 {
        self.base + self.bonus
    }

    /// Whether anything changed.
    pub fn is_noop(&self, before: &Member) -> bool {
        self.member == *before
    }
}

/// Reconcile `member` against every epoch appended since its checkpoint.
///
/// Idempotent: settling an already settled member returns it unchanged with
/// zero reward.
///
/// # Errors
///
/// - [`VaultError::ArithmeticOverflow`] if any intermediate does not fit
/// - [`VaultError::EpochOutOfRange`] if the member is ahead of the ledger
pub fn settle(
    ledger: &EpochLedger,
    calc: &dyn MultiplierCalculator,
    member: &Member,
) -> Result<Settlement, VaultError> {
    let current = ledger.current_index();
    if current <= member.checkpoint_index {
        return Ok(Settlement { member: *member, base: 0, bonus: 0 });
    }

    // Nothing staked: only the checkpoint moves.
    if member.balance == 0 && member.eligible_balance == 0 {
        let mut settled = *member;
        settled.reward_per_share_checkpoint = ledger.cumulative_at(current)?.reward_per_share;
        settled.checkpoint_index = current;
        return Ok(Settlement { member: settled, base: 0, bonus: 0 });
    }

    let base_bps = calc.params().base_bps as u128;
    let scale = math::mul(REWARD_PRECISION, base_bps)?;
    let level = calc.loyalty_level(member);

    let mut base = 0u128;
    let mut scaled = 0u128;
    let mut regular_from = member.checkpoint_index;

    if member.deposit_window_open() {
        let deposit = ledger.span(regular_from, regular_from + 1)?;
        let factor = calc.factor_bps(level) as u128;
        base = mul_div(member.eligible_balance, deposit.delta, REWARD_PRECISION)?;
        scaled = mul_div_wide(member.eligible_balance, U256::product(deposit.delta, factor), scale)?;
        regular_from += 1;
    }

    if regular_from < current {
        let span = ledger.span(regular_from, current)?;
        let weighted = calc.weighted_span(ledger, regular_from, current, level)?;
        base = math::add(base, mul_div(member.balance, span.delta, REWARD_PRECISION)?)?;
        scaled = math::add(scaled, mul_div_wide(member.balance, weighted, scale)?)?;
    }

    let mut settled = *member;
    let bonus = math::sub(scaled, base)?;
    settled.pending_reward = math::add(settled.pending_reward, scaled)?;
    settled.pending_bonus = math::add(settled.pending_bonus, bonus)?;
    settled.reward_per_share_checkpoint = ledger.cumulative_at(current)?.reward_per_share;
    settled.checkpoint_index = current;
    calc.accrue(&mut settled, current - regular_from)?;

    Ok(Settlement { member: settled, base, bonus })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::constants::UNIT;
    use ember_multiplier::MultiplierEngine;
    use proptest::prelude::*;

    fn engine() -> MultiplierEngine {
        MultiplierEngine::default()
    }

    /// A ledger where every epoch pays `reward` over `staked`.
    fn flat_ledger(epochs: u64, reward: u128, staked: u128) -> EpochLedger {
        let mut ledger = EpochLedger::new();
        for _ in 0..epochs {
            ledger.append_epoch(reward, staked).unwrap();
        }
        ledger
    }

    /// A member that staked `balance` at `index` with nothing before.
    fn staked_at(index: u64, balance: u128) -> Member {
        Member {
            balance,
            checkpoint_index: index,
            stake_epoch_index: index,
            eligible_balance: 0,
            ..Member::default()
        }
    }

    // ------------------------------------------------------------------
    // Basics
    // ------------------------------------------------------------------

    #[test]
    fn nothing_to_settle() {
        let ledger = flat_ledger(2, UNIT, UNIT);
        let m = Member { checkpoint_index: 2, ..staked_at(2, UNIT) };
        let s = settle(&ledger, &engine(), &m).unwrap();
        assert!(s.is_noop(&m));
        assert_eq!(s.booked(), 0);
    }

    #[test]
    fn deposit_epoch_pays_nothing_on_new_stake() {
        let ledger = flat_ledger(1, 10 * UNIT, 10 * UNIT);
        let s = settle(&ledger, &engine(), &staked_at(0, 10 * UNIT)).unwrap();
        assert_eq!(s.booked(), 0);
        assert_eq!(s.member.checkpoint_index, 1);
        assert_eq!(s.member.multiplier_points, 0);
        assert!(!s.member.deposit_window_open());
    }

    #[test]
    fn first_regular_epoch_pays_at_base() {
        let ledger = flat_ledger(2, 10 * UNIT, 10 * UNIT);
        let s = settle(&ledger, &engine(), &staked_at(0, 10 * UNIT)).unwrap();
        assert_eq!(s.base, 10 * UNIT);
        assert_eq!(s.bonus, 0);
        assert_eq!(s.member.pending_reward, 10 * UNIT);
        assert_eq!(s.member.multiplier_points, 10 * UNIT);
        assert_eq!(s.member.loyalty_epochs, 1);
        assert_eq!(s.member.reward_per_share_checkpoint, 2 * REWARD_PRECISION);
    }

    #[test]
    fn loyalty_grows_the_payout() {
        let ledger = flat_ledger(4, 10 * UNIT, 10 * UNIT);
        let s = settle(&ledger, &engine(), &staked_at(0, 10 * UNIT)).unwrap();
        // Epochs 2, 3, 4 at 1.0, 1.0125, 1.025.
        assert_eq!(s.base, 30 * UNIT);
        assert_eq!(s.bonus, UNIT / 8 + UNIT / 4);
        assert_eq!(s.member.pending_bonus, s.bonus);
        assert_eq!(s.member.multiplier_points, 30 * UNIT);
    }

    #[test]
    fn top_up_freezes_accrual_for_one_epoch() {
        let ledger = flat_ledger(4, 10 * UNIT, 10 * UNIT);
        let m = settle(&ledger, &engine(), &staked_at(0, 10 * UNIT)).unwrap().member;
        assert_eq!(m.multiplier_points, 30 * UNIT);

        // Top up to 20 at index 4.
        let mut topped = m;
        topped.open_window(4);
        topped.balance += 10 * UNIT;

        let mut ledger = ledger;
        ledger.append_epoch(10 * UNIT, 10 * UNIT).unwrap();
        let s = settle(&ledger, &engine(), &topped).unwrap();
        assert_eq!(s.member.multiplier_points, 30 * UNIT);
        // Only the pre-deposit 10 earned the deposit epoch.
        assert_eq!(s.base, 10 * UNIT);

        ledger.append_epoch(20 * UNIT, 20 * UNIT).unwrap();
        ledger.append_epoch(20 * UNIT, 20 * UNIT).unwrap();
        let s = settle(&ledger, &engine(), &s.member).unwrap();
        assert_eq!(s.member.multiplier_points, 70 * UNIT);
    }

    #[test]
    fn withdrawal_keeps_level_bounded_by_epochs() {
        let ledger = flat_ledger(4, 10 * UNIT, 10 * UNIT);
        let mut m = settle(&ledger, &engine(), &staked_at(0, 10 * UNIT)).unwrap().member;
        m.balance = UNIT;
        assert_eq!(engine().loyalty_level(&m), 3);
    }

    #[test]
    fn settled_member_idempotent() {
        let ledger = flat_ledger(5, 3 * UNIT, 7 * UNIT);
        let once = settle(&ledger, &engine(), &staked_at(0, 7 * UNIT)).unwrap();
        let twice = settle(&ledger, &engine(), &once.member).unwrap();
        assert_eq!(twice.member, once.member);
        assert_eq!(twice.booked(), 0);
    }

    #[test]
    fn zero_balance_member_books_nothing() {
        let ledger = flat_ledger(3, UNIT, UNIT);
        let m = Member { stake_epoch_index: 0, checkpoint_index: 1, ..Member::default() };
        let s = settle(&ledger, &engine(), &m).unwrap();
        assert_eq!(s.booked(), 0);
        assert_eq!(s.member.checkpoint_index, 3);
        assert_eq!(s.member.loyalty_epochs, 0);
    }

    #[test]
    fn fresh_member_only_moves_checkpoint() {
        // Deltas of 10^38: a one-unit stake received 100 tokens per epoch.
        let ledger = flat_ledger(3, 100 * UNIT, 1);
        let s = settle(&ledger, &engine(), &Member::default()).unwrap();
        assert_eq!(s.booked(), 0);
        assert_eq!(s.member.checkpoint_index, 3);
        assert_eq!(s.member.reward_per_share_checkpoint, 3 * 10u128.pow(38));
        assert_eq!(s.member.multiplier_points, 0);
    }

    #[test]
    fn dust_stake_settles_large_deltas() {
        // One unit staked, a token per epoch: every delta is 10^36.
        let ledger = flat_ledger(120, UNIT, 1);
        let s = settle(&ledger, &engine(), &staked_at(0, 1)).unwrap();
        // Epoch 1 is the deposit epoch; 119 regular epochs follow.
        assert_eq!(s.base, 119 * UNIT);
        // Levels 0..=99 below the cap, then 19 epochs at the cap.
        let ramp: u128 = (0..100u128).map(|k| 10_000 + 125 * k).sum();
        assert_eq!(s.booked(), (ramp + 19 * 22_500) * UNIT / 10_000);
        assert_eq!(s.member.multiplier_points, 119);
        assert_eq!(s.member.loyalty_epochs, 119);
    }

    #[test]
    fn member_ahead_of_ledger_is_noop() {
        let ledger = flat_ledger(1, UNIT, UNIT);
        let m = Member { checkpoint_index: 5, stake_epoch_index: 5, ..Member::default() };
        assert!(settle(&ledger, &engine(), &m).unwrap().is_noop(&m));
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    proptest! {
        #[test]
        fn settling_often_or_once_agrees(
            rewards in prop::collection::vec(0u128..=1_000 * UNIT, 1..40),
            balance in 1u128..=1_000 * UNIT,
        ) {
            let mut ledger = EpochLedger::new();
            let mut stepwise = staked_at(0, balance);
            let mut settlements = 0u128;
            for r in &rewards {
                ledger.append_epoch(*r, 1_000 * UNIT).unwrap();
                stepwise = settle(&ledger, &engine(), &stepwise).unwrap().member;
                settlements += 1;
            }
            let once = settle(&ledger, &engine(), &staked_at(0, balance)).unwrap().member;

            prop_assert_eq!(stepwise.multiplier_points, once.multiplier_points);
            prop_assert_eq!(stepwise.loyalty_epochs, once.loyalty_epochs);
            // Stepwise settlement truncates once per epoch.
            prop_assert!(stepwise.pending_reward <= once.pending_reward);
            prop_assert!(once.pending_reward - stepwise.pending_reward <= settlements);
        }

        #[test]
        fn scaled_never_below_base(
            rewards in prop::collection::vec(0u128..=1_000 * UNIT, 1..40),
            balance in 1u128..=1_000 * UNIT,
            points_epochs in 0u64..200,
        ) {
            let mut ledger = EpochLedger::new();
            for r in &rewards {
                ledger.append_epoch(*r, 1_000 * UNIT).unwrap();
            }
            let m = Member {
                multiplier_points: balance * points_epochs as u128,
                loyalty_epochs: points_epochs,
                stake_epoch_index: 0,
                checkpoint_index: 0,
                eligible_balance: balance / 2,
                balance,
                ..Member::default()
            };
            let s = settle(&ledger, &engine(), &m).unwrap();
            prop_assert_eq!(s.member.pending_reward, s.base + s.bonus);
            prop_assert_eq!(s.member.pending_bonus, s.bonus);
            let cap = ember_core::constants::MULTIPLIER_CAP_BPS as u128;
            prop_assert!(s.booked() * 10_000 <= s.base * cap + 2 * 10_000 * cap);
        }
    }
}
