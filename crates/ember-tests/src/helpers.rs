//! Shared fixtures for vault integration tests.

use ember_core::constants::UNIT;
use ember_core::error::VaultError;
use ember_core::memory::{FixedAllocator, MemoryToken};
use ember_core::types::AccountId;
use ember_vault::{Vault, VaultTotals};

pub type TestVault = Vault<MemoryToken, FixedAllocator>;

/// Stake and reward minted to every labelled account by [`fixture`].
pub const STARTING_BALANCE: u128 = 1_000_000 * UNIT;

pub fn alice() -> AccountId {
    AccountId::from_label("alice")
}

pub fn bob() -> AccountId {
    AccountId::from_label("bob")
}

pub fn carol() -> AccountId {
    AccountId::from_label("carol")
}

pub fn allocator() -> AccountId {
    AccountId::from_label("allocator")
}

/// Account that tops up the bonus reserve.
pub fn treasury() -> AccountId {
    AccountId::from_label("treasury")
}

/// An initialized vault where alice, bob and carol hold stake and the
/// allocator holds reward, each [`STARTING_BALANCE`].
pub fn fixture() -> TestVault {
    let mut stake = MemoryToken::new("STK");
    for a in [alice(), bob(), carol()] {
        stake.mint(&a, STARTING_BALANCE).unwrap();
    }
    let mut reward = MemoryToken::new("RWD");
    reward.mint(&allocator(), STARTING_BALANCE).unwrap();

    let mut vault = TestVault::new();
    vault.initialize(reward, stake, FixedAllocator(allocator())).unwrap();
    vault
}

/// Allocate `amount` and return nothing, panicking on failure.
pub fn allocate(vault: &mut TestVault, amount: u128) {
    vault.allocate_incentive(&allocator(), amount).unwrap();
}

/// Mint `amount` of reward to the treasury and deposit it into the bonus
/// reserve.
pub fn fund_reserve(vault: &mut TestVault, amount: u128) {
    vault.reward_asset_mut().unwrap().mint(&treasury(), amount).unwrap();
    vault.fund_reserve(&treasury(), amount).unwrap();
}

/// Σ pending reward over all members, caught up to the latest epoch.
pub fn total_earned(vault: &TestVault) -> Result<u128, VaultError> {
    let accounts: Vec<AccountId> = vault.member_store().iter().map(|(a, _)| *a).collect();
    accounts.iter().try_fold(0u128, |acc, a| Ok(acc + vault.earned(a)?))
}

/// Check the aggregate bookkeeping identities that must hold after every
/// committed operation.
pub fn assert_totals_consistent(vault: &TestVault) {
    let t: VaultTotals = vault.totals();
    let members = vault.member_store();

    assert_eq!(members.total_balance(), Some(t.total_staked), "total_staked drifted");
    assert!(t.pending_deposits <= t.total_staked, "pending deposits above stake");
    assert!(
        t.base_booked <= t.total_allocated - t.undistributed,
        "booked more base reward than was distributed"
    );

    let pending: u128 = members.iter().map(|(_, m)| m.pending_reward).sum();
    assert_eq!(pending + t.total_claimed, t.base_booked + t.bonus_booked, "pending + claimed != booked");

    let pending_bonus: u128 = members.iter().map(|(_, m)| m.pending_bonus).sum();
    assert_eq!(pending_bonus + t.bonus_paid, t.bonus_booked, "pending + paid bonus != booked bonus");
    assert!(t.bonus_paid <= t.undistributed + t.reserve_funded, "bonus paid beyond its budget");
    for (account, m) in members.iter() {
        assert!(m.pending_bonus <= m.pending_reward, "{account} carries more bonus than reward");
    }

    let custody = vault.reward_asset().unwrap().custody();
    assert_eq!(
        custody,
        t.total_allocated + t.reserve_funded - t.total_claimed,
        "reward custody drifted"
    );

    let frozen: u128 = members
        .iter()
        .map(|(_, m)| m.frozen_balance(vault.current_epoch()))
        .sum();
    assert_eq!(frozen, t.pending_deposits, "pending deposits drifted");
}
