//! Core vault types: account identifiers, epoch snapshots, member records.
//!
//! All amounts are `u128` base units (1 token = 10^18 units).
//! Epoch indices and loyalty counters are `u64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{MULTIPLIER_BASE_BPS, MULTIPLIER_CAP_BPS, MULTIPLIER_RATE_PER_EPOCH_BPS};
use crate::error::VaultError;
use crate::math::U256;

/// A 32-byte account identifier.
///
/// Callers are always identified explicitly; the vault never infers who is
/// calling an operation.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero account.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create an AccountId from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic account id from a human-readable label.
    ///
    /// The id is the BLAKE3 hash of the label bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use ember_core::types::AccountId;
    ///
    /// let alice = AccountId::from_label("alice");
    /// assert_eq!(alice, AccountId::from_label("alice"));
    /// assert_ne!(alice, AccountId::from_label("bob"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero account.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| VaultError::InvalidAccount(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| VaultError::InvalidAccount(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(array))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// One entry of the append-only epoch ledger.
///
/// Immutable once appended. Both cumulative accumulators are non-decreasing
/// in `index`.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct EpochSnapshot {
    /// Epoch number, starting at 1.
    pub index: u64,
    /// Σ per-epoch reward-per-share deltas, scaled by `REWARD_PRECISION`.
    pub reward_per_share_cumulative: u128,
    /// Σ `index × delta`. Used to integrate a linearly growing multiplier
    /// over an epoch span without walking it. Wider than the deltas it sums:
    /// an index times a large delta does not fit in `u128`.
    pub weighted_reward_per_share_cumulative: U256,
    /// Raw reward amount allocated in this epoch.
    pub reward_received: u128,
    /// Eligible stake the allocation was divided by.
    pub total_staked_at_epoch: u128,
}

/// Per-account staking record.
///
/// Created on first stake and kept for the lifetime of the account, including
/// at zero balance.
///
/// # Invariants
///
/// * `stake_epoch_index <= checkpoint_index <= ledger length`
/// * `eligible_balance <= balance` while the deposit window is open
/// * `pending_bonus <= pending_reward`
/// * `multiplier_points` never decreases except on claim, where it resets to 0
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Member {
    /// Staked amount.
    pub balance: u128,
    /// Cumulative reward-per-share last reconciled against.
    pub reward_per_share_checkpoint: u128,
    /// Epoch index of `reward_per_share_checkpoint`.
    pub checkpoint_index: u64,
    /// Settled, unclaimed reward.
    pub pending_reward: u128,
    /// Part of `pending_reward` added by the loyalty multiplier. Paid from
    /// the vault's bonus budget and carried forward while that runs short.
    pub pending_bonus: u128,
    /// Σ balance over accruing epochs in the current window.
    pub multiplier_points: u128,
    /// Number of epochs that accrued points in the current window.
    pub loyalty_epochs: u64,
    /// Ledger length at the most recent stake or claim.
    pub stake_epoch_index: u64,
    /// Balance that earns during the deposit epoch (`stake_epoch_index + 1`).
    pub eligible_balance: u128,
}

impl Member {
    /// Whether the deposit epoch following the last stake or claim has not
    /// been settled yet.
    pub fn deposit_window_open(&self) -> bool {
        self.checkpoint_index == self.stake_epoch_index
    }

    /// Stake deposited during the epoch currently open at `current_index`
    /// that does not earn until the next allocation.
    ///
    /// Zero unless the member's deposit window is open at `current_index`.
    pub fn frozen_balance(&self, current_index: u64) -> u128 {
        if self.deposit_window_open() && self.stake_epoch_index == current_index {
            self.balance.saturating_sub(self.eligible_balance)
        } else {
            0
        }
    }

    /// Start a new accrual window at `current_index`.
    ///
    /// Must be called on a member already settled to `current_index`. If a
    /// window was already opened at this index, the eligible balance recorded
    /// then is kept so repeated deposits in one epoch stay excluded.
    pub fn open_window(&mut self, current_index: u64) {
        if self.stake_epoch_index != current_index {
            self.stake_epoch_index = current_index;
            self.eligible_balance = self.balance;
        }
    }
}

/// Loyalty multiplier parameters, in basis points.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct MultiplierParams {
    /// Factor of a member with no loyalty. 10 000 = 1.0×.
    pub base_bps: u64,
    /// Factor growth per accruing epoch.
    pub rate_per_epoch_bps: u64,
    /// Maximum factor.
    pub cap_bps: u64,
}

impl Default for MultiplierParams {
    fn default() -> Self {
        Self {
            base_bps: MULTIPLIER_BASE_BPS,
            rate_per_epoch_bps: MULTIPLIER_RATE_PER_EPOCH_BPS,
            cap_bps: MULTIPLIER_CAP_BPS,
        }
    }
}

impl MultiplierParams {
    /// Reject parameter sets that would scale rewards below their base amount.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.base_bps == 0 {
            return Err(VaultError::InvalidConfig("base_bps must be positive".into()));
        }
        if self.cap_bps < self.base_bps {
            return Err(VaultError::InvalidConfig(format!(
                "cap_bps {} below base_bps {}",
                self.cap_bps, self.base_bps
            )));
        }
        Ok(())
    }
}
