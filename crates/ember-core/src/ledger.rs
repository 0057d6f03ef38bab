//! Append-only epoch ledger of cumulative reward-per-share snapshots.
//!
//! Allocation is O(1): appending an epoch computes one delta and never
//! touches member records. Members reconcile lazily against the ledger by
//! index, which is why snapshots are never mutated after they are appended.
//!
//! Rounding truncates toward zero. The remainder of
//! `reward × REWARD_PRECISION / total_staked` is never distributed; it is
//! bounded dust, not lost accounting.

use serde::{Deserialize, Serialize};

use crate::constants::REWARD_PRECISION;
use crate::error::VaultError;
use crate::math::{self, mul_div, U256};
use crate::types::EpochSnapshot;

/// Prefix sums of the ledger at one index. Index 0 is the empty prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cumulative {
    /// Σ delta up to the index.
    pub reward_per_share: u128,
    /// Σ `epoch × delta` up to the index.
    pub weighted: U256,
}

/// Reward-per-share sums over the epochs `(from, to]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpanSums {
    /// Last epoch before the span.
    pub from: u64,
    /// Last epoch in the span.
    pub to: u64,
    /// Σ delta over the span.
    pub delta: u128,
    /// Σ `epoch × delta` over the span.
    pub weighted: U256,
}

impl SpanSums {
    /// Number of epochs in the span.
    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    /// Whether the span covers no epochs.
    pub fn is_empty(&self) -> bool {
        self.to == self.from
    }
}

/// The epoch ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct EpochLedger {
    snapshots: Vec<EpochSnapshot>,
}

impl EpochLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self { snapshots: Vec::new() }
    }

    /// Number of epochs appended so far.
    pub fn current_index(&self) -> u64 {
        self.snapshots.len() as u64
    }

    /// Whether no epoch has been appended.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Most recent snapshot, if any.
    pub fn latest(&self) -> Option<&EpochSnapshot> {
        self.snapshots.last()
    }

    /// Iterate over all snapshots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &EpochSnapshot> {
        self.snapshots.iter()
    }

    /// Look up the snapshot for `index` (1-based).
    ///
    /// # Errors
    ///
    /// - [`VaultError::EpochOutOfRange`] if `index` is 0 or past the last epoch
    pub fn get_epoch(&self, index: u64) -> Result<EpochSnapshot, VaultError> {
        let len = self.current_index();
        if index == 0 || index > len {
            return Err(VaultError::EpochOutOfRange { index, len });
        }
        Ok(self.snapshots[(index - 1) as usize])
    }

    /// Prefix sums at `index`; index 0 yields zeros.
    pub fn cumulative_at(&self, index: u64) -> Result<Cumulative, VaultError> {
        if index == 0 {
            return Ok(Cumulative::default());
        }
        let snap = self.get_epoch(index)?;
        Ok(Cumulative {
            reward_per_share: snap.reward_per_share_cumulative,
            weighted: snap.weighted_reward_per_share_cumulative,
        })
    }

    /// Sums over the epochs `(from, to]`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::EpochOutOfRange`] if `from > to` or `to` is past the last epoch
    pub fn span(&self, from: u64, to: u64) -> Result<SpanSums, VaultError> {
        if from > to {
            return Err(VaultError::EpochOutOfRange { index: from, len: self.current_index() });
        }
        let start = self.cumulative_at(from)?;
        let end = self.cumulative_at(to)?;
        Ok(SpanSums {
            from,
            to,
            delta: math::sub(end.reward_per_share, start.reward_per_share)?,
            weighted: end.weighted.checked_sub(start.weighted)?,
        })
    }

    /// Compute the snapshot the next allocation would append, without
    /// appending it.
    ///
    /// `delta = reward_amount × REWARD_PRECISION / total_staked`, or 0 when
    /// nothing is staked.
    pub fn prepare_epoch(&self, reward_amount: u128, total_staked: u128) -> Result<EpochSnapshot, VaultError> {
        let index = self
            .current_index()
            .checked_add(1)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let prev = self.cumulative_at(self.current_index())?;

        let delta = if total_staked > 0 {
            mul_div(reward_amount, REWARD_PRECISION, total_staked)?
        } else {
            0
        };

        Ok(EpochSnapshot {
            index,
            reward_per_share_cumulative: math::add(prev.reward_per_share, delta)?,
            weighted_reward_per_share_cumulative: prev
                .weighted
                .checked_add(U256::product(index as u128, delta))?,
            reward_received: reward_amount,
            total_staked_at_epoch: total_staked,
        })
    }

    /// Append a snapshot produced by [`prepare_epoch`](Self::prepare_epoch).
    ///
    /// # Errors
    ///
    /// - [`VaultError::EpochOutOfRange`] if the snapshot is not the next index
    ///   or would make a cumulative value decrease
    pub fn commit_epoch(&mut self, snapshot: EpochSnapshot) -> Result<(), VaultError> {
        let len = self.current_index();
        if snapshot.index != len + 1 {
            return Err(VaultError::EpochOutOfRange { index: snapshot.index, len });
        }
        let prev = self.cumulative_at(len)?;
        if snapshot.reward_per_share_cumulative < prev.reward_per_share
            || snapshot.weighted_reward_per_share_cumulative < prev.weighted
        {
            return Err(VaultError::EpochOutOfRange { index: snapshot.index, len });
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Compute and append the next epoch in one step.
    pub fn append_epoch(&mut self, reward_amount: u128, total_staked: u128) -> Result<EpochSnapshot, VaultError> {
        let snapshot = self.prepare_epoch(reward_amount, total_staked)?;
        self.commit_epoch(snapshot)?;
        Ok(snapshot)
    }

    /// Check that indices are contiguous from 1, the reward-per-share never
    /// decreases, and each weighted sum adds exactly `index × delta`.
    pub fn verify(&self) -> Result<(), VaultError> {
        let mut prev = Cumulative::default();
        for (i, snap) in self.snapshots.iter().enumerate() {
            let expected = i as u64 + 1;
            let corrupt = VaultError::EpochOutOfRange { index: snap.index, len: self.current_index() };
            if snap.index != expected || snap.reward_per_share_cumulative < prev.reward_per_share {
                return Err(corrupt);
            }
            let delta = snap.reward_per_share_cumulative - prev.reward_per_share;
            let weighted = prev.weighted.checked_add(U256::product(expected as u128, delta))?;
            if snap.weighted_reward_per_share_cumulative != weighted {
                return Err(corrupt);
            }
            prev = Cumulative {
                reward_per_share: snap.reward_per_share_cumulative,
                weighted,
            };
        }
        Ok(())
    }
}
